//! MySQL administration over an sqlx pool.
//!
//! DDL goes through the text protocol (`raw_sql`), so identifiers and
//! literals are quoted here rather than bound.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{Executor, MySql, Transaction};
use tracing::debug;

use super::{ClientError, ClientResult, DatabaseAdmin, ScriptSession};

/// Administrative login as stored in the secret store.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminLogin {
    pub username: String,
    pub password: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

pub fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn account(user: &str, host: &str) -> String {
    format!("{}@{}", quote_literal(user), quote_literal(host))
}

fn db_error(err: sqlx::Error) -> ClientError {
    ClientError::backend("mysql", err)
}

#[derive(Clone)]
pub struct MySqlAdmin {
    pool: MySqlPool,
}

impl MySqlAdmin {
    /// Connections are opened on first use.
    pub fn connect_lazy(login: &AdminLogin, max_connections: u32) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&login.host)
            .port(login.port.unwrap_or(3306))
            .username(&login.username)
            .password(&login.password);

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy_with(options);

        Self { pool }
    }

    async fn run(&self, sql: &str) -> ClientResult<()> {
        debug!(statement = %sql.split_whitespace().take(3).collect::<Vec<_>>().join(" "), "mysql admin");
        sqlx::raw_sql(sql).execute(&self.pool).await.map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseAdmin for MySqlAdmin {
    async fn create_user(&self, user: &str, host: &str, password: &str) -> ClientResult<()> {
        self.run(&format!(
            "CREATE USER {} IDENTIFIED BY {}",
            account(user, host),
            quote_literal(password)
        ))
        .await
    }

    async fn create_database(&self, name: &str) -> ClientResult<()> {
        self.run(&format!("CREATE DATABASE {}", quote_ident(name))).await
    }

    async fn grant(&self, privileges: &[&str], database: &str, user: &str, host: &str) -> ClientResult<()> {
        self.run(&format!(
            "GRANT {} ON {}.* TO {}",
            privileges.join(", "),
            quote_ident(database),
            account(user, host)
        ))
        .await
    }

    async fn flush_privileges(&self) -> ClientResult<()> {
        self.run("FLUSH PRIVILEGES").await
    }

    async fn drop_database(&self, name: &str) -> ClientResult<()> {
        self.run(&format!("DROP DATABASE IF EXISTS {}", quote_ident(name))).await
    }

    async fn drop_user(&self, user: &str, host: &str) -> ClientResult<()> {
        self.run(&format!("DROP USER IF EXISTS {}", account(user, host))).await
    }

    async fn open_session(&self, database: &str) -> ClientResult<Box<dyn ScriptSession>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let use_db = format!("USE {}", quote_ident(database));
        (&mut *tx).execute(sqlx::raw_sql(&use_db))
            .await
            .map_err(db_error)?;
        Ok(Box::new(MySqlScriptSession { tx }))
    }
}

struct MySqlScriptSession {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl ScriptSession for MySqlScriptSession {
    async fn execute(&mut self, statement: &str) -> ClientResult<()> {
        (&mut *self.tx)
            .execute(sqlx::raw_sql(statement))
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> ClientResult<()> {
        self.tx.commit().await.map_err(db_error)
    }
}
