use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tenant_core::naming::{secret_name, SecretPurpose};
use tenant_core::{TenantError, TenantId, TenantResult};
use tracing::{info, instrument, warn};

use super::StepOutcome;
use crate::clients::{ClientError, SecretStore};

pub const SECRET_LENGTH: usize = 20;

pub const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const CRON_KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn random_string(length: usize, alphabet: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// A registered secret. Only the name and ARN travel; the value stays in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSecrets {
    pub db_password: SecretRef,
    pub user_password: SecretRef,
    pub lrs_key_password: SecretRef,
    pub cron_key: SecretRef,
    pub smtp_password: SecretRef,
}

pub struct CredentialGenerator {
    secrets: Arc<dyn SecretStore>,
}

impl CredentialGenerator {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    pub async fn generate_secret(
        &self,
        tenant: &TenantId,
        purpose: SecretPurpose,
        length: usize,
        alphabet: &[u8],
    ) -> TenantResult<SecretRef> {
        let value = random_string(length, alphabet);
        self.register(tenant, purpose, &value).await
    }

    pub async fn register(&self, tenant: &TenantId, purpose: SecretPurpose, value: &str) -> TenantResult<SecretRef> {
        let name = secret_name(tenant, purpose);
        match self.secrets.create_secret(&name, value).await {
            Ok(arn) => {
                info!(secret = %name, "registered secret");
                Ok(SecretRef { name, arn })
            }
            Err(ClientError::AlreadyExists(_)) => Err(TenantError::SecretAlreadyExists(name)),
            Err(e) => Err(TenantError::provision("secrets", e)),
        }
    }

    /// Register all five secrets. A supplied SMTP password is stored as given.
    #[instrument(skip(self, smtp_password), fields(tenant_id = %tenant))]
    pub async fn provision_all(&self, tenant: &TenantId, smtp_password: Option<&str>) -> TenantResult<TenantSecrets> {
        let db_password = self
            .generate_secret(tenant, SecretPurpose::DbPassword, SECRET_LENGTH, PASSWORD_ALPHABET)
            .await?;
        let user_password = self
            .generate_secret(tenant, SecretPurpose::UserPassword, SECRET_LENGTH, PASSWORD_ALPHABET)
            .await?;
        let lrs_key_password = self
            .generate_secret(tenant, SecretPurpose::LrsKeyPassword, SECRET_LENGTH, PASSWORD_ALPHABET)
            .await?;
        let cron_key = self
            .generate_secret(tenant, SecretPurpose::CronKey, SECRET_LENGTH, CRON_KEY_ALPHABET)
            .await?;
        let smtp_password = match smtp_password {
            Some(value) => self.register(tenant, SecretPurpose::SmtpPassword, value).await?,
            None => {
                self.generate_secret(tenant, SecretPurpose::SmtpPassword, SECRET_LENGTH, PASSWORD_ALPHABET)
                    .await?
            }
        };

        Ok(TenantSecrets {
            db_password,
            user_password,
            lrs_key_password,
            cron_key,
            smtp_password,
        })
    }

    pub async fn read(&self, tenant: &TenantId, purpose: SecretPurpose) -> TenantResult<String> {
        let name = secret_name(tenant, purpose);
        self.secrets
            .get_secret(&name)
            .await
            .map_err(|e| TenantError::provision("secrets", e))
    }

    /// Attempt every deletion. Missing secrets are skipped, not failures.
    #[instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn delete_all(&self, tenant: &TenantId) -> Vec<(String, StepOutcome)> {
        let mut outcomes = Vec::with_capacity(SecretPurpose::ALL.len());
        for purpose in SecretPurpose::ALL {
            let name = secret_name(tenant, purpose);
            let outcome = match self.secrets.delete_secret(&name).await {
                Ok(()) => StepOutcome::Done,
                Err(e) if e.is_not_found() => {
                    warn!(secret = %name, "secret already absent");
                    StepOutcome::Skipped
                }
                Err(e) => {
                    warn!(secret = %name, error = %e, "secret delete failed");
                    StepOutcome::Failed(e.to_string())
                }
            };
            outcomes.push((format!("secret:{name}"), outcome));
        }
        outcomes
    }
}
