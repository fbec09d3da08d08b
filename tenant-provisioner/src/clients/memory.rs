//! In-memory collaborators.
//!
//! Each fake keeps its state behind a `parking_lot` mutex and writes one line
//! per call into a shared [`CallLog`], so tests can assert both on resulting
//! state and on what was (or was not) touched.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    ClientError, ClientResult, Collaborators, ContentStore, DatabaseAdmin, NewRecordStoreAccessKey,
    NewRecordStoreEndpoint, NewRecordStoreUser, ObjectStore, RecordStoreAccessKey, RecordStoreApi,
    RecordStoreEndpoint, RecordStoreUser, RoutingTable, ScriptSession, SecretStore,
    StackDescription, StackParameter, StackRequest, StackService, TaskRequest, TaskRunner,
    TaskState, UpdateOutcome,
};

/// Ordered journal of every call made against the fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Entries that are not read-only lookups
    pub fn mutations(&self) -> Vec<String> {
        const READS: [&str; 6] = ["describe", "list", "get", "has", "read", "find"];
        self.entries()
            .into_iter()
            .filter(|e| {
                let verb = e.split(['.', ' ']).nth(1).unwrap_or_default();
                !READS.iter().any(|r| verb.starts_with(r))
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

// ---- Stacks ----

#[derive(Default)]
pub struct MemoryStacks {
    log: CallLog,
    stacks: Mutex<BTreeMap<String, StackDescription>>,
    resources: Mutex<BTreeMap<(String, String), String>>,
    requests: Mutex<Vec<StackRequest>>,
    created_status: Mutex<Option<String>>,
}

impl MemoryStacks {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn insert(&self, stack: StackDescription) {
        self.stacks.lock().insert(stack.name.clone(), stack);
    }

    pub fn insert_resource(&self, stack: &str, logical_id: &str, physical_id: &str) {
        self.resources
            .lock()
            .insert((stack.to_string(), logical_id.to_string()), physical_id.to_string());
    }

    pub fn set_status(&self, name: &str, status: &str) {
        if let Some(stack) = self.stacks.lock().get_mut(name) {
            stack.status = status.to_string();
        }
    }

    pub fn get(&self, name: &str) -> Option<StackDescription> {
        self.stacks.lock().get(name).cloned()
    }

    /// Status new stacks start in. Defaults to `CREATE_COMPLETE`.
    pub fn create_as(&self, status: &str) {
        *self.created_status.lock() = Some(status.to_string());
    }

    /// Every create/update request received, in order
    pub fn requests(&self) -> Vec<StackRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl StackService for MemoryStacks {
    async fn describe_stack(&self, name: &str) -> ClientResult<Option<StackDescription>> {
        self.log.record(format!("stacks.describe {name}"));
        Ok(self.get(name))
    }

    async fn list_stacks(&self) -> ClientResult<Vec<StackDescription>> {
        self.log.record("stacks.list");
        Ok(self.stacks.lock().values().cloned().collect())
    }

    async fn create_stack(&self, request: StackRequest) -> ClientResult<()> {
        self.log.record(format!("stacks.create {}", request.name));
        let mut stacks = self.stacks.lock();
        if stacks.contains_key(&request.name) {
            return Err(ClientError::AlreadyExists(request.name));
        }

        let parameters = request
            .parameters
            .iter()
            .filter_map(|p| match p {
                StackParameter::Value { key, value } => Some((key.clone(), value.clone())),
                StackParameter::UsePrevious { .. } => None,
            })
            .collect();
        stacks.insert(
            request.name.clone(),
            StackDescription {
                name: request.name.clone(),
                status: self
                    .created_status
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "CREATE_COMPLETE".into()),
                parameters,
                outputs: BTreeMap::new(),
                tags: request.tags.iter().cloned().collect(),
            },
        );
        self.requests.lock().push(request);
        Ok(())
    }

    async fn update_stack(&self, request: StackRequest) -> ClientResult<UpdateOutcome> {
        self.log.record(format!("stacks.update {}", request.name));
        let mut stacks = self.stacks.lock();
        let stack = stacks
            .get_mut(&request.name)
            .ok_or_else(|| ClientError::NotFound(request.name.clone()))?;

        // Keys left out of the request fall back to template defaults, which
        // here means they disappear.
        let mut next = BTreeMap::new();
        for parameter in &request.parameters {
            match parameter {
                StackParameter::Value { key, value } => {
                    next.insert(key.clone(), value.clone());
                }
                StackParameter::UsePrevious { key } => {
                    let previous = stack.parameters.get(key).ok_or_else(|| {
                        ClientError::backend("stacks", format!("no previous value for {key}"))
                    })?;
                    next.insert(key.clone(), previous.clone());
                }
            }
        }

        let outcome = if next == stack.parameters {
            UpdateOutcome::NoChanges
        } else {
            stack.parameters = next;
            stack.status = "UPDATE_COMPLETE".into();
            UpdateOutcome::Updating
        };
        drop(stacks);
        self.requests.lock().push(request);
        Ok(outcome)
    }

    async fn delete_stack(&self, name: &str) -> ClientResult<()> {
        self.log.record(format!("stacks.delete {name}"));
        self.stacks.lock().remove(name);
        Ok(())
    }

    async fn physical_resource_id(&self, stack: &str, logical_id: &str) -> ClientResult<Option<String>> {
        self.log.record(format!("stacks.describe_resource {stack} {logical_id}"));
        Ok(self
            .resources
            .lock()
            .get(&(stack.to_string(), logical_id.to_string()))
            .cloned())
    }
}

// ---- Secrets ----

#[derive(Default)]
pub struct MemorySecrets {
    log: CallLog,
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySecrets {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn insert(&self, name: &str, value: &str) {
        self.values.lock().insert(name.to_string(), value.to_string());
    }

    pub fn names(&self) -> Vec<String> {
        self.values.lock().keys().cloned().collect()
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.values.lock().get(name).cloned()
    }

    pub fn arn(name: &str) -> String {
        format!("arn:aws:secretsmanager:memory:secret:{name}")
    }
}

#[async_trait]
impl SecretStore for MemorySecrets {
    async fn create_secret(&self, name: &str, value: &str) -> ClientResult<String> {
        self.log.record(format!("secrets.create {name}"));
        let mut values = self.values.lock();
        if values.contains_key(name) {
            return Err(ClientError::AlreadyExists(name.to_string()));
        }
        values.insert(name.to_string(), value.to_string());
        Ok(Self::arn(name))
    }

    async fn get_secret(&self, name: &str) -> ClientResult<String> {
        self.log.record(format!("secrets.get {name}"));
        self.value(name).ok_or_else(|| ClientError::NotFound(name.to_string()))
    }

    async fn delete_secret(&self, name: &str) -> ClientResult<()> {
        self.log.record(format!("secrets.delete {name}"));
        self.values
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(name.to_string()))
    }
}

// ---- Tasks ----

pub struct MemoryTasks {
    log: CallLog,
    runs: Mutex<Vec<TaskRequest>>,
    exit_code: Mutex<Option<i32>>,
}

impl MemoryTasks {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            runs: Mutex::new(Vec::new()),
            exit_code: Mutex::new(Some(0)),
        }
    }

    /// Exit code reported for every task once stopped
    pub fn set_exit_code(&self, code: Option<i32>) {
        *self.exit_code.lock() = code;
    }

    pub fn runs(&self) -> Vec<TaskRequest> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl TaskRunner for MemoryTasks {
    async fn run_task(&self, request: TaskRequest) -> ClientResult<String> {
        self.log
            .record(format!("tasks.run {} {}", request.task_definition, request.command.join(" ")));
        let mut runs = self.runs.lock();
        runs.push(request);
        Ok(format!("arn:aws:ecs:memory:task/{}", runs.len()))
    }

    async fn describe_task(&self, _cluster: &str, task_arn: &str) -> ClientResult<TaskState> {
        self.log.record(format!("tasks.describe {task_arn}"));
        Ok(TaskState {
            last_status: "STOPPED".into(),
            exit_code: *self.exit_code.lock(),
            stopped_reason: Some("Essential container in task exited".into()),
        })
    }
}

// ---- Database ----

#[derive(Default)]
struct DatabaseState {
    users: BTreeSet<(String, String)>,
    databases: BTreeSet<String>,
    grants: Vec<String>,
    executed: Vec<String>,
    commits: usize,
}

#[derive(Default)]
pub struct MemoryDatabase {
    log: CallLog,
    state: Arc<Mutex<DatabaseState>>,
    failing: Arc<Mutex<Vec<String>>>,
}

impl MemoryDatabase {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// Script statements containing `needle` fail when executed
    pub fn fail_statements_containing(&self, needle: &str) {
        self.failing.lock().push(needle.to_string());
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.state.lock().databases.contains(name)
    }

    pub fn has_user(&self, user: &str, host: &str) -> bool {
        self.state.lock().users.contains(&(user.to_string(), host.to_string()))
    }

    pub fn grants(&self) -> Vec<String> {
        self.state.lock().grants.clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }
}

#[async_trait]
impl DatabaseAdmin for MemoryDatabase {
    async fn create_user(&self, user: &str, host: &str, _password: &str) -> ClientResult<()> {
        self.log.record(format!("database.create_user {user}@{host}"));
        if !self.state.lock().users.insert((user.to_string(), host.to_string())) {
            return Err(ClientError::AlreadyExists(format!("user {user}")));
        }
        Ok(())
    }

    async fn create_database(&self, name: &str) -> ClientResult<()> {
        self.log.record(format!("database.create_database {name}"));
        if !self.state.lock().databases.insert(name.to_string()) {
            return Err(ClientError::AlreadyExists(format!("database {name}")));
        }
        Ok(())
    }

    async fn grant(&self, privileges: &[&str], database: &str, user: &str, host: &str) -> ClientResult<()> {
        self.log.record(format!("database.grant {database} {user}@{host}"));
        self.state
            .lock()
            .grants
            .push(format!("{} ON {database}.* TO {user}@{host}", privileges.join(", ")));
        Ok(())
    }

    async fn flush_privileges(&self) -> ClientResult<()> {
        self.log.record("database.flush_privileges");
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> ClientResult<()> {
        self.log.record(format!("database.drop_database {name}"));
        self.state.lock().databases.remove(name);
        Ok(())
    }

    async fn drop_user(&self, user: &str, host: &str) -> ClientResult<()> {
        self.log.record(format!("database.drop_user {user}@{host}"));
        self.state.lock().users.remove(&(user.to_string(), host.to_string()));
        Ok(())
    }

    async fn open_session(&self, database: &str) -> ClientResult<Box<dyn ScriptSession>> {
        self.log.record(format!("database.open_session {database}"));
        if !self.state.lock().databases.contains(database) {
            return Err(ClientError::NotFound(format!("database {database}")));
        }
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
            failing: self.failing.clone(),
            pending: Vec::new(),
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<DatabaseState>>,
    failing: Arc<Mutex<Vec<String>>>,
    pending: Vec<String>,
}

#[async_trait]
impl ScriptSession for MemorySession {
    async fn execute(&mut self, statement: &str) -> ClientResult<()> {
        if self.failing.lock().iter().any(|needle| statement.contains(needle.as_str())) {
            return Err(ClientError::backend("mysql", format!("statement rejected: {statement}")));
        }
        self.pending.push(statement.to_string());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> ClientResult<()> {
        let mut state = self.state.lock();
        state.executed.extend(self.pending);
        state.commits += 1;
        Ok(())
    }
}

// ---- Object storage ----

#[derive(Default)]
pub struct MemoryObjects {
    log: CallLog,
    keys: Mutex<BTreeSet<String>>,
}

impl MemoryObjects {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn put(&self, key: &str) {
        self.keys.lock().insert(key.to_string());
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn has_prefix(&self, prefix: &str) -> ClientResult<bool> {
        self.log.record(format!("objects.has_prefix {prefix}"));
        Ok(self.keys.lock().iter().any(|k| k.starts_with(prefix)))
    }

    async fn list_prefixes(&self) -> ClientResult<Vec<String>> {
        self.log.record("objects.list_prefixes");
        let prefixes: BTreeSet<String> = self
            .keys
            .lock()
            .iter()
            .filter_map(|k| k.split_once('/').map(|(head, _)| head.to_string()))
            .collect();
        Ok(prefixes.into_iter().collect())
    }
}

// ---- Record store ----

#[derive(Default)]
struct RecordStoreState {
    users: Vec<RecordStoreUser>,
    endpoints: Vec<(RecordStoreEndpoint, NewRecordStoreEndpoint)>,
    keys: BTreeMap<String, Vec<NewRecordStoreAccessKey>>,
}

#[derive(Default)]
pub struct MemoryRecordStore {
    log: CallLog,
    state: Mutex<RecordStoreState>,
    ids: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.ids.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn add_user(&self, email: &str) -> String {
        let uuid = self.next_id("user");
        self.state.lock().users.push(RecordStoreUser {
            uuid: uuid.clone(),
            email: email.to_string(),
        });
        uuid
    }

    pub fn add_endpoint(&self, name: &str) -> String {
        let id = self.next_id("lrs");
        let endpoint = RecordStoreEndpoint {
            id: id.clone(),
            name: name.to_string(),
        };
        let body = NewRecordStoreEndpoint {
            owner: String::new(),
            lrs_name: name.to_string(),
            active: true,
            strict: false,
            compatibility_level: 0,
            verbose_logs: true,
            permissions: BTreeMap::new(),
        };
        self.state.lock().endpoints.push((endpoint, body));
        id
    }

    pub fn users(&self) -> Vec<RecordStoreUser> {
        self.state.lock().users.clone()
    }

    /// Endpoint creation bodies, in creation order
    pub fn endpoints(&self) -> Vec<NewRecordStoreEndpoint> {
        self.state.lock().endpoints.iter().map(|(_, body)| body.clone()).collect()
    }

    pub fn access_keys(&self, endpoint_name: &str) -> Vec<NewRecordStoreAccessKey> {
        self.state.lock().keys.get(endpoint_name).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl RecordStoreApi for MemoryRecordStore {
    async fn find_users_by_email(&self, email: &str) -> ClientResult<Vec<RecordStoreUser>> {
        self.log.record(format!("record_store.find_users {email}"));
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .filter(|u| u.email == email)
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: &NewRecordStoreUser) -> ClientResult<RecordStoreUser> {
        self.log.record(format!("record_store.create_user {}", user.email));
        let created = RecordStoreUser {
            uuid: self.next_id("user"),
            email: user.email.clone(),
        };
        self.state.lock().users.push(created.clone());
        Ok(created)
    }

    async fn list_endpoints(&self) -> ClientResult<Vec<RecordStoreEndpoint>> {
        self.log.record("record_store.list_endpoints");
        Ok(self.state.lock().endpoints.iter().map(|(e, _)| e.clone()).collect())
    }

    async fn create_endpoint(&self, endpoint: &NewRecordStoreEndpoint) -> ClientResult<RecordStoreEndpoint> {
        self.log.record(format!("record_store.create_endpoint {}", endpoint.lrs_name));
        let created = RecordStoreEndpoint {
            id: self.next_id("lrs"),
            name: endpoint.lrs_name.clone(),
        };
        self.state.lock().endpoints.push((created.clone(), endpoint.clone()));
        Ok(created)
    }

    async fn delete_endpoint(&self, id: &str) -> ClientResult<()> {
        self.log.record(format!("record_store.delete_endpoint {id}"));
        let mut state = self.state.lock();
        let before = state.endpoints.len();
        state.endpoints.retain(|(e, _)| e.id != id);
        if state.endpoints.len() == before {
            return Err(ClientError::NotFound(format!("lrs {id}")));
        }
        Ok(())
    }

    async fn list_access_keys(&self, endpoint_name: &str) -> ClientResult<Vec<RecordStoreAccessKey>> {
        self.log.record(format!("record_store.list_access_keys {endpoint_name}"));
        Ok(self
            .access_keys(endpoint_name)
            .into_iter()
            .map(|k| RecordStoreAccessKey { name: k.name })
            .collect())
    }

    async fn create_access_key(&self, endpoint_name: &str, key: &NewRecordStoreAccessKey) -> ClientResult<()> {
        self.log.record(format!("record_store.create_access_key {endpoint_name}"));
        self.state
            .lock()
            .keys
            .entry(endpoint_name.to_string())
            .or_default()
            .push(key.clone());
        Ok(())
    }
}

// ---- Routing ----

#[derive(Default)]
pub struct MemoryRouting {
    log: CallLog,
    priorities: Mutex<Vec<String>>,
}

impl MemoryRouting {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            priorities: Mutex::new(vec!["default".into()]),
        }
    }

    pub fn add_rule(&self, priority: impl Into<String>) {
        self.priorities.lock().push(priority.into());
    }
}

#[async_trait]
impl RoutingTable for MemoryRouting {
    async fn rule_priorities(&self, listener_arn: &str) -> ClientResult<Vec<String>> {
        self.log.record(format!("routing.list_rules {listener_arn}"));
        Ok(self.priorities.lock().clone())
    }
}

// ---- Content ----

#[derive(Default)]
struct ContentState {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, String>,
}

/// Paths are plain keys; a directory exists once created or once a file
/// sits beneath it.
#[derive(Default)]
pub struct MemoryContent {
    log: CallLog,
    state: Mutex<ContentState>,
}

impl MemoryContent {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn put_file(&self, path: impl Into<PathBuf>, contents: &str) {
        self.state.lock().files.insert(path.into(), contents.to_string());
    }

    pub fn put_dir(&self, path: impl Into<PathBuf>) {
        self.state.lock().dirs.insert(path.into());
    }

    pub fn file(&self, path: &Path) -> Option<String> {
        self.state.lock().files.get(path).cloned()
    }

    pub fn has_path(&self, path: &Path) -> bool {
        let state = self.state.lock();
        state.dirs.iter().any(|d| d.starts_with(path)) || state.files.keys().any(|f| f.starts_with(path))
    }
}

#[async_trait]
impl ContentStore for MemoryContent {
    async fn create_dir(&self, path: &Path) -> ClientResult<()> {
        self.log.record(format!("content.create_dir {}", path.display()));
        if self.has_path(path) {
            return Err(ClientError::AlreadyExists(path.display().to_string()));
        }
        self.put_dir(path);
        Ok(())
    }

    async fn copy_tree(&self, from: &Path, to: &Path) -> ClientResult<()> {
        self.log
            .record(format!("content.copy_tree {} {}", from.display(), to.display()));
        let mut state = self.state.lock();
        let copies: Vec<(PathBuf, String)> = state
            .files
            .iter()
            .filter_map(|(path, body)| {
                path.strip_prefix(from).ok().map(|rel| (to.join(rel), body.clone()))
            })
            .collect();
        if copies.is_empty() && !state.dirs.contains(from) {
            return Err(ClientError::NotFound(from.display().to_string()));
        }
        state.dirs.insert(to.to_path_buf());
        state.files.extend(copies);
        Ok(())
    }

    async fn extract_archive(&self, archive: &Path, into: &Path) -> ClientResult<()> {
        self.log
            .record(format!("content.extract {} {}", archive.display(), into.display()));
        let mut state = self.state.lock();
        if !state.files.contains_key(archive) {
            return Err(ClientError::NotFound(archive.display().to_string()));
        }
        state.dirs.insert(into.to_path_buf());
        Ok(())
    }

    async fn remove_tree(&self, path: &Path) -> ClientResult<()> {
        self.log.record(format!("content.remove_tree {}", path.display()));
        if !self.has_path(path) {
            return Err(ClientError::NotFound(path.display().to_string()));
        }
        let mut state = self.state.lock();
        state.dirs.retain(|d| !d.starts_with(path));
        state.files.retain(|f, _| !f.starts_with(path));
        Ok(())
    }

    async fn read_to_string(&self, path: &Path) -> ClientResult<String> {
        self.log.record(format!("content.read {}", path.display()));
        self.file(path)
            .ok_or_else(|| ClientError::NotFound(path.display().to_string()))
    }
}

/// All eight fakes sharing one [`CallLog`].
pub struct MemoryWorld {
    pub log: CallLog,
    pub stacks: Arc<MemoryStacks>,
    pub secrets: Arc<MemorySecrets>,
    pub tasks: Arc<MemoryTasks>,
    pub database: Arc<MemoryDatabase>,
    pub objects: Arc<MemoryObjects>,
    pub record_store: Arc<MemoryRecordStore>,
    pub routing: Arc<MemoryRouting>,
    pub content: Arc<MemoryContent>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            stacks: Arc::new(MemoryStacks::new(log.clone())),
            secrets: Arc::new(MemorySecrets::new(log.clone())),
            tasks: Arc::new(MemoryTasks::new(log.clone())),
            database: Arc::new(MemoryDatabase::new(log.clone())),
            objects: Arc::new(MemoryObjects::new(log.clone())),
            record_store: Arc::new(MemoryRecordStore::new(log.clone())),
            routing: Arc::new(MemoryRouting::new(log.clone())),
            content: Arc::new(MemoryContent::new(log.clone())),
            log,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            stacks: self.stacks.clone(),
            secrets: self.secrets.clone(),
            tasks: self.tasks.clone(),
            database: self.database.clone(),
            objects: self.objects.clone(),
            record_store: self.record_store.clone(),
            routing: self.routing.clone(),
            content: self.content.clone(),
        }
    }
}

impl Default for MemoryWorld {
    fn default() -> Self {
        Self::new()
    }
}
