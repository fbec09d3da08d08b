use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tenant scope for queue operations.
///
/// Every job belongs to exactly one tenant. Status lookups and
/// acknowledgements are checked against it, so one tenant can never
/// observe or settle another tenant's jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueCtx {
    pub tenant_id: String,

    /// Correlates a job with the HTTP request that dispatched it
    pub request_id: Option<String>,

    pub tags: HashMap<String, String>,
}

impl QueueCtx {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            request_id: None,
            tags: HashMap::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn get_tag(&self, key: &str) -> Option<&String> {
        self.tags.get(key)
    }
}
