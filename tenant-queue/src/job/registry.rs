use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{Job, JobError, JobMessage, QueueError, QueueResult};

/// Type-erased job handler for runtime dispatch
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(
        &self,
        message: &JobMessage,
        context: Arc<dyn Any + Send + Sync>,
    ) -> Result<Option<serde_json::Value>, JobError>;

    fn job_type(&self) -> &'static str;
}

struct ConcreteJobHandler<J: Job> {
    _phantom: std::marker::PhantomData<J>,
}

impl<J: Job> ConcreteJobHandler<J> {
    fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<J: Job> JobHandler for ConcreteJobHandler<J> {
    async fn execute(
        &self,
        message: &JobMessage,
        context: Arc<dyn Any + Send + Sync>,
    ) -> Result<Option<serde_json::Value>, JobError> {
        let job: J = serde_json::from_value(message.payload.clone())
            .map_err(|e| JobError::Permanent(format!("Failed to deserialize job: {}", e)))?;

        let typed_context = context
            .downcast_ref::<J::Context>()
            .ok_or_else(|| JobError::Permanent("Invalid context type".to_string()))?
            .clone();

        let result = job.execute(typed_context).await?;

        let value = serde_json::to_value(&result)
            .map_err(|e| JobError::Permanent(format!("Failed to serialize result: {}", e)))?;

        Ok(match value {
            serde_json::Value::Null => None,
            other => Some(other),
        })
    }

    fn job_type(&self) -> &'static str {
        J::JOB_TYPE
    }
}

/// Registry mapping job types to their handlers
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<J: Job>(&mut self) -> QueueResult<()> {
        let handler = Arc::new(ConcreteJobHandler::<J>::new());
        let job_type = handler.job_type().to_string();

        if self.handlers.contains_key(&job_type) {
            return Err(QueueError::DuplicateJobType(job_type));
        }

        self.handlers.insert(job_type, handler);
        Ok(())
    }

    pub async fn execute_job(
        &self,
        message: &JobMessage,
        context: Arc<dyn Any + Send + Sync>,
    ) -> Result<Option<serde_json::Value>, JobError> {
        let handler = self
            .handlers
            .get(&message.job_type)
            .ok_or_else(|| JobError::Permanent(format!("Unknown job type: {}", message.job_type)))?;

        handler.execute(message, context).await
    }

    pub fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
