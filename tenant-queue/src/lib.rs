//! # tenant-queue
//!
//! Fire-and-forget dispatch for lifecycle steps. A step becomes a typed
//! [`Job`] whose payload is serialized into a [`JobMessage`], picked up by a
//! pool of workers and settled in the backend, which keeps every
//! [`JobRecord`] around as the status store.
//!
//! ```rust,no_run
//! use tenant_queue::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone)]
//! struct Ctx;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Ping { tenant: String }
//!
//! #[async_trait::async_trait]
//! impl Job for Ping {
//!     type Context = Ctx;
//!     type Result = ();
//!     const JOB_TYPE: &'static str = "ping";
//!
//!     async fn execute(&self, _ctx: Ctx) -> Result<(), JobError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> QueueResult<()> {
//! let adapter = QueueAdapter::new(MemoryBackend::new());
//! adapter.register_job::<Ping>().await?;
//! let pool = adapter.start_workers(Ctx, vec!["default".into()]);
//!
//! let job_id = adapter
//!     .enqueue(QueueCtx::new("acme"), "default", Ping { tenant: "acme".into() })
//!     .await?;
//! let record = adapter.get_record(QueueCtx::new("acme"), job_id).await?;
//! println!("{}", record.status.name());
//! pool.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod backend;
pub mod error;
pub mod job;
pub mod types;

pub use adapter::{QueueAdapter, QueueConfig, WorkerPool};
pub use backend::{memory::MemoryBackend, BoxStream, QueueBackend};
pub use error::{JobError, QueueError, QueueResult};
pub use job::{Job, JobHandler, JobRegistry};
pub use types::*;

pub mod prelude {
    pub use crate::{
        Job, JobError, JobId, JobPriority, JobRecord, JobStatus, MemoryBackend, QueueAdapter,
        QueueBackend, QueueConfig, QueueCtx, QueueError, QueueResult,
    };
}
