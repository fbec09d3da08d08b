mod ctx;
mod events;
mod ids;
mod message;
mod priority;
mod record;

pub use ctx::QueueCtx;
pub use events::JobEvent;
pub use ids::{JobId, LeaseToken};
pub use message::JobMessage;
pub use priority::JobPriority;
pub use record::{JobRecord, JobStatus, LeasedJob};
