//! The REST surface over the saga coordinator.

mod error;
mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::router;
