pub mod responses;

pub use responses::{ApiError, HealthResponse};
