//! Process-level infrastructure: telemetry bootstrap and its errors.

pub mod error;
pub mod telemetry;

pub use error::InfraError;
