use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("configuration error: {0}")]
    Configuration(#[from] crate::config::LoadError),
    #[error("telemetry error: {message}")]
    Telemetry { message: String },
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry {
            message: message.into(),
        }
    }
}
