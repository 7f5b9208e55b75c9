/// Domain errors
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("Realtime repository is not configured")]
    NotConfigured,

    #[error("Infrastructure error: {message}")]
    InfrastructureError { message: String },
}

impl DomainError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::InfrastructureError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
