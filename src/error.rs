/// 统一错误类型
/// 所有错误都在会话/控制台边界被处理并展示给用户，不会自动重试

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScolioError {
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),
    #[error("Device is not calibrated, please calibrate first")]
    Uncalibrated,
    #[error("Cannot {action} while session is {state}")]
    Precondition { action: &'static str, state: String },
    #[error("Patient not found: {0}")]
    NotFound(String),
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<duckdb::Error> for ScolioError {
    fn from(e: duckdb::Error) -> Self {
        ScolioError::Persistence(format!("database error: {}", e))
    }
}

impl From<serde_json::Error> for ScolioError {
    fn from(e: serde_json::Error) -> Self {
        ScolioError::Persistence(format!("JSON error: {}", e))
    }
}

pub type ScolioResult<T> = Result<T, ScolioError>;
