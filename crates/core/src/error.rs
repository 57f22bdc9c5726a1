#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid value for {key}: '{value}' (expected {expected})")]
    InvalidSetting {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Validation failed: {0}")]
    Validation(String),
}
