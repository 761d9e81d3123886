#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    /// The AMS rule could not be compiled.
    #[error("invalid AMS rule: {0}")]
    InvalidRule(String),
    /// Malformed canonical input or a selection the engine cannot honor.
    /// Upstream stages own input validity; this is a defect, not bad data.
    #[error("contract violation in {context}: {message}")]
    ContractViolation { context: String, message: String },
}

impl CompareError {
    pub(crate) fn violation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContractViolation {
            context: context.into(),
            message: message.into(),
        }
    }
}
