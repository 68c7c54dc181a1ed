use thiserror::Error;

/// Top-level error taxonomy for the estimation engine.
///
/// Every variant carries a stable machine-readable code (see
/// [`EngineError::code`]) that transports surface verbatim.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unresolvable source: {0}")]
    Unresolvable(String),

    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    #[error("pricing unavailable: {0}")]
    PricingUnavailable(String),

    #[error("policy failed: {0}")]
    PolicyFailed(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Stable error code for transports and clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidRequest(_) => "INVALID_REQUEST",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Unresolvable(_) => "UNRESOLVABLE",
            EngineError::InvariantViolated(_) => "INVARIANT_VIOLATED",
            EngineError::PricingUnavailable(_) => "PRICING_UNAVAILABLE",
            EngineError::PolicyFailed(_) => "POLICY_FAILED",
            EngineError::Cancelled(_) => "CANCELLED",
            EngineError::Internal(_) => "INTERNAL_ERROR",
            EngineError::Json(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a client may retry the same request unchanged.
    ///
    /// Only transient pricing-store failures qualify; request-shaped
    /// errors and invariant violations never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::PricingUnavailable(_))
    }
}

impl From<crate::money::MoneyError> for EngineError {
    fn from(err: crate::money::MoneyError) -> Self {
        EngineError::Internal(err.to_string())
    }
}

impl From<crate::graph::GraphError> for EngineError {
    fn from(err: crate::graph::GraphError) -> Self {
        EngineError::InvariantViolated(err.to_string())
    }
}

impl From<crate::mapper::MapperError> for EngineError {
    fn from(err: crate::mapper::MapperError) -> Self {
        EngineError::Internal(err.to_string())
    }
}

impl From<crate::pricing::store::StoreError> for EngineError {
    fn from(err: crate::pricing::store::StoreError) -> Self {
        EngineError::PricingUnavailable(err.to_string())
    }
}

impl From<crate::scan::ScanError> for EngineError {
    fn from(err: crate::scan::ScanError) -> Self {
        match err {
            crate::scan::ScanError::MissingField { .. }
            | crate::scan::ScanError::WrongType { .. } => {
                EngineError::InvalidRequest(err.to_string())
            }
            _ => EngineError::Unresolvable(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
