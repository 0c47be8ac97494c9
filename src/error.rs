use std::fmt;

/// Classification of an engine failure, so callers can map it to the right
/// response without parsing message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// A second insert raced for an existing (user, day) daily record.
    DuplicateKey,
    /// A referenced thread, goal, record, or profile does not exist
    /// (or belongs to a different user).
    NotFound,
    /// Input that violates a domain precondition, e.g. an illegal goal
    /// status transition or an out-of-range metric.
    Validation,
}

impl EngineErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineErrorKind::DuplicateKey => "duplicate_key",
            EngineErrorKind::NotFound => "not_found",
            EngineErrorKind::Validation => "validation",
        }
    }
}

/// Domain error surfaced at engine operation boundaries.
///
/// Gateway failures never take this form: they are recovered inside the
/// engine with deterministic fallbacks. What does reach callers is the
/// small set of conditions they must handle (conflict, missing entity,
/// bad input).
#[derive(Debug, Clone)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn duplicate_key(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::DuplicateKey,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Validation,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for EngineError {}

/// Extract the engine error kind from an `anyhow` chain, if present.
pub fn kind_of(err: &anyhow::Error) -> Option<EngineErrorKind> {
    err.downcast_ref::<EngineError>().map(|e| e.kind)
}
