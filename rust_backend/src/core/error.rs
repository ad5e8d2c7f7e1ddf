//! Error types for the reconciliation and metrics core.

/// Result type for core operations
pub type PortResult<T> = Result<T, PortError>;

/// Error type for core operations
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Parse error in feed '{feed}': {message}")]
    Parse { feed: String, message: String },

    #[error("Identity conflict: {0} has no resolvable status")]
    IdentityConflict(String),

    #[error("Unknown scenario: '{0}' (expected one of: Peak Season, Normal Operations, Low Season)")]
    UnknownScenario(String),

    #[error("Feed unavailable: '{feed}': {reason}")]
    FeedUnavailable { feed: String, reason: String },

    #[error("Refresh rejected: a refresh cycle is already in progress")]
    ConcurrentRefreshRejected,

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortError {
    /// Errors that leave the cycle usable in a degraded state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PortError::Parse { .. }
                | PortError::IdentityConflict(_)
                | PortError::FeedUnavailable { .. }
                | PortError::ConcurrentRefreshRejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_display() {
        let err = PortError::UnknownScenario("peak_season".to_string());
        assert_eq!(
            err.to_string(),
            "Unknown scenario: 'peak_season' (expected one of: Peak Season, Normal Operations, Low Season)"
        );

        let err = PortError::FeedUnavailable {
            feed: "arrivals".to_string(),
            reason: "directory not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Feed unavailable: 'arrivals': directory not found"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(PortError::ConcurrentRefreshRejected.is_recoverable());
        assert!(PortError::IdentityConflict("x".into()).is_recoverable());
        assert!(!PortError::UnknownScenario("x".into()).is_recoverable());
        assert!(!PortError::DataUnavailable("x".into()).is_recoverable());
    }
}
