use thiserror::Error;

use crate::compare::Phase;

#[derive(Error, Debug)]
pub enum MarqueeError {
    // Configuration errors
    #[error("source collection '{collection}' does not exist")]
    SourceMissing { collection: String },

    #[error("config error: {0}")]
    Config(String),

    // Provisioning errors
    #[error("demo collection '{demo}' could not be provisioned: $out copy failed ({bulk}); cursor copy failed ({fallback})")]
    Provisioning {
        demo: String,
        bulk: String,
        fallback: String,
    },

    // Measurement errors
    #[error("{phase} phase failed: {source}")]
    Measurement {
        phase: Phase,
        #[source]
        source: Box<MarqueeError>,
    },

    // Index errors
    #[error("createIndex {keys} on '{collection}' failed: {source}")]
    IndexCreation {
        collection: String,
        keys: String,
        #[source]
        source: Box<MarqueeError>,
    },

    // Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    // Driver errors
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("store error: {0}")]
    Store(String),

    // Serialization errors
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MarqueeError>;

impl MarqueeError {
    pub fn status_code(&self) -> u16 {
        match self {
            MarqueeError::SourceMissing { .. } | MarqueeError::Validation(_) => 400,

            _ => 500,
        }
    }

    /// The orchestrator phase that raised this error, if it came from one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            MarqueeError::Measurement { phase, .. } => Some(*phase),
            MarqueeError::IndexCreation { .. } => Some(Phase::CreatingIndex),
            MarqueeError::Provisioning { .. } => Some(Phase::Provisioning),
            MarqueeError::SourceMissing { .. } => Some(Phase::VerifyingSource),
            _ => None,
        }
    }

    /// Messages of every error in the source chain, outermost first.
    pub fn causes(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut current: Option<&dyn std::error::Error> = Some(self);
        while let Some(err) = current {
            causes.push(err.to_string());
            current = err.source();
        }
        causes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let missing = MarqueeError::SourceMissing {
            collection: "movies".into(),
        };
        assert_eq!(missing.status_code(), 400);
        assert_eq!(MarqueeError::Validation("runs".into()).status_code(), 400);
        assert_eq!(MarqueeError::Store("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_cause_chain_includes_inner_error() {
        let err = MarqueeError::Measurement {
            phase: Phase::Before,
            source: Box::new(MarqueeError::Store("connection reset".into())),
        };
        let causes = err.causes();
        assert_eq!(causes.len(), 2);
        assert!(causes[0].starts_with("before phase failed"));
        assert_eq!(causes[1], "store error: connection reset");
        assert_eq!(err.phase(), Some(Phase::Before));
    }
}
