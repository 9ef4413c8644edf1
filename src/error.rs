use thiserror::Error;

use crate::engine::EngineError;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum CanopyError {
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("graph needs at least 2 edges, engine reported {found}")]
    InsufficientGraphEdges { found: usize },
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("no clusters qualify for the requested graph")]
    EmptySubset,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CanopyError {
    pub fn user_message(&self) -> String {
        match self {
            Self::InsufficientGraphEdges { .. } => {
                "Not enough edges to build a graph. Try a different scoring function or a shallower minimum depth."
                    .to_owned()
            }
            Self::InvalidSelection(reason) => format!("Cannot build a graph: {reason}."),
            Self::EmptySubset => "Select at least one cluster before building a graph.".to_owned(),
            Self::DuplicateKey(key) => format!("Internal error: {key} was inserted twice."),
            Self::Engine(EngineError::EngineUnavailable) => {
                "The clustering engine is not running.".to_owned()
            }
            Self::Engine(error) => format!("Engine error: {error}."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterId;

    #[test]
    fn engine_errors_convert_and_keep_their_text() {
        let error: CanopyError = EngineError::NotFound(ClusterId::new(2, 3)).into();
        assert_eq!(error.to_string(), "cluster 2-3 has no engine record");
        assert!(error.user_message().contains("2-3"));
    }

    #[test]
    fn insufficient_edges_reports_the_count() {
        let error = CanopyError::InsufficientGraphEdges { found: 1 };
        assert_eq!(error.to_string(), "graph needs at least 2 edges, engine reported 1");
        assert!(error.user_message().starts_with("Not enough edges"));
    }
}
