use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{ColorStrategy, DistanceMetric, EngineError, ScoringFunction};

pub const DEFAULT_EDGE_SCALAR: f32 = 25.0;
pub const DEFAULT_MAX_ITERATIONS: usize = 500;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanopyConfig {
    pub startup: StartupConfig,
    pub graph: GraphConfig,
    pub initial_color: ColorStrategy,
    pub initial_reveal: usize,
}

impl CanopyConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartupConfig {
    pub data_name: String,
    pub cardinality: usize,
    pub distance_metric: DistanceMetric,
    pub should_load: bool,
    pub load_path: Option<PathBuf>,
    pub min_cluster_size: usize,
    pub num_labels: usize,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            data_name: "blobs".to_owned(),
            cardinality: 2048,
            distance_metric: DistanceMetric::Euclidean,
            should_load: false,
            load_path: None,
            min_cluster_size: 1,
            num_labels: 6,
        }
    }
}

impl StartupConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.should_load {
            return match &self.load_path {
                Some(_) => Ok(()),
                None => Err(EngineError::StartupDataInvalid(
                    "loading was requested without a path".to_owned(),
                )),
            };
        }

        if self.data_name.trim().is_empty() {
            return Err(EngineError::StartupDataInvalid(
                "dataset name is empty".to_owned(),
            ));
        }
        if self.cardinality == 0 {
            return Err(EngineError::StartupDataInvalid(
                "cardinality must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    pub edge_scalar: f32,
    pub max_iterations: usize,
    pub scoring_function: Option<ScoringFunction>,
    pub min_depth: Option<usize>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            edge_scalar: DEFAULT_EDGE_SCALAR,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            scoring_function: None,
            min_depth: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "startup": {{ "dataName": "rings", "cardinality": 300 }}, "graph": {{ "scoringFunction": "LrEuclideanCc", "minDepth": 4 }} }}"#
        )
        .unwrap();

        let config = CanopyConfig::from_path(file.path()).unwrap();
        assert_eq!(config.startup.data_name, "rings");
        assert_eq!(config.startup.cardinality, 300);
        assert_eq!(config.startup.num_labels, 6);
        assert_eq!(config.graph.edge_scalar, DEFAULT_EDGE_SCALAR);
        assert_eq!(config.graph.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(
            config.graph.scoring_function,
            Some(ScoringFunction::LrEuclideanCc)
        );
        assert_eq!(config.graph.min_depth, Some(4));
        assert_eq!(config.initial_color, ColorStrategy::DominantLabel);
    }

    #[test]
    fn malformed_file_is_reported_with_its_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let error = CanopyConfig::from_path(file.path()).unwrap_err();
        assert!(format!("{error:#}").contains("failed to parse config"));
    }

    #[test]
    fn startup_validation_rejects_unusable_inputs() {
        assert!(StartupConfig::default().validate().is_ok());

        let empty_name = StartupConfig {
            data_name: "  ".to_owned(),
            ..StartupConfig::default()
        };
        assert!(matches!(
            empty_name.validate(),
            Err(EngineError::StartupDataInvalid(_))
        ));

        let no_points = StartupConfig {
            cardinality: 0,
            ..StartupConfig::default()
        };
        assert!(no_points.validate().is_err());

        let load_without_path = StartupConfig {
            should_load: true,
            ..StartupConfig::default()
        };
        assert!(load_without_path.validate().is_err());
    }
}
