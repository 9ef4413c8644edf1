//! Boundary between the viewer core and the clustering engine.
//!
//! The engine owns the tree, the distance computations and the physics
//! simulation. It reports clusters by streaming [`ClusterRecord`]s into
//! caller-supplied visitors; every streaming call visits clusters in
//! depth-first order.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::{ClusterId, ClusterNames, ClusterRecord};
use crate::config::StartupConfig;

pub mod synthetic;
#[cfg(test)]
pub(crate) mod testing;

pub type RecordVisitor<'a> = dyn FnMut(&ClusterRecord) + 'a;
pub type NameVisitor<'a> = dyn FnMut(&ClusterNames) + 'a;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum EngineError {
    #[error("cluster {0} has no engine record")]
    NotFound(ClusterId),
    #[error("cluster {0} has no local rendering state")]
    NotInCache(ClusterId),
    #[error("clustering engine is not initialized or has been shut down")]
    EngineUnavailable,
    #[error("startup data is invalid: {0}")]
    StartupDataInvalid(String),
    #[error("distance metric {0} is not supported")]
    UnsupportedMetric(DistanceMetric),
    #[error("graph build failed: {0}")]
    GraphBuildFailed(String),
    #[error("no graph has been built")]
    NoGraph,
    #[error("physics simulation is not running")]
    PhysicsNotRunning,
    #[error("physics simulation is already running")]
    PhysicsRunning,
    #[error("i/o failure: {0}")]
    Io(String),
    #[error("malformed tree data: {0}")]
    Format(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PhysicsStatus {
    Running,
    Finished,
    Error(EngineError),
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum DistanceMetric {
    None,
    #[default]
    Euclidean,
    EuclideanSq,
    Manhattan,
    L3Norm,
    L4Norm,
    Chebyshev,
    Cosine,
    Canberra,
    NeedlemanWunsch,
    Levenshtein,
}

impl DistanceMetric {
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Euclidean => "Euclidean",
            Self::EuclideanSq => "EuclideanSq",
            Self::Manhattan => "Manhattan",
            Self::L3Norm => "L3Norm",
            Self::L4Norm => "L4Norm",
            Self::Chebyshev => "Chebyshev",
            Self::Cosine => "Cosine",
            Self::Canberra => "Canberra",
            Self::NeedlemanWunsch => "NeedlemanWunsch",
            Self::Levenshtein => "Levenshtein",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ColorStrategy {
    #[default]
    DominantLabel,
    Label,
    Entropy,
    Depth,
    Radius,
    Cardinality,
    Lfd,
    VertexDegree,
}

impl ColorStrategy {
    pub const ALL: [Self; 8] = [
        Self::DominantLabel,
        Self::Label,
        Self::Entropy,
        Self::Depth,
        Self::Radius,
        Self::Cardinality,
        Self::Lfd,
        Self::VertexDegree,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::DominantLabel => "Dominant label",
            Self::Label => "Label",
            Self::Entropy => "Entropy",
            Self::Depth => "Depth",
            Self::Radius => "Radius",
            Self::Cardinality => "Cardinality",
            Self::Lfd => "LFD",
            Self::VertexDegree => "Vertex degree",
        }
    }
}

macro_rules! scoring_functions {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
        pub enum ScoringFunction {
            $(#[value(name = $name)] $variant),+
        }

        impl ScoringFunction {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl FromStr for ScoringFunction {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($name => Ok(Self::$variant),)+
                    other => Err(format!("unknown scoring function `{other}`")),
                }
            }
        }
    };
}

scoring_functions! {
    LrManhattanSc => "lr_manhattan_sc",
    LrManhattanCc => "lr_manhattan_cc",
    LrManhattanGn => "lr_manhattan_gn",
    LrManhattanCr => "lr_manhattan_cr",
    LrManhattanSp => "lr_manhattan_sp",
    LrManhattanVd => "lr_manhattan_vd",
    LrEuclideanCc => "lr_euclidean_cc",
    LrEuclideanSc => "lr_euclidean_sc",
    LrEuclideanGn => "lr_euclidean_gn",
    LrEuclideanCr => "lr_euclidean_cr",
    LrEuclideanSp => "lr_euclidean_sp",
    LrEuclideanVd => "lr_euclidean_vd",
    DtManhattanCc => "dt_manhattan_cc",
    DtManhattanSc => "dt_manhattan_sc",
    DtManhattanGn => "dt_manhattan_gn",
    DtManhattanCr => "dt_manhattan_cr",
    DtManhattanSp => "dt_manhattan_sp",
    DtManhattanVd => "dt_manhattan_vd",
    DtEuclideanCc => "dt_euclidean_cc",
    DtEuclideanSc => "dt_euclidean_sc",
    DtEuclideanGn => "dt_euclidean_gn",
    DtEuclideanCr => "dt_euclidean_cr",
    DtEuclideanSp => "dt_euclidean_sp",
    DtEuclideanVd => "dt_euclidean_vd",
}

impl ScoringFunction {
    /// Scoring functions trained against `metric`, as offered to the user.
    pub fn for_metric(metric: DistanceMetric) -> Vec<Self> {
        let family = match metric {
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Euclidean | DistanceMetric::EuclideanSq => "euclidean",
            _ => return Vec::new(),
        };
        Self::ALL
            .iter()
            .copied()
            .filter(|scoring| scoring.name().contains(family))
            .collect()
    }
}

impl fmt::Display for ScoringFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Edge announcement carried in `ClusterRecord::message` while the engine
/// streams graph edges: `"<flag> <otherID>"`, flag `1` for a real edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeMessage {
    pub is_real: bool,
    pub other: ClusterId,
}

impl EdgeMessage {
    pub fn encode(self) -> String {
        format!("{} {}", if self.is_real { '1' } else { '0' }, self.other)
    }

    pub fn decode(message: &str) -> Option<Self> {
        let mut parts = message.split_whitespace();
        let flag = parts.next()?;
        let other = parts.next()?.parse().ok()?;
        Some(Self {
            is_real: flag.starts_with('1'),
            other,
        })
    }
}

pub trait ClusterEngine {
    fn cluster_record(&self, id: ClusterId) -> Result<ClusterRecord, EngineError>;

    fn root_record(&self) -> Result<ClusterRecord, EngineError>;

    fn tree_height(&self) -> usize;

    fn tree_cardinality(&self) -> usize;

    fn max_lfd(&self) -> f32;

    fn max_vertex_degree(&self) -> usize;

    fn vertex_degree(&self, id: ClusterId) -> Result<usize, EngineError>;

    fn for_each_name(
        &self,
        start: ClusterId,
        max_depth: usize,
        visitor: &mut NameVisitor<'_>,
    ) -> Result<(), EngineError>;

    /// Visits `start` and its descendants down to `max_depth` (inclusive).
    fn traverse_depth_first(
        &self,
        start: ClusterId,
        max_depth: usize,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError>;

    fn draw_hierarchy(&self, visitor: &mut RecordVisitor<'_>) -> Result<(), EngineError>;

    /// Lays out `depth_span` levels below `root` and streams every node
    /// within that bound, translated so `root` keeps `root.position`.
    fn draw_hierarchy_bounded(
        &self,
        root: &ClusterRecord,
        current_depth: usize,
        depth_span: usize,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError>;

    fn color_clusters_by(
        &self,
        strategy: ColorStrategy,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError>;

    fn init_graph(
        &mut self,
        scoring: ScoringFunction,
        min_depth: usize,
        selector: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError>;

    fn init_force_layout(
        &mut self,
        seeds: &[(ClusterId, Vec3)],
        edge_scalar: f32,
        max_iterations: usize,
    ) -> Result<(), EngineError>;

    fn stream_graph_edges(&self, visitor: &mut RecordVisitor<'_>) -> Result<(), EngineError>;

    fn graph_edge_count(&self) -> Option<usize>;

    fn graph_cluster_count(&self) -> Option<usize>;

    fn graph_component_count(&self) -> Option<usize>;

    fn physics_step(&mut self, visitor: &mut RecordVisitor<'_>) -> PhysicsStatus;

    fn force_physics_shutdown(&mut self) -> Result<(), EngineError>;
}

pub trait EngineLifecycle: ClusterEngine + Sized {
    fn init(startup: &StartupConfig) -> Result<Self, EngineError>;

    fn load(path: &Path) -> Result<Self, EngineError>;

    fn save(&self, path: &Path) -> Result<(), EngineError>;

    fn shutdown(&mut self) -> Result<(), EngineError>;
}
