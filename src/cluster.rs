use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId {
    pub offset: usize,
    pub cardinality: usize,
}

impl ClusterId {
    pub const ZERO: Self = Self {
        offset: 0,
        cardinality: 0,
    };

    pub const fn new(offset: usize, cardinality: usize) -> Self {
        Self {
            offset,
            cardinality,
        }
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    pub fn contains(self, other: Self) -> bool {
        other.offset >= self.offset
            && other.offset + other.cardinality <= self.offset + self.cardinality
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.offset, self.cardinality)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("malformed cluster id `{0}`; expected `<offset>-<cardinality>`")]
pub struct ParseClusterIdError(String);

impl FromStr for ClusterId {
    type Err = ParseClusterIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (offset, cardinality) = trimmed
            .split_once('-')
            .ok_or_else(|| ParseClusterIdError(trimmed.to_owned()))?;
        let offset = offset
            .parse()
            .map_err(|_| ParseClusterIdError(trimmed.to_owned()))?;
        let cardinality = cardinality
            .parse()
            .map_err(|_| ParseClusterIdError(trimmed.to_owned()))?;
        Ok(Self::new(offset, cardinality))
    }
}

/// Snapshot of one cluster as reported by the engine at one point in time.
///
/// Records are transient: the cache copies out the fields it needs and never
/// holds on to the record itself. `message` carries auxiliary text for the
/// callbacks that need it, e.g. `"1 40-12"` on streamed graph edges.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterRecord {
    pub id: ClusterId,
    pub depth: usize,
    pub arg_center: usize,
    pub arg_radius: usize,
    pub radius: f32,
    pub lfd: f32,
    pub vertex_degree: usize,
    pub distance_to_query: Option<f32>,
    pub position: Vec3,
    pub color: Vec3,
    pub message: Option<String>,
}

impl ClusterRecord {
    pub fn new(id: ClusterId, depth: usize) -> Self {
        Self {
            id,
            depth,
            arg_center: id.offset,
            arg_radius: id.offset,
            radius: 0.0,
            lfd: 0.0,
            vertex_degree: 0,
            distance_to_query: None,
            position: Vec3::ZERO,
            color: Vec3::ONE,
            message: None,
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn info_lines(&self) -> Vec<(&'static str, String)> {
        let mut lines = vec![
            ("id", self.id.to_string()),
            ("depth", self.depth.to_string()),
            ("cardinality", self.id.cardinality.to_string()),
            ("offset", self.id.offset.to_string()),
            ("radius", format!("{:.4}", self.radius)),
            ("lfd", format!("{:.4}", self.lfd)),
            ("argCenter", self.arg_center.to_string()),
            ("argRadius", self.arg_radius.to_string()),
        ];
        if self.vertex_degree > 0 {
            lines.push(("vertexDegree", self.vertex_degree.to_string()));
        }
        if let Some(distance) = self.distance_to_query {
            lines.push(("distanceToQuery", format!("{distance:.4}")));
        }
        lines
    }
}

/// Identity of a cluster and its two children, streamed by the naming pass.
/// Leaves report `ClusterId::ZERO` for both children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterNames {
    pub id: ClusterId,
    pub left: ClusterId,
    pub right: ClusterId,
}

impl ClusterNames {
    pub fn leaf(id: ClusterId) -> Self {
        Self {
            id,
            left: ClusterId::ZERO,
            right: ClusterId::ZERO,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_zero() && self.right.is_zero()
    }
}
