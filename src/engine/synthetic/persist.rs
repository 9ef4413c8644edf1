use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::tree::{ClusterTree, Point, TreeNode};
use crate::engine::{DistanceMetric, EngineError};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedTreeRef<'a> {
    version: u32,
    metric: DistanceMetric,
    num_labels: usize,
    points: &'a [Point],
    labels: &'a [usize],
    nodes: &'a [TreeNode],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedTree {
    version: u32,
    metric: DistanceMetric,
    num_labels: usize,
    points: Vec<Point>,
    labels: Vec<usize>,
    nodes: Vec<TreeNode>,
}

pub(super) fn write_tree(tree: &ClusterTree, path: &Path) -> Result<(), EngineError> {
    let file = File::create(path)
        .map_err(|error| EngineError::Io(format!("{}: {error}", path.display())))?;
    let mut writer = BufWriter::new(file);
    let saved = SavedTreeRef {
        version: FORMAT_VERSION,
        metric: tree.metric,
        num_labels: tree.num_labels,
        points: &tree.points,
        labels: &tree.labels,
        nodes: &tree.nodes,
    };
    serde_json::to_writer(&mut writer, &saved)
        .map_err(|error| EngineError::Format(error.to_string()))?;
    writer
        .flush()
        .map_err(|error| EngineError::Io(format!("{}: {error}", path.display())))
}

pub(super) fn read_tree(path: &Path) -> Result<ClusterTree, EngineError> {
    let file = File::open(path)
        .map_err(|error| EngineError::Io(format!("{}: {error}", path.display())))?;
    let saved: SavedTree = serde_json::from_reader(BufReader::new(file))
        .map_err(|error| EngineError::Format(error.to_string()))?;
    if saved.version != FORMAT_VERSION {
        return Err(EngineError::Format(format!(
            "unsupported tree format version {}",
            saved.version
        )));
    }
    ClusterTree::from_parts(
        saved.metric,
        saved.points,
        saved.labels,
        saved.num_labels,
        saved.nodes,
    )
}
