use std::collections::HashMap;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterId, ClusterNames, ClusterRecord};
use crate::engine::{DistanceMetric, EngineError};
use crate::util::stable_hash;

pub(super) type Point = [f32; 3];
pub(super) type DistanceFn = fn(&Point, &Point) -> f32;

const CENTER_SAMPLE: usize = 64;
const BLOB_SPREAD: f32 = 12.0;

pub(super) fn distance_fn(metric: DistanceMetric) -> Result<DistanceFn, EngineError> {
    match metric {
        DistanceMetric::Euclidean => Ok(euclidean as DistanceFn),
        DistanceMetric::EuclideanSq => Ok(euclidean_sq as DistanceFn),
        DistanceMetric::Manhattan => Ok(manhattan as DistanceFn),
        DistanceMetric::L3Norm => Ok(l3_norm as DistanceFn),
        DistanceMetric::L4Norm => Ok(l4_norm as DistanceFn),
        DistanceMetric::Chebyshev => Ok(chebyshev as DistanceFn),
        DistanceMetric::Cosine => Ok(cosine as DistanceFn),
        DistanceMetric::Canberra => Ok(canberra as DistanceFn),
        DistanceMetric::None | DistanceMetric::NeedlemanWunsch | DistanceMetric::Levenshtein => {
            Err(EngineError::UnsupportedMetric(metric))
        }
    }
}

fn abs_diffs<'a>(a: &'a Point, b: &'a Point) -> impl Iterator<Item = f32> + 'a {
    a.iter().zip(b).map(|(x, y)| (x - y).abs())
}

fn euclidean(a: &Point, b: &Point) -> f32 {
    euclidean_sq(a, b).sqrt()
}

fn euclidean_sq(a: &Point, b: &Point) -> f32 {
    abs_diffs(a, b).map(|d| d * d).sum()
}

fn manhattan(a: &Point, b: &Point) -> f32 {
    abs_diffs(a, b).sum()
}

fn l3_norm(a: &Point, b: &Point) -> f32 {
    abs_diffs(a, b).map(|d| d.powi(3)).sum::<f32>().cbrt()
}

fn l4_norm(a: &Point, b: &Point) -> f32 {
    abs_diffs(a, b).map(|d| d.powi(4)).sum::<f32>().powf(0.25)
}

fn chebyshev(a: &Point, b: &Point) -> f32 {
    abs_diffs(a, b).fold(0.0, f32::max)
}

fn cosine(a: &Point, b: &Point) -> f32 {
    let (a, b) = (Vec3::from_array(*a), Vec3::from_array(*b));
    let norms = a.length() * b.length();
    if norms <= f32::EPSILON {
        1.0
    } else {
        (1.0 - a.dot(b) / norms).max(0.0)
    }
}

fn canberra(a: &Point, b: &Point) -> f32 {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.abs() + y.abs() > f32::EPSILON)
        .map(|(x, y)| (x - y).abs() / (x.abs() + y.abs()))
        .sum()
}

/// Seeded blob dataset: every point carries the label of the blob it was
/// drawn from.
pub(super) fn generate_blobs(
    data_name: &str,
    cardinality: usize,
    num_labels: usize,
) -> (Vec<Point>, Vec<usize>) {
    let num_labels = num_labels.max(1);
    let seed = stable_hash(format!("{data_name}/{cardinality}/{num_labels}"));
    let mut rng = StdRng::seed_from_u64(seed);

    let centers = (0..num_labels)
        .map(|_| {
            [
                rng.gen_range(-BLOB_SPREAD..BLOB_SPREAD),
                rng.gen_range(-BLOB_SPREAD..BLOB_SPREAD),
                rng.gen_range(-BLOB_SPREAD..BLOB_SPREAD),
            ]
        })
        .collect::<Vec<_>>();
    let widths = (0..num_labels)
        .map(|_| rng.gen_range(0.6..2.4))
        .collect::<Vec<f32>>();

    let mut points = Vec::with_capacity(cardinality);
    let mut labels = Vec::with_capacity(cardinality);
    for index in 0..cardinality {
        let label = index % num_labels;
        let center = centers[label];
        let mut point = [0.0; 3];
        for (axis, value) in point.iter_mut().enumerate() {
            // sum of uniforms, close enough to a gaussian for clustering
            let noise = (0..3).map(|_| rng.gen_range(-1.0..1.0)).sum::<f32>();
            *value = center[axis] + noise * widths[label];
        }
        points.push(point);
        labels.push(label);
    }
    (points, labels)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TreeNode {
    pub id: ClusterId,
    pub depth: usize,
    pub arg_center: usize,
    pub arg_radius: usize,
    pub radius: f32,
    pub lfd: f32,
    pub left: Option<usize>,
    pub right: Option<usize>,
}

impl TreeNode {
    pub fn children(&self) -> Option<[usize; 2]> {
        Some([self.left?, self.right?])
    }
}

/// Binary partition tree over a dataset whose points are stored in tree
/// order, so every node owns the contiguous range its `ClusterId` names.
/// `nodes[0]` is the root and nodes are stored in depth-first preorder.
pub(super) struct ClusterTree {
    pub metric: DistanceMetric,
    pub distance: DistanceFn,
    pub points: Vec<Point>,
    pub labels: Vec<usize>,
    pub num_labels: usize,
    pub nodes: Vec<TreeNode>,
    index: HashMap<ClusterId, usize>,
    height: usize,
}

struct PendingNode {
    start: usize,
    end: usize,
    depth: usize,
    parent: Option<(usize, bool)>,
}

impl ClusterTree {
    pub fn build(
        points: Vec<Point>,
        labels: Vec<usize>,
        num_labels: usize,
        metric: DistanceMetric,
        min_cluster_size: usize,
    ) -> Result<Self, EngineError> {
        let distance = distance_fn(metric)?;
        if points.is_empty() {
            return Err(EngineError::StartupDataInvalid(
                "dataset has no points".to_owned(),
            ));
        }
        if points.len() != labels.len() {
            return Err(EngineError::StartupDataInvalid(format!(
                "{} points but {} labels",
                points.len(),
                labels.len()
            )));
        }

        let min_cluster_size = min_cluster_size.max(1);
        let mut order = (0..points.len()).collect::<Vec<_>>();
        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut stack = vec![PendingNode {
            start: 0,
            end: points.len(),
            depth: 0,
            parent: None,
        }];

        while let Some(pending) = stack.pop() {
            let slot = nodes.len();
            if let Some((parent, is_left)) = pending.parent {
                if is_left {
                    nodes[parent].left = Some(slot);
                } else {
                    nodes[parent].right = Some(slot);
                }
            }

            let members = &mut order[pending.start..pending.end];
            let (arg_center, arg_radius, radius) = center_and_radius(&points, members, distance);
            let lfd = local_fractal_dimension(&points, members, arg_center, radius, distance);

            // arg_center/arg_radius hold original point indices until the
            // final reorder below.
            nodes.push(TreeNode {
                id: ClusterId::new(pending.start, members.len()),
                depth: pending.depth,
                arg_center,
                arg_radius,
                radius,
                lfd,
                left: None,
                right: None,
            });

            if members.len() <= min_cluster_size || radius <= 0.0 {
                continue;
            }

            let split = bipartition(&points, members, arg_radius, distance);
            if split == 0 || split == members.len() {
                continue;
            }

            let middle = pending.start + split;
            stack.push(PendingNode {
                start: middle,
                end: pending.end,
                depth: pending.depth + 1,
                parent: Some((slot, false)),
            });
            stack.push(PendingNode {
                start: pending.start,
                end: middle,
                depth: pending.depth + 1,
                parent: Some((slot, true)),
            });
        }

        let mut position_of = vec![0; order.len()];
        for (position, &original) in order.iter().enumerate() {
            position_of[original] = position;
        }
        for node in &mut nodes {
            node.arg_center = position_of[node.arg_center];
            node.arg_radius = position_of[node.arg_radius];
        }

        let points = order.iter().map(|&original| points[original]).collect();
        let labels = order.iter().map(|&original| labels[original]).collect();
        Self::from_parts(metric, points, labels, num_labels, nodes)
    }

    pub fn from_parts(
        metric: DistanceMetric,
        points: Vec<Point>,
        labels: Vec<usize>,
        num_labels: usize,
        nodes: Vec<TreeNode>,
    ) -> Result<Self, EngineError> {
        let distance = distance_fn(metric)?;
        let Some(root) = nodes.first() else {
            return Err(EngineError::Format("tree has no nodes".to_owned()));
        };
        if root.id != ClusterId::new(0, points.len()) || labels.len() != points.len() {
            return Err(EngineError::Format(
                "root does not cover the dataset".to_owned(),
            ));
        }

        let num_labels = num_labels.max(1);
        if let Some(label) = labels.iter().find(|&&label| label >= num_labels) {
            return Err(EngineError::Format(format!(
                "label {label} exceeds the {num_labels} labels declared"
            )));
        }

        let mut index = HashMap::with_capacity(nodes.len());
        let mut height = 0;
        for (slot, node) in nodes.iter().enumerate() {
            let in_range = |child: Option<usize>| child.is_none_or(|child| child > slot && child < nodes.len());
            if !in_range(node.left) || !in_range(node.right) || node.left.is_some() != node.right.is_some() {
                return Err(EngineError::Format(format!(
                    "cluster {} has malformed children",
                    node.id
                )));
            }
            let end = node.id.offset.checked_add(node.id.cardinality);
            if end.is_none_or(|end| end > points.len()) {
                return Err(EngineError::Format(format!(
                    "cluster {} lies outside the dataset",
                    node.id
                )));
            }
            if node.arg_center >= points.len() || node.arg_radius >= points.len() {
                return Err(EngineError::Format(format!(
                    "cluster {} names a point outside the dataset",
                    node.id
                )));
            }
            if index.insert(node.id, slot).is_some() {
                return Err(EngineError::Format(format!(
                    "cluster {} appears twice",
                    node.id
                )));
            }
            height = height.max(node.depth);
        }

        Ok(Self {
            metric,
            distance,
            points,
            labels,
            num_labels,
            nodes,
            index,
            height,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cardinality(&self) -> usize {
        self.points.len()
    }

    pub fn slot(&self, id: ClusterId) -> Result<usize, EngineError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(EngineError::NotFound(id))
    }

    pub fn node(&self, slot: usize) -> &TreeNode {
        &self.nodes[slot]
    }

    pub fn max_lfd(&self) -> f32 {
        self.nodes.iter().map(|node| node.lfd).fold(0.0, f32::max)
    }

    pub fn record(&self, slot: usize) -> ClusterRecord {
        let node = &self.nodes[slot];
        ClusterRecord {
            radius: node.radius,
            lfd: node.lfd,
            arg_center: node.arg_center,
            arg_radius: node.arg_radius,
            ..ClusterRecord::new(node.id, node.depth)
        }
    }

    pub fn names(&self, slot: usize) -> ClusterNames {
        let node = &self.nodes[slot];
        match node.children() {
            Some([left, right]) => ClusterNames {
                id: node.id,
                left: self.nodes[left].id,
                right: self.nodes[right].id,
            },
            None => ClusterNames::leaf(node.id),
        }
    }

    /// Preorder slots of `start` and its descendants down to `max_depth`.
    pub fn preorder(&self, start: usize, max_depth: usize) -> Vec<usize> {
        let mut visited = Vec::new();
        let mut stack = vec![start];
        while let Some(slot) = stack.pop() {
            visited.push(slot);
            let node = &self.nodes[slot];
            if node.depth >= max_depth {
                continue;
            }
            if let Some([left, right]) = node.children() {
                stack.push(right);
                stack.push(left);
            }
        }
        visited
    }

    pub fn label_histogram(&self, slot: usize) -> Vec<usize> {
        let id = self.nodes[slot].id;
        let mut histogram = vec![0; self.num_labels];
        for &label in &self.labels[id.offset..id.offset + id.cardinality] {
            if let Some(count) = histogram.get_mut(label) {
                *count += 1;
            }
        }
        histogram
    }

    pub fn center(&self, slot: usize) -> Point {
        self.points[self.nodes[slot].arg_center]
    }
}

fn center_and_radius(
    points: &[Point],
    members: &[usize],
    distance: DistanceFn,
) -> (usize, usize, f32) {
    let step = (members.len() / CENTER_SAMPLE).max(1);
    let sample = members.iter().step_by(step).copied().collect::<Vec<_>>();

    let arg_center = sample
        .iter()
        .map(|&candidate| {
            let spread = sample
                .iter()
                .map(|&other| distance(&points[candidate], &points[other]))
                .sum::<f32>();
            (candidate, spread)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
        .unwrap_or(members[0]);

    let (arg_radius, radius) = members
        .iter()
        .map(|&member| (member, distance(&points[arg_center], &points[member])))
        .fold((arg_center, 0.0), |best, candidate| {
            if candidate.1 > best.1 { candidate } else { best }
        });

    (arg_center, arg_radius, radius)
}

fn local_fractal_dimension(
    points: &[Point],
    members: &[usize],
    arg_center: usize,
    radius: f32,
    distance: DistanceFn,
) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    let half = members
        .iter()
        .filter(|&&member| distance(&points[arg_center], &points[member]) <= radius / 2.0)
        .count()
        .max(1);
    (members.len() as f32 / half as f32).log2()
}

/// Splits `members` in place around two poles; returns the size of the
/// left part.
fn bipartition(
    points: &[Point],
    members: &mut [usize],
    left_pole: usize,
    distance: DistanceFn,
) -> usize {
    let right_pole = members
        .iter()
        .copied()
        .max_by(|&a, &b| {
            distance(&points[left_pole], &points[a])
                .total_cmp(&distance(&points[left_pole], &points[b]))
        })
        .unwrap_or(left_pole);

    let (left, right): (Vec<usize>, Vec<usize>) = members.iter().partition(|&&member| {
        distance(&points[left_pole], &points[member])
            <= distance(&points[right_pole], &points[member])
    });

    let split = left.len();
    for (slot, member) in members.iter_mut().zip(left.into_iter().chain(right)) {
        *slot = member;
    }
    split
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn small_tree() -> ClusterTree {
        let (points, labels) = generate_blobs("unit", 96, 3);
        ClusterTree::build(points, labels, 3, DistanceMetric::Euclidean, 1).unwrap()
    }

    #[test]
    fn children_partition_their_parent_range() {
        let tree = small_tree();
        assert_eq!(tree.node(0).id, ClusterId::new(0, 96));
        for node in &tree.nodes {
            if let Some([left, right]) = node.children() {
                let (left, right) = (&tree.nodes[left], &tree.nodes[right]);
                assert_eq!(left.id.offset, node.id.offset);
                assert_eq!(right.id.offset, left.id.offset + left.id.cardinality);
                assert_eq!(left.id.cardinality + right.id.cardinality, node.id.cardinality);
                assert_eq!(left.depth, node.depth + 1);
                assert!(node.id.contains(ClusterId::new(node.arg_center, 1)));
            }
        }
    }

    #[test]
    fn preorder_respects_depth_bound() {
        let tree = small_tree();
        let shallow = tree.preorder(0, 1);
        assert_eq!(shallow.len(), 3);
        assert_eq!(tree.preorder(0, tree.height()).len(), tree.nodes.len());
    }

    #[test]
    fn unsupported_metrics_are_rejected() {
        let (points, labels) = generate_blobs("unit", 8, 1);
        assert_eq!(
            ClusterTree::build(points, labels, 1, DistanceMetric::Levenshtein, 1).err(),
            Some(EngineError::UnsupportedMetric(DistanceMetric::Levenshtein))
        );
    }

    #[test]
    fn metrics_agree_on_simple_points() {
        let a = [0.0, 0.0, 0.0];
        let b = [3.0, 4.0, 0.0];
        let euclidean = distance_fn(DistanceMetric::Euclidean).unwrap();
        let manhattan = distance_fn(DistanceMetric::Manhattan).unwrap();
        let chebyshev = distance_fn(DistanceMetric::Chebyshev).unwrap();
        assert!((euclidean(&a, &b) - 5.0).abs() < 1e-5);
        assert!((manhattan(&a, &b) - 7.0).abs() < 1e-5);
        assert!((chebyshev(&a, &b) - 4.0).abs() < 1e-5);
    }

    #[test]
    fn blobs_are_deterministic_per_name() {
        assert_eq!(generate_blobs("a", 10, 2), generate_blobs("a", 10, 2));
        assert_ne!(generate_blobs("a", 10, 2).0, generate_blobs("b", 10, 2).0);
    }
}
