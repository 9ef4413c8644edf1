use std::collections::HashMap;

use crate::cluster::ClusterId;
use crate::engine::ScoringFunction;
use crate::util::stable_triple;

use super::tree::ClusterTree;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Spring {
    pub a: usize,
    pub b: usize,
    pub is_real: bool,
    pub rest_length: f32,
}

/// Similarity graph over a set of clusters: two clusters are adjacent when
/// their balls overlap. Disconnected components are tied together with
/// non-real springs so the force layout keeps them in one frame.
pub(super) struct ClusterGraph {
    pub members: Vec<usize>,
    pub springs: Vec<Spring>,
    slot_of: HashMap<ClusterId, usize>,
    degree: Vec<usize>,
    components: usize,
}

impl ClusterGraph {
    pub fn over(tree: &ClusterTree, members: Vec<usize>, edge_scalar: f32) -> Self {
        let slot_of = members
            .iter()
            .enumerate()
            .map(|(slot, &node)| (tree.node(node).id, slot))
            .collect::<HashMap<_, _>>();
        let scale = tree.node(0).radius.max(f32::EPSILON);

        let mut springs = Vec::new();
        let mut degree = vec![0; members.len()];
        let mut components = DisjointSets::new(members.len());
        for a in 0..members.len() {
            for b in (a + 1)..members.len() {
                let (left, right) = (tree.node(members[a]), tree.node(members[b]));
                let gap = (tree.distance)(&tree.center(members[a]), &tree.center(members[b]));
                if gap <= left.radius + right.radius {
                    springs.push(Spring {
                        a,
                        b,
                        is_real: true,
                        rest_length: edge_scalar * (1.0 + 4.0 * gap / scale),
                    });
                    degree[a] += 1;
                    degree[b] += 1;
                    components.union(a, b);
                }
            }
        }

        let representatives = components.representatives();
        for pair in representatives.windows(2) {
            springs.push(Spring {
                a: pair[0],
                b: pair[1],
                is_real: false,
                rest_length: edge_scalar * 3.0,
            });
        }

        Self {
            members,
            springs,
            slot_of,
            degree,
            components: representatives.len(),
        }
    }

    pub fn real_edge_count(&self) -> usize {
        self.springs.iter().filter(|spring| spring.is_real).count()
    }

    pub fn cluster_count(&self) -> usize {
        self.members.len()
    }

    pub fn component_count(&self) -> usize {
        self.components
    }

    pub fn contains(&self, id: ClusterId) -> bool {
        self.slot_of.contains_key(&id)
    }

    pub fn degree_of(&self, id: ClusterId) -> usize {
        self.slot_of
            .get(&id)
            .map(|&slot| self.degree[slot])
            .unwrap_or_default()
    }

    pub fn max_degree(&self) -> usize {
        self.degree.iter().copied().max().unwrap_or_default()
    }
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut item: usize) -> usize {
        while self.parent[item] != item {
            self.parent[item] = self.parent[self.parent[item]];
            item = self.parent[item];
        }
        item
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[a.max(b)] = a.min(b);
        }
    }

    fn representatives(&mut self) -> Vec<usize> {
        (0..self.parent.len())
            .filter(|&item| self.find(item) == item)
            .collect()
    }
}

/// Anomaly-style score of one cluster: a weighted mix of how much of its
/// parent it keeps, how much it shrinks, and its local fractal dimension.
/// Each scoring function weighs the features differently; the `dt_` family
/// scores in coarse steps.
fn cluster_scores(tree: &ClusterTree, scoring: ScoringFunction) -> Vec<f32> {
    let weights = stable_triple(scoring.name());
    let max_lfd = tree.max_lfd().max(f32::EPSILON);
    let stepped = scoring.name().starts_with("dt_");

    let mut scores = vec![0.0; tree.nodes.len()];
    let mut parent_of = vec![None; tree.nodes.len()];
    for (slot, node) in tree.nodes.iter().enumerate() {
        if let Some([left, right]) = node.children() {
            parent_of[left] = Some(slot);
            parent_of[right] = Some(slot);
        }

        let (cardinality_ratio, radius_ratio) = match parent_of[slot] {
            Some(parent) => {
                let parent = tree.node(parent);
                (
                    node.id.cardinality as f32 / parent.id.cardinality as f32,
                    node.radius / parent.radius.max(f32::EPSILON),
                )
            }
            None => (1.0, 1.0),
        };
        let raw = weights.x * cardinality_ratio
            + weights.y * (1.0 - radius_ratio.min(1.0))
            + weights.z * (node.lfd / max_lfd);
        scores[slot] = if stepped { (raw * 4.0).floor() / 4.0 } else { raw };
    }
    scores
}

/// Clusters at or below `min_depth` whose score is at least every
/// descendant's, falling through to leaves. The result is an antichain
/// covering every point, in depth-first order.
pub(super) fn select_by_score(
    tree: &ClusterTree,
    scoring: ScoringFunction,
    min_depth: usize,
) -> Vec<usize> {
    let scores = cluster_scores(tree, scoring);

    let mut best_below = vec![f32::NEG_INFINITY; tree.nodes.len()];
    for slot in (0..tree.nodes.len()).rev() {
        if let Some([left, right]) = tree.node(slot).children() {
            best_below[slot] = scores[left]
                .max(best_below[left])
                .max(scores[right])
                .max(best_below[right]);
        }
    }

    let mut selected = Vec::new();
    let mut stack = vec![0];
    while let Some(slot) = stack.pop() {
        let node = tree.node(slot);
        let Some([left, right]) = node.children() else {
            selected.push(slot);
            continue;
        };
        if node.depth >= min_depth && scores[slot] >= best_below[slot] {
            selected.push(slot);
            continue;
        }
        stack.push(right);
        stack.push(left);
    }
    selected
}
