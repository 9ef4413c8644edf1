use glam::Vec3;

use super::graph::ClusterGraph;
use super::tree::ClusterTree;
use crate::engine::ColorStrategy;

const LABEL_PALETTE: [Vec3; 8] = [
    Vec3::new(0.89, 0.29, 0.27),
    Vec3::new(0.30, 0.69, 0.29),
    Vec3::new(0.22, 0.49, 0.72),
    Vec3::new(0.98, 0.60, 0.00),
    Vec3::new(0.60, 0.31, 0.64),
    Vec3::new(0.00, 0.75, 0.77),
    Vec3::new(0.97, 0.51, 0.75),
    Vec3::new(0.65, 0.34, 0.16),
];

pub(super) fn label_color(label: usize) -> Vec3 {
    LABEL_PALETTE[label % LABEL_PALETTE.len()]
}

fn gray_ramp(value: f32, max: f32) -> Vec3 {
    if max <= f32::EPSILON {
        return Vec3::ONE;
    }
    Vec3::splat((1.0 - value / max).clamp(0.0, 1.0))
}

pub(super) fn dominant_label(tree: &ClusterTree, slot: usize) -> usize {
    tree.label_histogram(slot)
        .iter()
        .enumerate()
        .max_by_key(|&(label, count)| (*count, std::cmp::Reverse(label)))
        .map(|(label, _)| label)
        .unwrap_or_default()
}

fn entropy(tree: &ClusterTree, slot: usize) -> f32 {
    if tree.num_labels < 2 {
        return 0.0;
    }
    let histogram = tree.label_histogram(slot);
    let total = histogram.iter().sum::<usize>() as f32;
    let bits = histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f32 / total;
            -p * p.log2()
        })
        .sum::<f32>();
    bits / (tree.num_labels as f32).log2()
}

pub(super) fn cluster_color(
    tree: &ClusterTree,
    graph: Option<&ClusterGraph>,
    slot: usize,
    strategy: ColorStrategy,
) -> Vec3 {
    let node = tree.node(slot);
    match strategy {
        ColorStrategy::DominantLabel => label_color(dominant_label(tree, slot)),
        ColorStrategy::Label => label_color(tree.labels[node.arg_center]),
        ColorStrategy::Entropy => {
            let disorder = entropy(tree, slot);
            Vec3::new(disorder, 1.0 - disorder, 0.0)
        }
        ColorStrategy::Depth => gray_ramp(node.depth as f32, tree.height() as f32),
        ColorStrategy::Radius => gray_ramp(node.radius, tree.node(0).radius),
        ColorStrategy::Cardinality => {
            gray_ramp(node.id.cardinality as f32, tree.cardinality() as f32)
        }
        ColorStrategy::Lfd => gray_ramp(node.lfd, tree.max_lfd()),
        ColorStrategy::VertexDegree => {
            let (degree, max) = graph
                .map(|graph| (graph.degree_of(node.id), graph.max_degree()))
                .unwrap_or_default();
            gray_ramp(degree as f32, max as f32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tree::tests::small_tree;
    use super::*;

    #[test]
    fn root_is_darkest_on_cardinality_and_radius() {
        let tree = small_tree();
        assert_eq!(
            cluster_color(&tree, None, 0, ColorStrategy::Cardinality),
            Vec3::ZERO
        );
        assert_eq!(cluster_color(&tree, None, 0, ColorStrategy::Radius), Vec3::ZERO);
        assert_eq!(cluster_color(&tree, None, 0, ColorStrategy::Depth), Vec3::ONE);
    }

    #[test]
    fn vertex_degree_without_graph_is_white() {
        let tree = small_tree();
        assert_eq!(
            cluster_color(&tree, None, 0, ColorStrategy::VertexDegree),
            Vec3::ONE
        );
    }

    #[test]
    fn mixed_root_has_positive_entropy() {
        let tree = small_tree();
        let color = cluster_color(&tree, None, 0, ColorStrategy::Entropy);
        assert!(color.x > 0.5);
    }
}
