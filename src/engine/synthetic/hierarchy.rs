use std::collections::HashMap;

use glam::Vec3;

use super::tree::ClusterTree;

const SIBLING_GAP: f32 = 2.5;
const LEVEL_GAP: f32 = 4.0;

/// Layered layout of the subtree under `root`, cut `depth_span` levels
/// below it. Nodes at the cut are laid out as leaves. Returns `(slot,
/// position)` in depth-first preorder with `root` at the origin.
pub(super) fn layered_positions(
    tree: &ClusterTree,
    root: usize,
    depth_span: usize,
) -> Vec<(usize, Vec3)> {
    let bottom = tree.node(root).depth + depth_span;
    let order = tree.preorder(root, bottom);
    let position_in_order = order
        .iter()
        .enumerate()
        .map(|(position, &slot)| (slot, position))
        .collect::<HashMap<_, _>>();

    let mut x = vec![0.0f32; order.len()];
    let mut next_leaf = 0.0f32;
    for (position, &slot) in order.iter().enumerate() {
        let node = tree.node(slot);
        if node.depth >= bottom || node.children().is_none() {
            x[position] = next_leaf * SIBLING_GAP;
            next_leaf += 1.0;
        }
    }

    // children always follow their parent in preorder
    for (position, &slot) in order.iter().enumerate().rev() {
        let node = tree.node(slot);
        if node.depth >= bottom {
            continue;
        }
        if let Some([left, right]) = node.children()
            && let (Some(&left), Some(&right)) =
                (position_in_order.get(&left), position_in_order.get(&right))
        {
            x[position] = (x[left] + x[right]) / 2.0;
        }
    }

    let root_depth = tree.node(root).depth;
    let root_x = x.first().copied().unwrap_or_default();
    order
        .iter()
        .zip(x)
        .map(|(&slot, x)| {
            let level = (tree.node(slot).depth - root_depth) as f32;
            (slot, Vec3::new(x - root_x, -level * LEVEL_GAP, 0.0))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::tree::tests::small_tree;
    use super::*;

    #[test]
    fn parents_sit_above_and_between_their_children() {
        let tree = small_tree();
        let layout = layered_positions(&tree, 0, 3);
        let positions = layout.iter().copied().collect::<HashMap<_, _>>();

        assert_eq!(layout[0], (0, Vec3::ZERO));
        for &(slot, position) in &layout {
            if let Some([left, right]) = tree.node(slot).children()
                && let (Some(left), Some(right)) = (positions.get(&left), positions.get(&right))
            {
                assert!(left.y < position.y);
                assert!(left.x < right.x);
                assert!((position.x - (left.x + right.x) / 2.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn layout_stops_at_the_cut() {
        let tree = small_tree();
        let layout = layered_positions(&tree, 0, 2);
        assert!(layout.iter().all(|&(slot, _)| tree.node(slot).depth <= 2));
        assert_eq!(layout.len(), tree.preorder(0, 2).len());
    }
}
