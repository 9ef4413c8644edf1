use std::collections::{BTreeMap, BTreeSet};

use crate::cache::{TreeCache, VisualNode};
use crate::cluster::ClusterId;
use crate::engine::ClusterEngine;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub components: usize,
    pub edges: usize,
    pub clusters: usize,
}

impl GraphStats {
    /// `None` until the engine holds a graph.
    pub fn from_engine<E: ClusterEngine + ?Sized>(engine: &E) -> Option<Self> {
        Some(Self {
            components: engine.graph_component_count()?,
            edges: engine.graph_edge_count()?,
            clusters: engine.graph_cluster_count()?,
        })
    }
}

pub fn active_selected(cache: &TreeCache) -> BTreeMap<ClusterId, VisualNode> {
    cache.subset(|node| node.active && node.is_selected())
}

/// Every selected node, hidden ones shown again.
pub fn reactivated_selected(cache: &TreeCache) -> BTreeMap<ClusterId, VisualNode> {
    let mut subset = cache.subset(VisualNode::is_selected);
    for node in subset.values_mut() {
        node.active = true;
    }
    subset
}

pub fn with_ids(cache: &TreeCache, ids: &[ClusterId]) -> BTreeMap<ClusterId, VisualNode> {
    let wanted = ids.iter().copied().collect::<BTreeSet<_>>();
    cache.subset(|node| wanted.contains(&node.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FixtureEngine;

    fn full_cache(engine: &FixtureEngine) -> TreeCache {
        let mut cache = TreeCache::new();
        for depth in 0..=engine.tree_height() {
            for id in engine.ids_at_depth(depth) {
                cache.get_or_add(engine, id).unwrap().active = true;
            }
        }
        cache
    }

    #[test]
    fn active_selected_skips_hidden_selections() {
        let engine = FixtureEngine::new(2);
        let mut cache = full_cache(&engine);
        let [shown, hidden, ..] = engine.ids_at_depth(2)[..] else {
            panic!("expected four leaves");
        };
        cache.get_mut(shown).unwrap().select();
        let node = cache.get_mut(hidden).unwrap();
        node.select();
        node.active = false;

        assert!(active_selected(&cache).keys().eq([&shown]));

        let subset = reactivated_selected(&cache);
        assert!(subset.keys().eq([&shown, &hidden]));
        assert!(subset.values().all(|node| node.active));
        // the cache itself is untouched until the subset is installed
        assert!(!cache.get(hidden).unwrap().active);
    }

    #[test]
    fn id_subset_ignores_uncached_ids() {
        let engine = FixtureEngine::new(2);
        let cache = full_cache(&engine);
        let children = engine.ids_at_depth(1);
        let subset = with_ids(&cache, &[children[0], ClusterId::new(99, 1), children[1]]);
        assert!(subset.keys().eq(children.iter()));
    }

    #[test]
    fn stats_wait_for_a_graph() {
        let mut engine = FixtureEngine::new(2).with_scored(FixtureEngine::new(2).ids_at_depth(1));
        assert_eq!(GraphStats::from_engine(&engine), None);

        engine
            .init_graph(crate::engine::ScoringFunction::LrEuclideanCc, 1, &mut |_| {})
            .unwrap();
        assert_eq!(
            GraphStats::from_engine(&engine),
            Some(GraphStats {
                components: 1,
                edges: 0,
                clusters: 2,
            })
        );
    }
}
