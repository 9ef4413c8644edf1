use tracing::{debug, info, trace, warn};

use crate::cache::TreeCache;
use crate::cluster::{ClusterId, ClusterRecord};
use crate::engine::{ClusterEngine, EngineError};

pub const INTERVAL_STEP: usize = 3;

/// Depth window `[current_depth, max_depth]` below a root cluster.
///
/// Positions are laid out for every level down to `max_depth` but only
/// levels down to `current_depth` are shown, so stepping one level deeper
/// usually needs no new layout. The layout is recomputed in batches of
/// `INTERVAL_STEP` levels when `current_depth` crosses either edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepthWindowLayout {
    root_id: ClusterId,
    root_depth: usize,
    current_depth: usize,
    max_depth: usize,
    tree_height: usize,
    recomputations: usize,
}

impl DepthWindowLayout {
    pub fn new<E: ClusterEngine + ?Sized>(
        engine: &E,
        cache: &mut TreeCache,
        root_id: ClusterId,
    ) -> Result<Self, EngineError> {
        let root = engine.cluster_record(root_id)?;
        let current_depth = root.depth + 1;
        let mut layout = Self {
            root_id,
            root_depth: root.depth,
            current_depth,
            max_depth: current_depth + INTERVAL_STEP,
            tree_height: engine.tree_height(),
            recomputations: 0,
        };

        cache.get_or_add(engine, root_id)?;
        layout.recompute(engine, cache)?;
        layout.apply_visibility(engine, cache)?;
        info!(
            root = %root_id,
            current_depth = layout.current_depth,
            max_depth = layout.max_depth,
            "depth window ready"
        );
        Ok(layout)
    }

    pub fn root_id(&self) -> ClusterId {
        self.root_id
    }

    pub fn root_depth(&self) -> usize {
        self.root_depth
    }

    pub fn current_depth(&self) -> usize {
        self.current_depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn tree_height(&self) -> usize {
        self.tree_height
    }

    /// Number of batched position recomputations, the construction pass
    /// included.
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    /// Reveals one more level. Returns `false` without touching the engine
    /// when the tree has no deeper level.
    pub fn show_more<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &E,
        cache: &mut TreeCache,
    ) -> Result<bool, EngineError> {
        let next = self.current_depth + 1;
        if next > self.tree_height {
            debug!(depth = self.current_depth, "already showing the deepest level");
            return Ok(false);
        }

        self.current_depth = next;
        if self.current_depth > self.max_depth {
            self.max_depth += INTERVAL_STEP;
            debug!(max_depth = self.max_depth, "enlarging depth window");
            self.recompute(engine, cache)?;
        }
        self.apply_visibility(engine, cache)?;
        Ok(true)
    }

    /// Hides the deepest shown level. Returns `false` when only the root's
    /// children are shown.
    pub fn show_less<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &E,
        cache: &mut TreeCache,
    ) -> Result<bool, EngineError> {
        let next = self.current_depth.saturating_sub(1);
        if next <= self.root_depth {
            debug!(depth = self.current_depth, "already showing the shallowest level");
            return Ok(false);
        }

        self.current_depth = next;
        if self.current_depth + INTERVAL_STEP < self.max_depth {
            self.max_depth -= INTERVAL_STEP;
            debug!(max_depth = self.max_depth, "shrinking depth window");
            self.recompute(engine, cache)?;
        }
        self.apply_visibility(engine, cache)?;
        Ok(true)
    }

    fn recompute<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &E,
        cache: &mut TreeCache,
    ) -> Result<(), EngineError> {
        let mut root = engine.cluster_record(self.root_id)?;
        if let Some(node) = cache.get(self.root_id) {
            root.position = node.position;
        }
        self.recompute_positions(engine, cache, root)
    }

    fn recompute_positions<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &E,
        cache: &mut TreeCache,
        root: ClusterRecord,
    ) -> Result<(), EngineError> {
        let span = self.max_depth - self.root_depth;
        engine.draw_hierarchy_bounded(&root, self.current_depth, span, &mut |record| {
            match cache.get_or_add(engine, record.id) {
                Ok(node) => node.position = record.position,
                Err(error) => warn!(id = %record.id, %error, "no node for laid out cluster"),
            }
        })?;
        cache.sync_names(engine, self.root_id, self.max_depth)?;
        self.recomputations += 1;
        Ok(())
    }

    /// Shows every level down to `current_depth` and hides the next one,
    /// then refreshes edges the same way.
    fn apply_visibility<E: ClusterEngine + ?Sized>(
        &self,
        engine: &E,
        cache: &mut TreeCache,
    ) -> Result<(), EngineError> {
        let current_depth = self.current_depth;
        let bound = current_depth + 1;

        engine.traverse_depth_first(self.root_id, bound, &mut |record| {
            if record.depth <= current_depth {
                match cache.get_or_add(engine, record.id) {
                    Ok(node) => node.active = true,
                    Err(error) => warn!(id = %record.id, %error, "no node for visible cluster"),
                }
            } else if let Some(node) = cache.get_mut(record.id) {
                node.active = false;
            } else {
                trace!(id = %record.id, "hidden cluster not cached");
            }
        })?;

        engine.traverse_depth_first(self.root_id, bound, &mut |record| {
            cache.materialize_edges(record.id);
            cache.refresh_edge_visibility(record.id);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EdgeKey;
    use crate::engine::testing::{CountingEngine, FixtureEngine};

    fn visible_edges_from_depth(cache: &TreeCache, engine: &FixtureEngine, depth: usize) -> usize {
        let parents = engine.ids_at_depth(depth);
        cache
            .edges()
            .values()
            .filter(|edge| edge.visible && parents.contains(&edge.parent()))
            .count()
    }

    #[test]
    fn seven_node_tree_shows_the_root_and_its_children() {
        let engine = FixtureEngine::new(2);
        let mut cache = TreeCache::new();
        let mut layout = DepthWindowLayout::new(&engine, &mut cache, engine.root_id()).unwrap();

        assert_eq!(layout.current_depth(), 1);
        assert_eq!(layout.max_depth(), 4);
        assert_eq!(cache.len(), 7);
        assert_eq!(cache.active_count(), 3);
        assert_eq!(visible_edges_from_depth(&cache, &engine, 0), 2);
        assert_eq!(visible_edges_from_depth(&cache, &engine, 1), 0);
        for leaf in engine.ids_at_depth(2) {
            assert!(!cache.get(leaf).unwrap().active);
        }

        assert!(layout.show_more(&engine, &mut cache).unwrap());
        assert_eq!(cache.active_count(), 7);
        assert_eq!(cache.visible_edge_count(), 6);
        assert!(!layout.show_more(&engine, &mut cache).unwrap());
    }

    #[test]
    fn deeper_edges_wait_for_two_reveals() {
        let engine = FixtureEngine::new(3);
        let mut cache = TreeCache::new();
        let mut layout = DepthWindowLayout::new(&engine, &mut cache, engine.root_id()).unwrap();

        assert_eq!(visible_edges_from_depth(&cache, &engine, 2), 0);
        layout.show_more(&engine, &mut cache).unwrap();
        assert_eq!(visible_edges_from_depth(&cache, &engine, 2), 0);
        layout.show_more(&engine, &mut cache).unwrap();
        assert_eq!(visible_edges_from_depth(&cache, &engine, 2), 8);
    }

    #[test]
    fn five_reveals_recompute_positions_twice() {
        let engine = CountingEngine::new(FixtureEngine::new(8));
        let mut cache = TreeCache::new();
        let root = engine.inner.root_id();
        let mut layout = DepthWindowLayout::new(&engine, &mut cache, root).unwrap();

        for _ in 0..5 {
            assert!(layout.show_more(&engine, &mut cache).unwrap());
        }

        assert_eq!(layout.current_depth(), layout.root_depth() + 6);
        assert_eq!(layout.max_depth(), 7);
        assert_eq!(layout.recomputations(), 2);
        assert_eq!(engine.bounded_draws(), 2);
        assert_eq!(engine.name_passes(), 2);
        // two visibility traversals per pass, construction included
        assert_eq!(engine.traversals(), 12);
    }

    #[test]
    fn reveal_at_tree_height_issues_no_engine_calls() {
        let engine = CountingEngine::new(FixtureEngine::new(2));
        let mut cache = TreeCache::new();
        let mut layout = DepthWindowLayout::new(&engine, &mut cache, engine.inner.root_id()).unwrap();
        layout.show_more(&engine, &mut cache).unwrap();
        assert_eq!(layout.current_depth(), 2);

        let calls = engine.total_calls();
        assert!(!layout.show_more(&engine, &mut cache).unwrap());
        assert_eq!(layout.current_depth(), 2);
        assert_eq!(engine.total_calls(), calls);
    }

    #[test]
    fn hiding_keeps_nodes_cached_and_hides_their_edges() {
        let engine = CountingEngine::new(FixtureEngine::new(3));
        let mut cache = TreeCache::new();
        let mut layout = DepthWindowLayout::new(&engine, &mut cache, engine.inner.root_id()).unwrap();
        layout.show_more(&engine, &mut cache).unwrap();
        let cached = cache.len();
        let lookups = engine.record_lookups();

        assert!(layout.show_less(&engine, &mut cache).unwrap());
        assert_eq!(cache.len(), cached);
        assert_eq!(visible_edges_from_depth(&cache, &engine.inner, 1), 0);
        assert!(!layout.show_less(&engine, &mut cache).unwrap());
        assert_eq!(layout.current_depth(), 1);

        // reactivation reuses cached nodes
        layout.show_more(&engine, &mut cache).unwrap();
        assert_eq!(engine.record_lookups(), lookups);
        let child = engine.inner.ids_at_depth(1)[0];
        let grandchild = engine.inner.ids_at_depth(2)[0];
        assert!(cache.edges()[&EdgeKey::new(child, grandchild)].visible);
    }

    #[test]
    fn shrinking_below_the_batch_recomputes_once() {
        let engine = FixtureEngine::new(9);
        let mut cache = TreeCache::new();
        let mut layout = DepthWindowLayout::new(&engine, &mut cache, engine.root_id()).unwrap();
        for _ in 0..4 {
            layout.show_more(&engine, &mut cache).unwrap();
        }
        assert_eq!((layout.current_depth(), layout.max_depth()), (5, 7));
        assert_eq!(layout.recomputations(), 2);

        layout.show_less(&engine, &mut cache).unwrap();
        assert_eq!((layout.current_depth(), layout.max_depth()), (4, 7));
        assert_eq!(layout.recomputations(), 2);
        layout.show_less(&engine, &mut cache).unwrap();
        assert_eq!((layout.current_depth(), layout.max_depth()), (3, 4));
        assert_eq!(layout.recomputations(), 3);
        layout.show_less(&engine, &mut cache).unwrap();
        assert_eq!((layout.current_depth(), layout.max_depth()), (2, 4));
        assert_eq!(layout.recomputations(), 3);
    }

    #[test]
    fn window_on_a_subtree_keeps_its_root_position() {
        let engine = FixtureEngine::new(4);
        let mut cache = TreeCache::new();
        let subtree = engine.ids_at_depth(1)[1];
        cache.get_or_add(&engine, subtree).unwrap().position = glam::Vec3::new(3.0, 9.0, 0.0);

        let mut layout = DepthWindowLayout::new(&engine, &mut cache, subtree).unwrap();
        for _ in 0..3 {
            layout.show_more(&engine, &mut cache).unwrap();
        }
        assert_eq!(layout.root_depth(), 1);
        assert_eq!(cache.get(subtree).unwrap().position, glam::Vec3::new(3.0, 9.0, 0.0));
        assert!(!cache.contains(engine.root_id()));
    }
}
