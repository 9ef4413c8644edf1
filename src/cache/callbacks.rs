use tracing::{trace, warn};

use crate::cluster::{ClusterId, ClusterNames, ClusterRecord};
use crate::engine::{ClusterEngine, EngineError};

use super::{Edge, EdgeKey, TreeCache};

impl TreeCache {
    pub fn apply_position(&mut self, record: &ClusterRecord) -> bool {
        let Some(node) = self.nodes.get_mut(&record.id) else {
            trace!(id = %record.id, "position for uncached cluster skipped");
            return false;
        };
        node.position = record.position;
        true
    }

    pub fn apply_color(&mut self, record: &ClusterRecord) -> bool {
        let Some(node) = self.nodes.get_mut(&record.id) else {
            trace!(id = %record.id, "color for uncached cluster skipped");
            return false;
        };
        node.deselect();
        node.set_color(record.color);
        true
    }

    pub fn apply_names<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &E,
        names: &ClusterNames,
    ) -> Result<(), EngineError> {
        let node = self.get_or_add(engine, names.id)?;
        node.set_children(names.left, names.right);
        Ok(())
    }

    /// Resolves real children for `start` and its descendants down to
    /// `max_depth`, creating nodes the cache has not seen yet.
    pub fn sync_names<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &E,
        start: ClusterId,
        max_depth: usize,
    ) -> Result<(), EngineError> {
        engine.for_each_name(start, max_depth, &mut |names| {
            if let Err(error) = self.apply_names(engine, names) {
                warn!(id = %names.id, %error, "could not name cluster");
            }
        })
    }

    /// Adds the edges from `parent` to each of its cached children. Returns
    /// how many new edges were created.
    pub fn materialize_edges(&mut self, parent: ClusterId) -> usize {
        let Some((left, right)) = self.nodes.get(&parent).and_then(|node| node.children()) else {
            return 0;
        };

        let mut created = 0;
        for child in [left, right] {
            if self.nodes.contains_key(&child) && self.insert_edge(Edge::new(EdgeKey::new(parent, child))) {
                created += 1;
            }
        }
        created
    }

    /// An edge is visible exactly when both of its endpoints are active.
    pub fn refresh_edge_visibility(&mut self, parent: ClusterId) {
        let Some((left, right)) = self.nodes.get(&parent).and_then(|node| node.children()) else {
            return;
        };
        let parent_active = self.nodes.get(&parent).is_some_and(|node| node.active);

        for child in [left, right] {
            let child_active = self.nodes.get(&child).is_some_and(|node| node.active);
            if let Some(edge) = self.edges.get_mut(&EdgeKey::new(parent, child)) {
                edge.visible = parent_active && child_active;
            }
        }
    }

    pub fn refresh_all_edge_visibility(&mut self) {
        let active =
            |cache: &Self, id: ClusterId| cache.nodes.get(&id).is_some_and(|node| node.active);
        let visibility = self
            .edges
            .keys()
            .map(|key| (*key, active(self, key.parent) && active(self, key.child)))
            .collect::<Vec<_>>();
        for (key, visible) in visibility {
            if let Some(edge) = self.edges.get_mut(&key) {
                edge.visible = visible;
            }
        }
    }
}
