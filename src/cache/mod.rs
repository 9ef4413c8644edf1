//! Local cache of materialized clusters and the hierarchy edges between
//! them. Every streamed engine callback ends up mutating this cache.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use glam::Vec3;
use tracing::debug;

use crate::cluster::{ClusterId, ClusterRecord};
use crate::engine::{ClusterEngine, EngineError};
use crate::error::CanopyError;

mod callbacks;
mod search;

pub use search::SearchHit;

pub const SELECTED_COLOR: Vec3 = Vec3::new(0.0, 0.0, 1.0);

#[derive(Clone, Debug, PartialEq)]
pub struct VisualNode {
    serial: u64,
    id: ClusterId,
    left: ClusterId,
    right: ClusterId,
    pub position: Vec3,
    color: Vec3,
    base_color: Vec3,
    selected: bool,
    pub active: bool,
    vertex_index: Option<usize>,
}

impl VisualNode {
    fn from_record(serial: u64, record: &ClusterRecord) -> Self {
        Self {
            serial,
            id: record.id,
            // filled in by the next naming pass
            left: record.id,
            right: record.id,
            position: record.position,
            color: record.color,
            base_color: record.color,
            selected: false,
            // shown by the next visibility pass
            active: false,
            vertex_index: None,
        }
    }

    /// Identity of this node instance; a re-created node gets a new serial.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    pub fn left(&self) -> ClusterId {
        self.left
    }

    pub fn right(&self) -> ClusterId {
        self.right
    }

    /// Real children, once a naming pass resolved them.
    pub fn children(&self) -> Option<(ClusterId, ClusterId)> {
        if self.is_leaf() || self.children_deferred() {
            None
        } else {
            Some((self.left, self.right))
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_zero() && self.right.is_zero()
    }

    pub fn children_deferred(&self) -> bool {
        self.left == self.id && self.right == self.id
    }

    pub fn set_children(&mut self, left: ClusterId, right: ClusterId) {
        self.left = left;
        self.right = right;
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn base_color(&self) -> Vec3 {
        self.base_color
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.base_color = color;
        if !self.selected {
            self.color = color;
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn select(&mut self) {
        self.selected = true;
        self.color = SELECTED_COLOR;
    }

    pub fn deselect(&mut self) {
        self.selected = false;
        self.color = self.base_color;
    }

    pub fn toggle_select(&mut self) {
        if self.selected {
            self.deselect();
        } else {
            self.select();
        }
    }

    pub fn vertex_index(&self) -> Option<usize> {
        self.vertex_index
    }

    pub(crate) fn set_vertex_index(&mut self, index: Option<usize>) {
        self.vertex_index = index;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub parent: ClusterId,
    pub child: ClusterId,
}

impl EdgeKey {
    pub fn new(parent: ClusterId, child: ClusterId) -> Self {
        Self { parent, child }
    }
}

/// Hierarchy edge between two cached nodes, looked up by its endpoint ids.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    key: EdgeKey,
    pub visible: bool,
}

impl Edge {
    pub fn new(key: EdgeKey) -> Self {
        Self {
            key,
            visible: false,
        }
    }

    pub fn key(&self) -> EdgeKey {
        self.key
    }

    pub fn parent(&self) -> ClusterId {
        self.key.parent
    }

    pub fn child(&self) -> ClusterId {
        self.key.child
    }
}

#[derive(Clone, Default)]
pub struct TreeCache {
    nodes: BTreeMap<ClusterId, VisualNode>,
    edges: BTreeMap<EdgeKey, Edge>,
    next_serial: u64,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ClusterId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: ClusterId) -> Option<&VisualNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: ClusterId) -> Option<&mut VisualNode> {
        self.nodes.get_mut(&id)
    }

    pub fn tree(&self) -> &BTreeMap<ClusterId, VisualNode> {
        &self.nodes
    }

    pub fn edges(&self) -> &BTreeMap<EdgeKey, Edge> {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn create_node(&mut self, record: &ClusterRecord) -> VisualNode {
        self.next_serial += 1;
        VisualNode::from_record(self.next_serial, record)
    }

    pub fn get_or_add<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &E,
        id: ClusterId,
    ) -> Result<&mut VisualNode, EngineError> {
        if !self.nodes.contains_key(&id) {
            let record = engine.cluster_record(id)?;
            let node = self.create_node(&record);
            self.nodes.insert(id, node);
        }
        self.nodes.get_mut(&id).ok_or(EngineError::NotInCache(id))
    }

    pub fn add<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &E,
        id: ClusterId,
    ) -> Result<&mut VisualNode, CanopyError> {
        if self.nodes.contains_key(&id) {
            return Err(CanopyError::DuplicateKey(format!("cluster {id}")));
        }
        let record = engine.cluster_record(id)?;
        let node = self.create_node(&record);
        Ok(self.nodes.entry(id).or_insert(node))
    }

    /// Swaps in `nodes` as the whole cache. Nodes left out are dropped along
    /// with every edge touching them. Returns how many nodes were dropped.
    pub fn replace_all(&mut self, nodes: BTreeMap<ClusterId, VisualNode>) -> usize {
        let dropped = self
            .nodes
            .keys()
            .filter(|id| !nodes.contains_key(id))
            .count();
        self.nodes = nodes;
        let before = self.edges.len();
        self.edges.retain(|key, _| {
            self.nodes.contains_key(&key.parent) && self.nodes.contains_key(&key.child)
        });
        debug!(
            kept = self.nodes.len(),
            dropped,
            dropped_edges = before - self.edges.len(),
            "replaced cluster cache"
        );
        dropped
    }

    pub fn destroy_edges(&mut self) {
        debug!(count = self.edges.len(), "destroying edges");
        self.edges.clear();
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Inserts `edge` unless its key is taken; a duplicate is discarded.
    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        match self.edges.entry(edge.key) {
            Entry::Occupied(_) => {
                debug!(
                    parent = %edge.key.parent,
                    child = %edge.key.child,
                    "edge already cached; discarding duplicate"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(edge);
                true
            }
        }
    }

    pub fn edge_mut(&mut self, key: EdgeKey) -> Option<&mut Edge> {
        self.edges.get_mut(&key)
    }

    /// Clones of the cached nodes matching `keep`, ready for `replace_all`.
    pub fn subset(
        &self,
        mut keep: impl FnMut(&VisualNode) -> bool,
    ) -> BTreeMap<ClusterId, VisualNode> {
        self.nodes
            .iter()
            .filter(|(_, node)| keep(node))
            .map(|(id, node)| (*id, node.clone()))
            .collect()
    }

    pub fn selected_ids(&self) -> Vec<ClusterId> {
        self.nodes
            .values()
            .filter(|node| node.selected)
            .map(|node| node.id)
            .collect()
    }

    pub fn deselect_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.deselect();
        }
    }

    pub fn deactivate_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.active = false;
        }
    }

    pub fn active_count(&self) -> usize {
        self.nodes.values().filter(|node| node.active).count()
    }

    pub fn visible_edge_count(&self) -> usize {
        self.edges.values().filter(|edge| edge.visible).count()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::engine::testing::{CountingEngine, FixtureEngine};

    proptest! {
        #[test]
        fn get_or_add_memoizes_per_id(height in 1usize..5, pick in 0usize..64) {
            let engine = CountingEngine::new(FixtureEngine::new(height));
            let all = (0..=height)
                .flat_map(|depth| engine.inner.ids_at_depth(depth))
                .collect::<Vec<_>>();
            let id = all[pick % all.len()];
            let mut cache = TreeCache::new();

            let first = cache.get_or_add(&engine, id).unwrap().serial();
            let lookups = engine.record_lookups();
            let second = cache.get_or_add(&engine, id).unwrap().serial();

            prop_assert_eq!(first, second);
            prop_assert_eq!(engine.record_lookups(), lookups);
            prop_assert_eq!(cache.len(), 1);
        }

        #[test]
        fn duplicate_edge_keys_leave_one_edge(
            pairs in proptest::collection::vec((0usize..6, 0usize..6, 1usize..4), 1..40)
        ) {
            let mut cache = TreeCache::new();
            let mut distinct = std::collections::BTreeSet::new();
            for (parent, child, repeats) in pairs {
                let key = EdgeKey::new(ClusterId::new(parent, 2), ClusterId::new(child, 1));
                distinct.insert(key);
                for _ in 0..repeats {
                    cache.insert_edge(Edge::new(key));
                }
            }
            prop_assert_eq!(cache.edges().len(), distinct.len());
        }
    }

    #[test]
    fn get_or_add_seeds_deferred_children_and_surfaces_misses() {
        let engine = FixtureEngine::new(2);
        let mut cache = TreeCache::new();

        let node = cache.get_or_add(&engine, engine.root_id()).unwrap();
        assert!(node.children_deferred());
        assert_eq!(node.children(), None);
        assert!(!node.is_leaf());

        let missing = ClusterId::new(1, 3);
        assert_eq!(
            cache.get_or_add(&engine, missing).err(),
            Some(EngineError::NotFound(missing))
        );
        assert!(!cache.contains(missing));
    }

    #[test]
    fn add_refuses_a_cached_id() {
        let engine = FixtureEngine::new(1);
        let mut cache = TreeCache::new();
        cache.add(&engine, engine.root_id()).unwrap();
        assert!(matches!(
            cache.add(&engine, engine.root_id()),
            Err(CanopyError::DuplicateKey(_))
        ));
    }

    #[test]
    fn replace_all_keeps_exactly_the_subset() {
        let engine = FixtureEngine::new(2);
        let mut cache = TreeCache::new();
        for depth in 0..=2 {
            for id in engine.ids_at_depth(depth) {
                cache.get_or_add(&engine, id).unwrap();
            }
        }
        let leaves = engine.ids_at_depth(2);
        cache.insert_edge(Edge::new(EdgeKey::new(engine.root_id(), engine.ids_at_depth(1)[0])));

        let subset = cache.subset(|node| leaves.contains(&node.id()));
        let dropped = cache.replace_all(subset.clone());

        assert_eq!(dropped, 3);
        assert!(cache.tree().keys().eq(subset.keys()));
        assert!(!cache.contains(engine.root_id()));
        assert!(cache.edges().is_empty());
    }

    #[test]
    fn selection_paints_and_restores_color() {
        let engine = FixtureEngine::new(1);
        let mut cache = TreeCache::new();
        let node = cache.get_or_add(&engine, engine.root_id()).unwrap();
        node.set_color(Vec3::new(0.2, 0.4, 0.6));

        node.select();
        assert_eq!(node.color(), SELECTED_COLOR);
        node.set_color(Vec3::ONE);
        assert_eq!(node.color(), SELECTED_COLOR);

        node.deselect();
        assert_eq!(node.color(), Vec3::ONE);
        assert!(cache.selected_ids().is_empty());
    }
}
