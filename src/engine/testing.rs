use std::cell::Cell;
use std::collections::{HashMap, VecDeque};

use glam::Vec3;

use crate::cluster::{ClusterId, ClusterNames, ClusterRecord};

use super::{
    ClusterEngine, ColorStrategy, EdgeMessage, EngineError, NameVisitor, PhysicsStatus,
    RecordVisitor, ScoringFunction,
};

/// Complete binary tree of a chosen height over `2^height` points, with
/// scripted graph edges and physics frames.
pub(crate) struct FixtureEngine {
    height: usize,
    records: Vec<ClusterRecord>,
    slots: HashMap<ClusterId, usize>,
    graph_edges: Vec<(ClusterId, ClusterId, bool)>,
    edge_count: Option<usize>,
    scored: Vec<ClusterId>,
    frames: VecDeque<Vec<(ClusterId, Vec3)>>,
    graph_members: Option<Vec<ClusterId>>,
    physics_running: bool,
    pub physics_shutdowns: usize,
}

impl FixtureEngine {
    pub fn new(height: usize) -> Self {
        let mut records = Vec::new();
        let mut stack = vec![(ClusterId::new(0, 1 << height), 0)];
        while let Some((id, depth)) = stack.pop() {
            let mut record = ClusterRecord::new(id, depth);
            record.radius = id.cardinality as f32;
            record.lfd = 1.0;
            records.push(record);
            if depth < height {
                let half = id.cardinality / 2;
                stack.push((ClusterId::new(id.offset + half, half), depth + 1));
                stack.push((ClusterId::new(id.offset, half), depth + 1));
            }
        }
        let slots = records
            .iter()
            .enumerate()
            .map(|(slot, record)| (record.id, slot))
            .collect();

        Self {
            height,
            records,
            slots,
            graph_edges: Vec::new(),
            edge_count: None,
            scored: Vec::new(),
            frames: VecDeque::new(),
            graph_members: None,
            physics_running: false,
            physics_shutdowns: 0,
        }
    }

    pub fn with_graph_edges(mut self, edges: Vec<(ClusterId, ClusterId, bool)>) -> Self {
        self.graph_edges = edges;
        self
    }

    /// Overrides the reported edge count regardless of the scripted edges.
    pub fn with_edge_count(mut self, count: usize) -> Self {
        self.edge_count = Some(count);
        self
    }

    pub fn with_scored(mut self, scored: Vec<ClusterId>) -> Self {
        self.scored = scored;
        self
    }

    pub fn with_frames(mut self, frames: Vec<Vec<(ClusterId, Vec3)>>) -> Self {
        self.frames = frames.into();
        self
    }

    pub fn root_id(&self) -> ClusterId {
        self.records[0].id
    }

    pub fn ids_at_depth(&self, depth: usize) -> Vec<ClusterId> {
        self.records
            .iter()
            .filter(|record| record.depth == depth)
            .map(|record| record.id)
            .collect()
    }

    pub fn physics_running(&self) -> bool {
        self.physics_running
    }

    fn children(&self, id: ClusterId, depth: usize) -> Option<(ClusterId, ClusterId)> {
        (depth < self.height).then(|| {
            let half = id.cardinality / 2;
            (
                ClusterId::new(id.offset, half),
                ClusterId::new(id.offset + half, half),
            )
        })
    }

    fn slot(&self, id: ClusterId) -> Result<usize, EngineError> {
        self.slots.get(&id).copied().ok_or(EngineError::NotFound(id))
    }

    fn preorder(&self, start: ClusterId, max_depth: usize) -> Result<Vec<usize>, EngineError> {
        let mut visited = Vec::new();
        let mut stack = vec![self.slot(start)?];
        while let Some(slot) = stack.pop() {
            visited.push(slot);
            let record = &self.records[slot];
            if record.depth >= max_depth {
                continue;
            }
            if let Some((left, right)) = self.children(record.id, record.depth) {
                stack.push(self.slot(right)?);
                stack.push(self.slot(left)?);
            }
        }
        Ok(visited)
    }

    fn layout_position(record: &ClusterRecord) -> Vec3 {
        Vec3::new(
            record.id.offset as f32 + record.id.cardinality as f32 / 2.0,
            -(record.depth as f32),
            0.0,
        )
    }
}

impl ClusterEngine for FixtureEngine {
    fn cluster_record(&self, id: ClusterId) -> Result<ClusterRecord, EngineError> {
        Ok(self.records[self.slot(id)?].clone())
    }

    fn root_record(&self) -> Result<ClusterRecord, EngineError> {
        Ok(self.records[0].clone())
    }

    fn tree_height(&self) -> usize {
        self.height
    }

    fn tree_cardinality(&self) -> usize {
        1 << self.height
    }

    fn max_lfd(&self) -> f32 {
        1.0
    }

    fn max_vertex_degree(&self) -> usize {
        0
    }

    fn vertex_degree(&self, id: ClusterId) -> Result<usize, EngineError> {
        self.slot(id)?;
        Ok(self
            .graph_edges
            .iter()
            .filter(|(a, b, real)| *real && (*a == id || *b == id))
            .count())
    }

    fn for_each_name(
        &self,
        start: ClusterId,
        max_depth: usize,
        visitor: &mut NameVisitor<'_>,
    ) -> Result<(), EngineError> {
        for slot in self.preorder(start, max_depth)? {
            let record = &self.records[slot];
            let names = match self.children(record.id, record.depth) {
                Some((left, right)) => ClusterNames {
                    id: record.id,
                    left,
                    right,
                },
                None => ClusterNames::leaf(record.id),
            };
            visitor(&names);
        }
        Ok(())
    }

    fn traverse_depth_first(
        &self,
        start: ClusterId,
        max_depth: usize,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        for slot in self.preorder(start, max_depth)? {
            visitor(&self.records[slot]);
        }
        Ok(())
    }

    fn draw_hierarchy(&self, visitor: &mut RecordVisitor<'_>) -> Result<(), EngineError> {
        for slot in self.preorder(self.root_id(), self.height)? {
            let record = &self.records[slot];
            visitor(&record.clone().with_position(Self::layout_position(record)));
        }
        Ok(())
    }

    fn draw_hierarchy_bounded(
        &self,
        root: &ClusterRecord,
        _current_depth: usize,
        depth_span: usize,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        let origin = Self::layout_position(&self.records[self.slot(root.id)?]);
        for slot in self.preorder(root.id, root.depth + depth_span)? {
            let record = &self.records[slot];
            let position = root.position + Self::layout_position(record) - origin;
            visitor(&record.clone().with_position(position));
        }
        Ok(())
    }

    fn color_clusters_by(
        &self,
        _strategy: ColorStrategy,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        for slot in self.preorder(self.root_id(), self.height)? {
            let record = &self.records[slot];
            let shade = record.depth as f32 / self.height.max(1) as f32;
            visitor(&record.clone().with_color(Vec3::splat(shade)));
        }
        Ok(())
    }

    fn init_graph(
        &mut self,
        _scoring: ScoringFunction,
        _min_depth: usize,
        selector: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        if self.physics_running {
            return Err(EngineError::PhysicsRunning);
        }
        for id in &self.scored {
            selector(&self.records[self.slot(*id)?]);
        }
        self.graph_members = Some(self.scored.clone());
        Ok(())
    }

    fn init_force_layout(
        &mut self,
        seeds: &[(ClusterId, Vec3)],
        _edge_scalar: f32,
        _max_iterations: usize,
    ) -> Result<(), EngineError> {
        if self.physics_running {
            return Err(EngineError::PhysicsRunning);
        }
        for (id, _) in seeds {
            self.slot(*id)?;
        }
        self.graph_members = Some(seeds.iter().map(|(id, _)| *id).collect());
        self.physics_running = true;
        Ok(())
    }

    fn stream_graph_edges(&self, visitor: &mut RecordVisitor<'_>) -> Result<(), EngineError> {
        if self.graph_members.is_none() {
            return Err(EngineError::NoGraph);
        }
        for &(near, far, is_real) in &self.graph_edges {
            let message = EdgeMessage {
                is_real,
                other: far,
            };
            visitor(&self.cluster_record(near)?.with_message(message.encode()));
        }
        Ok(())
    }

    fn graph_edge_count(&self) -> Option<usize> {
        self.graph_members.as_ref().map(|_| {
            self.edge_count.unwrap_or_else(|| {
                self.graph_edges
                    .iter()
                    .filter(|(_, _, is_real)| *is_real)
                    .count()
            })
        })
    }

    fn graph_cluster_count(&self) -> Option<usize> {
        self.graph_members.as_ref().map(Vec::len)
    }

    fn graph_component_count(&self) -> Option<usize> {
        self.graph_members.as_ref().map(|_| 1)
    }

    fn physics_step(&mut self, visitor: &mut RecordVisitor<'_>) -> PhysicsStatus {
        if !self.physics_running {
            return PhysicsStatus::Error(EngineError::PhysicsNotRunning);
        }
        let Some(frame) = self.frames.pop_front() else {
            self.physics_running = false;
            return PhysicsStatus::Finished;
        };
        for (id, position) in frame {
            match self.cluster_record(id) {
                Ok(record) => visitor(&record.with_position(position)),
                Err(error) => return PhysicsStatus::Error(error),
            }
        }
        PhysicsStatus::Running
    }

    fn force_physics_shutdown(&mut self) -> Result<(), EngineError> {
        if !self.physics_running {
            return Err(EngineError::PhysicsNotRunning);
        }
        self.physics_running = false;
        self.physics_shutdowns += 1;
        Ok(())
    }
}

#[derive(Default)]
struct CallCounts {
    record_lookups: Cell<usize>,
    bounded_draws: Cell<usize>,
    traversals: Cell<usize>,
    name_passes: Cell<usize>,
    total: Cell<usize>,
}

/// Delegates to `inner` and counts what the caller asked of the engine.
pub(crate) struct CountingEngine<E> {
    pub inner: E,
    counts: CallCounts,
}

impl<E: ClusterEngine> CountingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            counts: CallCounts::default(),
        }
    }

    fn tick(&self, counter: Option<&Cell<usize>>) {
        self.counts.total.set(self.counts.total.get() + 1);
        if let Some(counter) = counter {
            counter.set(counter.get() + 1);
        }
    }

    pub fn total_calls(&self) -> usize {
        self.counts.total.get()
    }

    pub fn bounded_draws(&self) -> usize {
        self.counts.bounded_draws.get()
    }

    pub fn traversals(&self) -> usize {
        self.counts.traversals.get()
    }

    pub fn record_lookups(&self) -> usize {
        self.counts.record_lookups.get()
    }

    pub fn name_passes(&self) -> usize {
        self.counts.name_passes.get()
    }
}

impl<E: ClusterEngine> ClusterEngine for CountingEngine<E> {
    fn cluster_record(&self, id: ClusterId) -> Result<ClusterRecord, EngineError> {
        self.tick(Some(&self.counts.record_lookups));
        self.inner.cluster_record(id)
    }

    fn root_record(&self) -> Result<ClusterRecord, EngineError> {
        self.tick(Some(&self.counts.record_lookups));
        self.inner.root_record()
    }

    fn tree_height(&self) -> usize {
        self.tick(None);
        self.inner.tree_height()
    }

    fn tree_cardinality(&self) -> usize {
        self.tick(None);
        self.inner.tree_cardinality()
    }

    fn max_lfd(&self) -> f32 {
        self.tick(None);
        self.inner.max_lfd()
    }

    fn max_vertex_degree(&self) -> usize {
        self.tick(None);
        self.inner.max_vertex_degree()
    }

    fn vertex_degree(&self, id: ClusterId) -> Result<usize, EngineError> {
        self.tick(None);
        self.inner.vertex_degree(id)
    }

    fn for_each_name(
        &self,
        start: ClusterId,
        max_depth: usize,
        visitor: &mut NameVisitor<'_>,
    ) -> Result<(), EngineError> {
        self.tick(Some(&self.counts.name_passes));
        self.inner.for_each_name(start, max_depth, visitor)
    }

    fn traverse_depth_first(
        &self,
        start: ClusterId,
        max_depth: usize,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        self.tick(Some(&self.counts.traversals));
        self.inner.traverse_depth_first(start, max_depth, visitor)
    }

    fn draw_hierarchy(&self, visitor: &mut RecordVisitor<'_>) -> Result<(), EngineError> {
        self.tick(None);
        self.inner.draw_hierarchy(visitor)
    }

    fn draw_hierarchy_bounded(
        &self,
        root: &ClusterRecord,
        current_depth: usize,
        depth_span: usize,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        self.tick(Some(&self.counts.bounded_draws));
        self.inner
            .draw_hierarchy_bounded(root, current_depth, depth_span, visitor)
    }

    fn color_clusters_by(
        &self,
        strategy: ColorStrategy,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        self.tick(None);
        self.inner.color_clusters_by(strategy, visitor)
    }

    fn init_graph(
        &mut self,
        scoring: ScoringFunction,
        min_depth: usize,
        selector: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        self.tick(None);
        self.inner.init_graph(scoring, min_depth, selector)
    }

    fn init_force_layout(
        &mut self,
        seeds: &[(ClusterId, Vec3)],
        edge_scalar: f32,
        max_iterations: usize,
    ) -> Result<(), EngineError> {
        self.tick(None);
        self.inner
            .init_force_layout(seeds, edge_scalar, max_iterations)
    }

    fn stream_graph_edges(&self, visitor: &mut RecordVisitor<'_>) -> Result<(), EngineError> {
        self.tick(None);
        self.inner.stream_graph_edges(visitor)
    }

    fn graph_edge_count(&self) -> Option<usize> {
        self.tick(None);
        self.inner.graph_edge_count()
    }

    fn graph_cluster_count(&self) -> Option<usize> {
        self.tick(None);
        self.inner.graph_cluster_count()
    }

    fn graph_component_count(&self) -> Option<usize> {
        self.tick(None);
        self.inner.graph_component_count()
    }

    fn physics_step(&mut self, visitor: &mut RecordVisitor<'_>) -> PhysicsStatus {
        self.tick(None);
        self.inner.physics_step(visitor)
    }

    fn force_physics_shutdown(&mut self) -> Result<(), EngineError> {
        self.tick(None);
        self.inner.force_physics_shutdown()
    }
}
