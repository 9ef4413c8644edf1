//! In-process clustering engine over a seeded blob dataset.

use std::path::Path;

use glam::Vec3;
use tracing::{debug, info};

use crate::cluster::{ClusterId, ClusterRecord};
use crate::config::{DEFAULT_EDGE_SCALAR, StartupConfig};

use super::{
    ClusterEngine, ColorStrategy, EdgeMessage, EngineError, EngineLifecycle, NameVisitor,
    PhysicsStatus, RecordVisitor, ScoringFunction,
};

mod color;
mod graph;
mod hierarchy;
mod persist;
mod physics;
mod tree;

use self::graph::{ClusterGraph, select_by_score};
use self::physics::{PhysicsPoll, PhysicsWorker};
use self::tree::{ClusterTree, generate_blobs};

pub struct SyntheticEngine {
    tree: Option<ClusterTree>,
    graph: Option<ClusterGraph>,
    physics: Option<PhysicsWorker>,
}

impl SyntheticEngine {
    fn from_tree(tree: ClusterTree) -> Self {
        info!(
            cardinality = tree.cardinality(),
            clusters = tree.nodes.len(),
            height = tree.height(),
            metric = %tree.metric,
            "cluster tree ready"
        );
        Self {
            tree: Some(tree),
            graph: None,
            physics: None,
        }
    }

    fn tree(&self) -> Result<&ClusterTree, EngineError> {
        self.tree.as_ref().ok_or(EngineError::EngineUnavailable)
    }

    fn record(&self, tree: &ClusterTree, slot: usize) -> ClusterRecord {
        let mut record = tree.record(slot);
        record.color = color::cluster_color(tree, None, slot, ColorStrategy::DominantLabel);
        if let Some(graph) = &self.graph {
            record.vertex_degree = graph.degree_of(record.id);
        }
        record
    }

    fn ensure_physics_idle(&self) -> Result<(), EngineError> {
        if self.physics.is_some() {
            return Err(EngineError::PhysicsRunning);
        }
        Ok(())
    }
}

impl ClusterEngine for SyntheticEngine {
    fn cluster_record(&self, id: ClusterId) -> Result<ClusterRecord, EngineError> {
        let tree = self.tree()?;
        Ok(self.record(tree, tree.slot(id)?))
    }

    fn root_record(&self) -> Result<ClusterRecord, EngineError> {
        let tree = self.tree()?;
        Ok(self.record(tree, 0))
    }

    fn tree_height(&self) -> usize {
        self.tree.as_ref().map(ClusterTree::height).unwrap_or_default()
    }

    fn tree_cardinality(&self) -> usize {
        self.tree
            .as_ref()
            .map(ClusterTree::cardinality)
            .unwrap_or_default()
    }

    fn max_lfd(&self) -> f32 {
        self.tree.as_ref().map(ClusterTree::max_lfd).unwrap_or_default()
    }

    fn max_vertex_degree(&self) -> usize {
        self.graph
            .as_ref()
            .map(ClusterGraph::max_degree)
            .unwrap_or_default()
    }

    fn vertex_degree(&self, id: ClusterId) -> Result<usize, EngineError> {
        let tree = self.tree()?;
        tree.slot(id)?;
        let graph = self.graph.as_ref().ok_or(EngineError::NoGraph)?;
        Ok(graph.degree_of(id))
    }

    fn for_each_name(
        &self,
        start: ClusterId,
        max_depth: usize,
        visitor: &mut NameVisitor<'_>,
    ) -> Result<(), EngineError> {
        let tree = self.tree()?;
        for slot in tree.preorder(tree.slot(start)?, max_depth) {
            visitor(&tree.names(slot));
        }
        Ok(())
    }

    fn traverse_depth_first(
        &self,
        start: ClusterId,
        max_depth: usize,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        let tree = self.tree()?;
        for slot in tree.preorder(tree.slot(start)?, max_depth) {
            visitor(&self.record(tree, slot));
        }
        Ok(())
    }

    fn draw_hierarchy(&self, visitor: &mut RecordVisitor<'_>) -> Result<(), EngineError> {
        let tree = self.tree()?;
        for (slot, position) in hierarchy::layered_positions(tree, 0, tree.height()) {
            visitor(&self.record(tree, slot).with_position(position));
        }
        Ok(())
    }

    fn draw_hierarchy_bounded(
        &self,
        root: &ClusterRecord,
        current_depth: usize,
        depth_span: usize,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        let tree = self.tree()?;
        let root_slot = tree.slot(root.id)?;
        debug!(root = %root.id, current_depth, depth_span, "bounded hierarchy draw");
        for (slot, position) in hierarchy::layered_positions(tree, root_slot, depth_span) {
            visitor(&self.record(tree, slot).with_position(root.position + position));
        }
        Ok(())
    }

    fn color_clusters_by(
        &self,
        strategy: ColorStrategy,
        visitor: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        let tree = self.tree()?;
        for slot in tree.preorder(0, tree.height()) {
            let color = color::cluster_color(tree, self.graph.as_ref(), slot, strategy);
            visitor(&self.record(tree, slot).with_color(color));
        }
        Ok(())
    }

    fn init_graph(
        &mut self,
        scoring: ScoringFunction,
        min_depth: usize,
        selector: &mut RecordVisitor<'_>,
    ) -> Result<(), EngineError> {
        self.ensure_physics_idle()?;
        let tree = self.tree()?;
        if min_depth > tree.height() {
            return Err(EngineError::GraphBuildFailed(format!(
                "minimum depth {min_depth} is below the tree height {}",
                tree.height()
            )));
        }

        let selected = select_by_score(tree, scoring, min_depth);
        let graph = ClusterGraph::over(tree, selected, DEFAULT_EDGE_SCALAR);
        info!(
            %scoring,
            min_depth,
            clusters = graph.cluster_count(),
            edges = graph.real_edge_count(),
            components = graph.component_count(),
            "graph selection ready"
        );
        self.graph = Some(graph);

        let (Some(tree), Some(graph)) = (&self.tree, &self.graph) else {
            return Err(EngineError::EngineUnavailable);
        };
        for &slot in &graph.members {
            selector(&self.record(tree, slot));
        }
        Ok(())
    }

    fn init_force_layout(
        &mut self,
        seeds: &[(ClusterId, Vec3)],
        edge_scalar: f32,
        max_iterations: usize,
    ) -> Result<(), EngineError> {
        self.ensure_physics_idle()?;
        let tree = self.tree()?;
        let members = seeds
            .iter()
            .map(|(id, _)| tree.slot(*id))
            .collect::<Result<Vec<_>, _>>()?;
        let graph = ClusterGraph::over(tree, members, edge_scalar);
        debug!(
            clusters = graph.cluster_count(),
            springs = graph.springs.len(),
            max_iterations,
            "starting force layout"
        );

        let positions = seeds.iter().map(|(_, position)| *position).collect();
        self.physics = Some(PhysicsWorker::spawn(
            positions,
            graph.springs.clone(),
            max_iterations,
        ));
        self.graph = Some(graph);
        Ok(())
    }

    fn stream_graph_edges(&self, visitor: &mut RecordVisitor<'_>) -> Result<(), EngineError> {
        let tree = self.tree()?;
        let graph = self.graph.as_ref().ok_or(EngineError::NoGraph)?;
        for spring in &graph.springs {
            let (near, far) = (graph.members[spring.a], graph.members[spring.b]);
            let message = EdgeMessage {
                is_real: spring.is_real,
                other: tree.node(far).id,
            };
            visitor(&self.record(tree, near).with_message(message.encode()));
        }
        Ok(())
    }

    fn graph_edge_count(&self) -> Option<usize> {
        self.graph.as_ref().map(ClusterGraph::real_edge_count)
    }

    fn graph_cluster_count(&self) -> Option<usize> {
        self.graph.as_ref().map(ClusterGraph::cluster_count)
    }

    fn graph_component_count(&self) -> Option<usize> {
        self.graph.as_ref().map(ClusterGraph::component_count)
    }

    fn physics_step(&mut self, visitor: &mut RecordVisitor<'_>) -> PhysicsStatus {
        let Some(worker) = self.physics.as_mut() else {
            return PhysicsStatus::Error(EngineError::PhysicsNotRunning);
        };
        match worker.poll() {
            PhysicsPoll::Pending => PhysicsStatus::Running,
            PhysicsPoll::Finished => {
                self.physics = None;
                info!("force layout finished");
                PhysicsStatus::Finished
            }
            PhysicsPoll::Frame(frame) => {
                let (Some(tree), Some(graph)) = (&self.tree, &self.graph) else {
                    return PhysicsStatus::Error(EngineError::EngineUnavailable);
                };
                for (&slot, position) in graph.members.iter().zip(frame) {
                    visitor(&self.record(tree, slot).with_position(position));
                }
                PhysicsStatus::Running
            }
        }
    }

    fn force_physics_shutdown(&mut self) -> Result<(), EngineError> {
        let mut worker = self.physics.take().ok_or(EngineError::PhysicsNotRunning)?;
        worker.stop();
        info!("force layout stopped");
        Ok(())
    }
}

impl EngineLifecycle for SyntheticEngine {
    fn init(startup: &StartupConfig) -> Result<Self, EngineError> {
        startup.validate()?;
        if startup.should_load
            && let Some(path) = &startup.load_path
        {
            return Self::load(path);
        }

        let (points, labels) =
            generate_blobs(&startup.data_name, startup.cardinality, startup.num_labels);
        let tree = ClusterTree::build(
            points,
            labels,
            startup.num_labels,
            startup.distance_metric,
            startup.min_cluster_size,
        )?;
        Ok(Self::from_tree(tree))
    }

    fn load(path: &Path) -> Result<Self, EngineError> {
        let tree = persist::read_tree(path)?;
        info!(path = %path.display(), "loaded cluster tree");
        Ok(Self::from_tree(tree))
    }

    fn save(&self, path: &Path) -> Result<(), EngineError> {
        persist::write_tree(self.tree()?, path)?;
        info!(path = %path.display(), "saved cluster tree");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.tree.is_none() {
            return Err(EngineError::EngineUnavailable);
        }
        if let Some(mut worker) = self.physics.take() {
            worker.stop();
        }
        self.graph = None;
        self.tree = None;
        info!("engine shut down");
        Ok(())
    }
}
