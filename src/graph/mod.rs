//! Dense, index-addressed graph over a subset of the cache, laid out by the
//! engine's force simulation.

use std::collections::HashMap;

use glam::Vec3;
use tracing::{debug, error, info, warn};

use crate::cache::TreeCache;
use crate::cluster::ClusterId;
use crate::engine::{ClusterEngine, EdgeMessage, EngineError, PhysicsStatus};
use crate::error::CanopyError;

mod select;

pub use select::{GraphStats, active_selected, reactivated_selected, with_ids};

pub const MIN_GRAPH_EDGES: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildState {
    #[default]
    Unbuilt,
    Running,
    Finished,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    Running,
    Finished,
    Failed(EngineError),
}

#[derive(Default)]
pub struct GraphSubsetBuilder {
    state: BuildState,
    ids: Vec<ClusterId>,
    index: HashMap<ClusterId, usize>,
    positions: Option<Vec<Vec3>>,
    edge_index_buffer: Option<Vec<usize>>,
    committed: Option<Vec<Vec3>>,
    updated_in_step: usize,
    commit_count: usize,
}

impl GraphSubsetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns the whole cache into a graph and starts the engine's force
    /// layout over it. Buffers are only installed once the engine accepted
    /// the graph; on failure the cache carries no vertex indices.
    pub fn init<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        cache: &mut TreeCache,
        edge_scalar: f32,
        max_iterations: usize,
    ) -> Result<(), CanopyError> {
        if self.state == BuildState::Running {
            return Err(EngineError::PhysicsRunning.into());
        }
        if cache.is_empty() {
            return Err(CanopyError::EmptySubset);
        }

        let ids = cache.tree().keys().copied().collect::<Vec<_>>();
        let index = ids
            .iter()
            .enumerate()
            .map(|(vertex, id)| (*id, vertex))
            .collect::<HashMap<_, _>>();
        let positions = ids
            .iter()
            .filter_map(|id| cache.get(*id).map(|node| node.position))
            .collect::<Vec<_>>();
        let seeds = ids
            .iter()
            .copied()
            .zip(positions.iter().copied())
            .collect::<Vec<_>>();

        if let Err(error) = engine.init_force_layout(&seeds, edge_scalar, max_iterations) {
            error!(%error, "engine rejected the graph");
            self.state = BuildState::Failed;
            return Err(error.into());
        }

        let edge_count = engine.graph_edge_count().unwrap_or_default();
        if edge_count < MIN_GRAPH_EDGES {
            error!(edge_count, "too few edges for a force layout");
            if let Err(error) = engine.force_physics_shutdown() {
                debug!(%error, "physics was not running");
            }
            self.state = BuildState::Failed;
            return Err(CanopyError::InsufficientGraphEdges { found: edge_count });
        }

        let mut edge_index_buffer = Vec::with_capacity(edge_count * 2);
        let streamed = engine.stream_graph_edges(&mut |record| {
            let Some(message) = record.message.as_deref().and_then(EdgeMessage::decode) else {
                warn!(id = %record.id, "edge record without a readable message");
                return;
            };
            if !message.is_real {
                return;
            }
            match (index.get(&record.id), index.get(&message.other)) {
                (Some(&near), Some(&far)) => edge_index_buffer.extend([near, far]),
                _ => warn!(id = %record.id, other = %message.other, "edge outside the graph"),
            }
        });
        if let Err(error) = streamed {
            error!(%error, "could not stream graph edges");
            if let Err(error) = engine.force_physics_shutdown() {
                debug!(%error, "physics was not running");
            }
            self.state = BuildState::Failed;
            return Err(error.into());
        }

        for (vertex, id) in ids.iter().enumerate() {
            if let Some(node) = cache.get_mut(*id) {
                node.set_vertex_index(Some(vertex));
            }
        }

        info!(
            vertices = ids.len(),
            edges = edge_index_buffer.len() / 2,
            "graph built; force layout running"
        );
        self.ids = ids;
        self.index = index;
        self.committed = Some(positions.clone());
        self.positions = Some(positions);
        self.edge_index_buffer = Some(edge_index_buffer);
        self.updated_in_step = 0;
        self.commit_count = 0;
        self.state = BuildState::Running;
        Ok(())
    }

    /// Takes one physics step from the engine. Positions stream into the
    /// cache and the working buffer; the buffer is committed once every
    /// vertex moved.
    pub fn poll<E: ClusterEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        cache: &mut TreeCache,
    ) -> PollOutcome {
        match self.state {
            BuildState::Running => {}
            BuildState::Finished => return PollOutcome::Finished,
            BuildState::Unbuilt | BuildState::Failed => {
                return PollOutcome::Failed(EngineError::PhysicsNotRunning);
            }
        }

        let vertex_count = self.ids.len();
        let index = &self.index;
        let Some(positions) = self.positions.as_mut() else {
            return PollOutcome::Failed(EngineError::NoGraph);
        };
        let committed = &mut self.committed;
        let updated_in_step = &mut self.updated_in_step;
        let commit_count = &mut self.commit_count;

        let status = engine.physics_step(&mut |record| {
            let Some(&vertex) = index.get(&record.id) else {
                warn!(id = %record.id, "physics update for a cluster outside the graph");
                return;
            };
            positions[vertex] = record.position;
            cache.apply_position(record);

            *updated_in_step += 1;
            if *updated_in_step == vertex_count {
                *committed = Some(positions.clone());
                *commit_count += 1;
                *updated_in_step = 0;
            }
        });

        match status {
            PhysicsStatus::Running => PollOutcome::Running,
            PhysicsStatus::Finished => {
                info!(commits = self.commit_count, "force layout complete");
                self.state = BuildState::Finished;
                PollOutcome::Finished
            }
            PhysicsStatus::Error(error) => {
                error!(%error, "force layout failed");
                self.state = BuildState::Failed;
                PollOutcome::Failed(error)
            }
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == BuildState::Running
    }

    pub fn vertex_count(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[ClusterId] {
        &self.ids
    }

    pub fn index_of(&self, id: ClusterId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn positions(&self) -> Option<&[Vec3]> {
        self.positions.as_deref()
    }

    pub fn edge_index_buffer(&self) -> Option<&[usize]> {
        self.edge_index_buffer.as_deref()
    }

    /// Last full set of positions handed to the renderer.
    pub fn committed_positions(&self) -> Option<&[Vec3]> {
        self.committed.as_deref()
    }

    pub fn commit_count(&self) -> usize {
        self.commit_count
    }

    /// Clears the vertex indices this graph wrote into `cache`.
    pub fn release(self, cache: &mut TreeCache) {
        for id in &self.ids {
            if let Some(node) = cache.get_mut(*id) {
                node.set_vertex_index(None);
            }
        }
    }
}
