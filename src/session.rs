//! One viewing session: the engine, the cluster cache and whichever of the
//! depth window or the graph builder is currently installed.
//!
//! Operations that rebuild or tear down the cache are refused while a graph
//! build owns it. They log and return `Ok(false)` instead of failing.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::cache::{TreeCache, VisualNode};
use crate::cluster::ClusterId;
use crate::config::{DEFAULT_EDGE_SCALAR, DEFAULT_MAX_ITERATIONS, GraphConfig};
use crate::engine::{ClusterEngine, ColorStrategy, EngineLifecycle, ScoringFunction};
use crate::error::CanopyError;
use crate::graph::{self, GraphStats, GraphSubsetBuilder, PollOutcome};
use crate::layout::DepthWindowLayout;
use crate::util::scatter_position;

const SCATTER_EXTENT: f32 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    BuildingGraph,
    LayingOutPhysics,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BuildingGraph => "building graph",
            Self::LayingOutPhysics => "physics running",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceParams {
    pub edge_scalar: f32,
    pub max_iterations: usize,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            edge_scalar: DEFAULT_EDGE_SCALAR,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl From<&GraphConfig> for ForceParams {
    fn from(config: &GraphConfig) -> Self {
        Self {
            edge_scalar: config.edge_scalar,
            max_iterations: config.max_iterations,
        }
    }
}

pub struct Session<E> {
    engine: E,
    cache: TreeCache,
    layout: Option<DepthWindowLayout>,
    builder: Option<GraphSubsetBuilder>,
    scored: Vec<ClusterId>,
    stats: Option<GraphStats>,
    color: ColorStrategy,
    state: SessionState,
}

impl<E: ClusterEngine> Session<E> {
    pub fn start(engine: E, initial_color: ColorStrategy) -> Result<Self, CanopyError> {
        let mut session = Self {
            engine,
            cache: TreeCache::new(),
            layout: None,
            builder: None,
            scored: Vec::new(),
            stats: None,
            color: initial_color,
            state: SessionState::Idle,
        };
        session.install_layout()?;
        session.color_by(initial_color)?;
        Ok(session)
    }

    fn install_layout(&mut self) -> Result<(), CanopyError> {
        let root = self.engine.root_record()?;
        self.layout = Some(DepthWindowLayout::new(&self.engine, &mut self.cache, root.id)?);
        Ok(())
    }

    fn allow(&self, operation: &'static str) -> bool {
        if self.state == SessionState::Idle {
            return true;
        }
        warn!(operation, state = self.state.label(), "refused while a graph build is active");
        false
    }

    /// Drops any graph and shows the tree from its root again.
    pub fn reset_tree(&mut self) -> Result<bool, CanopyError> {
        if !self.allow("reset tree") {
            return Ok(false);
        }
        self.builder = None;
        self.layout = None;
        self.scored.clear();
        self.stats = None;
        self.cache.clear();
        self.install_layout()?;
        self.color_by(self.color)?;
        info!("tree reset to the root");
        Ok(true)
    }

    pub fn show_more(&mut self) -> Result<bool, CanopyError> {
        if !self.allow("show more") {
            return Ok(false);
        }
        let Some(layout) = self.layout.as_mut() else {
            debug!("no depth window installed");
            return Ok(false);
        };
        Ok(layout.show_more(&self.engine, &mut self.cache)?)
    }

    pub fn show_less(&mut self) -> Result<bool, CanopyError> {
        if !self.allow("show less") {
            return Ok(false);
        }
        let Some(layout) = self.layout.as_mut() else {
            debug!("no depth window installed");
            return Ok(false);
        };
        Ok(layout.show_less(&self.engine, &mut self.cache)?)
    }

    pub fn color_by(&mut self, strategy: ColorStrategy) -> Result<(), CanopyError> {
        let cache = &mut self.cache;
        let mut painted = 0usize;
        self.engine.color_clusters_by(strategy, &mut |record| {
            if cache.apply_color(record) {
                painted += 1;
            }
        })?;
        self.color = strategy;
        debug!(strategy = strategy.label(), painted, "recolored clusters");
        Ok(())
    }

    pub fn toggle_select(&mut self, id: ClusterId) -> bool {
        let Some(node) = self.cache.get_mut(id) else {
            debug!(%id, "cannot select an uncached cluster");
            return false;
        };
        node.toggle_select();
        true
    }

    pub fn select(&mut self, id: ClusterId) -> bool {
        let Some(node) = self.cache.get_mut(id) else {
            debug!(%id, "cannot select an uncached cluster");
            return false;
        };
        node.select();
        true
    }

    pub fn deselect_all(&mut self) {
        self.cache.deselect_all();
    }

    /// Hides the selected clusters. They stay selected so `include_hidden`
    /// can bring them back.
    pub fn hide_selected(&mut self) -> usize {
        let mut hidden = 0;
        for id in self.cache.selected_ids() {
            if let Some(node) = self.cache.get_mut(id)
                && node.active
            {
                node.active = false;
                hidden += 1;
            }
        }
        self.cache.refresh_all_edge_visibility();
        debug!(hidden, "hid selected clusters");
        hidden
    }

    /// Evicts every cluster that is not selected.
    pub fn hide_others(&mut self) -> Result<bool, CanopyError> {
        if !self.allow("hide others") {
            return Ok(false);
        }
        let keep = self.cache.subset(VisualNode::is_selected);
        if keep.is_empty() {
            return Err(CanopyError::EmptySubset);
        }
        let dropped = self.cache.replace_all(keep);
        self.cache.refresh_all_edge_visibility();
        info!(dropped, kept = self.cache.len(), "kept only the selected clusters");
        Ok(true)
    }

    pub fn include_hidden(&mut self) -> usize {
        let mut shown = 0;
        for id in self.cache.selected_ids() {
            if let Some(node) = self.cache.get_mut(id)
                && !node.active
            {
                node.active = true;
                shown += 1;
            }
        }
        self.cache.refresh_all_edge_visibility();
        debug!(shown, "showed hidden selections");
        shown
    }

    /// Lets the engine pick clusters with `scoring` below `min_depth`, then
    /// shows and selects them. Returns how many clusters were picked.
    pub fn select_clusters_by_scoring(
        &mut self,
        scoring: Option<ScoringFunction>,
        min_depth: Option<usize>,
    ) -> Result<usize, CanopyError> {
        let Some(scoring) = scoring else {
            return Err(CanopyError::InvalidSelection(
                "no scoring function chosen".to_owned(),
            ));
        };
        let Some(min_depth) = min_depth else {
            return Err(CanopyError::InvalidSelection(
                "no minimum depth chosen".to_owned(),
            ));
        };
        let height = self.engine.tree_height();
        if min_depth > height {
            return Err(CanopyError::InvalidSelection(format!(
                "minimum depth {min_depth} exceeds the tree height {height}"
            )));
        }
        if !self.allow("select by scoring") {
            return Ok(0);
        }

        self.cache.deselect_all();
        let mut scored = Vec::new();
        self.engine
            .init_graph(scoring, min_depth, &mut |record| scored.push(record.id))?;

        for id in &scored {
            match self.cache.get_or_add(&self.engine, *id) {
                Ok(node) => {
                    node.active = true;
                    node.select();
                }
                Err(error) => warn!(%id, %error, "scored cluster could not be cached"),
            }
        }
        self.cache.refresh_all_edge_visibility();
        self.stats = GraphStats::from_engine(&self.engine);
        info!(%scoring, min_depth, selected = scored.len(), "clusters selected by score");

        let count = scored.len();
        self.scored = scored;
        Ok(count)
    }

    pub fn build_graph_with_selected(&mut self, params: ForceParams) -> Result<bool, CanopyError> {
        let subset = graph::active_selected(&self.cache);
        self.build_graph(subset, params)
    }

    pub fn build_graph_within_params(&mut self, params: ForceParams) -> Result<bool, CanopyError> {
        let subset = graph::reactivated_selected(&self.cache);
        self.build_graph(subset, params)
    }

    pub fn build_graph_from_scoring(&mut self, params: ForceParams) -> Result<bool, CanopyError> {
        let subset = graph::with_ids(&self.cache, &self.scored);
        self.build_graph(subset, params)
    }

    fn build_graph(
        &mut self,
        subset: BTreeMap<ClusterId, VisualNode>,
        params: ForceParams,
    ) -> Result<bool, CanopyError> {
        if !self.allow("build graph") {
            return Ok(false);
        }
        if subset.is_empty() {
            return Err(CanopyError::EmptySubset);
        }

        self.state = SessionState::BuildingGraph;
        let previous_cache = self.cache.clone();
        let previous_layout = self.layout.take();
        let previous_builder = self.builder.take();
        self.cache.replace_all(subset);
        self.cache.destroy_edges();
        let ids = self.cache.tree().keys().copied().collect::<Vec<_>>();
        for id in ids {
            if let Some(node) = self.cache.get_mut(id) {
                node.position = scatter_position(id.to_string(), SCATTER_EXTENT);
            }
        }

        let mut builder = GraphSubsetBuilder::new();
        match builder.init(
            &mut self.engine,
            &mut self.cache,
            params.edge_scalar,
            params.max_iterations,
        ) {
            Ok(()) => {
                self.builder = Some(builder);
                self.stats = GraphStats::from_engine(&self.engine);
                self.state = SessionState::LayingOutPhysics;
                Ok(true)
            }
            Err(error) => {
                error!(%error, "graph build aborted; restoring the previous view");
                self.cache = previous_cache;
                self.layout = previous_layout;
                self.builder = previous_builder;
                self.state = SessionState::Idle;
                Err(error)
            }
        }
    }

    /// Advances the force layout by one tick. `None` when nothing is running.
    pub fn poll_physics(&mut self) -> Option<PollOutcome> {
        if self.state != SessionState::LayingOutPhysics {
            return None;
        }
        let Some(builder) = self.builder.as_mut() else {
            warn!("physics marked running without a graph");
            self.state = SessionState::Idle;
            return None;
        };

        let outcome = builder.poll(&mut self.engine, &mut self.cache);
        match &outcome {
            PollOutcome::Running => {}
            PollOutcome::Finished => {
                info!(commits = builder.commit_count(), "graph layout settled");
                self.state = SessionState::Idle;
            }
            PollOutcome::Failed(error) => {
                error!(%error, "graph layout failed");
                self.state = SessionState::Idle;
            }
        }
        Some(outcome)
    }

    pub fn destroy_graph(&mut self) -> bool {
        if !self.allow("destroy graph") {
            return false;
        }
        let Some(builder) = self.builder.take() else {
            return false;
        };
        builder.release(&mut self.cache);
        info!("graph destroyed");
        true
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn cache(&self) -> &TreeCache {
        &self.cache
    }

    pub fn layout(&self) -> Option<&DepthWindowLayout> {
        self.layout.as_ref()
    }

    pub fn builder(&self) -> Option<&GraphSubsetBuilder> {
        self.builder.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_physics_running(&self) -> bool {
        self.state == SessionState::LayingOutPhysics
    }

    pub fn graph_stats(&self) -> Option<GraphStats> {
        self.stats
    }

    pub fn color(&self) -> ColorStrategy {
        self.color
    }

    pub fn scored(&self) -> &[ClusterId] {
        &self.scored
    }
}

impl<E: EngineLifecycle> Session<E> {
    pub fn save(&self, path: &Path) -> Result<(), CanopyError> {
        self.engine.save(path)?;
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<(), CanopyError> {
        if self.state == SessionState::LayingOutPhysics
            && let Err(error) = self.engine.force_physics_shutdown()
        {
            debug!(%error, "physics already stopped");
        }
        self.state = SessionState::Idle;
        self.builder = None;
        self.layout = None;
        self.scored.clear();
        self.stats = None;
        self.cache.clear();
        self.engine.shutdown()?;
        Ok(())
    }
}
