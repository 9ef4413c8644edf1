use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use cluster_canopy::config::CanopyConfig;
use cluster_canopy::engine::EngineLifecycle;
use cluster_canopy::engine::synthetic::SyntheticEngine;
use cluster_canopy::error::CanopyError;
use cluster_canopy::graph::PollOutcome;
use cluster_canopy::session::{ForceParams, Session};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

pub fn run(config: &CanopyConfig, save: Option<&Path>) -> Result<()> {
    let engine =
        SyntheticEngine::init(&config.startup).context("failed to start the clustering engine")?;
    let mut session = Session::start(engine, config.initial_color)
        .context("failed to lay out the root window")?;

    for _ in 0..config.initial_reveal {
        if !session.show_more()? {
            break;
        }
    }
    if let Some(layout) = session.layout() {
        info!(
            depth = layout.current_depth(),
            height = layout.tree_height(),
            cached = session.cache().len(),
            shown = session.cache().active_count(),
            edges = session.cache().visible_edge_count(),
            "tree window"
        );
    }

    let graph = &config.graph;
    if graph.scoring_function.is_some() || graph.min_depth.is_some() {
        let selected = session.select_clusters_by_scoring(graph.scoring_function, graph.min_depth)?;
        info!(selected, stats = ?session.graph_stats(), "scored selection");

        match session.build_graph_from_scoring(ForceParams::from(graph)) {
            Ok(_) => settle(&mut session)?,
            Err(error @ CanopyError::InsufficientGraphEdges { .. }) => {
                warn!("{}", error.user_message());
            }
            Err(error) => return Err(error).context("failed to build the cluster graph"),
        }
    }

    if let Some(path) = save {
        session
            .save(path)
            .with_context(|| format!("failed to save tree to {}", path.display()))?;
    }
    session.shutdown()?;
    Ok(())
}

fn settle(session: &mut Session<SyntheticEngine>) -> Result<()> {
    while let Some(outcome) = session.poll_physics() {
        match outcome {
            PollOutcome::Running => thread::sleep(POLL_INTERVAL),
            PollOutcome::Finished => break,
            PollOutcome::Failed(error) => return Err(error).context("force layout failed"),
        }
    }

    if let Some(builder) = session.builder() {
        info!(
            vertices = builder.vertex_count(),
            edges = builder.edge_index_buffer().map_or(0, |buffer| buffer.len() / 2),
            commits = builder.commit_count(),
            "graph settled"
        );
    }
    Ok(())
}
