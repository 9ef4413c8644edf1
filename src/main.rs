mod app;
mod headless;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use cluster_canopy::config::CanopyConfig;
use cluster_canopy::engine::{DistanceMetric, ScoringFunction};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON file with startup and graph settings.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    data_name: Option<String>,
    #[arg(long)]
    cardinality: Option<usize>,
    #[arg(long, value_enum)]
    metric: Option<DistanceMetric>,
    /// Load a previously saved tree instead of generating one.
    #[arg(long)]
    load: Option<PathBuf>,
    /// Save the tree after a headless run.
    #[arg(long)]
    save: Option<PathBuf>,
    #[arg(long, value_enum)]
    scoring: Option<ScoringFunction>,
    #[arg(long)]
    min_depth: Option<usize>,
    #[arg(long)]
    edge_scalar: Option<f32>,
    #[arg(long)]
    max_iterations: Option<usize>,
    /// Levels to reveal below the root's children on start.
    #[arg(long)]
    reveal: Option<usize>,
    #[arg(long)]
    headless: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<CanopyConfig> {
        let mut config = match &self.config {
            Some(path) => CanopyConfig::from_path(path)?,
            None => CanopyConfig::default(),
        };

        let startup = &mut config.startup;
        if let Some(data_name) = &self.data_name {
            startup.data_name.clone_from(data_name);
        }
        if let Some(cardinality) = self.cardinality {
            startup.cardinality = cardinality;
        }
        if let Some(metric) = self.metric {
            startup.distance_metric = metric;
        }
        if let Some(path) = &self.load {
            startup.should_load = true;
            startup.load_path = Some(path.clone());
        }

        let graph = &mut config.graph;
        if self.scoring.is_some() {
            graph.scoring_function = self.scoring;
        }
        if self.min_depth.is_some() {
            graph.min_depth = self.min_depth;
        }
        if let Some(edge_scalar) = self.edge_scalar {
            graph.edge_scalar = edge_scalar;
        }
        if let Some(max_iterations) = self.max_iterations {
            graph.max_iterations = max_iterations;
        }
        if let Some(reveal) = self.reveal {
            config.initial_reveal = reveal;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,cluster_canopy=debug".into()),
        )
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;

    if args.headless {
        return headless::run(&config, args.save.as_deref());
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "cluster-canopy",
        options,
        Box::new(move |cc| Ok(Box::new(app::CanopyApp::new(cc, config)))),
    )
    .map_err(|error| anyhow!("viewer failed: {error}"))
}
