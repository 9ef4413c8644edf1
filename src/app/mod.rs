use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use cluster_canopy::cluster::ClusterId;
use cluster_canopy::config::{CanopyConfig, StartupConfig};
use cluster_canopy::engine::synthetic::SyntheticEngine;
use cluster_canopy::engine::{EngineLifecycle, ScoringFunction};
use cluster_canopy::session::{ForceParams, Session};
use eframe::egui::{self, Context, Pos2, Vec2};
use tracing::{error, info};

mod graph;
mod render_utils;
mod ui;

pub struct CanopyApp {
    config: CanopyConfig,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<SyntheticEngine, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    session: Session<SyntheticEngine>,
    pan: Vec2,
    zoom: f32,
    fit_requested: bool,
    search: String,
    focused: Option<ClusterId>,
    scoring: Option<ScoringFunction>,
    min_depth: usize,
    force: ForceParams,
    show_edges: bool,
    status: Option<String>,
    scratch: CanvasScratch,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
    visible_node_count: usize,
    visible_edge_count: usize,
}

/// Per-frame screen-space copy of whatever the canvas draws.
#[derive(Default)]
struct CanvasScratch {
    ids: Vec<ClusterId>,
    world: Vec<Vec2>,
    colors: Vec<egui::Color32>,
    selected: Vec<bool>,
    edges: Vec<(usize, usize)>,
    screen_positions: Vec<Pos2>,
    screen_radii: Vec<f32>,
    visible_indices: Vec<usize>,
}

impl CanopyApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: CanopyConfig) -> Self {
        let state = Self::start_load(config.startup.clone());
        Self { config, state }
    }

    fn spawn_load(startup: StartupConfig) -> Receiver<Result<SyntheticEngine, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = SyntheticEngine::init(&startup).map_err(|error| error.to_string());
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(startup: StartupConfig) -> AppState {
        info!(data = %startup.data_name, cardinality = startup.cardinality, "starting engine");
        AppState::Loading {
            rx: Self::spawn_load(startup),
        }
    }

    fn ready(&self, engine: SyntheticEngine) -> AppState {
        match ViewModel::new(engine, &self.config) {
            Ok(model) => AppState::Ready(Box::new(model)),
            Err(error) => {
                error!(%error, "could not open the cluster tree");
                AppState::Error(error.user_message())
            }
        }
    }
}

impl eframe::App for CanopyApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;
        let mut retry = false;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(result);
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Building cluster tree...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint();
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to start the clustering engine");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    retry = ui.button("Retry").clicked();
                });
            }
            AppState::Ready(model) => model.show(ctx),
        }

        if retry {
            self.state = Self::start_load(self.config.startup.clone());
        }
        if let Some(result) = transition {
            self.state = match result {
                Ok(engine) => self.ready(engine),
                Err(error) => AppState::Error(error),
            };
        }
    }
}

impl Drop for ViewModel {
    fn drop(&mut self) {
        if let Err(error) = self.session.shutdown() {
            error!(%error, "engine shutdown failed");
        }
    }
}
