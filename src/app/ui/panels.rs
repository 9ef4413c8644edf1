use std::collections::VecDeque;

use cluster_canopy::config::CanopyConfig;
use cluster_canopy::engine::synthetic::SyntheticEngine;
use cluster_canopy::error::CanopyError;
use cluster_canopy::graph::PollOutcome;
use cluster_canopy::session::{ForceParams, Session};
use eframe::egui::{self, Align, Context, Layout, Vec2};
use tracing::warn;

use super::super::{CanvasScratch, ViewModel};

impl ViewModel {
    pub(in crate::app) fn new(
        engine: SyntheticEngine,
        config: &CanopyConfig,
    ) -> Result<Self, CanopyError> {
        let mut session = Session::start(engine, config.initial_color)?;
        for _ in 0..config.initial_reveal {
            if !session.show_more()? {
                break;
            }
        }

        Ok(Self {
            session,
            pan: Vec2::ZERO,
            zoom: 1.0,
            fit_requested: true,
            search: String::new(),
            focused: None,
            scoring: config.graph.scoring_function,
            min_depth: config.graph.min_depth.unwrap_or(4),
            force: ForceParams::from(&config.graph),
            show_edges: true,
            status: None,
            scratch: CanvasScratch::default(),
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
            visible_node_count: 0,
            visible_edge_count: 0,
        })
    }

    /// Records the outcome of a user action for the status line.
    pub(in crate::app) fn report<T>(&mut self, result: Result<T, CanopyError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.status = None;
                Some(value)
            }
            Err(error) => {
                warn!(%error, "action failed");
                self.status = Some(error.user_message());
                None
            }
        }
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context) {
        self.update_fps_counter(ctx);

        match self.session.poll_physics() {
            Some(PollOutcome::Running) => ctx.request_repaint(),
            Some(PollOutcome::Finished) => self.fit_requested = true,
            Some(PollOutcome::Failed(error)) => {
                self.status = Some(CanopyError::from(error).user_message());
            }
            None => {}
        }

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("cluster-canopy");
                    ui.separator();
                    ui.label(self.session.state().label());
                    if let Some(status) = &self.status {
                        ui.separator();
                        ui.colored_label(egui::Color32::from_rgb(241, 146, 94), status);
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.visible_canvas_text());
                        if let Some(fps_text) = self.fps_display_text() {
                            ui.label(fps_text);
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.draw_controls(ui));
            });

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_canvas(ui));
    }
}
