use cluster_canopy::engine::{ClusterEngine, ColorStrategy, ScoringFunction};
use eframe::egui::{self, Ui};

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        let idle = !self.session.is_physics_running();

        ui.heading("Tree");
        ui.separator();
        if let Some(layout) = self.session.layout() {
            ui.label(format!(
                "depth {} of {} (laid out to {})",
                layout.current_depth(),
                layout.tree_height(),
                layout.max_depth()
            ));
        } else {
            ui.label("graph view");
        }

        ui.horizontal(|ui| {
            if ui.add_enabled(idle, egui::Button::new("Show less")).clicked() {
                let result = self.session.show_less();
                self.report(result);
            }
            if ui.add_enabled(idle, egui::Button::new("Show more")).clicked() {
                let result = self.session.show_more();
                self.report(result);
            }
            if ui
                .add_enabled(idle, egui::Button::new("Reset tree"))
                .on_hover_text("Drop any graph and show the tree from its root.")
                .clicked()
            {
                let result = self.session.reset_tree();
                if self.report(result) == Some(true) {
                    self.focused = None;
                    self.fit_requested = true;
                }
            }
        });
        if ui.button("Fit view").on_hover_text("Home key on the canvas").clicked() {
            self.fit_requested = true;
        }
        ui.checkbox(&mut self.show_edges, "Show edges");

        ui.add_space(6.0);
        ui.label("Color by");
        let mut color = self.session.color();
        egui::ComboBox::from_id_salt("color_strategy")
            .selected_text(color.label())
            .show_ui(ui, |ui| {
                for strategy in ColorStrategy::ALL {
                    ui.selectable_value(&mut color, strategy, strategy.label());
                }
            });
        if color != self.session.color() {
            let result = self.session.color_by(color);
            self.report(result);
        }

        ui.add_space(10.0);
        ui.heading("Selection");
        ui.separator();
        ui.label(format!("{} selected", self.session.cache().selected_ids().len()));
        ui.horizontal_wrapped(|ui| {
            if ui.button("Hide selected").clicked() {
                self.session.hide_selected();
            }
            if ui.button("Include hidden").clicked() {
                self.session.include_hidden();
            }
            if ui.add_enabled(idle, egui::Button::new("Hide others")).clicked() {
                let result = self.session.hide_others();
                self.report(result);
            }
            if ui.button("Deselect all").clicked() {
                self.session.deselect_all();
            }
        });

        ui.add_space(10.0);
        ui.heading("Graph");
        ui.separator();
        egui::ComboBox::from_id_salt("scoring_function")
            .selected_text(self.scoring.map_or("choose a scoring function", ScoringFunction::name))
            .show_ui(ui, |ui| {
                for scoring in ScoringFunction::ALL {
                    ui.selectable_value(&mut self.scoring, Some(*scoring), scoring.name());
                }
            });
        let height = self.session.engine().tree_height();
        ui.add(egui::Slider::new(&mut self.min_depth, 0..=height.max(1)).text("Min depth"));
        if ui
            .add_enabled(idle, egui::Button::new("Select by score"))
            .on_hover_text("Let the engine pick one cluster per branch below the min depth.")
            .clicked()
        {
            let result = self
                .session
                .select_clusters_by_scoring(self.scoring, Some(self.min_depth));
            self.report(result);
        }
        if let Some(stats) = self.session.graph_stats() {
            ui.label(format!(
                "{} clusters, {} edges, {} components",
                stats.clusters, stats.edges, stats.components
            ));
        }

        ui.add(egui::Slider::new(&mut self.force.edge_scalar, 1.0..=100.0).text("Edge scalar"));
        ui.add(
            egui::Slider::new(&mut self.force.max_iterations, 10..=5000)
                .logarithmic(true)
                .text("Max iterations"),
        );

        let force = self.force;
        let mut built = None;
        ui.add_enabled_ui(idle, |ui| {
            if ui.button("Build from shown selection").clicked() {
                built = Some(self.session.build_graph_with_selected(force));
            }
            if ui
                .button("Build from all selected")
                .on_hover_text("Hidden selections are shown again and included.")
                .clicked()
            {
                built = Some(self.session.build_graph_within_params(force));
            }
            if ui.button("Build from scoring").clicked() {
                built = Some(self.session.build_graph_from_scoring(force));
            }
            if ui.button("Destroy graph").clicked() {
                self.session.destroy_graph();
            }
        });
        if let Some(result) = built
            && self.report(result) == Some(true)
        {
            self.fit_requested = true;
        }
    }
}
