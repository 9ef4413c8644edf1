use cluster_canopy::engine::ClusterEngine;
use eframe::egui::{self, RichText, Ui};

use super::super::ViewModel;

const SEARCH_ROWS: usize = 12;

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Search");
        ui.label("Cluster id (offset-cardinality)")
            .on_hover_text("Fuzzy-match cached clusters; hidden ones are listed too.");
        ui.text_edit_singleline(&mut self.search);

        let hits = self.session.cache().search(&self.search, true);
        for hit in hits.iter().take(SEARCH_ROWS) {
            let shown = self
                .session
                .cache()
                .get(hit.id)
                .is_some_and(|node| node.active);
            let label = if shown {
                hit.id.to_string()
            } else {
                format!("{} (hidden)", hit.id)
            };
            if ui
                .selectable_label(self.focused == Some(hit.id), label)
                .clicked()
            {
                self.focused = Some(hit.id);
            }
        }
        if hits.len() > SEARCH_ROWS {
            ui.small(format!("{} more matches", hits.len() - SEARCH_ROWS));
        }

        ui.separator();
        ui.heading("Cluster Details");
        ui.add_space(6.0);

        let Some(id) = self.focused else {
            ui.label("Click a cluster or a search result.");
            return;
        };
        let record = match self.session.engine().cluster_record(id) {
            Ok(record) => record,
            Err(error) => {
                ui.label(format!("No details for {id}: {error}"));
                return;
            }
        };

        ui.label(RichText::new(id.to_string()).strong());
        egui::Grid::new("cluster_details")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                for (key, value) in record.info_lines() {
                    ui.label(key);
                    ui.label(value);
                    ui.end_row();
                }
            });

        let Some(node) = self.session.cache().get(id) else {
            ui.label("Not cached in the current view.");
            return;
        };
        let selected = node.is_selected();
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            let text = if selected { "Deselect" } else { "Select" };
            if ui.button(text).clicked() {
                self.session.toggle_select(id);
            }
        });
    }
}
