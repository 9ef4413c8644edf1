use std::collections::HashMap;

use cluster_canopy::cluster::ClusterId;
use cluster_canopy::engine::ClusterEngine;
use eframe::egui::{self, Align2, Color32, FontId, Sense, Stroke, Ui, Vec2, vec2};

use super::super::render_utils::{
    blend_color, draw_background, edge_visible, fit_view, node_color, project, world_to_screen,
};
use super::super::{CanvasScratch, ViewModel};

const HOVER_COLOR: Color32 = Color32::from_rgb(255, 164, 101);
const SELECTED_RING: Color32 = Color32::from_rgb(245, 206, 93);

impl CanvasScratch {
    fn clear(&mut self) {
        self.ids.clear();
        self.world.clear();
        self.colors.clear();
        self.selected.clear();
        self.edges.clear();
    }

    fn push(&mut self, id: ClusterId, world: Vec2, color: Color32, selected: bool) -> usize {
        self.ids.push(id);
        self.world.push(world);
        self.colors.push(color);
        self.selected.push(selected);
        self.ids.len() - 1
    }
}

impl ViewModel {
    fn collect_tree(&mut self) {
        let cache = self.session.cache();
        let scratch = &mut self.scratch;
        scratch.clear();

        let mut index_by_id = HashMap::new();
        for node in cache.tree().values().filter(|node| node.active) {
            let index = scratch.push(
                node.id(),
                project(node.position),
                node_color(node.color()),
                node.is_selected(),
            );
            index_by_id.insert(node.id(), index);
        }

        if !self.show_edges {
            return;
        }
        for edge in cache.edges().values().filter(|edge| edge.visible) {
            if let (Some(&parent), Some(&child)) =
                (index_by_id.get(&edge.parent()), index_by_id.get(&edge.child()))
            {
                scratch.edges.push((parent, child));
            }
        }
    }

    /// Fills the scratch from the committed force layout. `false` when no
    /// graph is installed.
    fn collect_graph(&mut self) -> bool {
        let Some(builder) = self.session.builder() else {
            return false;
        };
        let Some(positions) = builder.committed_positions() else {
            return false;
        };
        let cache = self.session.cache();
        let scratch = &mut self.scratch;
        scratch.clear();

        for (id, position) in builder.ids().iter().zip(positions) {
            let (color, selected) = cache.get(*id).map_or((Color32::GRAY, false), |node| {
                (node_color(node.color()), node.is_selected())
            });
            scratch.push(*id, project(*position), color, selected);
        }

        if self.show_edges
            && let Some(buffer) = builder.edge_index_buffer()
        {
            scratch
                .edges
                .extend(buffer.chunks_exact(2).map(|pair| (pair[0], pair[1])));
        }
        true
    }

    pub(in crate::app) fn draw_canvas(&mut self, ui: &mut Ui) {
        if !self.collect_graph() {
            self.collect_tree();
        }

        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        if self.fit_requested
            && let Some((pan, zoom)) = fit_view(rect, &self.scratch.world)
        {
            self.pan = pan;
            self.zoom = zoom;
            self.fit_requested = false;
        }

        draw_background(&painter, rect, self.pan, self.zoom);
        self.handle_canvas_zoom(ui, rect, &response);
        self.handle_canvas_pan(&response);

        let (pan, zoom) = (self.pan, self.zoom);
        let radius = (6.0 * zoom.powf(0.4)).clamp(2.5, 14.0);
        let scratch = &mut self.scratch;

        scratch.screen_positions.clear();
        scratch.screen_positions.extend(
            scratch
                .world
                .iter()
                .map(|world| world_to_screen(rect, pan, zoom, *world)),
        );
        scratch.screen_radii.clear();
        scratch.screen_radii.resize(scratch.world.len(), radius);
        Self::visible_indices_into(
            rect,
            &scratch.screen_positions,
            &scratch.screen_radii,
            &mut scratch.visible_indices,
        );

        let hovered = Self::hovered_index(
            ui,
            &scratch.visible_indices,
            &scratch.screen_positions,
            &scratch.screen_radii,
        );
        if hovered.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
        }

        let edge_stroke = Stroke::new(
            (1.1 * zoom.sqrt()).clamp(0.6, 2.4),
            Color32::from_rgba_unmultiplied(120, 128, 140, 170),
        );
        let mut visible_edge_count = 0usize;
        for &(a, b) in &scratch.edges {
            let (Some(&start), Some(&end)) =
                (scratch.screen_positions.get(a), scratch.screen_positions.get(b))
            else {
                continue;
            };
            if !edge_visible(rect, start, end, 2.5) {
                continue;
            }
            painter.line_segment([start, end], edge_stroke);
            visible_edge_count += 1;
        }

        for &index in &scratch.visible_indices {
            let position = scratch.screen_positions[index];
            let is_hovered = hovered == Some(index);
            let color = if is_hovered {
                blend_color(scratch.colors[index], HOVER_COLOR, 0.6)
            } else {
                scratch.colors[index]
            };

            painter.circle_filled(position, radius, color);
            let ring = if scratch.selected[index] {
                Stroke::new(2.2, SELECTED_RING)
            } else {
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
            };
            painter.circle_stroke(position, radius, ring);

            if is_hovered || zoom > 2.5 {
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    scratch.ids[index].to_string(),
                    FontId::proportional(12.0),
                    Color32::from_gray(238),
                );
            }
        }

        self.visible_node_count = scratch.visible_indices.len();
        self.visible_edge_count = visible_edge_count;
        let hovered_id = hovered.map(|index| scratch.ids[index]);

        if let Some(id) = hovered_id
            && let Ok(record) = self.session.engine().cluster_record(id)
        {
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!(
                    "{id}  |  depth {}  |  radius {:.3}  |  lfd {:.2}",
                    record.depth, record.radius, record.lfd
                ),
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        if response.clicked_by(egui::PointerButton::Primary)
            && let Some(id) = hovered_id
        {
            self.session.toggle_select(id);
            self.focused = Some(id);
        }
    }
}
