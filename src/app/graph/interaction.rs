use eframe::egui::{self, Key, Pos2, Rect, Ui};

use super::super::ViewModel;
use super::super::render_utils::{circle_visible, screen_to_world};

const MIN_ZOOM: f32 = 0.02;
const MAX_ZOOM: f32 = 6.0;
const KEY_ZOOM_STEP: f32 = 1.25;

impl ViewModel {
    /// Zooms around the pointer on scroll or pinch, around the canvas centre
    /// on `+`/`-`. `Home` asks for a refit.
    pub(in crate::app) fn handle_canvas_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let (scroll, pinch, keys, refit) = ui.input(|input| {
            let keys = if input.key_pressed(Key::Plus) || input.key_pressed(Key::Equals) {
                KEY_ZOOM_STEP
            } else if input.key_pressed(Key::Minus) {
                KEY_ZOOM_STEP.recip()
            } else {
                1.0
            };
            (
                input.raw_scroll_delta.y,
                input.zoom_delta(),
                keys,
                input.key_pressed(Key::Home),
            )
        });
        if refit {
            self.fit_requested = true;
            return;
        }

        let mut factor = pinch * keys;
        if scroll.abs() > f32::EPSILON {
            factor *= (1.0 + scroll * 0.0018).clamp(0.85, 1.15);
        }
        if (factor - 1.0).abs() <= f32::EPSILON {
            return;
        }

        let anchor = if (keys - 1.0).abs() <= f32::EPSILON {
            response.hover_pos().unwrap_or_else(|| rect.center())
        } else {
            rect.center()
        };
        let anchor_world = screen_to_world(rect, self.pan, self.zoom, anchor);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = anchor - rect.center() - anchor_world * self.zoom;
    }

    pub(in crate::app) fn handle_canvas_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }
    }

    pub(in crate::app) fn visible_indices_into(
        rect: Rect,
        screen_positions: &[Pos2],
        screen_radii: &[f32],
        visible: &mut Vec<usize>,
    ) {
        visible.clear();
        visible.extend(
            (0..screen_positions.len())
                .filter(|&index| circle_visible(rect, screen_positions[index], screen_radii[index])),
        );
    }

    pub(in crate::app) fn hovered_index(
        ui: &Ui,
        visible_indices: &[usize],
        screen_positions: &[Pos2],
        screen_radii: &[f32],
    ) -> Option<usize> {
        let pointer = ui.input(|input| input.pointer.hover_pos())?;
        visible_indices
            .iter()
            .filter_map(|&index| {
                let distance = screen_positions[index].distance(pointer);
                (distance <= screen_radii[index]).then_some((index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}
