use eframe::egui::Context;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn update_fps_counter(&mut self, ctx: &Context) {
        const FPS_SAMPLE_WINDOW: usize = 180;

        let dt = ctx.input(|input| input.stable_dt);
        if dt <= f32::EPSILON {
            return;
        }

        self.fps_current = (1.0 / dt).clamp(0.0, 1000.0);
        self.fps_samples.push_back(self.fps_current);
        while self.fps_samples.len() > FPS_SAMPLE_WINDOW {
            self.fps_samples.pop_front();
        }
    }

    pub(in crate::app) fn fps_display_text(&self) -> Option<String> {
        if self.fps_samples.is_empty() {
            return None;
        }

        let avg = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
        let low = self.fps_samples.iter().copied().fold(f32::INFINITY, f32::min);
        let mut text = format!("FPS {:.0} | avg {avg:.1} | low {low:.0}", self.fps_current);
        if self.fps_current > f32::EPSILON {
            text.push_str(&format!(" | {:.1} ms", 1000.0 / self.fps_current));
        }
        Some(text)
    }

    pub(in crate::app) fn visible_canvas_text(&self) -> String {
        let cache = self.session.cache();
        format!(
            "on screen: {} clusters / {} edges  |  cached {} ({} shown)",
            self.visible_node_count,
            self.visible_edge_count,
            cache.len(),
            cache.active_count()
        )
    }
}
