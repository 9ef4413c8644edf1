use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2, vec2};
use glam::Vec3;

/// World units per cluster-layout unit before zoom.
const WORLD_SCALE: f32 = 14.0;

pub(super) fn project(position: Vec3) -> Vec2 {
    vec2(position.x, -position.y) * WORLD_SCALE
}

pub(super) fn node_color(color: Vec3) -> Color32 {
    let [r, g, b] = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).to_array();
    Color32::from_rgb(r as u8, g as u8, b as u8)
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.center() + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    rect.expand(radius).contains(position)
}

pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let bounds = Rect::from_two_pos(start, end).expand(padding);
    bounds.intersects(rect)
}

pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + pan + world * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center() - pan) / zoom
}

/// Pan and zoom that frame every point in `world` inside `rect`.
pub(super) fn fit_view(rect: Rect, world: &[Vec2]) -> Option<(Vec2, f32)> {
    let first = *world.first()?;
    let (min, max) = world
        .iter()
        .fold((first, first), |(min, max), point| (min.min(*point), max.max(*point)));
    let extent = (max - min).max(vec2(1.0, 1.0));
    let zoom = ((rect.width() / extent.x).min(rect.height() / extent.y) * 0.85).clamp(0.02, 6.0);
    let center = (min + max) * 0.5;
    Some((-center * zoom, zoom))
}
