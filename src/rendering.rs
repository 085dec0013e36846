use minifb::{Key, Window, WindowOptions};

use crate::box_2d::rocket_lander::{RocketLander, Scene};
use crate::error::LanderError;

// Colors (ARGB)
const COLOR_SKY: u32 = 0xFF0B1026;
const COLOR_TERRAIN: u32 = 0xFF5A4632;
const COLOR_PAD: u32 = 0xFFCCCC00;
const COLOR_BODY: u32 = 0xFFE6E6E6;
const COLOR_LEGS: u32 = 0xFF8066E6;
const COLOR_PLUME: u32 = 0xFFFF8C1A;
const COLOR_TIMER: u32 = 0xFF33CC66;

pub struct Renderer {
    window: Window,
    buffer: Vec<u32>, // ARGB8888
    w: usize,
    h: usize,
}

impl Renderer {
    pub fn new(w: usize, h: usize, title: &str) -> Result<Self, LanderError> {
        let window = Window::new(title, w, h, WindowOptions::default())?;

        Ok(Self {
            window,
            buffer: vec![0; w * h],
            w,
            h,
        })
    }

    pub fn clear(&mut self, color: u32) {
        self.buffer.fill(color);
    }

    pub fn rect(&mut self, x: usize, y: usize, rw: usize, rh: usize, color: u32) {
        if x >= self.w {
            return;
        }
        let x_end = (x + rw).min(self.w);
        let y_end = (y + rh).min(self.h);

        for row in y..y_end {
            let start = row * self.w + x;
            let end = row * self.w + x_end;
            self.buffer[start..end].fill(color);
        }
    }

    pub fn present(&mut self) -> Result<(), LanderError> {
        self.window
            .update_with_buffer(&self.buffer, self.w, self.h)?;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.window.is_key_down(key)
    }

    /// Fills a convex quad given in screen pixels, corners in winding order.
    pub fn quad(&mut self, corners: [(f32, f32); 4], color: u32) {
        let xs = corners.map(|p| p.0);
        let ys = corners.map(|p| p.1);
        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min).max(0.0);
        let max_x = xs
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
            .min(self.w as f32 - 1.0);
        let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min).max(0.0);
        let max_y = ys
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
            .min(self.h as f32 - 1.0);

        if !(min_x < max_x && min_y < max_y) {
            return;
        }

        let edge = |a: (f32, f32), b: (f32, f32), px: f32, py: f32| {
            (px - b.0) * (a.1 - b.1) - (a.0 - b.0) * (py - b.1) < 0.0
        };

        // Only iterate over the bounding box, not the entire screen
        for row in min_y as usize..=max_y as usize {
            for col in min_x as usize..=max_x as usize {
                let px = col as f32 + 0.5;
                let py = row as f32 + 0.5;

                let b1 = edge(corners[0], corners[1], px, py);
                let b2 = edge(corners[1], corners[2], px, py);
                let b3 = edge(corners[2], corners[3], px, py);
                let b4 = edge(corners[3], corners[0], px, py);

                if (b1 == b2) && (b2 == b3) && (b3 == b4) {
                    self.buffer[row * self.w + col] = color;
                }
            }
        }
    }

    pub fn get_width(&self) -> usize {
        self.w
    }
}

/// Maps pad-frame meters (y up) to screen pixels (y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pixels_per_meter: f32,
    /// World point drawn at the screen center.
    pub center: (f32, f32),
    pub screen: (usize, usize),
}

impl Camera {
    pub fn to_screen(&self, point: (f32, f32)) -> (f32, f32) {
        (
            self.screen.0 as f32 / 2.0 + (point.0 - self.center.0) * self.pixels_per_meter,
            self.screen.1 as f32 / 2.0 - (point.1 - self.center.1) * self.pixels_per_meter,
        )
    }

    fn polygon(&self, corners: [(f32, f32); 4]) -> [(f32, f32); 4] {
        corners.map(|p| self.to_screen(p))
    }
}

/// Draws any number of environments into a single window. Environments are
/// handed in per frame; the coordinator keeps no reference to them.
pub struct RenderCoordinator {
    renderer: Renderer,
    camera: Camera,
}

impl RenderCoordinator {
    pub fn new(w: usize, h: usize, pixels_per_meter: f32) -> Result<Self, LanderError> {
        let renderer = Renderer::new(w, h, "Rocket Lander")?;
        // Pad near the bottom, spawn area in view.
        let camera = Camera {
            pixels_per_meter,
            center: (0.0, h as f32 * 0.4 / pixels_per_meter),
            screen: (w, h),
        };
        Ok(Self { renderer, camera })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn is_open(&self) -> bool {
        self.renderer.is_open()
    }

    /// Renders one frame. The planet is drawn from the first environment that
    /// has been reset; every rocket is overlaid on it.
    pub fn draw(&mut self, envs: &[&RocketLander]) -> Result<(), LanderError> {
        self.renderer.clear(COLOR_SKY);

        let scenes: Vec<Scene> = envs.iter().filter_map(|env| env.scene()).collect();
        if let Some(first) = scenes.first() {
            self.renderer
                .quad(self.camera.polygon(first.terrain), COLOR_TERRAIN);
            self.renderer.quad(self.camera.polygon(first.pad), COLOR_PAD);
        }

        // things appear from last to first
        for scene in &scenes {
            self.draw_plume(scene);
            for leg in scene.legs {
                self.renderer.quad(self.camera.polygon(leg), COLOR_LEGS);
            }
            self.renderer
                .quad(self.camera.polygon(scene.body), COLOR_BODY);
        }

        // Landing commitment progress of the first rocket along the top edge.
        if let Some(env) = envs.first() {
            let commitment = env.config().reward.commitment_duration;
            let progress = (env.episode().contact_time / commitment).clamp(0.0, 1.0);
            let width = (progress * self.renderer.get_width() as f32) as usize;
            self.renderer.rect(0, 0, width, 4, COLOR_TIMER);
        }

        self.renderer.present()
    }

    fn draw_plume(&mut self, scene: &Scene) {
        let power = scene.thruster.power;
        if power <= 0.0 {
            return;
        }
        let (mx, my) = scene.engine_mount;
        let (dx, dy) = scene.exhaust_direction;
        let length = 20.0 * power;
        let half_width = 1.2;
        // Perpendicular to the exhaust direction.
        let (nx, ny) = (-dy * half_width, dx * half_width);
        let tip = (mx + dx * length, my + dy * length);
        let corners = [
            (mx + nx, my + ny),
            (mx - nx, my - ny),
            (tip.0 - nx * 0.3, tip.1 - ny * 0.3),
            (tip.0 + nx * 0.3, tip.1 + ny * 0.3),
        ];
        self.renderer
            .quad(self.camera.polygon(corners), COLOR_PLUME);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_flips_the_vertical_axis() {
        let camera = Camera {
            pixels_per_meter: 2.0,
            center: (0.0, 100.0),
            screen: (800, 600),
        };
        assert_eq!(camera.to_screen((0.0, 100.0)), (400.0, 300.0));
        assert_eq!(camera.to_screen((10.0, 110.0)), (420.0, 280.0));
        assert_eq!(camera.to_screen((-10.0, 0.0)), (380.0, 500.0));
    }
}
