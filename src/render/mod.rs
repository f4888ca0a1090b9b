//! Software renderer
//!
//! Draws the simulation into a `Canvas`, the render target the capture
//! pipeline reads frames from. Draw order: background, win zone, walls,
//! trails, racers, particles.

pub mod canvas;
pub mod pixel;
pub mod shapes;

pub use canvas::Canvas;
pub use pixel::{Rgba, colors};

use glam::Vec2;

use crate::error::CaptureError;
use crate::sim::{RacerStatus, Simulation, Wall};

/// Seconds per full glow pulse of the win zone
const GLOW_PERIOD: f32 = 1.2;

#[derive(Debug, Clone)]
pub struct Renderer {
    canvas: Canvas,
    scale: f32,
}

impl Renderer {
    /// Allocate the render target at the arena's pixel size
    pub fn new(width: u32, height: u32, pixels_per_meter: f32) -> Result<Self, CaptureError> {
        Ok(Self {
            canvas: Canvas::new(width, height)?,
            scale: pixels_per_meter,
        })
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    fn px(&self, p: Vec2) -> Vec2 {
        p * self.scale
    }

    /// Render one frame of `sim`
    pub fn draw(&mut self, sim: &Simulation) {
        let config = sim.config();
        self.canvas.clear(Rgba::rgb(config.background));

        self.draw_boundary(config.world_width(), config.world_height());
        self.draw_win_zone(sim);
        for wall in sim.walls() {
            let color = Rgba::rgb(config.palette_color(wall.color_index));
            self.draw_wall(wall, color);
        }

        let size = sim.tunables().racer_size;
        for racer in sim.racers() {
            let color = Rgba::rgb(config.racer_color(racer.index));
            let len = racer.trail.len();
            for (i, p) in racer.trail.iter().enumerate() {
                let alpha = shapes::trail_alpha(i, len);
                self.canvas
                    .fill_circle(self.px(*p), size * 0.25 * self.scale, color.with_alpha(alpha));
            }

            match racer.status {
                RacerStatus::Dead => {
                    let pos = racer.death_pos.unwrap_or(racer.pos);
                    for (a, b) in shapes::tombstone(pos, size) {
                        self.canvas
                            .line(self.px(a), self.px(b), 0.15 * self.scale, colors::TOMBSTONE);
                    }
                }
                status => {
                    let outline = shapes::racer_outline(racer.pos, racer.angle, size)
                        .map(|p| self.px(p));
                    self.canvas.fill_polygon(&outline, color);
                    if status == RacerStatus::Finished {
                        self.canvas.stroke_polygon(&outline, 2.0, colors::FINISHED_RING);
                    }
                }
            }
        }

        for p in sim.particles() {
            let color = Rgba::rgb(p.color).with_alpha(p.life);
            self.canvas.fill_circle(self.px(p.pos), p.size * self.scale, color);
        }
    }

    fn draw_boundary(&mut self, width: f32, height: f32) {
        let t = crate::consts::BOUNDARY_HALF_THICKNESS;
        let rects = [
            (Vec2::new(0.0, 0.0), Vec2::new(width, t)),
            (Vec2::new(0.0, height - t), Vec2::new(width, height)),
            (Vec2::new(0.0, 0.0), Vec2::new(t, height)),
            (Vec2::new(width - t, 0.0), Vec2::new(width, height)),
        ];
        for (min, max) in rects {
            self.canvas
                .fill_rect(self.px(min), self.px(max), colors::BOUNDARY);
        }
    }

    fn draw_win_zone(&mut self, sim: &Simulation) {
        let zone = sim.win_zone();
        let min = self.px(zone.pos - zone.size * 0.5);
        let max = self.px(zone.pos + zone.size * 0.5);
        let mut fill = colors::WIN_ZONE;
        if zone.glow {
            let t = sim.tick_count() as f32 * crate::consts::SIM_DT;
            let pulse = 0.5 + 0.5 * (t * std::f32::consts::TAU / GLOW_PERIOD).sin();
            fill = fill.lighten(pulse * 0.4);
        }
        self.canvas.fill_rect(min, max, fill);
        let edge = [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)];
        self.canvas.stroke_polygon(&edge, 2.0, colors::WIN_ZONE_EDGE);
    }

    fn draw_wall(&mut self, wall: &Wall, base: Rgba) {
        let mut color = if wall.deadly { colors::DEADLY } else { base };
        if wall.flash_timer > 0.0 {
            color = color.lighten(wall.flash_timer / crate::consts::WALL_FLASH_TIME);
        }
        let outline: Vec<Vec2> = wall.world_points().into_iter().map(|p| self.px(p)).collect();
        self.canvas.fill_polygon(&outline, color);

        let Some(d) = wall.destructible else {
            return;
        };
        let center = self.px(wall.pos);
        let cells = if d.show_text {
            shapes::digit_cells(center, d.hits_left.max(0) as u32, 2.0)
        } else {
            shapes::hp_pips(center, d.hits_left, 4.0)
        };
        for (min, max) in cells {
            self.canvas.fill_rect(min, max, colors::HP_PIP);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{SimConfig, Tunables};
    use crate::sim::WallDef;

    #[test]
    fn test_draws_racers_on_background() {
        let sim = Simulation::new(SimConfig::default(), Tunables::default());
        let mut r = Renderer::new(720, 720, 30.0).unwrap();
        r.draw(&sim);
        let bg = Rgba::rgb(sim.config().background);
        let p = sim.racers()[0].pos * 30.0;
        let center = r.canvas().get(p.x as u32, p.y as u32).unwrap();
        assert_eq!(center, Rgba::rgb(sim.config().racer_color(0)));
        assert_eq!(r.canvas().get(360, 200), Some(bg));
    }

    #[test]
    fn test_deadly_wall_is_red() {
        let mut sim = Simulation::new(SimConfig::default(), Tunables::default());
        sim.add_wall(WallDef::rect(Vec2::new(12.0, 20.0), Vec2::new(4.0, 1.0)).deadly());
        let mut r = Renderer::new(720, 720, 30.0).unwrap();
        r.draw(&sim);
        assert_eq!(r.canvas().get(360, 600), Some(colors::DEADLY));
    }
}
