//! Level file format
//!
//! One directive per line, first token selects the record:
//!
//! ```text
//! CONFIG <speed> <racerSize> <restitution> <chaosEnabled> [<stopOnFirstWin>]
//! WINZONE <x> <y> <w> <h> [<glow>]
//! WALL <x> <y> <w> <h> <soundID> [<colorIndex> <expandable> ... <useTextForHP>]
//! RACER <id> <x> <y> <vx> <vy> <angle> <angularVel>
//! ```
//!
//! Parsing is forgiving: missing trailing fields keep their defaults, and the
//! first malformed token ends that line. Unknown directives are skipped.
//! Coordinates are meters; booleans are `0`/`1`.

use std::fmt::Write as _;
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

use glam::Vec2;

use super::wall::{WallDef, WallShape};
use crate::error::LevelError;

/// CONFIG record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelConfig {
    pub speed: f32,
    pub racer_size: f32,
    pub restitution: f32,
    pub chaos: bool,
    pub stop_on_first_win: bool,
}

/// WINZONE record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinZoneDef {
    pub pos: Vec2,
    pub size: Vec2,
    pub glow: bool,
}

/// RACER record; fields missing from the line are `None` and leave the
/// racer's current value alone
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RacerDef {
    pub id: usize,
    pub pos: Option<Vec2>,
    pub vel: Option<Vec2>,
    pub angle: Option<f32>,
    pub angular_vel: Option<f32>,
}

/// A parsed level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Level {
    pub config: Option<LevelConfig>,
    pub win_zone: Option<WinZoneDef>,
    pub walls: Vec<WallDef>,
    pub racers: Vec<RacerDef>,
}

/// Sequential field reader that stops for good at the first bad token
struct Fields<'a> {
    tokens: SplitWhitespace<'a>,
    failed: bool,
}

impl<'a> Fields<'a> {
    fn new(tokens: SplitWhitespace<'a>) -> Self {
        Self { tokens, failed: false }
    }

    fn next<T: FromStr>(&mut self) -> Option<T> {
        if self.failed {
            return None;
        }
        let value = self.tokens.next().and_then(|t| t.parse().ok());
        if value.is_none() {
            self.failed = true;
        }
        value
    }

    fn read<T: FromStr>(&mut self, slot: &mut T) {
        if let Some(v) = self.next() {
            *slot = v;
        }
    }

    fn read_bool(&mut self, slot: &mut bool) {
        if let Some(v) = self.next::<i32>() {
            *slot = v != 0;
        }
    }

    fn vec2(&mut self) -> Option<Vec2> {
        let x = self.next()?;
        let y = self.next()?;
        Some(Vec2::new(x, y))
    }
}

fn bit(b: bool) -> u8 {
    u8::from(b)
}

impl Level {
    /// Parse level text; never fails
    pub fn parse(text: &str) -> Self {
        let mut level = Level::default();
        for (line_no, line) in text.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            let Some(kind) = tokens.next() else {
                continue;
            };
            let mut f = Fields::new(tokens);
            match kind {
                "CONFIG" => {
                    let mut c = LevelConfig {
                        speed: crate::consts::TARGET_SPEED,
                        racer_size: crate::consts::RACER_SIZE,
                        restitution: 1.0,
                        chaos: false,
                        stop_on_first_win: true,
                    };
                    f.read(&mut c.speed);
                    f.read(&mut c.racer_size);
                    f.read(&mut c.restitution);
                    f.read_bool(&mut c.chaos);
                    f.read_bool(&mut c.stop_on_first_win);
                    level.config = Some(c);
                }
                "WINZONE" => {
                    let mut z = WinZoneDef {
                        pos: Vec2::ZERO,
                        size: Vec2::splat(2.0),
                        glow: false,
                    };
                    f.read(&mut z.pos.x);
                    f.read(&mut z.pos.y);
                    f.read(&mut z.size.x);
                    f.read(&mut z.size.y);
                    f.read_bool(&mut z.glow);
                    level.win_zone = Some(z);
                }
                "WALL" => level.walls.push(parse_wall(&mut f)),
                "RACER" => match f.next::<usize>() {
                    Some(id) => level.racers.push(RacerDef {
                        id,
                        pos: f.vec2(),
                        vel: f.vec2(),
                        angle: f.next(),
                        angular_vel: f.next(),
                    }),
                    None => log::debug!("Skipping RACER without a valid id on line {}", line_no + 1),
                },
                other => {
                    log::debug!("Skipping unknown directive '{}' on line {}", other, line_no + 1);
                }
            }
            if f.failed {
                log::debug!("Line {} truncated or malformed, kept defaults", line_no + 1);
            }
        }
        level
    }

    /// Read and parse a level file
    pub fn load(path: &Path) -> Result<Self, LevelError> {
        if !path.exists() {
            return Err(LevelError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Serialize with every field written
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if let Some(c) = &self.config {
            let _ = writeln!(
                out,
                "CONFIG {} {} {} {} {}",
                c.speed,
                c.racer_size,
                c.restitution,
                bit(c.chaos),
                bit(c.stop_on_first_win)
            );
        }
        if let Some(z) = &self.win_zone {
            let _ = writeln!(
                out,
                "WINZONE {} {} {} {} {}",
                z.pos.x,
                z.pos.y,
                z.size.x,
                z.size.y,
                bit(z.glow)
            );
        }
        for w in &self.walls {
            let _ = writeln!(
                out,
                "WALL {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
                w.pos.x,
                w.pos.y,
                w.size.x,
                w.size.y,
                w.sound_id,
                w.color_index,
                bit(w.expandable),
                w.expansion_delay,
                w.expansion_speed,
                w.expansion_axis,
                bit(w.stop_on_contact),
                w.stop_target,
                w.max_size,
                w.shape.index(),
                w.rotation,
                bit(w.deadly),
                bit(w.moving),
                w.point_a.x,
                w.point_a.y,
                w.point_b.x,
                w.point_b.y,
                w.move_speed,
                bit(w.reverse_on_contact),
                bit(w.free_bounce),
                bit(w.destructible),
                w.max_hits,
                w.current_hits,
                bit(w.text_for_hp)
            );
        }
        for r in &self.racers {
            let _ = write!(out, "RACER {}", r.id);
            // positional fields: stop at the first one that is unset
            let fields = [
                r.pos.map(|p| format!("{} {}", p.x, p.y)),
                r.vel.map(|v| format!("{} {}", v.x, v.y)),
                r.angle.map(|a| a.to_string()),
                r.angular_vel.map(|w| w.to_string()),
            ];
            for field in fields.into_iter().map_while(|f| f) {
                let _ = write!(out, " {field}");
            }
            out.push('\n');
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<(), LevelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}

fn parse_wall(f: &mut Fields<'_>) -> WallDef {
    let mut w = WallDef::default();
    f.read(&mut w.pos.x);
    f.read(&mut w.pos.y);
    f.read(&mut w.size.x);
    f.read(&mut w.size.y);
    f.read(&mut w.sound_id);
    f.read(&mut w.color_index);
    f.read_bool(&mut w.expandable);
    f.read(&mut w.expansion_delay);
    f.read(&mut w.expansion_speed);
    f.read(&mut w.expansion_axis);
    f.read_bool(&mut w.stop_on_contact);
    f.read(&mut w.stop_target);
    f.read(&mut w.max_size);
    let mut shape = 0;
    f.read(&mut shape);
    w.shape = WallShape::from_index(shape);
    f.read(&mut w.rotation);
    f.read_bool(&mut w.deadly);
    f.read_bool(&mut w.moving);
    f.read(&mut w.point_a.x);
    f.read(&mut w.point_a.y);
    f.read(&mut w.point_b.x);
    f.read(&mut w.point_b.y);
    f.read(&mut w.move_speed);
    f.read_bool(&mut w.reverse_on_contact);
    f.read_bool(&mut w.free_bounce);
    f.read_bool(&mut w.destructible);
    f.read(&mut w.max_hits);
    f.read(&mut w.current_hits);
    f.read_bool(&mut w.text_for_hp);
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_old_format_wall_keeps_defaults() {
        let level = Level::parse("WALL 1 2 3 4 5\n");
        assert_eq!(level.walls.len(), 1);
        let w = &level.walls[0];
        assert_eq!(w.pos, Vec2::new(1.0, 2.0));
        assert_eq!(w.size, Vec2::new(3.0, 4.0));
        assert_eq!(w.sound_id, 5);
        assert_eq!(w.expansion_delay, WallDef::default().expansion_delay);
        assert!(!w.destructible);
    }

    #[test]
    fn test_malformed_token_stops_line() {
        let level = Level::parse("WALL 1 2 oops 4 5\nWALL 6 7 1 1 2\n");
        assert_eq!(level.walls.len(), 2);
        assert_eq!(level.walls[0].pos, Vec2::new(1.0, 2.0));
        // size and everything after the bad token keep defaults
        assert_eq!(level.walls[0].size, Vec2::ONE);
        assert_eq!(level.walls[0].sound_id, 0);
        // the next line is unaffected
        assert_eq!(level.walls[1].pos, Vec2::new(6.0, 7.0));
        assert_eq!(level.walls[1].sound_id, 2);
    }

    #[test]
    fn test_full_wall_line() {
        let line = "WALL 5 6 2 1 3 4 1 0.5 1.5 0 1 2 6 1 0.25 1 1 1 1 9 9 2.5 1 0 1 5 2 1";
        let level = Level::parse(line);
        let w = &level.walls[0];
        assert_eq!(w.color_index, 4);
        assert!(w.expandable);
        assert_eq!(w.expansion_axis, 0);
        assert_eq!(w.stop_target, 2);
        assert_eq!(w.max_size, 6.0);
        assert_eq!(w.shape, WallShape::Spike);
        assert!(w.deadly && w.moving && w.reverse_on_contact && !w.free_bounce);
        assert_eq!(w.point_b, Vec2::new(9.0, 9.0));
        assert!(w.destructible);
        assert_eq!((w.max_hits, w.current_hits), (5, 2));
        assert!(w.text_for_hp);
    }

    #[test]
    fn test_config_winzone_racer() {
        let text = "CONFIG 10 1.2 0.9 1\nWINZONE 3 4 2 2 1\nRACER 2 1 1 8 0 0.5 -1\n# comment\n";
        let level = Level::parse(text);
        let c = level.config.unwrap();
        assert_eq!(c.speed, 10.0);
        assert!(c.chaos);
        assert!(c.stop_on_first_win, "missing optional field keeps default");
        let z = level.win_zone.unwrap();
        assert!(z.glow);
        assert_eq!(level.racers[0].id, 2);
        assert_eq!(level.racers[0].angular_vel, Some(-1.0));
    }

    #[test]
    fn test_truncated_racer_keeps_only_read_fields() {
        let level = Level::parse("RACER 2
RACER 1 4 5 6
RACER -1 3 3 0 0 0 0
RACER x 1 1
");
        assert_eq!(level.racers.len(), 2, "records without a valid id are dropped");
        let bare = level.racers[0];
        assert_eq!(bare.id, 2);
        assert_eq!((bare.pos, bare.vel, bare.angle, bare.angular_vel), (None, None, None, None));
        let partial = level.racers[1];
        assert_eq!(partial.pos, Some(Vec2::new(4.0, 5.0)));
        // a lone vx is not half a velocity
        assert_eq!(partial.vel, None);
        assert_eq!(partial.angle, None);
        assert_eq!(Level::parse(&level.to_text()), level);
    }

    #[test]
    fn test_save_then_parse_matches() {
        let mut level = Level::default();
        level.config = Some(LevelConfig {
            speed: 8.0,
            racer_size: 1.0,
            restitution: 1.0,
            chaos: true,
            stop_on_first_win: false,
        });
        level.walls.push(WallDef::rect(Vec2::new(4.0, 5.0), Vec2::new(2.0, 0.5)).destructible(3));
        level.walls.push(WallDef::rect(Vec2::new(8.0, 8.0), Vec2::ONE).spike(0.5).deadly());
        let parsed = Level::parse(&level.to_text());
        assert_eq!(parsed, level);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let path = std::env::temp_dir().join("chaos_racer_missing_level.txt");
        assert!(matches!(Level::load(&path), Err(LevelError::NotFound(_))));
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(text in "\\PC*") {
            let _ = Level::parse(&text);
        }

        #[test]
        fn prop_wall_prefix_fields_read(x in -50.0f32..50.0, y in -50.0f32..50.0) {
            let level = Level::parse(&format!("WALL {x} {y}"));
            prop_assert_eq!(level.walls[0].pos, Vec2::new(x, y));
        }
    }
}
