//! Snapshot to display list, plus the status overlay drawn on top

use crate::connection::{ConnectionState, LobbyInfo};
use crate::effects::CountdownDisplay;
use macroquad::prelude::{
    clear_background, draw_circle, draw_line, draw_rectangle, draw_rectangle_lines, draw_text,
    Color,
};
use shared::{ItemKind, Phase, Player, Snapshot, CELL_SIZE, MAX_BOARD_CELLS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Rgba> for Color {
    fn from(c: Rgba) -> Self {
        Color::from_rgba(c.r, c.g, c.b, c.a)
    }
}

pub mod palette {
    use super::Rgba;

    pub const BACKGROUND: Rgba = Rgba::new(26, 26, 26, 255);
    pub const GRID: Rgba = Rgba::new(44, 44, 44, 255);
    pub const OWN: Rgba = Rgba::new(0, 228, 48, 255);
    pub const OTHER: Rgba = Rgba::new(255, 68, 68, 255);
    pub const DEAD: Rgba = Rgba::new(102, 102, 102, 255);
    pub const HEAD_OUTLINE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const MINOR_ITEM: Rgba = Rgba::new(253, 249, 0, 255);
    pub const MAJOR_ITEM: Rgba = Rgba::new(0, 170, 255, 255);
    pub const TEXT: Rgba = Rgba::new(255, 255, 255, 255);
    pub const PANEL: Rgba = Rgba::new(0, 0, 0, 190);
    pub const BAR_TRACK: Rgba = Rgba::new(51, 51, 51, 255);
    pub const BOOST: Rgba = Rgba::new(255, 161, 0, 255);
    pub const SLOW: Rgba = Rgba::new(200, 122, 255, 255);
    pub const STATUS_OK: Rgba = Rgba::new(0, 228, 48, 255);
    pub const STATUS_PENDING: Rgba = Rgba::new(253, 249, 0, 255);
    pub const STATUS_DOWN: Rgba = Rgba::new(230, 41, 55, 255);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Rgba),
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        thickness: f32,
        color: Rgba,
    },
    FillRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgba,
    },
    StrokeRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        thickness: f32,
        color: Rgba,
    },
    FillCircle {
        x: f32,
        y: f32,
        radius: f32,
        color: Rgba,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        color: Rgba,
    },
}

/// Back-to-front list of draw operations for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub commands: Vec<DrawCommand>,
}

impl Frame {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: vec![DrawCommand::Clear(palette::BACKGROUND)],
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Replays the frame onto the macroquad window
    pub fn present(&self) {
        for command in &self.commands {
            match command {
                DrawCommand::Clear(color) => clear_background((*color).into()),
                DrawCommand::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    thickness,
                    color,
                } => draw_line(*x1, *y1, *x2, *y2, *thickness, (*color).into()),
                DrawCommand::FillRect { x, y, w, h, color } => {
                    draw_rectangle(*x, *y, *w, *h, (*color).into())
                }
                DrawCommand::StrokeRect {
                    x,
                    y,
                    w,
                    h,
                    thickness,
                    color,
                } => draw_rectangle_lines(*x, *y, *w, *h, *thickness, (*color).into()),
                DrawCommand::FillCircle {
                    x,
                    y,
                    radius,
                    color,
                } => draw_circle(*x, *y, *radius, (*color).into()),
                DrawCommand::Text {
                    text,
                    x,
                    y,
                    size,
                    color,
                } => {
                    draw_text(text, *x, *y, *size, (*color).into());
                }
            }
        }
    }
}

/// Session state drawn on top of the board
#[derive(Debug, Clone, Copy)]
pub struct Overlay<'a> {
    pub connection: ConnectionState,
    pub lobby: Option<&'a LobbyInfo>,
    pub showing_game: bool,
    pub phase: Option<Phase>,
    pub countdown: Option<CountdownDisplay>,
}

const HUD_TEXT_SIZE: f32 = 16.0;
const HUD_LINE_HEIGHT: f32 = 18.0;
const HUD_MARGIN: f32 = 8.0;

pub struct Renderer {
    cell_size: u32,
}

impl Renderer {
    pub fn new(cell_size: u32) -> Self {
        Self {
            cell_size: cell_size.max(1),
        }
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Pixel position of a logical grid coordinate
    pub fn to_pixel(&self, x: i32, y: i32) -> (f32, f32) {
        let cell = self.cell_size as f32;
        (x as f32 * cell, y as f32 * cell)
    }

    /// Saturates instead of overflowing on boards that never passed validation
    pub fn canvas_size(&self, snapshot: &Snapshot) -> (u32, u32) {
        (
            (snapshot.width.max(0) as u32).saturating_mul(self.cell_size),
            (snapshot.height.max(0) as u32).saturating_mul(self.cell_size),
        )
    }

    /// Draws the board; same inputs always give the same frame
    pub fn render(&self, snapshot: &Snapshot, local_id: Option<&str>) -> Frame {
        let (width, height) = self.canvas_size(snapshot);
        let mut frame = Frame::blank(width, height);

        self.draw_grid(&mut frame, snapshot);
        self.draw_items(&mut frame, snapshot);
        for player in &snapshot.players {
            self.draw_snake(&mut frame, player, local_id);
        }
        self.draw_hud(&mut frame, snapshot, local_id);

        frame
    }

    /// Adds the connection indicator, lobby panel and effect bar
    pub fn render_overlay(&self, frame: &mut Frame, overlay: &Overlay) {
        self.draw_connection_status(frame, overlay.connection);

        if overlay.showing_game {
            if let Some(countdown) = overlay.countdown {
                self.draw_effect_bar(frame, countdown);
            }
        } else {
            self.draw_lobby_panel(frame, overlay);
        }
    }

    fn draw_grid(&self, frame: &mut Frame, snapshot: &Snapshot) {
        let (width, height) = (frame.width as f32, frame.height as f32);

        for column in 0..=snapshot.width.min(MAX_BOARD_CELLS) {
            let (x, _) = self.to_pixel(column, 0);
            frame.commands.push(DrawCommand::Line {
                x1: x,
                y1: 0.0,
                x2: x,
                y2: height,
                thickness: 1.0,
                color: palette::GRID,
            });
        }
        for row in 0..=snapshot.height.min(MAX_BOARD_CELLS) {
            let (_, y) = self.to_pixel(0, row);
            frame.commands.push(DrawCommand::Line {
                x1: 0.0,
                y1: y,
                x2: width,
                y2: y,
                thickness: 1.0,
                color: palette::GRID,
            });
        }
    }

    fn draw_items(&self, frame: &mut Frame, snapshot: &Snapshot) {
        let cell = self.cell_size as f32;
        for item in &snapshot.items {
            let (x, y) = self.to_pixel(item.x, item.y);
            let (radius, color) = match item.kind {
                ItemKind::Minor => (cell * 0.3, palette::MINOR_ITEM),
                ItemKind::Major => (cell * 0.45, palette::MAJOR_ITEM),
            };
            frame.commands.push(DrawCommand::FillCircle {
                x: x + cell / 2.0,
                y: y + cell / 2.0,
                radius,
                color,
            });
        }
    }

    fn draw_snake(&self, frame: &mut Frame, player: &Player, local_id: Option<&str>) {
        let cell = self.cell_size as f32;
        let color = snake_color(player, local_id);

        for segment in &player.segments {
            let (x, y) = self.to_pixel(segment.x, segment.y);
            frame.commands.push(DrawCommand::FillRect {
                x: x + 1.0,
                y: y + 1.0,
                w: cell - 2.0,
                h: cell - 2.0,
                color,
            });
        }

        if player.alive {
            if let Some(head) = player.head() {
                let (x, y) = self.to_pixel(head.x, head.y);
                frame.commands.push(DrawCommand::StrokeRect {
                    x,
                    y,
                    w: cell,
                    h: cell,
                    thickness: 2.0,
                    color: palette::HEAD_OUTLINE,
                });
            }
        }
    }

    fn draw_hud(&self, frame: &mut Frame, snapshot: &Snapshot, local_id: Option<&str>) {
        for (i, player) in snapshot.players.iter().enumerate() {
            frame.commands.push(DrawCommand::Text {
                text: hud_line(player, local_id),
                x: HUD_MARGIN,
                y: HUD_MARGIN + HUD_LINE_HEIGHT * (i as f32 + 1.0),
                size: HUD_TEXT_SIZE,
                color: snake_color(player, local_id),
            });
        }
    }

    fn draw_connection_status(&self, frame: &mut Frame, state: ConnectionState) {
        let color = match state {
            ConnectionState::Connected => palette::STATUS_OK,
            ConnectionState::Connecting { .. } => palette::STATUS_PENDING,
            ConnectionState::Disconnected | ConnectionState::ExhaustedRetries => {
                palette::STATUS_DOWN
            }
        };
        let label = state.label();
        let x = (frame.width as f32 - 8.0 * label.len() as f32 - 28.0).max(HUD_MARGIN);

        frame.commands.push(DrawCommand::FillCircle {
            x: x + 5.0,
            y: HUD_MARGIN + 7.0,
            radius: 5.0,
            color,
        });
        frame.commands.push(DrawCommand::Text {
            text: label.to_string(),
            x: x + 16.0,
            y: HUD_MARGIN + 12.0,
            size: HUD_TEXT_SIZE,
            color: palette::TEXT,
        });
    }

    fn draw_effect_bar(&self, frame: &mut Frame, countdown: CountdownDisplay) {
        let bar_width = (frame.width as f32 / 3.0).max(120.0);
        let x = HUD_MARGIN;
        let y = frame.height as f32 - 24.0;
        let fill = bar_width * countdown.percentage.clamp(0.0, 100.0) / 100.0;
        let color = match countdown.kind {
            shared::EffectKind::Boost => palette::BOOST,
            shared::EffectKind::Slow => palette::SLOW,
        };

        frame.commands.push(DrawCommand::Text {
            text: format!("{} {}s", countdown.kind.label(), countdown.remaining_secs),
            x,
            y: y - 4.0,
            size: HUD_TEXT_SIZE,
            color: palette::TEXT,
        });
        frame.commands.push(DrawCommand::FillRect {
            x,
            y,
            w: bar_width,
            h: 10.0,
            color: palette::BAR_TRACK,
        });
        frame.commands.push(DrawCommand::FillRect {
            x,
            y,
            w: fill,
            h: 10.0,
            color,
        });
    }

    fn draw_lobby_panel(&self, frame: &mut Frame, overlay: &Overlay) {
        let mut lines = Vec::new();
        if overlay.phase == Some(Phase::Finished) {
            lines.push("Game over".to_string());
        }
        match overlay.connection {
            ConnectionState::Connected => {
                if let Some(lobby) = overlay.lobby {
                    if !lobby.status.is_empty() {
                        lines.push(format!("Lobby: {}", lobby.status));
                    }
                    lines.push(format!("{} player(s) waiting", lobby.count));
                    lines.extend(lobby.names.iter().map(|name| format!("  {}", name)));
                }
                lines.push("Press Enter to start".to_string());
            }
            state => lines.push(state.label().to_string()),
        }

        let panel_height = HUD_LINE_HEIGHT * lines.len() as f32 + 2.0 * HUD_MARGIN;
        let panel_width = (frame.width as f32 * 0.6).max(240.0);
        let x = ((frame.width as f32 - panel_width) / 2.0).max(0.0);
        let y = ((frame.height as f32 - panel_height) / 2.0).max(0.0);

        frame.commands.push(DrawCommand::FillRect {
            x,
            y,
            w: panel_width,
            h: panel_height,
            color: palette::PANEL,
        });
        for (i, line) in lines.into_iter().enumerate() {
            frame.commands.push(DrawCommand::Text {
                text: line,
                x: x + HUD_MARGIN,
                y: y + HUD_MARGIN + HUD_LINE_HEIGHT * (i as f32 + 1.0) - 4.0,
                size: HUD_TEXT_SIZE,
                color: palette::TEXT,
            });
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(CELL_SIZE)
    }
}

/// Dead snakes share one color; living ones are colored by ownership
pub fn snake_color(player: &Player, local_id: Option<&str>) -> Rgba {
    if !player.alive {
        palette::DEAD
    } else if Some(player.id.as_str()) == local_id {
        palette::OWN
    } else {
        palette::OTHER
    }
}

pub fn hud_line(player: &Player, local_id: Option<&str>) -> String {
    let is_local = Some(player.id.as_str()) == local_id;
    let prefix = if is_local { "> You" } else { "  Player" };
    let status = if player.alive { "alive" } else { "dead" };
    format!("{} {}: {} ({})", prefix, player.id, player.score, status)
}
