//! HUD-facing session state fed by control messages.

use starlance::net::protocol::RosterEntry;

/// How many teammates the HUD shows besides the local player.
const MAX_TEAMMATES: usize = 3;

const MAX_LIVES: u8 = 10;

#[derive(Debug, Clone)]
pub struct Teammate {
    pub id: u32,
    pub name: String,
    pub lives: u8,
    pub ship_id: u8,
}

/// Everything the gameplay screen reads: identity, lives, score, lobby
/// parameters, and the terminal flags.
#[derive(Debug, Default)]
pub struct HudState {
    pub self_id: u32,
    pub lives: u8,
    pub ship_row: u8,
    pub team_score: i32,
    pub teammates: Vec<Teammate>,
    pub host_id: u32,
    pub base_lives: u8,
    pub difficulty: u8,
    pub started: bool,
    pub game_over: bool,
    pub return_to_menu: bool,
}

/// Prefix of `name` that fits the 15 significant wire bytes.
fn wire_name(name: &str) -> &str {
    let max = 15.min(name.len());
    let mut end = max;
    while end > 0 && !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

impl HudState {
    /// Replaces the roster. The local player is recognized by the 15-byte
    /// name prefix; everyone else becomes a teammate, capped for the HUD.
    pub fn apply_roster(&mut self, entries: &[RosterEntry], username: &str) {
        let self_name = wire_name(username);
        self.teammates.clear();
        for entry in entries {
            if entry.name == self_name {
                self.self_id = entry.id;
                self.lives = entry.lives.min(MAX_LIVES);
                self.ship_row = entry.ship_id;
                continue;
            }
            if self.teammates.len() < MAX_TEAMMATES {
                self.teammates.push(Teammate {
                    id: entry.id,
                    name: entry.name.clone(),
                    lives: entry.lives.min(MAX_LIVES),
                    ship_id: entry.ship_id,
                });
            }
        }
    }

    pub fn apply_lives(&mut self, id: u32, lives: u8) {
        let lives = lives.min(MAX_LIVES);
        if id == self.self_id {
            self.lives = lives;
            if lives == 0 {
                self.game_over = true;
            }
            return;
        }
        if let Some(mate) = self.teammates.iter_mut().find(|m| m.id == id) {
            mate.lives = lives;
        }
    }

    pub fn is_host(&self) -> bool {
        self.self_id != 0 && self.self_id == self.host_id
    }

    /// One-line roster summary for logs and status bars.
    pub fn roster_line(&self) -> String {
        let mut line = format!("self #{} ship {} lives {}", self.self_id, self.ship_row, self.lives);
        for mate in &self.teammates {
            line.push_str(&format!(
                " | {} #{} ship {} lives {}",
                mate.name, mate.id, mate.ship_id, mate.lives
            ));
        }
        line
    }

    /// The reconciler-side game-over observation: everyone we know about
    /// sits at zero lives.
    pub fn all_players_dead(&self) -> bool {
        self.lives == 0 && self.teammates.iter().all(|m| m.lives == 0)
    }
}
