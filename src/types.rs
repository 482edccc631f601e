use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::CompetitionEngine;

// ── Constants ──────────────────────────────────────────────────────────

pub const API_SERVER_ADDR: &str = "127.0.0.1:17890";
pub const OVERLAY_SERVER_ADDR: &str = "127.0.0.1:17891";
pub const RUN_MUTATION_WAIT_BUDGET_MS: u64 = 5_000;
pub const RUN_MUTATION_MAX_QUEUE: usize = 8;
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
pub const MAX_BRACKET_SIZE: usize = 64;

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedEngine = Arc<CompetitionEngine>;

// ── Race domain types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lane {
    A,
    B,
}

impl Lane {
    pub fn index(self) -> usize {
        match self {
            Lane::A => 0,
            Lane::B => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Lane::A => "A",
            Lane::B => "B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Valid,
    Fall,
    FalseStart,
    Dns,
}

/// One timed attempt in one lane. The time only counts toward a match total
/// when the status is `Valid` and a time is present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub time_sec: Option<f64>,
    pub status: RunStatus,
}

/// Elimination stages in bracket order. `SmallFinal` is the third-place
/// race between the two semifinal losers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    RoundOf64,
    RoundOf32,
    RoundOf16,
    QuarterFinal,
    SemiFinal,
    SmallFinal,
    BigFinal,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::RoundOf64 => "Round of 64",
            Stage::RoundOf32 => "Round of 32",
            Stage::RoundOf16 => "Round of 16",
            Stage::QuarterFinal => "Quarter Final",
            Stage::SemiFinal => "Semi Final",
            Stage::SmallFinal => "Small Final",
            Stage::BigFinal => "Big Final",
        }
    }

    /// First stage of a bracket with `size` slots (size is a power of two).
    pub fn for_bracket_size(size: usize) -> Option<Stage> {
        match size {
            2 => Some(Stage::BigFinal),
            4 => Some(Stage::SemiFinal),
            8 => Some(Stage::QuarterFinal),
            16 => Some(Stage::RoundOf16),
            32 => Some(Stage::RoundOf32),
            64 => Some(Stage::RoundOf64),
            _ => None,
        }
    }

    /// Next stage on the winners' track. The Small Final is created as a
    /// side effect of advancing the semifinals, never as a `next` stage.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::RoundOf64 => Some(Stage::RoundOf32),
            Stage::RoundOf32 => Some(Stage::RoundOf16),
            Stage::RoundOf16 => Some(Stage::QuarterFinal),
            Stage::QuarterFinal => Some(Stage::SemiFinal),
            Stage::SemiFinal => Some(Stage::BigFinal),
            Stage::SmallFinal | Stage::BigFinal => None,
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, Stage::SmallFinal | Stage::BigFinal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contestant {
    pub id: u32,
    pub name: String,
    pub team: Option<String>,
    pub bib: u32,
    pub qualification_rank: Option<u32>,
}

/// One side of a match: a contestant (empty in slot 1 means BYE), their two
/// lane runs, and the cached aggregation of those runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSlot {
    pub contestant_id: Option<u32>,
    pub runs: [Option<Run>; 2],
    pub total_sec: Option<f64>,
}

impl MatchSlot {
    pub fn empty() -> Self {
        MatchSlot {
            contestant_id: None,
            runs: [None, None],
            total_sec: None,
        }
    }

    pub fn seeded(contestant_id: u32) -> Self {
        MatchSlot {
            contestant_id: Some(contestant_id),
            runs: [None, None],
            total_sec: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: u64,
    pub competition_id: String,
    pub stage: Stage,
    pub order: u32,
    pub slots: [MatchSlot; 2],
    pub winner_id: Option<u32>,
    pub tied: bool,
    pub finalized: bool,
    pub updated_at_ms: u64,
}

impl Match {
    /// Slot 0 is always occupied by construction; an empty slot 1 is a BYE.
    pub fn is_bye(&self) -> bool {
        self.slots[1].contestant_id.is_none()
    }

    pub fn slot_of(&self, contestant_id: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.contestant_id == Some(contestant_id))
    }

    pub fn participants(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().filter_map(|slot| slot.contestant_id)
    }

    /// The non-winning contestant of a decided, non-BYE match. A BYE has no
    /// loser.
    pub fn loser_id(&self) -> Option<u32> {
        let winner = self.winner_id?;
        if self.is_bye() {
            return None;
        }
        self.participants().find(|id| *id != winner)
    }
}

// ── Judge input payloads ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    pub match_id: u64,
    pub contestant_id: u32,
    pub lane: Lane,
    pub time_sec: Option<f64>,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerOverrideInput {
    pub winner_id: u32,
}

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub api_addr: String,
    pub overlay_addr: String,
    pub overlay_dir: String,
    pub roster_path: String,
    pub judge_log: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_addr: API_SERVER_ADDR.to_string(),
            overlay_addr: OVERLAY_SERVER_ADDR.to_string(),
            overlay_dir: "overlay".to_string(),
            roster_path: "rosters/city_finals.json".to_string(),
            judge_log: true,
        }
    }
}

// ── Roster file types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterConfig {
    pub competition_id: String,
    pub name: String,
    pub contestants: Vec<RosterContestant>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterContestant {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub team: Option<String>,
    pub bib: u32,
    #[serde(default)]
    pub qualification_rank: Option<u32>,
}

impl RosterContestant {
    pub fn into_contestant(self) -> Contestant {
        Contestant {
            id: self.id,
            name: self.name,
            team: self.team,
            bib: self.bib,
            qualification_rank: self.qualification_rank,
        }
    }
}
