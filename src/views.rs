use serde::Serialize;
use std::collections::HashMap;

use crate::placement::PlacementRow;
use crate::types::{Contestant, Lane, Match, Run, RunStatus, Stage};

// ── Bracket view ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketView {
    pub competition_id: String,
    pub competition_name: String,
    pub stages: Vec<StageView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub stage: String,
    pub matches: Vec<BracketMatchView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketMatchView {
    pub match_id: u64,
    pub order: u32,
    pub bye: bool,
    pub tied: bool,
    pub winner_id: Option<u32>,
    pub slots: Vec<BracketSlotView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSlotView {
    pub contestant_id: Option<u32>,
    pub name: Option<String>,
    pub bib: Option<u32>,
    pub total_sec: Option<f64>,
}

// ── Match detail view ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetailView {
    pub match_id: u64,
    pub stage: String,
    pub order: u32,
    pub bye: bool,
    pub tied: bool,
    pub finalized: bool,
    pub winner_id: Option<u32>,
    pub slots: Vec<MatchSlotDetailView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSlotDetailView {
    pub contestant_id: Option<u32>,
    pub name: Option<String>,
    pub team: Option<String>,
    pub bib: Option<u32>,
    pub runs: Vec<RunView>,
    pub total_sec: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    pub lane: String,
    pub time_sec: Option<f64>,
    pub status: Option<String>,
}

// ── Leaderboard view ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardView {
    pub competition_id: String,
    pub rows: Vec<LeaderboardRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: Option<u32>,
    pub contestant_id: u32,
    pub name: Option<String>,
    pub team: Option<String>,
    pub bib: Option<u32>,
    pub total_sec: Option<f64>,
    pub stage_reached: String,
}

// ── Mappers ────────────────────────────────────────────────────────────

fn run_view(lane: Lane, run: Option<&Run>) -> RunView {
    RunView {
        lane: lane.label().to_string(),
        time_sec: run.and_then(|r| r.time_sec),
        status: run.map(|r| match r.status {
            RunStatus::Valid => "valid".to_string(),
            RunStatus::Fall => "fall".to_string(),
            RunStatus::FalseStart => "falseStart".to_string(),
            RunStatus::Dns => "dns".to_string(),
        }),
    }
}

pub fn bracket_view(
    competition_id: &str,
    competition_name: &str,
    matches: &[Match],
    contestants: &HashMap<u32, Contestant>,
) -> BracketView {
    let mut stages: Vec<StageView> = Vec::new();
    let mut order: Vec<Stage> = matches.iter().map(|m| m.stage).collect();
    order.sort();
    order.dedup();

    for stage in order {
        let mut stage_matches: Vec<&Match> = matches.iter().filter(|m| m.stage == stage).collect();
        stage_matches.sort_by_key(|m| m.order);
        stages.push(StageView {
            stage: stage.label().to_string(),
            matches: stage_matches
                .into_iter()
                .map(|m| BracketMatchView {
                    match_id: m.id,
                    order: m.order,
                    bye: m.is_bye(),
                    tied: m.tied,
                    winner_id: m.winner_id,
                    slots: m
                        .slots
                        .iter()
                        .map(|slot| {
                            let contestant =
                                slot.contestant_id.and_then(|id| contestants.get(&id));
                            BracketSlotView {
                                contestant_id: slot.contestant_id,
                                name: contestant.map(|c| c.name.clone()),
                                bib: contestant.map(|c| c.bib),
                                total_sec: slot.total_sec,
                            }
                        })
                        .collect(),
                })
                .collect(),
        });
    }

    BracketView {
        competition_id: competition_id.to_string(),
        competition_name: competition_name.to_string(),
        stages,
    }
}

pub fn match_detail_view(m: &Match, contestants: &HashMap<u32, Contestant>) -> MatchDetailView {
    MatchDetailView {
        match_id: m.id,
        stage: m.stage.label().to_string(),
        order: m.order,
        bye: m.is_bye(),
        tied: m.tied,
        finalized: m.finalized,
        winner_id: m.winner_id,
        slots: m
            .slots
            .iter()
            .map(|slot| {
                let contestant = slot.contestant_id.and_then(|id| contestants.get(&id));
                MatchSlotDetailView {
                    contestant_id: slot.contestant_id,
                    name: contestant.map(|c| c.name.clone()),
                    team: contestant.and_then(|c| c.team.clone()),
                    bib: contestant.map(|c| c.bib),
                    runs: vec![
                        run_view(Lane::A, slot.runs[0].as_ref()),
                        run_view(Lane::B, slot.runs[1].as_ref()),
                    ],
                    total_sec: slot.total_sec,
                }
            })
            .collect(),
    }
}

pub fn leaderboard_view(
    competition_id: &str,
    placements: &[PlacementRow],
    contestants: &HashMap<u32, Contestant>,
) -> LeaderboardView {
    LeaderboardView {
        competition_id: competition_id.to_string(),
        rows: placements
            .iter()
            .map(|row| {
                let contestant = contestants.get(&row.contestant_id);
                LeaderboardRow {
                    rank: row.rank,
                    contestant_id: row.contestant_id,
                    name: contestant.map(|c| c.name.clone()),
                    team: contestant.and_then(|c| c.team.clone()),
                    bib: contestant.map(|c| c.bib),
                    total_sec: row.total_sec,
                    stage_reached: row.stage_reached.label().to_string(),
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchSlot, RunStatus};

    fn contestants() -> HashMap<u32, Contestant> {
        [
            (
                1,
                Contestant {
                    id: 1,
                    name: "Aiko".to_string(),
                    team: Some("North".to_string()),
                    bib: 101,
                    qualification_rank: Some(1),
                },
            ),
            (
                2,
                Contestant {
                    id: 2,
                    name: "Bram".to_string(),
                    team: None,
                    bib: 102,
                    qualification_rank: Some(2),
                },
            ),
        ]
        .into_iter()
        .collect()
    }

    fn bye_match() -> Match {
        Match {
            id: 401,
            competition_id: "comp".to_string(),
            stage: Stage::QuarterFinal,
            order: 1,
            slots: [MatchSlot::seeded(1), MatchSlot::empty()],
            winner_id: Some(1),
            tied: false,
            finalized: true,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn test_bracket_view_annotates_byes_and_names() {
        let view = bracket_view("comp", "City Finals", &[bye_match()], &contestants());
        assert_eq!(view.stages.len(), 1);
        assert_eq!(view.stages[0].stage, "Quarter Final");

        let m = &view.stages[0].matches[0];
        assert!(m.bye);
        assert_eq!(m.winner_id, Some(1));
        assert_eq!(m.slots[0].name.as_deref(), Some("Aiko"));
        assert_eq!(m.slots[1].contestant_id, None);
    }

    #[test]
    fn test_match_detail_view_exposes_lane_runs() {
        let mut m = bye_match();
        m.slots[1] = MatchSlot::seeded(2);
        m.winner_id = None;
        m.finalized = false;
        m.slots[0].runs[0] = Some(Run {
            time_sec: Some(6.1),
            status: RunStatus::Valid,
        });
        m.slots[0].runs[1] = Some(Run {
            time_sec: None,
            status: RunStatus::Fall,
        });

        let view = match_detail_view(&m, &contestants());
        assert_eq!(view.slots[0].runs[0].lane, "A");
        assert_eq!(view.slots[0].runs[0].time_sec, Some(6.1));
        assert_eq!(view.slots[0].runs[1].status.as_deref(), Some("fall"));
        assert_eq!(view.slots[1].runs[0].status, None);
    }

    #[test]
    fn test_leaderboard_view_maps_rows() {
        let placements = vec![PlacementRow {
            contestant_id: 1,
            rank: Some(1),
            total_sec: Some(12.0),
            stage_reached: Stage::BigFinal,
        }];
        let view = leaderboard_view("comp", &placements, &contestants());
        assert_eq!(view.rows[0].rank, Some(1));
        assert_eq!(view.rows[0].name.as_deref(), Some("Aiko"));
        assert_eq!(view.rows[0].stage_reached, "Big Final");
    }
}
