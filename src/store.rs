use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::types::{Lane, Match, Run, Stage};

/// Persistence seam for Match entities. The engine only ever talks to this
/// trait; swapping in a database-backed store does not touch the bracket
/// logic.
pub trait MatchStore: Send + Sync {
    fn matches_by_competition(&self, competition_id: &str) -> Result<Vec<Match>>;

    fn matches_by_stage(&self, competition_id: &str, stage: Stage) -> Result<Vec<Match>>;

    fn get_match(&self, competition_id: &str, match_id: u64) -> Result<Match>;

    /// Record one lane run for one contestant. Rejected once the match is
    /// finalized — corrections to a decided match go through a rebuild.
    fn update_match_run(
        &self,
        competition_id: &str,
        match_id: u64,
        contestant_id: u32,
        lane: Lane,
        run: Run,
        now_ms: u64,
    ) -> Result<Match>;

    /// Cache both slots' aggregated totals.
    fn set_totals(
        &self,
        competition_id: &str,
        match_id: u64,
        totals: [Option<f64>; 2],
        now_ms: u64,
    ) -> Result<Match>;

    fn set_winner(
        &self,
        competition_id: &str,
        match_id: u64,
        winner_id: Option<u32>,
        tied: bool,
        finalized: bool,
        now_ms: u64,
    ) -> Result<Match>;

    /// Insert a batch atomically: either every match is created or none is.
    fn create_matches(&self, competition_id: &str, matches: Vec<Match>) -> Result<()>;

    /// Whether any match exists at a stage later than `stage`.
    fn exists_next_stage(&self, competition_id: &str, stage: Stage) -> Result<bool>;

    /// Remove every match of the competition. Only the explicit bracket
    /// rebuild calls this.
    fn wipe_competition(&self, competition_id: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryMatchStore {
    state: Mutex<HashMap<String, HashMap<u64, Match>>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        InMemoryMatchStore::default()
    }

    fn with_match<F, R>(&self, competition_id: &str, match_id: u64, f: F) -> Result<R>
    where
        F: FnOnce(&mut Match) -> Result<R>,
    {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let matches = state
            .get_mut(competition_id)
            .ok_or_else(|| Error::NotFound(format!("Competition {competition_id} not found.")))?;
        let m = matches
            .get_mut(&match_id)
            .ok_or_else(|| Error::NotFound(format!("Match {match_id} not found.")))?;
        f(m)
    }
}

impl MatchStore for InMemoryMatchStore {
    fn matches_by_competition(&self, competition_id: &str) -> Result<Vec<Match>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<Match> = state
            .get(competition_id)
            .map(|matches| matches.values().cloned().collect())
            .unwrap_or_default();
        out.sort_by_key(|m| (m.stage, m.order));
        Ok(out)
    }

    fn matches_by_stage(&self, competition_id: &str, stage: Stage) -> Result<Vec<Match>> {
        let mut out = self.matches_by_competition(competition_id)?;
        out.retain(|m| m.stage == stage);
        Ok(out)
    }

    fn get_match(&self, competition_id: &str, match_id: u64) -> Result<Match> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .get(competition_id)
            .and_then(|matches| matches.get(&match_id))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Match {match_id} not found.")))
    }

    fn update_match_run(
        &self,
        competition_id: &str,
        match_id: u64,
        contestant_id: u32,
        lane: Lane,
        run: Run,
        now_ms: u64,
    ) -> Result<Match> {
        self.with_match(competition_id, match_id, |m| {
            if m.finalized {
                return Err(Error::Conflict(format!(
                    "Match {match_id} is already decided; correcting it requires a bracket rebuild."
                )));
            }
            let slot_index = m.slot_of(contestant_id).ok_or_else(|| {
                Error::Validation(format!(
                    "Contestant {contestant_id} is not in match {match_id}."
                ))
            })?;
            m.slots[slot_index].runs[lane.index()] = Some(run);
            m.updated_at_ms = now_ms;
            Ok(m.clone())
        })
    }

    fn set_totals(
        &self,
        competition_id: &str,
        match_id: u64,
        totals: [Option<f64>; 2],
        now_ms: u64,
    ) -> Result<Match> {
        self.with_match(competition_id, match_id, |m| {
            m.slots[0].total_sec = totals[0];
            m.slots[1].total_sec = totals[1];
            m.updated_at_ms = now_ms;
            Ok(m.clone())
        })
    }

    fn set_winner(
        &self,
        competition_id: &str,
        match_id: u64,
        winner_id: Option<u32>,
        tied: bool,
        finalized: bool,
        now_ms: u64,
    ) -> Result<Match> {
        self.with_match(competition_id, match_id, |m| {
            if let Some(winner) = winner_id {
                if m.slot_of(winner).is_none() {
                    return Err(Error::Validation(format!(
                        "Contestant {winner} is not in match {match_id}."
                    )));
                }
            }
            m.winner_id = winner_id;
            m.tied = tied;
            m.finalized = finalized;
            m.updated_at_ms = now_ms;
            Ok(m.clone())
        })
    }

    fn create_matches(&self, competition_id: &str, matches: Vec<Match>) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let existing = state.entry(competition_id.to_string()).or_default();
        if let Some(m) = matches.iter().find(|m| existing.contains_key(&m.id)) {
            return Err(Error::Conflict(format!(
                "Match {} already exists; refusing a partial write.",
                m.id
            )));
        }
        for m in matches {
            existing.insert(m.id, m);
        }
        Ok(())
    }

    fn exists_next_stage(&self, competition_id: &str, stage: Stage) -> Result<bool> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .get(competition_id)
            .map(|matches| matches.values().any(|m| m.stage > stage))
            .unwrap_or(false))
    }

    fn wipe_competition(&self, competition_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.remove(competition_id);
        Ok(())
    }
}
