use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::scoring::{resolve_winner, WinnerDecision};
use crate::types::{Contestant, Match, MatchSlot, Stage, MAX_BRACKET_SIZE};

/// Standard seeding order for a bracket of `size` slots: 1 vs size,
/// 2 vs size-1, ... arranged so the top seeds can only meet in the final.
pub fn seed_positions(size: u32) -> Vec<u32> {
  let mut seeds = vec![1u32];
  while seeds.len() < size as usize {
    let n = seeds.len() as u32;
    let mut next = Vec::with_capacity(seeds.len() * 2);
    for seed in seeds.iter().copied() {
      next.push(seed);
      next.push((n * 2 + 1).saturating_sub(seed));
    }
    seeds = next;
  }
  seeds
}

pub fn next_power_of_two(n: usize) -> usize {
  let value = n.max(1);
  if value.is_power_of_two() {
    return value;
  }
  value.next_power_of_two()
}

/// Contestant ids in seed order. Unique positive qualification ranks are
/// honored; contestants without one (or with a duplicate) fill the lowest
/// free rank in input order.
pub fn seed_order(contestants: &[Contestant]) -> Vec<u32> {
  let mut used_ranks = HashSet::new();
  let mut assigned: Vec<(u32, u32)> = Vec::with_capacity(contestants.len());

  for contestant in contestants {
    let rank = contestant
      .qualification_rank
      .filter(|r| *r > 0 && !used_ranks.contains(r));
    let final_rank = if let Some(rank) = rank {
      used_ranks.insert(rank);
      rank
    } else {
      0
    };
    assigned.push((contestant.id, final_rank));
  }

  let mut next_rank = 1u32;
  for (_, rank) in assigned.iter_mut() {
    if *rank != 0 {
      continue;
    }
    while used_ranks.contains(&next_rank) {
      next_rank += 1;
    }
    *rank = next_rank;
    used_ranks.insert(next_rank);
    next_rank += 1;
  }

  assigned.sort_by_key(|(_, rank)| *rank);
  assigned.into_iter().map(|(id, _)| id).collect()
}

fn stage_code(stage: Stage) -> u64 {
  match stage {
    Stage::RoundOf64 => 1,
    Stage::RoundOf32 => 2,
    Stage::RoundOf16 => 3,
    Stage::QuarterFinal => 4,
    Stage::SemiFinal => 5,
    Stage::SmallFinal => 6,
    Stage::BigFinal => 7,
  }
}

/// Deterministic match id. Re-deriving a stage from identical stored state
/// therefore produces the identical match set.
pub fn match_id_for(stage: Stage, order: u32) -> u64 {
  stage_code(stage) * 100 + order as u64
}

/// Walkovers are decided at creation: winner set, finalized, zero runs.
pub fn resolve_bye(m: &mut Match) {
  if let WinnerDecision::Bye(winner) = resolve_winner(m) {
    m.winner_id = Some(winner);
    m.finalized = true;
  }
}

fn slot_for_seed(order: &[u32], seed: usize) -> MatchSlot {
  order
    .get(seed - 1)
    .copied()
    .map(MatchSlot::seeded)
    .unwrap_or_else(MatchSlot::empty)
}

/// Seed Round 1 from qualification-ranked contestants. Seed slots beyond
/// the field become BYEs, resolved immediately.
pub fn build_round_one(
  competition_id: &str,
  contestants: &[Contestant],
  now_ms: u64,
) -> Result<Vec<Match>> {
  if contestants.is_empty() {
    return Err(Error::Precondition(
      "Cannot build a bracket with zero contestants.".to_string(),
    ));
  }
  let order = seed_order(contestants);
  let size = next_power_of_two(order.len().max(2));
  if size > MAX_BRACKET_SIZE {
    return Err(Error::Precondition(format!(
      "Field of {} needs a bracket of {size}; the maximum supported is {MAX_BRACKET_SIZE}.",
      order.len()
    )));
  }
  let stage = Stage::for_bracket_size(size).ok_or_else(|| {
    Error::Precondition(format!("No stage mapping for bracket size {size}."))
  })?;

  let seeds = seed_positions(size as u32);
  let mut out = Vec::with_capacity(size / 2);
  for i in 0..(size / 2) {
    let mut slot_a = slot_for_seed(&order, seeds[i * 2] as usize);
    let mut slot_b = slot_for_seed(&order, seeds[i * 2 + 1] as usize);
    if slot_a.contestant_id.is_none() {
      std::mem::swap(&mut slot_a, &mut slot_b);
    }
    if slot_a.contestant_id.is_none() {
      return Err(Error::Precondition(
        "Seeding produced a pairing with no contestants.".to_string(),
      ));
    }
    let order_in_stage = (i + 1) as u32;
    let mut m = Match {
      id: match_id_for(stage, order_in_stage),
      competition_id: competition_id.to_string(),
      stage,
      order: order_in_stage,
      slots: [slot_a, slot_b],
      winner_id: None,
      tied: false,
      finalized: false,
      updated_at_ms: now_ms,
    };
    resolve_bye(&mut m);
    out.push(m);
  }
  Ok(out)
}

/// Pair a finished stage's winners into the next stage. Advancing the
/// semifinals additionally pairs the two losers into the Small Final; a BYE
/// semifinal yields no loser, so its Small Final slot is itself a BYE.
///
/// Pure: the caller is responsible for the existing-next-stage guard and
/// the atomic write.
pub fn advance_stage(stage: Stage, stage_matches: &[Match], now_ms: u64) -> Result<Vec<Match>> {
  if stage.is_final() {
    return Err(Error::Precondition(format!("{} does not advance.", stage.label())));
  }
  let next = stage
    .next()
    .ok_or_else(|| Error::Precondition(format!("{} has no next stage.", stage.label())))?;

  let mut ordered: Vec<&Match> = stage_matches.iter().collect();
  ordered.sort_by_key(|m| m.order);
  if ordered.is_empty() {
    return Err(Error::Precondition(format!("No matches found for {}.", stage.label())));
  }
  if ordered.len() % 2 != 0 {
    return Err(Error::Precondition(format!(
      "{} has {} matches; expected an even count.",
      stage.label(),
      ordered.len()
    )));
  }
  if let Some(m) = ordered.iter().find(|m| m.winner_id.is_none()) {
    return Err(Error::Precondition(format!(
      "{} match {} has no winner yet.",
      stage.label(),
      m.order
    )));
  }

  let competition_id = ordered[0].competition_id.clone();
  let mut out = Vec::new();

  if stage == Stage::SemiFinal {
    let losers: Vec<u32> = ordered.iter().filter_map(|m| m.loser_id()).collect();
    if !losers.is_empty() {
      let slot_a = MatchSlot::seeded(losers[0]);
      let slot_b = losers
        .get(1)
        .copied()
        .map(MatchSlot::seeded)
        .unwrap_or_else(MatchSlot::empty);
      let mut small = Match {
        id: match_id_for(Stage::SmallFinal, 1),
        competition_id: competition_id.clone(),
        stage: Stage::SmallFinal,
        order: 1,
        slots: [slot_a, slot_b],
        winner_id: None,
        tied: false,
        finalized: false,
        updated_at_ms: now_ms,
      };
      resolve_bye(&mut small);
      out.push(small);
    }
  }

  for (k, pair) in ordered.chunks(2).enumerate() {
    let (Some(a), Some(b)) = (pair[0].winner_id, pair[1].winner_id) else {
      return Err(Error::Precondition(format!(
        "{} pairing is missing a winner.",
        stage.label()
      )));
    };
    let order_in_stage = (k + 1) as u32;
    out.push(Match {
      id: match_id_for(next, order_in_stage),
      competition_id: competition_id.clone(),
      stage: next,
      order: order_in_stage,
      slots: [MatchSlot::seeded(a), MatchSlot::seeded(b)],
      winner_id: None,
      tied: false,
      finalized: false,
      updated_at_ms: now_ms,
    });
  }

  Ok(out)
}
