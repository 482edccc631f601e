use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{Contestant, Match, Stage};

/// One line of the derived tournament placement. `rank` stays `None` for
/// contestants whose bucket is not resolved yet — never guessed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRow {
  pub contestant_id: u32,
  pub rank: Option<u32>,
  pub total_sec: Option<f64>,
  pub stage_reached: Stage,
}

struct BucketEntry {
  contestant_id: u32,
  total_sec: Option<f64>,
  qualification_rank: Option<u32>,
}

/// Within a bucket: ascending total time, DNF (no total) after every timed
/// contestant, remaining ties by qualification rank, then contestant id.
fn compare_bucket(a: &BucketEntry, b: &BucketEntry) -> Ordering {
  let by_total = match (a.total_sec, b.total_sec) {
    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  };
  by_total
    .then_with(|| {
      let qa = a.qualification_rank.unwrap_or(u32::MAX);
      let qb = b.qualification_rank.unwrap_or(u32::MAX);
      qa.cmp(&qb)
    })
    .then_with(|| a.contestant_id.cmp(&b.contestant_id))
}

/// Derive ranks 1..N from whatever bracket state is resolved.
///
/// Buckets, most specific first: Big Final winner/loser (1/2), Small Final
/// winner/loser (3/4), then per earlier stage the contestants eliminated
/// there and absent from every later stage. Each bucket reserves its rank
/// positions even while unresolved, so later buckets keep their offsets;
/// an elimination bucket only resolves once every match of its stage has a
/// winner and the following stage has been materialized.
pub fn compute_placements(
  matches: &[Match],
  contestants: &HashMap<u32, Contestant>,
) -> Vec<PlacementRow> {
  let mut by_stage: BTreeMap<Stage, Vec<&Match>> = BTreeMap::new();
  let mut participants: BTreeMap<Stage, HashSet<u32>> = BTreeMap::new();
  let mut furthest: HashMap<u32, (Stage, Option<f64>)> = HashMap::new();

  for m in matches {
    by_stage.entry(m.stage).or_default().push(m);
    for slot in &m.slots {
      if let Some(id) = slot.contestant_id {
        participants.entry(m.stage).or_default().insert(id);
        let entry = furthest.entry(id).or_insert((m.stage, slot.total_sec));
        if m.stage >= entry.0 {
          *entry = (m.stage, slot.total_sec);
        }
      }
    }
  }

  let mut ranks: HashMap<u32, u32> = HashMap::new();
  let mut next_rank: u32 = 1;

  for stage in [Stage::BigFinal, Stage::SmallFinal] {
    let Some(stage_matches) = by_stage.get(&stage) else {
      continue;
    };
    for m in stage_matches {
      let count = m.participants().count() as u32;
      if let Some(winner) = m.winner_id {
        ranks.insert(winner, next_rank);
        if let Some(loser) = m.loser_id() {
          ranks.insert(loser, next_rank + 1);
        }
      }
      next_rank += count;
    }
  }

  for stage in [
    Stage::SemiFinal,
    Stage::QuarterFinal,
    Stage::RoundOf16,
    Stage::RoundOf32,
    Stage::RoundOf64,
  ] {
    let Some(stage_matches) = by_stage.get(&stage) else {
      continue;
    };
    let later: HashSet<u32> = participants
      .iter()
      .filter(|(s, _)| **s > stage)
      .flat_map(|(_, set)| set.iter().copied())
      .collect();

    let mut members: Vec<BucketEntry> = Vec::new();
    for m in stage_matches {
      for slot in &m.slots {
        if let Some(id) = slot.contestant_id {
          if !later.contains(&id) {
            members.push(BucketEntry {
              contestant_id: id,
              total_sec: slot.total_sec,
              qualification_rank: contestants.get(&id).and_then(|c| c.qualification_rank),
            });
          }
        }
      }
    }

    let stage_complete = stage_matches.iter().all(|m| m.winner_id.is_some());
    let next_materialized = participants.keys().any(|s| *s > stage);
    if stage_complete && next_materialized {
      members.sort_by(compare_bucket);
      for (i, entry) in members.iter().enumerate() {
        ranks.insert(entry.contestant_id, next_rank + i as u32);
      }
    }
    next_rank += members.len() as u32;
  }

  let mut rows: Vec<PlacementRow> = furthest
    .iter()
    .map(|(id, (stage, total))| PlacementRow {
      contestant_id: *id,
      rank: ranks.get(id).copied(),
      total_sec: *total,
      stage_reached: *stage,
    })
    .collect();

  rows.sort_by(|a, b| match (a.rank, b.rank) {
    (Some(x), Some(y)) => x.cmp(&y),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => {
      let qual = |row: &PlacementRow| {
        contestants
          .get(&row.contestant_id)
          .and_then(|c| c.qualification_rank)
          .unwrap_or(u32::MAX)
      };
      b.stage_reached
        .cmp(&a.stage_reached)
        .then_with(|| qual(a).cmp(&qual(b)))
        .then_with(|| a.contestant_id.cmp(&b.contestant_id))
    }
  });
  rows
}
