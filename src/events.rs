use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{Stage, EVENT_CHANNEL_CAPACITY};

/// Typed domain events, delivered at-least-once per competition. Payloads
/// carry ids only — consumers re-pull the projections they care about
/// instead of trusting event contents, so duplicated or dropped deliveries
/// delay but never corrupt what they show.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum DomainEvent {
    MatchUpdated {
        competition_id: String,
        match_id: u64,
    },
    RoundAdvanced {
        competition_id: String,
        stage: Stage,
    },
}

impl DomainEvent {
    pub fn competition_id(&self) -> &str {
        match self {
            DomainEvent::MatchUpdated { competition_id, .. } => competition_id,
            DomainEvent::RoundAdvanced { competition_id, .. } => competition_id,
        }
    }
}

/// Per-competition broadcast channels. Subscribers that lag past the
/// channel capacity observe `RecvError::Lagged` and must force a full
/// re-fetch, same as after a transport reconnect.
#[derive(Default)]
pub struct EventHub {
    channels: Mutex<HashMap<String, broadcast::Sender<DomainEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        EventHub::default()
    }

    pub fn subscribe(&self, competition_id: &str) -> broadcast::Receiver<DomainEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(competition_id.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn emit(&self, event: DomainEvent) {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = channels.get(event.competition_id()) {
            // Nobody listening is fine; events are a refresh signal.
            let _ = tx.send(event);
        }
    }
}
