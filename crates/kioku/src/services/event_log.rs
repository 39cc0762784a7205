//! Event Log - Append-only interaction record
//!
//! Owned by one conversation. Events leave the log only through `clear`
//! or `evict_oldest`; consumers always get copies.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::{estimate_events_size, Event, EventPayload, ToolOutcome};
use crate::domain::value_objects::EventType;

/// Summary counters for a log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLogStats {
    pub count: usize,
    pub per_type: BTreeMap<EventType, usize>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

/// Ordered, append-only event log
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
    next_seq: u64,
    latest: Option<DateTime<Utc>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event stamped with the current time.
    ///
    /// Stamps never go backwards: if the clock is behind the newest event,
    /// the newest timestamp is reused and insertion order breaks the tie.
    pub fn append(&mut self, payload: EventPayload) -> Event {
        let now = Utc::now();
        let timestamp = match self.latest {
            Some(latest) if latest > now => latest,
            _ => now,
        };
        self.push(timestamp, payload)
    }

    /// Append an event with an explicit timestamp (replaying recorded history)
    pub fn append_at(&mut self, payload: EventPayload, timestamp: DateTime<Utc>) -> Event {
        self.push(timestamp, payload)
    }

    fn push(&mut self, timestamp: DateTime<Utc>, payload: EventPayload) -> Event {
        let event = Event::new(self.next_seq, timestamp, payload);
        self.next_seq += 1;
        self.latest = Some(self.latest.map_or(timestamp, |t| t.max(timestamp)));
        self.events.push(event.clone());
        event
    }

    pub fn append_user_message(&mut self, content: impl Into<String>) -> Event {
        self.append(EventPayload::UserMessage {
            content: content.into(),
        })
    }

    pub fn append_agent_message(&mut self, content: impl Into<String>) -> Event {
        self.append(EventPayload::AgentMessage {
            content: content.into(),
        })
    }

    pub fn append_tool_call(
        &mut self,
        tool_name: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Event {
        self.append(EventPayload::ToolCall {
            tool_name: tool_name.into(),
            parameters,
        })
    }

    pub fn append_tool_result(&mut self, results: Vec<ToolOutcome>) -> Event {
        self.append(EventPayload::ToolResult { results })
    }

    pub fn append_error(&mut self, message: impl Into<String>) -> Event {
        self.append(EventPayload::Error {
            message: message.into(),
        })
    }

    pub fn append_system(&mut self, content: impl Into<String>) -> Event {
        self.append(EventPayload::System {
            content: content.into(),
        })
    }

    /// Copy of every event in insertion order
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.clone()
    }

    pub fn filter_by_type(&self, event_type: EventType) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// The last `n` events in insertion order
    pub fn recent(&self, n: usize) -> Vec<Event> {
        let start = self.events.len().saturating_sub(n);
        self.events[start..].to_vec()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.latest = None;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn stats(&self) -> EventLogStats {
        let mut per_type = BTreeMap::new();
        for event in &self.events {
            *per_type.entry(event.event_type()).or_insert(0) += 1;
        }

        EventLogStats {
            count: self.events.len(),
            per_type,
            first_timestamp: self.events.first().map(Event::timestamp),
            last_timestamp: self.events.last().map(Event::timestamp),
        }
    }

    /// Estimated rendered size of the whole log
    pub fn estimate_size(&self, tool_result_weight: usize) -> usize {
        estimate_events_size(&self.events, tool_result_weight)
    }

    /// Remove the `count` oldest events by timestamp (ties by insertion order).
    ///
    /// Survivors keep their relative order. Removed events are returned
    /// oldest first.
    pub fn evict_oldest(&mut self, count: usize) -> Vec<Event> {
        if count == 0 || self.events.is_empty() {
            return Vec::new();
        }

        let mut by_age: Vec<(DateTime<Utc>, u64)> = self
            .events
            .iter()
            .map(|e| (e.timestamp(), e.seq()))
            .collect();
        by_age.sort_unstable();
        let doomed: HashSet<u64> = by_age.iter().take(count).map(|(_, seq)| *seq).collect();

        let (mut removed, kept): (Vec<Event>, Vec<Event>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|e| doomed.contains(&e.seq()));
        self.events = kept;

        removed.sort_by_key(|e| (e.timestamp(), e.seq()));
        removed
    }
}
