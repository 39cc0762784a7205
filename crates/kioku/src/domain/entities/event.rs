//! Event - One entry of the append-only interaction log
//!
//! Pure domain entity without infrastructure dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::EventType;

/// Format used when events and memories are stamped for the text generator.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of a single tool execution, as recorded in a `ToolResult` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool_name: String,
    pub success: bool,
    /// Human-readable message produced by the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error text when the tool failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }

    fn render(&self) -> String {
        if self.success {
            match &self.message {
                Some(message) => format!("Tool result: {}", message),
                None => format!("Tool result: {} succeeded", self.tool_name),
            }
        } else {
            format!(
                "Tool failed: {} - {}",
                self.tool_name,
                self.error.as_deref().unwrap_or_default()
            )
        }
    }
}

/// Type-specific event body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    UserMessage {
        content: String,
    },
    AgentMessage {
        content: String,
    },
    ToolCall {
        tool_name: String,
        #[serde(default)]
        parameters: serde_json::Value,
    },
    ToolResult {
        results: Vec<ToolOutcome>,
    },
    Error {
        message: String,
    },
    System {
        content: String,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::UserMessage { .. } => EventType::UserMessage,
            Self::AgentMessage { .. } => EventType::AgentMessage,
            Self::ToolCall { .. } => EventType::ToolCall,
            Self::ToolResult { .. } => EventType::ToolResult,
            Self::Error { .. } => EventType::Error,
            Self::System { .. } => EventType::System,
        }
    }

    /// Size contribution to the context estimate, in characters.
    ///
    /// Tool results render to a bounded but variable length, so they count
    /// as a flat `tool_result_weight`.
    pub fn estimated_size(&self, tool_result_weight: usize) -> usize {
        match self {
            Self::UserMessage { content }
            | Self::AgentMessage { content }
            | Self::System { content } => content.chars().count(),
            Self::Error { message } => message.chars().count(),
            Self::ToolCall {
                tool_name,
                parameters,
            } => tool_name.chars().count() + render_parameters(parameters).chars().count(),
            Self::ToolResult { .. } => tool_result_weight,
        }
    }

    /// Render as history lines, labelling the agent's own turns with `agent_label`.
    pub fn render_lines(&self, agent_label: &str) -> Vec<String> {
        match self {
            Self::UserMessage { content } => vec![format!("User: {}", content)],
            Self::AgentMessage { content } => vec![format!("{}: {}", agent_label, content)],
            Self::ToolCall {
                tool_name,
                parameters,
            } => vec![format!(
                "Tool call: {}({})",
                tool_name,
                render_parameters(parameters)
            )],
            Self::ToolResult { results } => results.iter().map(ToolOutcome::render).collect(),
            Self::Error { message } => vec![format!("Error: {}", message)],
            Self::System { content } => vec![format!("System: {}", content)],
        }
    }
}

fn render_parameters(parameters: &serde_json::Value) -> String {
    match parameters {
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Event - An immutable interaction record
///
/// Only the event log creates events; consumers receive clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    seq: u64,
    timestamp: DateTime<Utc>,
    payload: EventPayload,
}

impl Event {
    pub(crate) fn new(seq: u64, timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }

    /// Insertion sequence number within the owning log
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn estimated_size(&self, tool_result_weight: usize) -> usize {
        self.payload.estimated_size(tool_result_weight)
    }

    /// Time-stamped lines for the summarization prompt
    pub fn archive_lines(&self) -> Vec<String> {
        let stamp = self.timestamp.format(TIMESTAMP_FORMAT);
        self.payload
            .render_lines("Assistant")
            .into_iter()
            .map(|line| format!("[{}] {}", stamp, line))
            .collect()
    }
}

/// Sum of the size estimates of a batch of events
pub fn estimate_events_size(events: &[Event], tool_result_weight: usize) -> usize {
    events
        .iter()
        .map(|e| e.estimated_size(tool_result_weight))
        .sum()
}
