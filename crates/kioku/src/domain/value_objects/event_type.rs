//! EventType - Classification of interaction log entries

use serde::{Deserialize, Serialize};

/// Event type classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserMessage,
    AgentMessage,
    ToolCall,
    ToolResult,
    Error,
    System,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::UserMessage,
        EventType::AgentMessage,
        EventType::ToolCall,
        EventType::ToolResult,
        EventType::Error,
        EventType::System,
    ];
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::UserMessage => write!(f, "user_message"),
            EventType::AgentMessage => write!(f, "agent_message"),
            EventType::ToolCall => write!(f, "tool_call"),
            EventType::ToolResult => write!(f, "tool_result"),
            EventType::Error => write!(f, "error"),
            EventType::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user_message" => Ok(EventType::UserMessage),
            "agent_message" => Ok(EventType::AgentMessage),
            "tool_call" => Ok(EventType::ToolCall),
            "tool_result" => Ok(EventType::ToolResult),
            "error" => Ok(EventType::Error),
            "system" => Ok(EventType::System),
            _ => Err(format!("Unknown event type: {}", s)),
        }
    }
}
