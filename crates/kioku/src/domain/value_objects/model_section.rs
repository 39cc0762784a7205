//! ModelSection - The three strata of the long-term cognitive model

use serde::{Deserialize, Serialize};

/// Section of the long-term cognitive model, ordered by volatility
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModelSection {
    /// Near-immutable traits and relationship principles
    Bedrock,
    /// Slowly shifting long-run patterns
    Evolutionary,
    /// Time-stamped facts that get superseded
    Dynamic,
}

impl ModelSection {
    pub const ALL: [ModelSection; 3] = [
        ModelSection::Bedrock,
        ModelSection::Evolutionary,
        ModelSection::Dynamic,
    ];

    /// Tag name used in the model text (`<Bedrock>...</Bedrock>`)
    pub fn tag(&self) -> &'static str {
        match self {
            ModelSection::Bedrock => "Bedrock",
            ModelSection::Evolutionary => "Evolutionary",
            ModelSection::Dynamic => "Dynamic",
        }
    }
}

impl std::fmt::Display for ModelSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
