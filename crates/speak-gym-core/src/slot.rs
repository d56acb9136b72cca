use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A logical drill context with its own capture and feedback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Repeat a reference sentence.
    Shadow,
    /// Swap slot words in a base sentence.
    Substitution,
    /// Grow a seed line with connectors and detail.
    Expansion,
    /// Guided role-play dialog.
    Review,
}

impl Slot {
    /// Every slot, in menu order.
    pub const ALL: [Slot; 4] = [Slot::Shadow, Slot::Substitution, Slot::Expansion, Slot::Review];

    /// Lowercase name used in endpoint paths and commands.
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Shadow => "shadow",
            Slot::Substitution => "substitution",
            Slot::Expansion => "expansion",
            Slot::Review => "review",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shadow" => Ok(Slot::Shadow),
            "substitution" | "sub" => Ok(Slot::Substitution),
            "expansion" | "expand" => Ok(Slot::Expansion),
            "review" => Ok(Slot::Review),
            other => Err(format!("unknown drill '{}'", other)),
        }
    }
}
