//! Core domain types for character lookups.

use serde::{Deserialize, Serialize};

use crate::error::LodebotError;

// ---------------------------------------------------------------------------
// CharacterId
// ---------------------------------------------------------------------------

/// Opaque upstream character identifier. Upstream is the source of truth; we
/// only require that it is a non-empty run of ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(String);

impl CharacterId {
    /// Borrow the identifier as it appears in upstream URLs.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CharacterId {
    type Err = LodebotError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LodebotError::invalid_argument(format!(
                "character id must be numeric, got '{s}'"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<u64> for CharacterId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// Result of a successful resolution. Never cached or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    /// Honorific title, if the character has one equipped.
    pub title: Option<String>,
    pub nameday: String,
    pub avatar_url: String,
    /// `None` means unaffiliated.
    pub grand_company: Option<GrandCompany>,
    pub active_job: ActiveJob,
    /// One entry per progression track, in upstream order.
    pub jobs: Vec<Job>,
}

/// Grand Company affiliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrandCompany {
    pub id: u32,
    pub name: String,
}

/// The currently equipped progression entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveJob {
    pub name: String,
    pub level: u32,
}

/// One progression track. `class_id` drives role classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub class_id: u32,
    pub level: u32,
    pub name: String,
}

/// Transient stage-1 search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub id: CharacterId,
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// RoleBucket
// ---------------------------------------------------------------------------

/// The seven fixed display categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleBucket {
    Tank,
    Healer,
    MeleeDps,
    RangedPhysicalDps,
    RangedMagicalDps,
    Crafter,
    Gatherer,
}

impl RoleBucket {
    /// All buckets in display order.
    pub const ALL: [RoleBucket; 7] = [
        Self::Tank,
        Self::Healer,
        Self::MeleeDps,
        Self::RangedPhysicalDps,
        Self::RangedMagicalDps,
        Self::Crafter,
        Self::Gatherer,
    ];

    /// Heading used when rendering the bucket.
    pub fn label(self) -> &'static str {
        match self {
            Self::Tank => "Tank",
            Self::Healer => "Healer",
            Self::MeleeDps => "Melee DPS",
            Self::RangedPhysicalDps => "Physical Ranged DPS",
            Self::RangedMagicalDps => "Magical Ranged DPS",
            Self::Crafter => "Crafter",
            Self::Gatherer => "Gatherer",
        }
    }

    /// Position in [`RoleBucket::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for RoleBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for RoleBucket {
    type Err = LodebotError;

    /// Accepts the variant name in any case, with or without separators
    /// (`"RangedMagicalDPS"`, `"ranged-magical-dps"`, `"melee_dps"`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "tank" => Ok(Self::Tank),
            "healer" => Ok(Self::Healer),
            "melee" | "meleedps" => Ok(Self::MeleeDps),
            "rangedphysical" | "rangedphysicaldps" | "physicalrangeddps" => {
                Ok(Self::RangedPhysicalDps)
            }
            "rangedmagical" | "rangedmagicaldps" | "magicalrangeddps" | "caster" => {
                Ok(Self::RangedMagicalDps)
            }
            "crafter" => Ok(Self::Crafter),
            "gatherer" => Ok(Self::Gatherer),
            _ => Err(LodebotError::parse(format!("unknown role bucket '{s}'"))),
        }
    }
}
