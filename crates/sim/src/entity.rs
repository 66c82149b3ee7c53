use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Ensures future ids are strictly greater than `id`.
    pub fn reserve_through(&mut self, id: EntityId) {
        self.next = self.next.max(id.0.saturating_add(1));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Player,
    Slime,
    Cow,
    Krumblid,
    Serpent,
    Guardian,
    GuardianSpikyBall,
    GuardianGemFragment,
    GuardianShockwave,
    Boulder,
}

impl EntityType {
    /// Decorative entities never become vision candidates.
    pub fn excluded_from_vision(self) -> bool {
        matches!(self, Self::Boulder)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Slime => "slime",
            Self::Cow => "cow",
            Self::Krumblid => "krumblid",
            Self::Serpent => "serpent",
            Self::Guardian => "guardian",
            Self::GuardianSpikyBall => "guardian_spiky_ball",
            Self::GuardianGemFragment => "guardian_gem_fragment",
            Self::GuardianShockwave => "guardian_shockwave",
            Self::Boulder => "boulder",
        }
    }
}
