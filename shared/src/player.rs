use std::fmt;

use orm::players::{PlayerDb, PlayerProfileUpdateDb};
use serde::{Deserialize, Serialize};

/// Blockchain address identifying a player. Immutable once the player exists.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerAddress(pub String);

impl fmt::Display for PlayerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&PlayerDb> for PlayerAddress {
    fn from(player: &PlayerDb) -> Self {
        Self(player.address.clone())
    }
}

/// One entry of the ledger's holder list for the tracked asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderRecord {
    pub address: PlayerAddress,
    pub quantity: Option<u64>,
}

/// Players whose enrichment has not completed yet.
pub fn is_pending_enrichment(player: &PlayerDb) -> bool {
    player.processed_at.is_none()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}

impl From<ProfileChanges> for PlayerProfileUpdateDb {
    fn from(changes: ProfileChanges) -> Self {
        Self {
            name: changes.name,
            description: changes.description,
            latitude: changes.latitude,
            longitude: changes.longitude,
        }
    }
}
