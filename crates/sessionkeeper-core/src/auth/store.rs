//! Bearer credential storage across two durability tiers.
//!
//! Exactly one tier holds the live token: saving into one tier clears the
//! other. Storage failures are logged and otherwise ignored; a slot that
//! cannot be read is treated as empty.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::credentials::{FileSlot, KeyringSlot, MemorySlot, TokenSlot};
use crate::config::{Config, TokenBackend};

/// Whether a token outlives the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurabilityTier {
    Ephemeral,
    Persistent,
}

impl DurabilityTier {
    /// Tier implied by a "remember me" choice.
    pub fn from_remember(remember: bool) -> Self {
        if remember {
            DurabilityTier::Persistent
        } else {
            DurabilityTier::Ephemeral
        }
    }
}

pub struct TokenStore {
    persistent: Box<dyn TokenSlot>,
    ephemeral: Box<dyn TokenSlot>,
    // Serializes save/clear so a tier switch is never observed half-done.
    write_lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(persistent: Box<dyn TokenSlot>, ephemeral: Box<dyn TokenSlot>) -> Self {
        Self {
            persistent,
            ephemeral,
            write_lock: Mutex::new(()),
        }
    }

    /// Both tiers in memory. Useful for tests and embedding.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemorySlot::new()), Box::new(MemorySlot::new()))
    }

    /// Build the store described by the configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let persistent: Box<dyn TokenSlot> = match config.token_backend {
            TokenBackend::File => Box::new(FileSlot::new(config.data_dir()?)),
            TokenBackend::Keyring => Box::new(KeyringSlot::new()),
        };
        Ok(Self::new(persistent, Box::new(MemorySlot::new())))
    }

    fn slots(&self, tier: DurabilityTier) -> (&dyn TokenSlot, &dyn TokenSlot) {
        match tier {
            DurabilityTier::Persistent => (self.persistent.as_ref(), self.ephemeral.as_ref()),
            DurabilityTier::Ephemeral => (self.ephemeral.as_ref(), self.persistent.as_ref()),
        }
    }

    /// Write `token` into `tier` and clear the other tier.
    pub fn save(&self, token: &str, tier: DurabilityTier) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let (target, other) = self.slots(tier);

        if let Err(e) = target.set(token) {
            warn!(slot = target.name(), error = %e, "Failed to save token");
        }
        if let Err(e) = other.delete() {
            warn!(slot = other.name(), error = %e, "Failed to clear other tier");
        }
        debug!(?tier, slot = target.name(), "Token saved");
    }

    /// The stored token, preferring the persistent tier.
    pub fn read(&self) -> Option<String> {
        Self::read_slot(self.persistent.as_ref())
            .or_else(|| Self::read_slot(self.ephemeral.as_ref()))
    }

    /// Tier currently holding the token, if any.
    pub fn tier(&self) -> Option<DurabilityTier> {
        if Self::read_slot(self.persistent.as_ref()).is_some() {
            Some(DurabilityTier::Persistent)
        } else if Self::read_slot(self.ephemeral.as_ref()).is_some() {
            Some(DurabilityTier::Ephemeral)
        } else {
            None
        }
    }

    /// Remove the token from both tiers. Safe to call repeatedly.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        for slot in [self.persistent.as_ref(), self.ephemeral.as_ref()] {
            if let Err(e) = slot.delete() {
                warn!(slot = slot.name(), error = %e, "Failed to clear token");
            }
        }
        debug!("Token store cleared");
    }

    fn read_slot(slot: &dyn TokenSlot) -> Option<String> {
        match slot.get() {
            Ok(token) => token,
            Err(e) => {
                warn!(slot = slot.name(), error = %e, "Unreadable token slot, treating as empty");
                None
            }
        }
    }
}
