//! Storage slots backing the two durability tiers.
//!
//! A slot holds at most one token. `MemorySlot` backs the ephemeral tier;
//! `FileSlot` and `KeyringSlot` back the persistent tier.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};

use crate::config::APP_NAME;

/// Keychain account name for the persistent token.
const KEYRING_ACCOUNT: &str = "persistent-token";

/// Persistent token file name
const TOKEN_FILE: &str = "token.json";

pub trait TokenSlot: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    fn get(&self) -> Result<Option<String>>;

    fn set(&self, token: &str) -> Result<()>;

    /// Remove the token. Deleting an empty slot succeeds.
    fn delete(&self) -> Result<()>;
}

/// Process-lifetime slot.
#[derive(Default)]
pub struct MemorySlot {
    value: Mutex<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.value.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenSlot for MemorySlot {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self) -> Result<Option<String>> {
        Ok(self.lock().clone())
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.lock() = Some(token.to_string());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        *self.lock() = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: String,
}

/// JSON file slot. Read from disk on every access so that another process
/// clearing the file is seen immediately.
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }
}

impl TokenSlot for FileSlot {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        let file: TokenFile =
            serde_json::from_str(&contents).context("Failed to parse token file")?;
        Ok(Some(file.token).filter(|t| !t.is_empty()))
    }

    fn set(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).context("Failed to create token directory")?;
        let contents = serde_json::to_string(&TokenFile {
            token: token.to_string(),
        })?;
        // Write then rename so a reader never sees a half-written file.
        let tmp = self.dir.join(format!("{}.tmp", TOKEN_FILE));
        std::fs::write(&tmp, contents).context("Failed to write token file")?;
        std::fs::rename(&tmp, self.path()).context("Failed to replace token file")?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to delete token file")?;
        }
        Ok(())
    }
}

/// OS keychain slot.
pub struct KeyringSlot {
    service: String,
}

impl KeyringSlot {
    pub fn new() -> Self {
        Self {
            service: APP_NAME.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, KEYRING_ACCOUNT).context("Failed to create keyring entry")
    }
}

impl Default for KeyringSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSlot for KeyringSlot {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn get(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn delete(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}
