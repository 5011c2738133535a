//! Runtime fact storage shared across workers (`storage/runtime.json`).
//!
//! Every read loads the whole record from disk and every write is a
//! read-modify-write of the whole record, landed via temp file + rename.
//! There is no locking: two workers updating different keys at the same time
//! can lose one of the updates (last writer wins per record).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::types::{FactKey, FactValue};
use crate::io::atomic_file::write_atomic;

/// Default location relative to the suite root.
pub const DEFAULT_STORE_PATH: &str = "storage/runtime.json";

/// Persisted runtime facts. Absent fields are unknown, not false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verified: Option<bool>,
}

impl RuntimeRecord {
    pub fn get(&self, key: FactKey) -> Option<FactValue> {
        match key {
            FactKey::GroupName => self.group_name.clone().map(FactValue::Text),
            FactKey::ChatMessage => self.chat_message.clone().map(FactValue::Text),
            FactKey::UserEmail => self.user_email.clone().map(FactValue::Text),
            FactKey::UserVerified => self.user_verified.map(FactValue::Flag),
        }
    }

    /// Replace one field. Fails when the value kind does not fit the key.
    pub fn set(&mut self, key: FactKey, value: FactValue) -> Result<()> {
        match (key, value) {
            (FactKey::GroupName, FactValue::Text(v)) => self.group_name = Some(v),
            (FactKey::ChatMessage, FactValue::Text(v)) => self.chat_message = Some(v),
            (FactKey::UserEmail, FactValue::Text(v)) => self.user_email = Some(v),
            (FactKey::UserVerified, FactValue::Flag(v)) => self.user_verified = Some(v),
            (key, value) => {
                return Err(anyhow!(
                    "{key} does not accept {:?} value {value:?}",
                    value.kind()
                ));
            }
        }
        Ok(())
    }
}

/// File-backed runtime store. Cheap to clone; holds only the path.
#[derive(Debug, Clone)]
pub struct RuntimeStore {
    path: PathBuf,
}

impl RuntimeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole record. A missing file is an empty record.
    pub fn snapshot(&self) -> Result<RuntimeRecord> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "runtime store missing, treating as empty");
                return Ok(RuntimeRecord::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read runtime store {}", self.path.display()));
            }
        };
        serde_json::from_str(&contents)
            .with_context(|| format!("parse runtime store {}", self.path.display()))
    }

    /// Read one fact. `Ok(None)` means not found.
    pub fn read(&self, key: FactKey) -> Result<Option<FactValue>> {
        Ok(self.snapshot()?.get(key))
    }

    /// Replace one fact (whole-record read, mutate, atomic write).
    pub fn write(&self, key: FactKey, value: FactValue) -> Result<()> {
        info!(%key, %value, "saving runtime fact");
        let mut record = self.snapshot()?;
        record.set(key, value)?;
        self.write_record(&record)
    }

    /// Delete the backing file. Used between full suite runs.
    pub fn reset(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("remove runtime store {}", self.path.display()))
            }
        }
    }

    pub fn save_group_name(&self, name: &str) -> Result<()> {
        self.write(FactKey::GroupName, FactValue::Text(name.to_string()))
    }

    pub fn group_name(&self) -> Result<Option<String>> {
        Ok(self.snapshot()?.group_name)
    }

    pub fn save_chat_message(&self, message: &str) -> Result<()> {
        self.write(FactKey::ChatMessage, FactValue::Text(message.to_string()))
    }

    pub fn chat_message(&self) -> Result<Option<String>> {
        Ok(self.snapshot()?.chat_message)
    }

    pub fn save_user_email(&self, email: &str) -> Result<()> {
        self.write(FactKey::UserEmail, FactValue::Text(email.to_string()))
    }

    pub fn user_email(&self) -> Result<Option<String>> {
        Ok(self.snapshot()?.user_email)
    }

    pub fn save_user_verified(&self, verified: bool) -> Result<()> {
        self.write(FactKey::UserVerified, FactValue::Flag(verified))
    }

    pub fn user_verified(&self) -> Result<Option<bool>> {
        Ok(self.snapshot()?.user_verified)
    }

    fn write_record(&self, record: &RuntimeRecord) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(record)?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}
