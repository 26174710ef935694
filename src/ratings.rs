use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::models::RatingRecord;

/// Per-browser star ratings, persisted as JSON at a fixed path. Anyone may
/// rate, signed in or not; nothing syncs to the account.
#[derive(Debug)]
pub struct RatingsStore {
    path: PathBuf,
    records: Vec<RatingRecord>,
}

impl RatingsStore {
    /// Loads the persisted set once. A missing, unreadable, or corrupt file
    /// degrades to an empty set instead of failing.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(records) => records,
                Err(err) => {
                    warn!("discarding corrupt ratings file {}: {err}", path.display());
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path, records }
    }

    /// Upserts a 1-5 rating and writes the full set back to disk.
    pub fn rate(&mut self, content_id: i32, value: u8) -> Result<()> {
        if !(1..=5).contains(&value) {
            bail!("rating must be between 1 and 5, got {value}");
        }
        let timestamp = Utc::now().timestamp_millis();
        match self.records.iter_mut().find(|r| r.content_id == content_id) {
            Some(record) => {
                record.rating = value;
                record.timestamp = timestamp;
            }
            None => self.records.push(RatingRecord {
                content_id,
                rating: value,
                timestamp,
            }),
        }
        self.persist()
    }

    /// Stored value, or `None` when unrated.
    pub fn get_rating(&self, content_id: i32) -> Option<u8> {
        self.records
            .iter()
            .find(|r| r.content_id == content_id)
            .map(|r| r.rating)
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.records).context("serializing ratings failed")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("writing ratings to {} failed", self.path.display()))
    }
}
