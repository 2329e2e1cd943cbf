// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! File-backed state store.
//!
//! Each state item lives in its own `<id>.json` file under the store
//! directory; ids are case-insensitive, so file names are lowercased.
//! Reads go straight to disk. Writes serialize through a store-wide
//! mutex taken with `try_lock`: a writer that loses the race answers
//! `Busy` (a 409 whose body carries the code `busy`, distinct from the
//! `already_exists` conflict) and the client retries on its own cadence
//! rather than queueing inside the server.

use std::path::{Path, PathBuf};

use chrono::Utc;
use fleetbench_contracts::StateItem;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;

pub struct StateStore {
    dir: PathBuf,
    writer: Mutex<()>,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn get(&self, state_id: &str) -> Result<Option<StateItem<Value>>, StoreError> {
        let path = self.path_for(state_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Create a new item from a bare definition. The stored id keeps the
    /// caller's casing; only the file name is lowercased.
    pub async fn create(
        &self,
        state_id: &str,
        definition: Value,
    ) -> Result<StateItem<Value>, StoreError> {
        let _writer = self.writer.try_lock().map_err(|_| StoreError::Busy)?;
        let path = self.path_for(state_id);
        if tokio::fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(state_id.to_string()));
        }
        let item = StateItem::new(state_id.to_string(), definition);
        self.write(&path, &item).await?;
        debug!(state_id, "State created");
        Ok(item)
    }

    /// Replace the whole item, refreshing `lastModified`. Upserts: a PUT
    /// against an absent id creates it, matching first-writer-wins
    /// handoff between peers.
    pub async fn update(
        &self,
        state_id: &str,
        item: StateItem<Value>,
    ) -> Result<StateItem<Value>, StoreError> {
        if !item.has_id(state_id) {
            return Err(StoreError::IdMismatch {
                path: state_id.to_string(),
                body: item.id,
            });
        }
        let _writer = self.writer.try_lock().map_err(|_| StoreError::Busy)?;
        let path = self.path_for(state_id);
        let item = StateItem {
            last_modified: Utc::now(),
            ..item
        };
        self.write(&path, &item).await?;
        debug!(state_id, "State updated");
        Ok(item)
    }

    /// Idempotent delete: removing an absent item succeeds.
    pub async fn delete(&self, state_id: &str) -> Result<(), StoreError> {
        let _writer = self.writer.try_lock().map_err(|_| StoreError::Busy)?;
        match tokio::fs::remove_file(self.path_for(state_id)).await {
            Ok(()) => {
                debug!(state_id, "State deleted");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, path: &Path, item: &StateItem<Value>) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(item)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    fn path_for(&self, state_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", state_id.to_lowercase()))
    }
}
