// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seed-task loading: an optional JSON file of preset tasks merged at
//! startup, idempotent on `(name, trigger_type, trigger_config)`.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use mnemos_core::time::now_ts;
use mnemos_core::types::Trigger;
use mnemos_core::Error;
use mnemos_storage::Store;

use crate::build_task;

/// One entry of the seed file, matching the stored task layout.
#[derive(Debug, Deserialize)]
struct SeedEntry {
    name: String,
    trigger_type: String,
    trigger_config: serde_json::Value,
    message: String,
}

/// Merge the seed file into the store. A missing file is fine; loading
/// the same file twice yields the same task set as loading it once.
/// Returns how many new tasks were inserted.
pub async fn load_seed_tasks(store: &Store, path: &Path) -> Result<usize, Error> {
    if !path.exists() {
        return Ok(0);
    }
    let raw = std::fs::read_to_string(path).map_err(|e| Error::StoreUnavailable {
        source: Box::new(e),
    })?;
    let entries: Vec<SeedEntry> = serde_json::from_str(&raw)
        .map_err(|e| Error::BadArgument(format!("invalid seed-task file: {e}")))?;

    let now = now_ts();
    let mut inserted = 0;
    for entry in entries {
        let trigger =
            match Trigger::from_parts(&entry.trigger_type, &entry.trigger_config.to_string()) {
                Ok(trigger) => trigger,
                Err(e) => {
                    warn!(name = entry.name.as_str(), error = %e, "skipping seed entry");
                    continue;
                }
            };

        if store
            .find_task_by_identity(&entry.name, &trigger)
            .await?
            .is_some()
        {
            continue;
        }

        let task = build_task(&entry.name, trigger, &entry.message, now)?;
        store.upsert_task(&task).await?;
        inserted += 1;
    }

    info!(path = %path.display(), inserted, "seed tasks merged");
    Ok(inserted)
}
