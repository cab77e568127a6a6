use std::collections::BTreeMap;
use std::path::Path;

use gsmake_store::Store;

use crate::error::{Error, Result};

/// The `userspace` index: `{target_path -> uuid}`.
pub type UserspaceIndex = BTreeMap<String, String>;

/// Returns the userspace id for `target_path`, allocating and persisting a
/// fresh one if this is the first time this project path has been seen.
pub async fn allocate(store: &Store, target_path: &Path) -> Result<String> {
    let key = target_path.to_string_lossy().to_string();
    let id = store
        .with_lock(|txn| {
            let mut index: UserspaceIndex = txn.read("userspace")?;
            let id = index
                .entry(key.clone())
                .or_insert_with(gsmake_support::ids::new_userspace_id)
                .clone();
            txn.write("userspace", &index)?;
            Ok(id)
        })
        .await?;
    Ok(id)
}

/// Bootstrapping purges any userspace entries whose target path is a
/// descendant of the OS temp dir -- these back ad-hoc
/// invocations and are garbage-collected on the next coordinator start.
/// The on-disk tree for each removed id is deleted once the index write
/// commits, so a temp-bound userspace's lifetime never outlives this call.
pub async fn purge_temp_bound(store: &Store) -> Result<Vec<String>> {
    let removed = store
        .with_lock(|txn| {
            let mut index: UserspaceIndex = txn.read("userspace")?;
            let mut removed = Vec::new();
            index.retain(|target_path, id| {
                if gsmake_paths::is_under_temp_dir(target_path) {
                    removed.push(id.clone());
                    false
                } else {
                    true
                }
            });
            txn.write("userspace", &index)?;
            Ok(removed)
        })
        .await?;

    for id in &removed {
        gsmake_support::fs::remove_dir_all(gsmake_paths::userspace_dir(store.root(), id))
            .await
            .map_err(Error::Io)?;
    }
    Ok(removed)
}
