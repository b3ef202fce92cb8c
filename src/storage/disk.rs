//! Free-space guard for the output volume.
//!
//! The check is fail-open: if the path or its volume cannot be resolved the
//! guard permits the run, since an inability to check is not evidence of a
//! full disk.

use std::fs;
use std::path::Path;

use sysinfo::Disks;
use tracing::{debug, warn};

/// Free-space margin required before a run starts (10 MiB).
pub const DEFAULT_MIN_FREE_BYTES: u64 = 10 * 1024 * 1024;

/// Returns false only when the volume holding `path` is known to have no
/// more than `minimum_bytes` available.
pub fn has_sufficient_space(path: &Path, minimum_bytes: u64) -> bool {
    match available_space(path) {
        Some(available) => {
            let ok = available > minimum_bytes;
            if !ok {
                warn!(
                    "[Disk] {} has {} bytes free, need more than {}",
                    path.display(),
                    available,
                    minimum_bytes
                );
            }
            ok
        }
        None => {
            debug!("[Disk] Could not resolve volume for {}, allowing run", path.display());
            true
        }
    }
}

/// Available bytes on the volume holding `path`, if it can be resolved.
pub fn available_space(path: &Path) -> Option<u64> {
    let resolved = fs::canonicalize(path).ok()?;
    let disks = Disks::new_with_refreshed_list();
    volume_space(
        &resolved,
        disks.list().iter().map(|disk| (disk.mount_point(), disk.available_space())),
    )
}

/// Picks the mount point that is the longest prefix of `path`.
fn volume_space<'a>(path: &Path, mounts: impl Iterator<Item = (&'a Path, u64)>) -> Option<u64> {
    mounts
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, available)| available)
}
