/*!
 * Output Folder Housekeeping
 *
 * Free-space guard for the destination volume and rotation of earlier
 * captures into numbered backup folders.
 */

pub mod backup;
pub mod disk;

pub use backup::{rotate_existing, BACKUP_PREFIX, MAX_BACKUP_FOLDERS};
pub use disk::{has_sufficient_space, DEFAULT_MIN_FREE_BYTES};
