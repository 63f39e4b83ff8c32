//! Core types for Safekeep.
//!
//! - [`StateBlob`]: the application's working data as named, opaque sections
//! - [`SnapshotId`]: collision-resistant identifier for a local snapshot
//! - [`Clock`]: injectable time source so retention and scheduling are testable

mod clock;
mod snapshot_id;
mod state;

pub mod iso8601;

pub use clock::{Clock, ManualClock, SystemClock};
pub use snapshot_id::SnapshotId;
pub use state::StateBlob;

/// Serialized layout version written next to every snapshot and remote object.
pub const FORMAT_VERSION: &str = "1.0";

/// Metadata key holding the snapshot creation time.
pub const BACKUP_TIME_KEY: &str = "backupTime";
/// Metadata key holding the snapshot id.
pub const BACKUP_ID_KEY: &str = "backupId";
/// Metadata key holding the remote object's last update time.
pub const LAST_UPDATED_KEY: &str = "lastUpdated";
/// Metadata key holding [`FORMAT_VERSION`].
pub const VERSION_KEY: &str = "version";

/// Keys the serialized layouts reserve for metadata. A section with one of
/// these names cannot be stored or transmitted.
pub const RESERVED_KEYS: [&str; 4] = [BACKUP_TIME_KEY, BACKUP_ID_KEY, LAST_UPDATED_KEY, VERSION_KEY];
