//! Domain model (names, leases, errors, listing views).

pub mod errors;
pub mod ids;
pub mod lease;
pub mod listing;

pub use self::errors::{ClaimError, ErrorKind, StoreError};
pub use self::ids::{Name, NameError, NameMarker, OwnerId, TaskKey};
pub use self::lease::{DEFAULT_TTL_SECS, Lease};
pub use self::listing::{ListedTask, TaskStatus};
