//! Document version ledger and multi-role review reconciliation.
//!
//! Everything under this module is pure: functions take already-fetched
//! versions, assignments and role sets and return new values. Persistence and
//! clocks live in [`crate::store`] and [`crate::engine`].

pub mod aggregate;
pub mod assignment;
pub mod display;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod reconcile;
pub mod resolver;
pub mod version;

pub use aggregate::{aggregate_type, OverallState, SlotState, SlotSummary, TypeSummary};
pub use assignment::{
    prevailing, Assignment, AssignmentStatus, ExplicitAssignment, VirtualAssignment,
};
pub use display::{resolve_display_name, UserProfile, UNKNOWN_DISPLAY_NAME};
pub use error::{ReviewError, ReviewResult};
pub use ledger::{build_file_meta, plan_append, UploadRequest};
pub use lock::{plan_transition, Decision, LockCommand, Transition, VersionPatch};
pub use reconcile::{reconcile, ReconciledAssignment};
pub use resolver::{resolve, resolve_all, ReviewState, RoleStatus, RoleStatusEntry};
pub use version::{normalize_slot, DocumentKey, DocumentVersion, FileMeta, VersionStatus, DEFAULT_SLOT};
