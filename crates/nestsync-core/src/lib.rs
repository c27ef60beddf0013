//! nestsync Core Library
//!
//! Shared types and traits for nestsync.
//!
//! # Modules
//!
//! - [`model`] - Source/target identities and the per-run membership maps
//! - [`traits`] - Collaborator seams (`SourceDirectory`, `TargetPlatform`)
//! - [`error`] - Standardized error type (`SyncError`)
//!
//! # Example
//!
//! ```
//! use nestsync_core::{Member, ReconciliationMaps, SourceUser};
//!
//! let mut maps = ReconciliationMaps::new("Engineering");
//! let alice = SourceUser::new("Alice", "alice@example.com");
//! maps.record_member("Engineering", Member::User(alice.clone()));
//! maps.distinct_users.insert(alice);
//!
//! assert!(maps.contains_group("engineering"));
//! assert_eq!(maps.members_of("Engineering").len(), 1);
//! ```

pub mod error;
pub mod model;
pub mod traits;

// Re-export main types for convenient access
pub use error::{SyncError, SyncResult};
pub use model::{
    casefold, eq_ignore_case, Member, MemberKind, ReconciliationMaps, SourceGroup, SourceMember,
    SourceUser, TargetGroup, TargetMemberRef, TargetSnapshot, TargetUser,
};
pub use traits::{SourceDirectory, TargetPlatform};
