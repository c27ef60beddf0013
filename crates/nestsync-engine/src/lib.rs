//! Membership reconciliation engine for nestsync.
//!
//! Mirrors a nested source group tree into a target platform that only knows flat groups.
//! Nesting is preserved by placing target groups inside target groups, so every patch is
//! computed against a group's *immediate* members.
//!
//! # Pipeline
//!
//! - [`flatten`] - walk the source tree into [`nestsync_core::ReconciliationMaps`]
//! - [`matcher`] - decide whether a source and a target identity are the same
//! - [`diff`] - minimal add/remove sets for one group
//! - [`applier`] - turn a diff into one batched membership patch
//! - [`reconciler`] - create, delete orphans, re-read, patch; one root or many
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nestsync_core::{SourceDirectory, TargetPlatform};
//! use nestsync_engine::{ReconcileConfig, Reconciler};
//!
//! # async fn example(
//! #     source: Arc<dyn SourceDirectory>,
//! #     target: Arc<dyn TargetPlatform>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let reconciler = Reconciler::new(source, target, ReconcileConfig::default());
//! let report = reconciler.reconcile("Data Platform", true).await?;
//! println!("{} users would be created", report.users_created);
//! # Ok(())
//! # }
//! ```

pub mod applier;
pub mod config;
pub mod diff;
pub mod flatten;
pub mod matcher;
pub mod orphans;
pub mod reconciler;
pub mod report;

pub use applier::{PatchApplier, PatchOutcome};
pub use config::ReconcileConfig;
pub use diff::{diff_members, MembershipDiff};
pub use flatten::{Flattened, HierarchyFlattener};
pub use matcher::IdentityMatcher;
pub use reconciler::Reconciler;
pub use report::{MutationAction, MutationFailure, ReconcileReport, RootOutcome, RootRun};
