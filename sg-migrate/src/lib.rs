//! Copy network access-control rule sets between environments.
//!
//! A rule set (security group) holds inbound and outbound rules whose targets
//! are CIDR blocks, other rule sets or named address lists (prefix lists).
//! Moving rule sets to another environment means every identifier changes, so
//! references between them must be remapped once the new identifiers exist.
//! This library reads rule sets through an
//! [`AccessControlProvider`](ruleset_core::AccessControlProvider), decides
//! what must not be copied, recreates the rest in a destination network and
//! rewires every reference it can, reporting the ones it cannot.
//!
//! # Architecture
//!
//! ## Pipeline
//!
//! - [`filter`]: Drop orphan defaults and wide-open egress, extract
//!   cross-group rules into a side collection
//! - [`self_ref`]: Tag and later bind self references
//! - [`prefix_sync`]: Clone referenced address lists
//! - [`identity`]: Old id to name to new id, and old list id to clone
//! - [`resolve`]: Rewrite rule targets against the maps
//! - [`sync`]: Phase-ordered orchestration
//!
//! ## Providers
//!
//! - [`retry`]: Retry transient failures with exponential backoff
//! - [`dry_run`]: Record mutations instead of performing them
//! - [`wipe`]: Revoke every rule in a destination
//!
//! ## Reporting & settings
//!
//! - [`summary`]: Run summary, text rendering
//! - [`tags`]: Creation timestamp tag
//! - [`config`]: TOML configuration
//!
//! # Workflow
//!
//! 1. **Fetch** source rule sets
//! 2. **Filter** what must stay behind
//! 3. **Clone** referenced address lists
//! 4. **Create** rule sets with their inline rules
//! 5. **Apply** cross-group rules once every new id is known
//! 6. **Report** what was created, reused and skipped
//!
//! # Examples
//!
//! ```ignore
//! use ruleset_core::{load_snapshot, MemoryProvider};
//! use sg_migrate::sync::{SyncOptions, Syncer};
//!
//! let source = MemoryProvider::new(load_snapshot("source.json".as_ref())?);
//! let mut destination = MemoryProvider::new(load_snapshot("destination.json".as_ref())?);
//! let summary = Syncer::new(&source, &mut destination, SyncOptions::new("vpc-dst")).run()?;
//! println!("created={} skipped={}", summary.created_count(), summary.skipped.len());
//! ```

pub mod config;
pub mod dry_run;
pub mod filter;
pub mod identity;
pub mod prefix_sync;
pub mod resolve;
pub mod retry;
pub mod self_ref;
pub mod summary;
pub mod sync;
pub mod tags;
pub mod wipe;
