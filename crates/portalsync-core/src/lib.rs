//! portalsync core library
//!
//! Keeps a local folder and a Power Pages portal in sync with
//! source-control semantics: a list of changed files, commit (local to
//! remote), checkout and discard (remote to local), and incremental refresh.
//! There is no history and no merging; the last writer wins.
//!
//! # Architecture
//!
//! - **Snapshot**: in-memory copy of the last known remote state
//! - **Path resolution**: local paths to file identities and back, per kind
//! - **Change tracking**: debounced filesystem events classified against
//!   the snapshot
//! - **Engine**: download / commit / checkout / discard on top of the above
//!
//! The remote side is reached only through [`RemoteGateway`];
//! [`remote::DataverseGateway`] implements it over the Dataverse Web API.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let gateway = Arc::new(remote::connect(&config)?);
//! let mut engine = SyncEngine::open(&root, &config, gateway, Arc::new(Unattended))?;
//!
//! engine.download(true).await?;
//! engine.rescan().await;
//! let summary = engine.commit().await?;
//! ```
//!
//! # Modules
//!
//! - `engine`: sync operations (main entry point)
//! - `snapshot`, `hierarchy`: remote state and the page tree
//! - `paths`, `kinds`: identity scheme and per-kind behaviour
//! - `tracker`, `watcher`: local change detection
//! - `gateway`, `remote`: remote access
//! - `config`, `sidecar`: global configuration and per-workspace binding

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod hierarchy;
pub mod interaction;
pub mod kinds;
pub mod materialize;
pub mod models;
pub mod paths;
pub mod registry;
pub mod remote;
pub mod sidecar;
pub mod snapshot;
pub mod tracker;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use engine::{CancelFlag, CommitFailure, CommitSummary, DownloadSummary, KindCounts, SyncEngine};
pub use error::{AuthError, GatewayError, SyncError, SyncResult};
pub use gateway::{RemoteGateway, TokenProvider};
pub use hierarchy::PageTree;
pub use interaction::{Interaction, Unattended};
pub use models::{ChangeKind, Document, FileId, PendingChange, ResourceKind, WebPage};
pub use paths::{FileLayout, PathResolver};
pub use registry::WorkspaceRegistry;
pub use sidecar::PortalFile;
pub use snapshot::ContentSnapshot;
pub use tracker::{ChangeTracker, IgnoreList, DEBOUNCE_WINDOW};
pub use watcher::WorkspaceWatcher;
