//! Error handling
//!
//! Typed errors for the sync engine, the remote gateway, and token
//! acquisition. Bulk operations (download phases, commit items) catch these
//! per item; everything else propagates with `?`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::ResourceKind;

/// Errors raised while acquiring an access token
#[derive(Error, Debug)]
pub enum AuthError {
    /// Credentials are incomplete
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    /// The token endpoint rejected the request
    #[error("Token request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The token endpoint could not be reached
    #[error("Token request failed: {0}")]
    Request(#[source] reqwest::Error),
}

/// Errors raised by a single remote call
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No token could be obtained
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The service answered with an error status
    #[error("Remote call failed ({status}): {message}")]
    Http { status: u16, message: String },

    /// The request never completed
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body was not what we expected
    #[error("Could not decode response: {0}")]
    Decode(String),

    /// A record came back without a field we rely on
    #[error("Record from {collection} is missing '{field}'")]
    MissingField {
        collection: &'static str,
        field: &'static str,
    },

    /// A lookup that must return a result returned nothing
    #[error("{0}")]
    Empty(String),
}

impl GatewayError {
    /// Check if the failure came from the network rather than the data
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GatewayError::Request(_) | GatewayError::Http { .. } | GatewayError::Auth(_)
        )
    }
}

/// Errors that can occur during sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote identity or credentials are missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A remote call failed
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A local path could not be mapped to a known identity
    #[error("Cannot reconcile '{path}': {reason}")]
    Reconciliation { path: PathBuf, reason: String },

    /// Two remote records fold to the same file identity
    #[error("Identity '{identity}' is already used by another {kind} record")]
    IdentityCollision {
        kind: ResourceKind,
        identity: String,
    },

    /// Checkout refused because local work would be lost
    #[error("There are {count} changed file(s). Discard or commit them before checking out.")]
    PendingChanges { count: usize },

    /// Materialization needs exactly one anchor root page
    #[error("Cannot pick a root page: {0}")]
    AmbiguousRoot(String),

    /// The workspace could not be watched
    #[error("Could not watch workspace: {0}")]
    Watch(#[from] notify::Error),

    /// Permission denied accessing a local path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other local I/O failure
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    /// Create an error from an I/O error with path context
    pub fn from_io(error: io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match error.kind() {
            io::ErrorKind::PermissionDenied => SyncError::PermissionDenied {
                path,
                source: error,
            },
            _ => SyncError::Io {
                path,
                source: error,
            },
        }
    }

    /// Shorthand for a reconciliation failure
    pub fn reconcile(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SyncError::Reconciliation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if retrying the same operation later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Gateway(e) => e.is_transport(),
            SyncError::PendingChanges { .. } | SyncError::PermissionDenied { .. } => true,
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::Configuration(_) => {
                Some("Run `portalsync config show` and set the missing connection values.")
            }
            SyncError::Gateway(GatewayError::Auth(_)) => {
                Some("Check the tenant id, client id and client secret.")
            }
            SyncError::PendingChanges { .. } => {
                Some("Run `portalsync commit` or `portalsync discard` first.")
            }
            SyncError::IdentityCollision { .. } => {
                Some("Rename one of the remote records so their names differ by more than case.")
            }
            SyncError::AmbiguousRoot(_) => {
                Some("Create the folder's page in the portal first, then commit the file again.")
            }
            _ => None,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for gateway calls
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = SyncError::from_io(io_err, "/work/Templates/home.html");

        assert!(matches!(err, SyncError::PermissionDenied { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_other_io_classification() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = SyncError::from_io(io_err, "/missing");

        assert!(matches!(err, SyncError::Io { .. }));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("/missing"));
    }

    #[test]
    fn test_gateway_errors_are_transparent() {
        let err: SyncError = GatewayError::Http {
            status: 503,
            message: "unavailable".to_string(),
        }
        .into();

        assert_eq!(err.to_string(), "Remote call failed (503): unavailable");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_pending_changes_display() {
        let err = SyncError::PendingChanges { count: 3 };
        assert!(err.to_string().contains("3 changed"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_collision_display() {
        let err = SyncError::IdentityCollision {
            kind: ResourceKind::PageTemplate,
            identity: "home".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'home'"));
        assert!(msg.contains("page template"));
    }
}
