//! Workspace sidecar
//!
//! A `.portal` JSON file at the workspace root remembers which portal the
//! folder is bound to, so later runs don't have to ask again:
//!
//! ```json
//! { "portalId": "…", "portalName": "Customer Portal", "defaultPageTemplateId": "…" }
//! ```
//!
//! Uses atomic writes (write to temp file, then rename) to prevent corruption.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::paths::FileLayout;

/// Sidecar file name
pub const SIDECAR_FILE: &str = ".portal";

/// Portal binding of one workspace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalFile {
    #[serde(default)]
    pub portal_id: String,
    #[serde(default)]
    pub portal_name: String,
    /// Page template new pages are created with (hierarchical layout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_page_template_id: Option<String>,
}

impl PortalFile {
    pub fn new(portal_id: impl Into<String>, portal_name: impl Into<String>) -> Self {
        Self {
            portal_id: portal_id.into(),
            portal_name: portal_name.into(),
            default_page_template_id: None,
        }
    }

    /// Sidecar location for a workspace root
    pub fn path(root: &Path) -> PathBuf {
        root.join(SIDECAR_FILE)
    }

    /// Check the binding is usable with a layout
    pub fn validate(&self, layout: FileLayout) -> std::result::Result<(), String> {
        if self.portal_id.is_empty() {
            return Err("portalId is missing".to_string());
        }
        if Uuid::parse_str(&self.portal_id).is_err() {
            return Err(format!("portalId '{}' is not a GUID", self.portal_id));
        }
        if self.portal_name.is_empty() {
            return Err("portalName is missing".to_string());
        }
        if layout == FileLayout::Hierarchical
            && self
                .default_page_template_id
                .as_deref()
                .map_or(true, str::is_empty)
        {
            return Err("defaultPageTemplateId is required when folders are used for files".to_string());
        }
        Ok(())
    }

    /// Load the sidecar of a workspace
    ///
    /// A missing file is `None`. An unreadable or invalid one is logged and
    /// also treated as `None`, so the user gets asked again.
    pub fn load(root: &Path, layout: FileLayout) -> Result<Option<Self>> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read portal file {:?}", path))?;
        let file: PortalFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!("Ignoring malformed portal file {:?}: {}", path, e);
                return Ok(None);
            }
        };

        match file.validate(layout) {
            Ok(()) => Ok(Some(file)),
            Err(reason) => {
                warn!("Ignoring portal file {:?}: {}", path, reason);
                Ok(None)
            }
        }
    }

    /// Write the sidecar atomically
    pub fn save(&self, root: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize portal file")?;
        atomic_write(&Self::path(root), &json)
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

    file.write_all(data)
        .with_context(|| format!("Failed to write to temp file {:?}", temp_path))?;

    // Sync to disk before rename
    file.sync_all()
        .with_context(|| format!("Failed to sync temp file {:?}", temp_path))?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}
