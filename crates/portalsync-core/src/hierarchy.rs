//! Page hierarchy
//!
//! Builds the remote page tree from the flat id/parent-id list the service
//! returns, and answers the path questions the hierarchical file layout
//! needs.
//!
//! ## Paths
//!
//! A page's full path is the `/`-joined partial URLs of every ancestor below
//! the root, ending with the page's own partial URL. The root itself has the
//! empty path, its children `/child`, and so on.
//!
//! Pages whose parent id points at a page we never received are kept but
//! flagged as orphans; they have no full path.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::models::WebPage;
use crate::paths::fold_identity;

/// Partial URL conventionally carried by a site's home page
const ROOT_PARTIAL_URL: &str = "/";

/// The page tree of one site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTree {
    /// Pages keyed by remote id
    nodes: BTreeMap<String, WebPage>,
    /// Ids of pages whose parent is unknown
    orphans: BTreeSet<String>,
}

impl PageTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a flat page list
    ///
    /// First every node is instantiated, then a second pass resolves each
    /// parent id. Unresolved parents are logged and the page is kept as an
    /// orphan.
    pub fn build(pages: impl IntoIterator<Item = WebPage>) -> Self {
        let mut tree = Self::new();

        for page in pages {
            tree.nodes.insert(page.id.clone(), page);
        }

        for page in tree.nodes.values() {
            let Some(parent_id) = &page.parent_id else {
                continue;
            };
            if !tree.nodes.contains_key(parent_id) {
                warn!(
                    "Couldn't resolve parent for page {}. Parent id: {}",
                    page.display_name, parent_id
                );
                tree.orphans.insert(page.id.clone());
            }
        }

        tree
    }

    /// Insert one page and wire it against the existing tree
    ///
    /// Orphans waiting for this page as their parent are adopted.
    pub fn extend(&mut self, page: WebPage) -> &WebPage {
        let id = page.id.clone();

        match &page.parent_id {
            Some(parent_id) if !self.nodes.contains_key(parent_id) => {
                warn!(
                    "Couldn't resolve parent for page {}. Parent id: {}",
                    page.display_name, parent_id
                );
                self.orphans.insert(id.clone());
            }
            _ => {
                self.orphans.remove(&id);
            }
        }

        let adopted: Vec<String> = self
            .orphans
            .iter()
            .filter(|orphan| {
                self.nodes
                    .get(*orphan)
                    .and_then(|p| p.parent_id.as_deref())
                    == Some(id.as_str())
            })
            .cloned()
            .collect();
        for orphan in adopted {
            self.orphans.remove(&orphan);
        }

        match self.nodes.entry(id) {
            Entry::Occupied(mut slot) => {
                slot.insert(page);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(page),
        }
    }

    /// Get a page by id
    pub fn get(&self, id: &str) -> Option<&WebPage> {
        self.nodes.get(id)
    }

    /// Get the parent of a page, if it is known
    pub fn parent(&self, id: &str) -> Option<&WebPage> {
        self.nodes
            .get(id)
            .and_then(|p| p.parent_id.as_deref())
            .and_then(|pid| self.nodes.get(pid))
    }

    /// Check if a page's parent is missing
    pub fn is_orphan(&self, id: &str) -> bool {
        self.orphans.contains(id)
    }

    /// Number of pages
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no pages
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All pages in id order
    pub fn pages(&self) -> impl Iterator<Item = &WebPage> {
        self.nodes.values()
    }

    /// Full path of a page
    ///
    /// Returns `None` for pages without a complete ancestor chain. A parent
    /// chain that loops back onto itself is cut at the first repeated page,
    /// which is then treated as the root.
    pub fn full_path(&self, id: &str) -> Option<String> {
        let mut current = self.nodes.get(id)?;
        let mut visited = HashSet::from([current.id.as_str()]);
        let mut segments = Vec::new();

        loop {
            let Some(parent_id) = current.parent_id.as_deref() else {
                break;
            };
            if !visited.insert(parent_id) {
                warn!("Page {} is part of a parent cycle", current.display_name);
                break;
            }
            let parent = self.nodes.get(parent_id)?;
            segments.push(current.partial_url.as_str());
            current = parent;
        }

        segments.reverse();
        Some(segments.iter().map(|seg| format!("/{}", seg)).collect())
    }

    /// Pages without a parent id
    pub fn roots(&self) -> Vec<&WebPage> {
        self.nodes
            .values()
            .filter(|p| p.parent_id.is_none())
            .collect()
    }

    /// The single root page new paths are anchored at
    ///
    /// With several unparented pages, the one whose partial URL is `/` wins.
    pub fn root(&self) -> SyncResult<&WebPage> {
        let roots = self.roots();
        match roots.as_slice() {
            [] => Err(SyncError::AmbiguousRoot(
                "the site has no root page".to_string(),
            )),
            [only] => Ok(only),
            many => {
                let mut home = many.iter().filter(|p| p.partial_url == ROOT_PARTIAL_URL);
                match (home.next(), home.next()) {
                    (Some(page), None) => Ok(page),
                    _ => Err(SyncError::AmbiguousRoot(format!(
                        "{} pages have no parent",
                        many.len()
                    ))),
                }
            }
        }
    }

    /// First page with the given partial URL anywhere in the tree
    ///
    /// Comparison is case-insensitive. Pages without a full ancestor chain
    /// are skipped because nothing can be anchored below them.
    pub fn find_by_partial_url(&self, partial_url: &str) -> Option<&WebPage> {
        let wanted = fold_identity(partial_url);
        self.nodes.values().find(|p| {
            fold_identity(&p.partial_url) == wanted && self.full_path(&p.id).is_some()
        })
    }

    /// Page whose full path equals `path` (case-insensitive)
    ///
    /// The empty path resolves to the root page.
    pub fn find_by_full_path(&self, path: &str) -> Option<&WebPage> {
        let wanted = fold_identity(path);
        let wanted = wanted.trim_end_matches('/');
        if wanted.is_empty() {
            return self.root().ok();
        }
        self.nodes.values().find(|p| {
            self.full_path(&p.id)
                .is_some_and(|full| fold_identity(&full) == wanted)
        })
    }
}
