//! Page-path materialization
//!
//! In the hierarchical layout a new file's folders have to exist as pages
//! before the file can be created. Folders are walked from the leaf towards
//! `Files/`; the first folder that matches a known page's partial URL is the
//! anchor, and every folder below it becomes a new page, created parent
//! first. Reaching `Files/` without a match anchors at the site root.

use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::gateway::{NewPage, RemoteGateway};
use crate::hierarchy::PageTree;

/// Values every materialized page is created with
#[derive(Debug, Clone, Copy)]
pub struct PageDefaults<'a> {
    pub site_id: &'a str,
    pub page_template_id: &'a str,
    pub published_state_id: &'a str,
}

/// Where a folder chain attaches to the tree and what is missing below it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    /// Existing page the chain hangs under
    pub anchor_id: String,
    /// Folder names to create, anchor outward
    pub missing: Vec<String>,
}

/// Work out which pages a folder chain still needs
///
/// `folders` are the segments between `Files/` and the file name.
pub fn plan(tree: &PageTree, folders: &[String]) -> SyncResult<PagePlan> {
    let full_path: String = folders.iter().map(|f| format!("/{}", f)).collect();
    if let Some(page) = tree.find_by_full_path(&full_path) {
        return Ok(PagePlan {
            anchor_id: page.id.clone(),
            missing: Vec::new(),
        });
    }

    for (index, folder) in folders.iter().enumerate().rev() {
        if let Some(page) = tree.find_by_partial_url(folder) {
            return Ok(PagePlan {
                anchor_id: page.id.clone(),
                missing: folders[index + 1..].to_vec(),
            });
        }
    }

    let root = tree.root()?;
    Ok(PagePlan {
        anchor_id: root.id.clone(),
        missing: folders.to_vec(),
    })
}

/// Resolve the page a new file hangs under, creating missing pages
///
/// Every created page is added to `tree` right away so later files of the
/// same batch find it. Returns the id of the innermost page.
pub async fn ensure_page_path(
    gateway: &dyn RemoteGateway,
    tree: &mut PageTree,
    folders: &[String],
    defaults: &PageDefaults<'_>,
) -> SyncResult<String> {
    let PagePlan {
        mut anchor_id,
        missing,
    } = plan(tree, folders)?;

    if missing.is_empty() {
        debug!("Folder path {:?} resolves to page {}", folders, anchor_id);
        return Ok(anchor_id);
    }

    for name in missing {
        let new_page = NewPage {
            site_id: defaults.site_id.to_string(),
            name: name.clone(),
            partial_url: name.clone(),
            parent_id: Some(anchor_id.clone()),
            page_template_id: defaults.page_template_id.to_string(),
            published_state_id: defaults.published_state_id.to_string(),
        };
        let created = gateway.create_page(&new_page).await.map_err(|e| {
            SyncError::reconcile(
                name.as_str(),
                format!("could not create page path element '{}': {}", name, e),
            )
        })?;
        info!("Created web page {}", created.display_name);
        anchor_id = tree.extend(created).id.clone();
    }

    Ok(anchor_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WebPage;
    use crate::testing::FakeGateway;

    fn tree() -> PageTree {
        PageTree::build(vec![
            WebPage::new("root", None, "/", "Home"),
            WebPage::new("blog", Some("root".to_string()), "Blog", "Blog"),
        ])
    }

    fn folders(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    const DEFAULTS: PageDefaults<'static> = PageDefaults {
        site_id: "site",
        page_template_id: "tpl",
        published_state_id: "pub",
    };

    #[test]
    fn test_plan_existing_path() {
        let existing = plan(&tree(), &folders(&["blog"])).unwrap();
        assert_eq!(existing.anchor_id, "blog");
        assert!(existing.missing.is_empty());
    }

    #[test]
    fn test_plan_anchors_at_nearest_known_page() {
        let anchored = plan(&tree(), &folders(&["Blog", "Posts", "2024"])).unwrap();
        assert_eq!(anchored.anchor_id, "blog");
        assert_eq!(anchored.missing, folders(&["Posts", "2024"]));
    }

    #[test]
    fn test_plan_falls_back_to_root() {
        let unknown = plan(&tree(), &folders(&["Docs", "Guides"])).unwrap();
        assert_eq!(unknown.anchor_id, "root");
        assert_eq!(unknown.missing, folders(&["Docs", "Guides"]));

        let empty = plan(&tree(), &[]).unwrap();
        assert_eq!(empty.anchor_id, "root");
        assert!(empty.missing.is_empty());
    }

    #[test]
    fn test_plan_without_root_fails() {
        let orphaned = PageTree::build(vec![
            WebPage::new("a", None, "a", "A"),
            WebPage::new("b", None, "b", "B"),
        ]);
        let err = plan(&orphaned, &folders(&["Docs"])).unwrap_err();
        assert!(matches!(err, SyncError::AmbiguousRoot(_)));
    }

    #[tokio::test]
    async fn test_creates_missing_pages_parent_first() {
        let gateway = FakeGateway::new();
        let mut tree = tree();

        let id = ensure_page_path(
            &gateway,
            &mut tree,
            &folders(&["Blog", "Posts", "2024"]),
            &DEFAULTS,
        )
        .await
        .unwrap();

        let year = tree.get(&id).unwrap();
        assert_eq!(year.partial_url, "2024");
        let posts = tree.parent(&id).unwrap();
        assert_eq!(posts.partial_url, "Posts");
        assert_eq!(posts.parent_id.as_deref(), Some("blog"));
        assert_eq!(tree.full_path(&id).as_deref(), Some("/Blog/Posts/2024"));

        let created = gateway.created_pages();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].name, "Posts");
        assert_eq!(created[0].page_template_id, "tpl");
        assert_eq!(created[0].published_state_id, "pub");
        assert_eq!(created[1].name, "2024");
    }

    #[tokio::test]
    async fn test_existing_path_creates_nothing() {
        let gateway = FakeGateway::new();
        let mut tree = tree();

        let id = ensure_page_path(&gateway, &mut tree, &folders(&["BLOG"]), &DEFAULTS)
            .await
            .unwrap();
        assert_eq!(id, "blog");
        assert!(gateway.created_pages().is_empty());
    }

    #[tokio::test]
    async fn test_failed_creation_is_reported() {
        let gateway = FakeGateway::new();
        gateway.fail_on("create_page");
        let mut tree = tree();

        let err = ensure_page_path(&gateway, &mut tree, &folders(&["Docs"]), &DEFAULTS)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Reconciliation { .. }));
        assert_eq!(tree.len(), 2);
    }
}
