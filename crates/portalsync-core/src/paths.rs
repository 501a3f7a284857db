//! Local path resolution
//!
//! Maps local paths under a workspace root to `(ResourceKind, FileId)` pairs
//! and back. The workspace has three top-level folders:
//!
//! ```text
//! <root>/
//!   Templates/<name>.html
//!   Snippets/<name prefix>/<language code>/<leaf>.html
//!   Files/<file>                       (flat layout)
//!   Files/<page>/<page>/.../<file>     (hierarchical layout)
//! ```
//!
//! All identity comparison goes through [`fold_identity`]; nothing else in
//! the crate lower-cases paths on its own.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::kinds;
use crate::models::{FileId, LanguageTable, ResourceKind};

/// Extension every template and snippet file carries
pub const HTML_SUFFIX: &str = ".html";

/// Normalize a logical path into identity form
///
/// Backslashes become `/` and the result is lower-cased. This is the only
/// case-folding rule in the crate.
pub fn fold_identity(raw: &str) -> String {
    raw.replace('\\', "/").to_lowercase()
}

/// Strip a trailing `.html` (any case) from a file name
pub fn strip_html(leaf: &str) -> Option<&str> {
    let cut = leaf.len().checked_sub(HTML_SUFFIX.len())?;
    if cut == 0 || !leaf.is_char_boundary(cut) {
        return None;
    }
    leaf[cut..]
        .eq_ignore_ascii_case(HTML_SUFFIX)
        .then(|| &leaf[..cut])
}

/// How binary files are laid out under the files folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileLayout {
    /// Every file directly under `Files/`
    #[default]
    Flat,
    /// One folder per page, mirroring the page tree
    Hierarchical,
}

impl FileLayout {
    /// Layout selected by the `use_folders_for_files` setting
    pub fn from_use_folders(use_folders: bool) -> Self {
        if use_folders {
            FileLayout::Hierarchical
        } else {
            FileLayout::Flat
        }
    }
}

/// A snippet path split into its remote name and language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetName {
    /// Server-side snippet name, e.g. `Account/SignIn/PageCopy`
    pub name: String,
    /// Website language id, when a path segment matched a known language
    pub language_id: Option<String>,
}

/// Resolves local paths for one workspace
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    layout: FileLayout,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>, layout: FileLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    /// Workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> FileLayout {
        self.layout
    }

    /// Path relative to the workspace root, if it lies inside it
    pub fn relative(&self, path: &Path) -> Option<PathBuf> {
        self.components(path)
            .map(|parts| parts.iter().collect::<PathBuf>())
    }

    /// Path segments below the root, keeping their original case
    ///
    /// Relative paths are taken as relative to the root. Both `/` and `\`
    /// split segments. `..` and paths outside the root yield `None`.
    pub fn components(&self, path: &Path) -> Option<Vec<String>> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root).ok()?
        } else {
            path
        };

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment.to_str()?;
                    parts.extend(
                        segment
                            .split('\\')
                            .filter(|s| !s.is_empty())
                            .map(str::to_string),
                    );
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(parts)
    }

    /// Classify a path by its top-level folder
    pub fn kind_of(&self, path: &Path) -> ResourceKind {
        self.identify(path)
            .map(|(kind, _)| kind)
            .unwrap_or(ResourceKind::Other)
    }

    /// Resolve a local path to its kind and file identity
    ///
    /// Returns `None` for anything that is not a tracked resource.
    pub fn identify(&self, path: &Path) -> Option<(ResourceKind, FileId)> {
        let parts = self.components(path)?;
        let (folder, rest) = parts.split_first()?;
        if rest.is_empty() {
            return None;
        }
        let strategy = kinds::for_folder(folder)?;
        let id = (strategy.identify)(rest, self.layout)?;
        Some((strategy.kind, id))
    }

    /// Local path for an identity
    ///
    /// Segments come from the identity, so materialized names are lower-case.
    pub fn local_path(&self, kind: ResourceKind, id: &FileId) -> Option<PathBuf> {
        let strategy = kinds::strategy(kind)?;
        let mut path = self.root.join(strategy.folder);
        path.push((strategy.relative_path)(id));
        Some(path)
    }

    /// Absolute path of a managed folder
    pub fn folder(&self, kind: ResourceKind) -> Option<PathBuf> {
        kinds::strategy(kind).map(|s| self.root.join(s.folder))
    }

    /// Split a snippet path into its server name and language
    ///
    /// The language is the nearest segment above the leaf that matches a
    /// known language code (case-insensitive); it is removed from the name.
    /// Without a match the language slot stays empty.
    pub fn snippet_name(&self, path: &Path, languages: &LanguageTable) -> Option<SnippetName> {
        let parts = self.components(path)?;
        let (folder, rest) = parts.split_first()?;
        if kinds::for_folder(folder)?.kind != ResourceKind::TextSnippet {
            return None;
        }
        let (leaf, prefix) = rest.split_last()?;
        let leaf = strip_html(leaf)?;

        let mut segments: Vec<&str> = prefix.iter().map(String::as_str).collect();
        let mut language_id = None;
        let found = segments.iter().enumerate().rev().find_map(|(index, segment)| {
            languages
                .iter()
                .find(|(_, language)| language.code.eq_ignore_ascii_case(segment))
                .map(|(id, _)| (index, id.clone()))
        });
        if let Some((index, id)) = found {
            segments.remove(index);
            language_id = Some(id);
        }

        segments.push(leaf);
        Some(SnippetName {
            name: segments.join("/"),
            language_id,
        })
    }

    /// Remote name of a template path, original case
    ///
    /// `Templates/Layouts/Main.html` is `Layouts/Main`.
    pub fn template_name(&self, path: &Path) -> Option<String> {
        let parts = self.components(path)?;
        let (folder, rest) = parts.split_first()?;
        if kinds::for_folder(folder)?.kind != ResourceKind::PageTemplate {
            return None;
        }
        let (leaf, prefix) = rest.split_last()?;
        let mut segments: Vec<&str> = prefix.iter().map(String::as_str).collect();
        segments.push(strip_html(leaf)?);
        Some(segments.join("/"))
    }

    /// Folder segments between `Files/` and the file name, original case
    pub fn file_folders(&self, path: &Path) -> Option<Vec<String>> {
        let parts = self.components(path)?;
        let (folder, rest) = parts.split_first()?;
        if kinds::for_folder(folder)?.kind != ResourceKind::BinaryFile {
            return None;
        }
        let (_, folders) = rest.split_last()?;
        Some(folders.to_vec())
    }

    /// File name of a binary file path, original case
    pub fn file_name(&self, path: &Path) -> Option<String> {
        let mut parts = self.components(path)?;
        if parts.len() < 2 || kinds::for_folder(&parts[0])?.kind != ResourceKind::BinaryFile {
            return None;
        }
        parts.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Language;

    fn resolver(layout: FileLayout) -> PathResolver {
        PathResolver::new("/work", layout)
    }

    fn languages() -> LanguageTable {
        let mut table = LanguageTable::new();
        table.insert(
            "lang-en".to_string(),
            Language {
                code: "en-US".to_string(),
                display_name: "English".to_string(),
            },
        );
        table.insert(
            "lang-de".to_string(),
            Language {
                code: "de-DE".to_string(),
                display_name: "German".to_string(),
            },
        );
        table
    }

    #[test]
    fn test_fold_identity() {
        assert_eq!(fold_identity("Account\\SignIn/PageCopy"), "account/signin/pagecopy");
        assert_eq!(fold_identity(fold_identity("A/B").as_str()), "a/b");
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("Home.HTML"), Some("Home"));
        assert_eq!(strip_html("home.htm"), None);
        assert_eq!(strip_html(".html"), None);
    }

    #[test]
    fn test_identify_template() {
        let r = resolver(FileLayout::Flat);
        let (kind, id) = r.identify(Path::new("/work/Templates/Home.html")).unwrap();
        assert_eq!(kind, ResourceKind::PageTemplate);
        assert_eq!(id.as_str(), "home");

        assert_eq!(r.kind_of(Path::new("/work/Templates/Home.txt")), ResourceKind::Other);
        assert_eq!(r.kind_of(Path::new("/work/Templates")), ResourceKind::Other);
    }

    #[test]
    fn test_identify_snippet_keeps_language() {
        let r = resolver(FileLayout::Flat);
        let (kind, id) = r
            .identify(Path::new("/work/Snippets/Account/SignIn/en-US/PageCopy.html"))
            .unwrap();
        assert_eq!(kind, ResourceKind::TextSnippet);
        assert_eq!(id.as_str(), "account/signin/en-us/pagecopy");
    }

    #[test]
    fn test_identify_files_by_layout() {
        let flat = resolver(FileLayout::Flat);
        let (kind, id) = flat.identify(Path::new("/work/Files/Logo.PNG")).unwrap();
        assert_eq!(kind, ResourceKind::BinaryFile);
        assert_eq!(id.as_str(), "/logo.png");
        assert!(flat.identify(Path::new("/work/Files/Blog/logo.png")).is_none());

        let nested = resolver(FileLayout::Hierarchical);
        let (_, id) = nested
            .identify(Path::new("/work/Files/Blog/Posts/image.png"))
            .unwrap();
        assert_eq!(id.as_str(), "/blog/posts/image.png");
    }

    #[test]
    fn test_paths_outside_root_are_other() {
        let r = resolver(FileLayout::Flat);
        assert_eq!(r.kind_of(Path::new("/elsewhere/Templates/a.html")), ResourceKind::Other);
        assert_eq!(r.kind_of(Path::new("/work/notes/a.html")), ResourceKind::Other);
        assert_eq!(r.kind_of(Path::new("Templates/../x.html")), ResourceKind::Other);
    }

    #[test]
    fn test_separators_are_neutral() {
        let r = resolver(FileLayout::Flat);
        let a = r.identify(Path::new("Snippets\\Header\\en-US\\Title.html")).unwrap();
        let b = r.identify(Path::new("/work/Snippets/Header/en-US/Title.html")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_round_trip_identity() {
        let cases = [
            (FileLayout::Flat, "/work/Templates/Home.html"),
            (FileLayout::Flat, "/work/Templates/Account/Header.html"),
            (FileLayout::Flat, "/work/Snippets/Account/SignIn/en-US/PageCopy.html"),
            (FileLayout::Flat, "/work/Snippets/Footer.html"),
            (FileLayout::Flat, "/work/Files/Logo.png"),
            (FileLayout::Hierarchical, "/work/Files/Blog/Posts/image.png"),
            (FileLayout::Hierarchical, "/work/Files/robots.txt"),
        ];

        for (layout, raw) in cases {
            let r = resolver(layout);
            let (kind, id) = r.identify(Path::new(raw)).unwrap();
            let back = r.local_path(kind, &id).unwrap();
            assert_eq!(
                fold_identity(&back.to_string_lossy()),
                fold_identity(raw),
                "round trip of {}",
                raw
            );
        }
    }

    #[test]
    fn test_identify_is_idempotent() {
        let r = resolver(FileLayout::Hierarchical);
        let path = Path::new("/work/Files/Blog/Photo.JPG");
        let first = r.identify(path);
        let second = r.identify(path);
        assert_eq!(first, second);

        let (kind, id) = first.unwrap();
        let again = r.identify(&r.local_path(kind, &id).unwrap()).unwrap();
        assert_eq!(again, (kind, id));
    }

    #[test]
    fn test_snippet_name_strips_language() {
        let r = resolver(FileLayout::Flat);
        let name = r
            .snippet_name(
                Path::new("/work/Snippets/Account/SignIn/de-de/PageCopy.html"),
                &languages(),
            )
            .unwrap();
        assert_eq!(name.name, "Account/SignIn/PageCopy");
        assert_eq!(name.language_id.as_deref(), Some("lang-de"));
    }

    #[test]
    fn test_snippet_name_without_language() {
        let r = resolver(FileLayout::Flat);
        let name = r
            .snippet_name(Path::new("/work/Snippets/Header/Title.html"), &languages())
            .unwrap();
        assert_eq!(name.name, "Header/Title");
        assert_eq!(name.language_id, None);

        assert!(r
            .snippet_name(Path::new("/work/Templates/Title.html"), &languages())
            .is_none());
    }

    #[test]
    fn test_file_folders_keep_case() {
        let r = resolver(FileLayout::Hierarchical);
        let path = Path::new("/work/Files/Blog/Posts/image.png");
        assert_eq!(
            r.file_folders(path).unwrap(),
            vec!["Blog".to_string(), "Posts".to_string()]
        );
        assert_eq!(r.file_name(path).as_deref(), Some("image.png"));
        assert!(r.file_folders(Path::new("/work/Templates/a.html")).is_none());
    }

    #[test]
    fn test_template_name_keeps_case() {
        let r = resolver(FileLayout::Flat);
        assert_eq!(
            r.template_name(Path::new("/work/Templates/Layouts/Main.html")).as_deref(),
            Some("Layouts/Main")
        );
        assert!(r.template_name(Path::new("/work/Snippets/Main.html")).is_none());
        assert!(r.template_name(Path::new("/work/Templates/Main.txt")).is_none());
    }
}
