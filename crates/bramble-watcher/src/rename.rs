//! Page rename with link rewriting.
//!
//! Moves a page's file and rewrites `[[old]]` wikilinks in every page
//! the backlink index lists as a referrer. The two steps are not atomic:
//! the rename happens first, and each referrer is then rewritten on its
//! own. A referrer that can't be read or written is reported as skipped
//! and the remaining referrers are still processed.

use crate::error::{EngineError, Result};
use bramble_core::{candidates_for, page_candidates, split_destination, ContentError, ContentRoot};
use bramble_graph::BacklinkIndex;
use serde::Serialize;
use tracing::{debug, info, warn};

/// A referrer that was left untouched, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedReferrer {
    pub page_name: String,
    pub reason: String,
}

/// What a rename did (or, for a dry run, would do).
#[derive(Debug, Clone, Serialize)]
pub struct RenameReport {
    pub from_page: String,
    pub from_file: String,
    pub to_page: String,
    pub to_file: String,
    pub dry_run: bool,
    /// Files whose links were rewritten.
    pub rewritten: Vec<String>,
    /// Referrers with no wikilink to rewrite, e.g. plain markdown links.
    pub unchanged: Vec<String>,
    pub skipped: Vec<SkippedReferrer>,
}

impl RenameReport {
    /// True if every referrer was handled.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Renames `src` to `dest` and rewrites links to it.
///
/// Both names may be page names (`simd`) or file names (`simd.md`).
/// `index` should come from a crawl taken right before the call; pages
/// that started linking to `src` after it was built are not rewritten.
pub fn rename_page(
    root: &ContentRoot,
    index: &BacklinkIndex,
    src: &str,
    dest: &str,
    dry_run: bool,
) -> Result<RenameReport> {
    if root.is_read_only() && !dry_run {
        return Err(ContentError::ReadOnly.into());
    }
    let source = root.find_page(src)?;
    let (to_page, to_file) = split_destination(dest);
    if to_page.is_empty() {
        return Err(ContentError::InvalidPageName(dest.to_string()).into());
    }
    if root.exists(&to_file) {
        return Err(EngineError::DestinationExists(to_file));
    }
    // Any other file backing the destination page would be shadowed or
    // would shadow the moved one.
    if let Some(taken) = page_candidates(&to_page)
        .into_iter()
        .find(|file| *file != source.file_name && root.exists(file))
    {
        return Err(EngineError::DestinationExists(taken));
    }

    let mut report = RenameReport {
        from_page: source.page_name.clone(),
        from_file: source.file_name.clone(),
        to_page,
        to_file,
        dry_run,
        rewritten: Vec::new(),
        unchanged: Vec::new(),
        skipped: Vec::new(),
    };

    info!("mv {:?} {:?}", report.from_file, report.to_file);
    if !dry_run {
        root.create_parent_dirs(&report.to_file)?;
        root.rename(&report.from_file, &report.to_file)?;
    }

    let referrers = index.backlinks(&report.from_page);
    debug!("{} backlinks to {}", referrers.len(), report.from_page);
    for referrer in referrers {
        rewrite_referrer(root, referrer, &mut report);
    }

    if !report.is_clean() {
        warn!(
            "renamed {} with {} referrers left unchanged",
            report.from_page,
            report.skipped.len()
        );
    }
    Ok(report)
}

fn rewrite_referrer(root: &ContentRoot, referrer: &str, report: &mut RenameReport) {
    // A page linking to itself has just moved along with the rename.
    let candidates = if referrer == report.from_page && !report.dry_run {
        candidates_for(&report.to_file)
    } else {
        page_candidates(referrer)
    };

    let page = match root.read_first(&candidates) {
        Ok(page) => page,
        Err(e) => {
            warn!("not rewriting {}: {}", referrer, e);
            report.skipped.push(SkippedReferrer {
                page_name: referrer.to_string(),
                reason: e.to_string(),
            });
            return;
        }
    };

    let Some(updated) = rewrite_links(&page.raw, &report.from_page, &report.to_page) else {
        debug!("{} has no wikilink to {}", page.file_name, report.from_page);
        report.unchanged.push(page.file_name);
        return;
    };

    info!(
        "replace [[{}]] -> [[{}]] in {}",
        report.from_page, report.to_page, page.file_name
    );
    if !report.dry_run {
        if let Err(e) = root.write_file(&page.file_name, &updated) {
            warn!("rewriting {} failed: {}", page.file_name, e);
            report.skipped.push(SkippedReferrer {
                page_name: referrer.to_string(),
                reason: e.to_string(),
            });
            return;
        }
    }
    report.rewritten.push(page.file_name);
}

/// Replaces wikilinks to `old` with wikilinks to `new`, keeping labels
/// and fragments. Returns None if `content` has no such link.
///
/// Works on the stored bytes so text around the links is written back
/// unchanged, whatever its encoding.
pub fn rewrite_links(content: &[u8], old: &str, new: &str) -> Option<Vec<u8>> {
    let mut updated: Option<Vec<u8>> = None;
    for close in ["]]", "|", "#"] {
        let from = format!("[[{}{}", old, close);
        let to = format!("[[{}{}", new, close);
        let current = updated.as_deref().unwrap_or(content);
        if let Some(replaced) = replace_all(current, from.as_bytes(), to.as_bytes()) {
            updated = Some(replaced);
        }
    }
    updated
}

/// Replaces every occurrence of `from`, or returns None if there is none.
fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut found = false;
    while let Some(at) = rest.windows(from.len()).position(|window| window == from) {
        out.extend_from_slice(&rest[..at]);
        out.extend_from_slice(to);
        rest = &rest[at + from.len()..];
        found = true;
    }
    if !found {
        return None;
    }
    out.extend_from_slice(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{index_content, CancellationToken};
    use bramble_core::Settings;
    use std::fs;
    use tempfile::tempdir;

    fn settings() -> Settings {
        Settings {
            workers: 2,
            pop_timeout_ms: 10,
            ..Settings::default()
        }
    }

    fn index(root: &ContentRoot) -> BacklinkIndex {
        index_content(root, &settings(), &CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_rewrite_links_forms() {
        let text = b"[[simd]] and [[simd|vectors]] and [[simd#avx]] but not [[simdx]] or [simd](simd)";
        assert_eq!(
            rewrite_links(text, "simd", "Performance/SIMD").unwrap(),
            b"[[Performance/SIMD]] and [[Performance/SIMD|vectors]] and [[Performance/SIMD#avx]] \
              but not [[simdx]] or [simd](simd)"
        );
        assert!(rewrite_links(b"[[other]]", "simd", "x").is_none());
    }

    #[test]
    fn test_rename_keeps_bytes_that_are_not_utf8() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::write(base.join("simd.md"), "# SIMD").unwrap();
        fs::write(base.join("a.md"), b"caf\xe9 [[simd]]").unwrap();

        let root = ContentRoot::open(base).unwrap();
        let idx = index(&root);
        let report = rename_page(&root, &idx, "simd", "fast", false).unwrap();

        assert_eq!(report.rewritten, ["a.md"]);
        assert_eq!(fs::read(base.join("a.md")).unwrap(), b"caf\xe9 [[fast]]");
    }

    #[test]
    fn test_destination_with_other_suffix_is_refused() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::write(base.join("a.md"), "A").unwrap();
        fs::write(base.join("b.markdown"), "B").unwrap();

        let root = ContentRoot::open(base).unwrap();
        let idx = index(&root);
        for dest in ["b", "b.md"] {
            let err = rename_page(&root, &idx, "a", dest, false).unwrap_err();
            assert!(
                matches!(err, EngineError::DestinationExists(ref file) if file == "b.markdown"),
                "{}: {:?}",
                dest,
                err
            );
        }
        assert!(base.join("a.md").exists());
        assert!(!base.join("b.md").exists());
        assert_eq!(root.find_page("b").unwrap().content, "B");
    }

    #[test]
    fn test_changing_suffix_is_not_a_conflict() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("old.markdown"), "legacy").unwrap();

        let root = ContentRoot::open(dir.path()).unwrap();
        let idx = index(&root);
        let report = rename_page(&root, &idx, "old.markdown", "old.md", false).unwrap();
        assert_eq!(report.to_file, "old.md");
        assert!(dir.path().join("old.md").exists());
        assert!(!dir.path().join("old.markdown").exists());
    }

    #[test]
    fn test_rename_updates_referrers() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::write(base.join("simd.md"), "# SIMD").unwrap();
        fs::write(base.join("a.md"), "see [[simd]] and [[other]]").unwrap();
        fs::write(base.join("b.md"), "also [[simd]]").unwrap();
        fs::write(base.join("other.md"), "no links").unwrap();

        let root = ContentRoot::open(base).unwrap();
        let idx = index(&root);
        let report = rename_page(&root, &idx, "simd", "Performance/SIMD", false).unwrap();

        assert_eq!(report.from_file, "simd.md");
        assert_eq!(report.to_file, "Performance/SIMD.md");
        assert_eq!(report.rewritten, ["a.md", "b.md"]);
        assert!(report.is_clean());

        assert!(!base.join("simd.md").exists());
        assert_eq!(fs::read_to_string(base.join("Performance/SIMD.md")).unwrap(), "# SIMD");
        assert_eq!(
            fs::read_to_string(base.join("a.md")).unwrap(),
            "see [[Performance/SIMD]] and [[other]]"
        );
        assert_eq!(fs::read_to_string(base.join("b.md")).unwrap(), "also [[Performance/SIMD]]");
    }

    #[test]
    fn test_missing_referrer_is_skipped() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::write(base.join("simd.md"), "# SIMD").unwrap();
        fs::write(base.join("a.md"), "[[simd]]").unwrap();
        fs::write(base.join("b.md"), "[[simd]]").unwrap();

        let root = ContentRoot::open(base).unwrap();
        let idx = index(&root);
        fs::remove_file(base.join("a.md")).unwrap();

        let report = rename_page(&root, &idx, "simd.md", "Performance/SIMD", false).unwrap();
        assert_eq!(report.rewritten, ["b.md"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].page_name, "a");
        assert!(!report.is_clean());
        assert_eq!(fs::read_to_string(base.join("b.md")).unwrap(), "[[Performance/SIMD]]");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::write(base.join("simd.md"), "[[simd]]").unwrap();
        fs::write(base.join("a.md"), "[[simd|fast]]").unwrap();
        fs::write(base.join("c.md"), "[link](simd)").unwrap();

        let root = ContentRoot::open(base).unwrap().with_read_only(true);
        let idx = index(&root);
        let report = rename_page(&root, &idx, "simd", "fast.md", true).unwrap();

        assert_eq!(report.to_page, "fast");
        assert_eq!(report.rewritten, ["a.md", "simd.md"]);
        assert_eq!(report.unchanged, ["c.md"]);
        assert!(base.join("simd.md").exists());
        assert!(!base.join("fast.md").exists());
        assert_eq!(fs::read_to_string(base.join("a.md")).unwrap(), "[[simd|fast]]");
    }

    #[test]
    fn test_self_link_follows_the_page() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("loop.md"), "me: [[loop]]").unwrap();

        let root = ContentRoot::open(dir.path()).unwrap();
        let idx = index(&root);
        let report = rename_page(&root, &idx, "loop", "cycle", false).unwrap();

        assert_eq!(report.rewritten, ["cycle.md"]);
        assert_eq!(fs::read_to_string(dir.path().join("cycle.md")).unwrap(), "me: [[cycle]]");
    }

    #[test]
    fn test_rename_refusals() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();

        let root = ContentRoot::open(dir.path()).unwrap();
        let idx = index(&root);
        assert!(matches!(
            rename_page(&root, &idx, "a", "b", false),
            Err(EngineError::DestinationExists(_))
        ));
        let missing = rename_page(&root, &idx, "nope", "c", false).unwrap_err();
        assert!(matches!(
            missing,
            EngineError::Content(ContentError::PageNotFound(_))
        ));

        let read_only = root.clone().with_read_only(true);
        let err = rename_page(&read_only, &idx, "a", "c", false).unwrap_err();
        assert!(err.is_client_error());
    }
}
