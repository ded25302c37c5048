//! Full-text search over the content tree.
//!
//! Search reuses the crawl/read pipeline: each read worker greps its
//! pages line by line and scores the hits. While that runs, a ticker
//! reports how many files have been searched so far. Ranked results are
//! only available once every reader has finished.

use crate::cancel::CancellationToken;
use crate::crawler::CrawlOptions;
use crate::error::{EngineError, Result};
use crate::pipeline::run_pipeline;
use bramble_core::{ContentRoot, Settings};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Events delivered to a search subscriber, in order: any number of
/// progress updates, one result per match (best first), then done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    Progress {
        message: String,
    },
    Result {
        page_name: String,
        matching_lines: Vec<String>,
    },
    Done,
}

/// A validated search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
    lowered: String,
}

impl SearchQuery {
    /// Rejects empty queries and queries shorter than `min_len` characters.
    pub fn parse(text: &str, min_len: usize) -> Result<Self> {
        if text.is_empty() {
            return Err(EngineError::InvalidQuery("empty query not allowed".into()));
        }
        if text.chars().count() < min_len {
            return Err(EngineError::InvalidQuery(format!(
                "minimum query length: {} characters",
                min_len
            )));
        }
        Ok(Self {
            text: text.to_string(),
            lowered: text.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Lines of `content` that contain the query, ignoring case.
    pub fn grep<'c>(&self, content: &'c str) -> Vec<&'c str> {
        content
            .split('\n')
            .filter(|line| line.to_lowercase().contains(&self.lowered))
            .collect()
    }

    /// Scores a page by how its name relates to the query.
    ///
    /// Name matching ignores case, but the exact and prefix tiers do not.
    pub fn score(&self, page_name: &str, name_matched: bool) -> f64 {
        if !name_matched {
            0.0
        } else if page_name == self.text {
            1.0
        } else if page_name.starts_with(&self.text) {
            0.9
        } else {
            0.5
        }
    }
}

/// A page that matched the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub page_name: String,
    /// Matching content lines, followed by the page name if it matched.
    pub matching_lines: Vec<String>,
    pub score: f64,
}

impl Match {
    pub fn to_event(&self) -> SearchEvent {
        SearchEvent::Result {
            page_name: self.page_name.clone(),
            matching_lines: self.matching_lines.clone(),
        }
    }
}

/// Searches every page and returns the matches, best first.
///
/// If `progress` is given, a progress event is sent on it every
/// `settings.progress_interval()` until the search completes. No
/// progress event is sent after this function returns.
pub fn search(
    root: &ContentRoot,
    settings: &Settings,
    query: &SearchQuery,
    cancel: &CancellationToken,
    progress: Option<&Sender<SearchEvent>>,
) -> Result<Vec<Match>> {
    info!("searching for query {:?}", query.as_str());
    let start = Instant::now();
    let files_read = AtomicU64::new(0);
    let ticker_stop = cancel.child();

    let output = thread::scope(|s| {
        if let Some(progress) = progress {
            let (files_read, ticker_stop) = (&files_read, &ticker_stop);
            let interval = settings.progress_interval();
            s.spawn(move || report_progress(progress, files_read, ticker_stop, interval));
        }

        let output = run_pipeline(
            root,
            settings,
            CrawlOptions::default(),
            cancel,
            Vec::new,
            |matches: &mut Vec<Match>, found| {
                let page = match root.read_page(&found.file_name) {
                    Ok(page) => page,
                    Err(e) => {
                        warn!("search: skipping {}: {}", found.file_name, e);
                        return Ok(());
                    }
                };
                files_read.fetch_add(1, Ordering::Relaxed);
                if let Some(m) = match_page(query, &page.page_name, page.text()) {
                    matches.push(m);
                }
                Ok(())
            },
        );
        // The scope joins the ticker once it has seen this.
        ticker_stop.cancel();
        output
    })?;

    let mut results: Vec<Match> = output.partials.into_iter().flatten().collect();
    rank(&mut results);
    info!(
        "search for query {:?} done in {:?}: {} of {} files matched",
        query.as_str(),
        start.elapsed(),
        results.len(),
        files_read.load(Ordering::Relaxed)
    );
    Ok(results)
}

/// Greps one page. Returns None if neither content nor name matched.
fn match_page(query: &SearchQuery, page_name: &str, text: &str) -> Option<Match> {
    let mut lines: Vec<String> = query.grep(text).into_iter().map(String::from).collect();
    let name_matched = !query.grep(page_name).is_empty();
    if name_matched {
        lines.push(page_name.to_string());
    }
    if lines.is_empty() {
        return None;
    }
    Some(Match {
        page_name: page_name.to_string(),
        matching_lines: lines,
        score: query.score(page_name, name_matched),
    })
}

/// Best score first, then by page name.
fn rank(results: &mut [Match]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.page_name.cmp(&b.page_name))
    });
}

fn report_progress(
    progress: &Sender<SearchEvent>,
    files_read: &AtomicU64,
    stop: &CancellationToken,
    interval: Duration,
) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => {}
            recv(stop.done()) -> _ => return,
        }
        let event = SearchEvent::Progress {
            message: format!(
                "searched through {} files",
                files_read.load(Ordering::Relaxed)
            ),
        };
        select! {
            send(progress, event) -> sent => {
                if sent.is_err() {
                    return;
                }
            }
            recv(stop.done()) -> _ => return,
        }
    }
}

/// A search running on its own thread, delivering [`SearchEvent`]s.
///
/// Dropping the stream cancels the search and waits for it to stop.
pub struct SearchStream {
    events: Receiver<SearchEvent>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<usize>>>,
}

impl SearchStream {
    /// The event channel. It closes after [`SearchEvent::Done`], or
    /// early if the search fails or is cancelled.
    pub fn events(&self) -> &Receiver<SearchEvent> {
        &self.events
    }

    /// Stops the search. Events already queued may still be received.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the search thread and returns the number of results.
    pub fn finish(mut self) -> Result<usize> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or(Err(EngineError::WorkerPanicked("search"))),
            None => Ok(0),
        }
    }
}

impl Drop for SearchStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Starts a search in the background and streams its events.
///
/// The query is validated up front so bad input fails here rather than
/// through the stream.
pub fn search_stream(
    root: &ContentRoot,
    settings: &Settings,
    query: &str,
    cancel: &CancellationToken,
) -> Result<SearchStream> {
    let query = SearchQuery::parse(query, settings.min_query_len)?;
    let (tx, events) = bounded(16);
    let cancel = cancel.child();

    let handle = {
        let root = root.clone();
        let settings = settings.clone();
        let cancel = cancel.clone();
        thread::Builder::new()
            .name("bramble-search".into())
            .spawn(move || produce_events(&root, &settings, &query, &cancel, tx))
            .map_err(EngineError::Spawn)?
    };

    Ok(SearchStream {
        events,
        cancel,
        handle: Some(handle),
    })
}

/// Runs the search and sends its results. Owns `tx`, so the channel is
/// closed exactly once, when this returns.
fn produce_events(
    root: &ContentRoot,
    settings: &Settings,
    query: &SearchQuery,
    cancel: &CancellationToken,
    tx: Sender<SearchEvent>,
) -> Result<usize> {
    let results = search(root, settings, query, cancel, Some(&tx))?;
    debug!("streaming {} results", results.len());
    for event in results.iter().map(Match::to_event).chain([SearchEvent::Done]) {
        select! {
            send(tx, event) -> sent => {
                if sent.is_err() {
                    return Err(EngineError::Cancelled);
                }
            }
            recv(cancel.done()) -> _ => return Err(EngineError::Cancelled),
        }
    }
    Ok(results.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn settings() -> Settings {
        Settings {
            workers: 3,
            pop_timeout_ms: 10,
            progress_interval_ms: 20,
            ..Settings::default()
        }
    }

    fn write(base: &std::path::Path, rel: &str, content: &str) {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn names(results: &[Match]) -> Vec<&str> {
        results.iter().map(|m| m.page_name.as_str()).collect()
    }

    #[test]
    fn test_query_validation() {
        assert!(matches!(
            SearchQuery::parse("", 2),
            Err(EngineError::InvalidQuery(_))
        ));
        let short = SearchQuery::parse("x", 2).unwrap_err();
        assert!(short.is_client_error());
        assert!(SearchQuery::parse("xy", 2).is_ok());
        // Length counts characters, not bytes.
        assert!(SearchQuery::parse("é", 2).is_err());
    }

    #[test]
    fn test_grep_ignores_case() {
        let query = SearchQuery::parse("Rust", 2).unwrap();
        let text = "I like rust\nand go\nRUSTACEANS\n";
        assert_eq!(query.grep(text), ["I like rust", "RUSTACEANS"]);
    }

    #[test]
    fn test_name_scores() {
        let query = SearchQuery::parse("foo", 2).unwrap();
        assert_eq!(query.score("foo", true), 1.0);
        assert_eq!(query.score("foobar", true), 0.9);
        assert_eq!(query.score("barfoo", true), 0.5);
        assert_eq!(query.score("Foo", true), 0.5);
        assert_eq!(query.score("notes", false), 0.0);
    }

    #[test]
    fn test_search_ranks_by_score_then_name() {
        let dir = tempdir().unwrap();
        write(dir.path(), "foo.md", "nothing");
        write(dir.path(), "foobar.md", "nothing");
        write(dir.path(), "barfoo.md", "nothing");
        write(dir.path(), "zeta.md", "mentions foo in the body");
        write(dir.path(), "alpha.md", "FOO shouting");
        write(dir.path(), "other.md", "unrelated");

        let root = ContentRoot::open(dir.path()).unwrap();
        let query = SearchQuery::parse("foo", 2).unwrap();
        let results = search(&root, &settings(), &query, &CancellationToken::new(), None).unwrap();

        assert_eq!(names(&results), ["foo", "foobar", "barfoo", "alpha", "zeta"]);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[3].score, 0.0);
        assert_eq!(results[3].matching_lines, ["FOO shouting"]);
        assert_eq!(results[0].matching_lines, ["foo"]);
    }

    #[test]
    fn test_search_results_are_deterministic() {
        let dir = tempdir().unwrap();
        for i in 0..30 {
            write(dir.path(), &format!("n{}/page{}.md", i % 3, i), "common line");
        }
        let root = ContentRoot::open(dir.path()).unwrap();
        let query = SearchQuery::parse("common", 2).unwrap();

        let first = search(&root, &settings(), &query, &CancellationToken::new(), None).unwrap();
        let second = search(&root, &settings(), &query, &CancellationToken::new(), None).unwrap();
        assert_eq!(first.len(), 30);
        assert_eq!(first, second);
    }

    #[test]
    fn test_stream_ends_with_done() {
        let dir = tempdir().unwrap();
        write(dir.path(), "garden.md", "tomatoes\npotatoes");
        write(dir.path(), "shed.md", "tools");

        let root = ContentRoot::open(dir.path()).unwrap();
        let stream = search_stream(&root, &settings(), "atoes", &CancellationToken::new()).unwrap();
        let events: Vec<SearchEvent> = stream
            .events()
            .iter()
            .filter(|e| !matches!(e, SearchEvent::Progress { .. }))
            .collect();
        assert_eq!(stream.finish().unwrap(), 1);

        assert_eq!(
            events,
            [
                SearchEvent::Result {
                    page_name: "garden".into(),
                    matching_lines: vec!["tomatoes".into(), "potatoes".into()],
                },
                SearchEvent::Done,
            ]
        );
    }

    #[test]
    fn test_stream_reports_progress_before_results() {
        let dir = tempdir().unwrap();
        for i in 0..60 {
            write(dir.path(), &format!("d{}/page{}.md", i % 4, i), "slow reading");
        }
        let root = ContentRoot::open(dir.path())
            .unwrap()
            .with_transform(|raw| {
                thread::sleep(Duration::from_millis(3));
                raw.to_vec()
            });
        let settings = Settings {
            progress_interval_ms: 2,
            ..settings()
        };

        let stream = search_stream(&root, &settings, "slow", &CancellationToken::new()).unwrap();
        let events: Vec<SearchEvent> = stream.events().iter().collect();
        assert_eq!(stream.finish().unwrap(), 60);

        let first_result = events
            .iter()
            .position(|e| !matches!(e, SearchEvent::Progress { .. }))
            .unwrap();
        assert!(first_result > 0, "no progress before the first result");
        assert!(events[first_result..]
            .iter()
            .all(|e| !matches!(e, SearchEvent::Progress { .. })));
        assert_eq!(events.last(), Some(&SearchEvent::Done));

        let counts: Vec<u64> = events[..first_result]
            .iter()
            .map(|e| match e {
                SearchEvent::Progress { message } => message
                    .strip_prefix("searched through ")
                    .and_then(|rest| rest.strip_suffix(" files"))
                    .unwrap()
                    .parse()
                    .unwrap(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{:?}", counts);
        assert!(counts.iter().all(|&n| n <= 60));
    }

    #[cfg(unix)]
    #[test]
    fn test_search_skips_unreadable_page() {
        let dir = tempdir().unwrap();
        write(dir.path(), "good.md", "needle");
        std::os::unix::fs::symlink("/nonexistent", dir.path().join("bad.md")).unwrap();

        let root = ContentRoot::open(dir.path()).unwrap();
        let query = SearchQuery::parse("needle", 2).unwrap();
        let results = search(&root, &settings(), &query, &CancellationToken::new(), None).unwrap();
        assert_eq!(names(&results), ["good"]);
    }

    #[test]
    fn test_stream_rejects_short_query() {
        let dir = tempdir().unwrap();
        let root = ContentRoot::open(dir.path()).unwrap();
        let result = search_stream(&root, &settings(), "a", &CancellationToken::new());
        assert!(matches!(result, Err(EngineError::InvalidQuery(_))));
    }

    #[test]
    fn test_event_json_shape() {
        let progress = SearchEvent::Progress {
            message: "searched through 3 files".into(),
        };
        assert_eq!(
            serde_json::to_string(&progress).unwrap(),
            r#"{"type":"progress","message":"searched through 3 files"}"#
        );
        assert_eq!(
            serde_json::to_string(&SearchEvent::Done).unwrap(),
            r#"{"type":"done"}"#
        );
        let result = SearchEvent::Result {
            page_name: "a".into(),
            matching_lines: vec!["x".into()],
        };
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"type":"result","page_name":"a","matching_lines":["x"]}"#
        );
    }
}
