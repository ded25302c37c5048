//! CLI command implementations.

use bramble_core::{ContentRoot, Settings};
use bramble_graph::{BacklinkReport, IndexExport};
use bramble_watcher::{
    index_content, list_pages, recent_pages, rename_page, search_stream, watch_page,
    CancellationToken, ListOptions, PageEntry, SearchEvent, SortKey, SortOrder,
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::debug;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Loads settings and opens the content directory they apply to.
fn open(content: &Path) -> Result<(ContentRoot, Settings)> {
    let settings = Settings::load(content)?;
    let root = ContentRoot::open(content)?.with_read_only(settings.read_only);
    debug!("content directory {} ({:?})", content.display(), settings);
    Ok((root, settings))
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());
    Ok(spinner)
}

/// Write the default settings file.
pub fn init(content: &Path) -> Result<()> {
    if !Settings::write_default(content)? {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }
    println!(
        "{} Wrote {}",
        "✓".green(),
        Settings::file_path(content).display()
    );
    println!("  Run {} to build the backlink index", "bramble index".cyan());
    Ok(())
}

/// Build the backlink index.
pub fn index(content: &Path, output: Option<&Path>, page: Option<&str>) -> Result<()> {
    let (root, settings) = open(content)?;

    let spinner = spinner("Crawling pages...")?;
    let index = index_content(&root, &settings, &CancellationToken::new());
    spinner.finish_and_clear();
    let index = index?;

    let counts = index.counts();
    println!(
        "{} Indexed {} pages in {} directories ({} link targets)",
        "✓".green(),
        counts.pages.to_string().cyan(),
        counts.dirs.to_string().cyan(),
        index.target_count().to_string().cyan()
    );

    if let Some(page) = page {
        let report = BacklinkReport::for_page(&index, page);
        if report.referrers.is_empty() {
            println!("\nNo pages link to {}", page.cyan());
        } else {
            println!("\n{} pages link to {}:", report.referrers.len(), page.cyan());
            for referrer in &report.referrers {
                println!("  {}", referrer);
            }
        }
    }

    if let Some(out_path) = output {
        fs::write(out_path, IndexExport::from_index(&index).to_json()?)?;
        println!("{} Exported to {}", "✓".green(), out_path.display());
    }
    Ok(())
}

/// Search page names and content.
pub fn search(content: &Path, query: &str, limit: usize, json: bool) -> Result<()> {
    let (root, settings) = open(content)?;
    let stream = search_stream(&root, &settings, query, &CancellationToken::new())?;

    if json {
        let mut shown = 0;
        for event in stream.events().iter() {
            if matches!(event, SearchEvent::Result { .. }) {
                if shown == limit {
                    continue;
                }
                shown += 1;
            }
            println!("{}", serde_json::to_string(&event)?);
        }
        stream.finish()?;
        return Ok(());
    }

    let spinner = spinner("Searching...")?;
    let mut results = Vec::new();
    for event in stream.events().iter() {
        match event {
            SearchEvent::Progress { message } => spinner.set_message(message),
            SearchEvent::Result {
                page_name,
                matching_lines,
            } => results.push((page_name, matching_lines)),
            SearchEvent::Done => {}
        }
    }
    spinner.finish_and_clear();
    stream.finish()?;

    if results.is_empty() {
        println!("No matches found for \"{}\"", query);
        return Ok(());
    }
    println!("Found {} matches:\n", results.len());
    for (page_name, lines) in results.iter().take(limit) {
        println!("  {}", page_name.cyan());
        for line in lines.iter().take(3) {
            println!("    {}", line.trim().dimmed());
        }
    }
    if results.len() > limit {
        println!("  ... and {} more", results.len() - limit);
    }
    Ok(())
}

/// Rename a page and rewrite links to it.
pub fn mv(content: &Path, src: &str, dest: &str, dry_run: bool) -> Result<()> {
    let (root, settings) = open(content)?;
    let index = index_content(&root, &settings, &CancellationToken::new())?;
    let report = rename_page(&root, &index, src, dest, dry_run)?;

    let verb = if dry_run { "Would move" } else { "Moved" };
    println!(
        "{} {} {} → {}",
        "✓".green(),
        verb,
        report.from_file.cyan(),
        report.to_file.cyan()
    );
    let verb = if dry_run { "would update" } else { "updated" };
    for file in &report.rewritten {
        println!("  {} {}", verb, file);
    }
    for file in &report.unchanged {
        println!("  {} {}", "no wikilink in".dimmed(), file.dimmed());
    }
    if !report.skipped.is_empty() {
        println!("\n{} referrers not updated:", "⚠".yellow());
        for skipped in &report.skipped {
            println!("  {} - {}", skipped.page_name.red(), skipped.reason);
        }
    }
    Ok(())
}

/// Print change events for a page until interrupted.
pub async fn watch(content: &Path, page: &str, hash: Option<String>) -> Result<()> {
    let (root, settings) = open(content)?;
    let cancel = CancellationToken::new();
    let subscription = watch_page(&root, page, hash.as_deref(), &settings, &cancel)?;

    eprintln!("  Press {} to stop", "Ctrl+C".cyan());
    let printer = tokio::task::spawn_blocking(move || -> std::result::Result<(), String> {
        for event in subscription.events().iter() {
            let line = serde_json::to_string(&event).map_err(|e| e.to_string())?;
            println!("{}", line);
        }
        Ok(())
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            Ok(())
        }
        printed = printer => {
            printed??;
            Ok(())
        }
    }
}

/// List the most recently modified pages.
pub fn recent(content: &Path, limit: usize) -> Result<()> {
    let (root, settings) = open(content)?;
    let pages = recent_pages(&root, &settings, limit, &CancellationToken::new())?;
    print_entries(&pages);
    Ok(())
}

/// List pages below a directory.
pub fn browse(content: &Path, dir: Option<String>, sort: SortKey, desc: bool) -> Result<()> {
    let (root, settings) = open(content)?;
    let options = ListOptions {
        dir,
        sort,
        order: if desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        },
    };
    let pages = list_pages(&root, &settings, &options, &CancellationToken::new())?;
    print_entries(&pages);
    Ok(())
}

fn print_entries(pages: &[PageEntry]) {
    if pages.is_empty() {
        println!("No pages found");
        return;
    }
    for entry in pages {
        let age = entry.mod_time.map(format_age).unwrap_or_default();
        println!("  {:<50} {}", entry.page_name.cyan(), age.dimmed());
    }
}

fn format_age(mod_time: SystemTime) -> String {
    let secs = SystemTime::now()
        .duration_since(mod_time)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86400),
    }
}

/// Save a page from standard input.
pub fn save(content: &Path, page: &str) -> Result<()> {
    let (root, _) = open(content)?;
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    let file_name = root.save_page(page, &text)?;
    println!("{} Saved {}", "✓".green(), file_name.cyan());
    Ok(())
}
