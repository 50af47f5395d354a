//! CLI entry point for `emlsearch`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use emlsearch::config::{self, Config};
use emlsearch::index::stats::IndexStats;
use emlsearch::index::IndexStore;
use emlsearch::model::folder::FolderNode;
use emlsearch::model::record::SearchResult;
use emlsearch::search::filter::parse_date_bound;
use emlsearch::search::{SearchFilters, SearchRequest};
use emlsearch::session::Session;

#[derive(Parser)]
#[command(
    name = "emlsearch",
    version,
    about = "Index and search a folder tree of .eml files",
    after_help = "Emails are expected under <root>/<client>/<project>/*.eml."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Index directory (defaults to the cache directory)
    #[arg(long, global = true, value_name = "DIR", env = "EMLSEARCH_INDEX_DIR")]
    index_dir: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a root folder and bring the index up to date
    Index {
        /// Root folder (defaults to `general.root_path` in the config)
        root: Option<PathBuf>,
        /// Remove index entries whose file no longer exists
        #[arg(long)]
        prune: bool,
        /// Re-read every file even if it looks unchanged
        #[arg(short, long)]
        force: bool,
        /// Delete the index and build it from scratch
        #[arg(long)]
        rebuild: bool,
    },
    /// Search the index
    Search {
        /// Free-text query: words, "phrases", +required, -excluded, subject:word
        query: Option<String>,
        /// Only emails of this client (first-level folder)
        #[arg(long)]
        client: Option<String>,
        /// Only emails of this project (second-level folder)
        #[arg(long)]
        project: Option<String>,
        /// Only emails whose sender contains this text
        #[arg(long)]
        sender: Option<String>,
        /// Only emails sent on or after this date (YYYY, YYYY-MM, YYYY-MM-DD or RFC 3339)
        #[arg(long, value_name = "DATE")]
        after: Option<String>,
        /// Only emails sent on or before this date
        #[arg(long, value_name = "DATE")]
        before: Option<String>,
        /// Maximum number of results
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Print the folder tree of a root
    Tree {
        root: Option<PathBuf>,
    },
    /// Display an email
    Show {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List recently viewed emails
    Recent,
    /// Show index statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config();
    if let Some(dir) = cli.index_dir {
        config.index.location = Some(dir);
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        Commands::Index {
            root,
            prune,
            force,
            rebuild,
        } => {
            let root = resolve_root(root, &config)?;
            cmd_index(config, &root, prune, force, rebuild)
        }
        Commands::Search {
            query,
            client,
            project,
            sender,
            after,
            before,
            max_results,
            json,
        } => {
            let filters = SearchFilters {
                client,
                project,
                sender,
                start_date: after.as_deref().map(|d| parse_date(d, false)).transpose()?,
                end_date: before.as_deref().map(|d| parse_date(d, true)).transpose()?,
            };
            let request = SearchRequest {
                text: query.unwrap_or_default(),
                filters,
                max_results: max_results.unwrap_or(config.search.max_results),
            };
            cmd_search(config, &request, json)
        }
        Commands::Tree { root } => {
            let root = resolve_root(root, &config)?;
            cmd_tree(config, &root)
        }
        Commands::Show { path, json } => cmd_show(config, &path, json),
        Commands::Recent => cmd_recent(config),
        Commands::Stats { json } => cmd_stats(config, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "emlsearch.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Parse a `--after`/`--before` value. `end` selects the last instant of a
/// partial date.
fn parse_date(value: &str, end: bool) -> anyhow::Result<DateTime<Utc>> {
    parse_date_bound(value, end).ok_or_else(|| {
        anyhow::anyhow!("Invalid date '{value}' (expected YYYY, YYYY-MM, YYYY-MM-DD or RFC 3339)")
    })
}

fn resolve_root(root: Option<PathBuf>, config: &Config) -> anyhow::Result<PathBuf> {
    root.or_else(|| config.general.root_path.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No root folder given and `general.root_path` is not configured")
        })
}

/// Open a session, refusing to continue when search is unavailable.
fn open_searchable(config: Config) -> anyhow::Result<Session> {
    let session = Session::open(config);
    if let Some(reason) = session.degraded_reason() {
        anyhow::bail!("Index unavailable: {reason}");
    }
    Ok(session)
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "emlsearch", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Scan a root folder into the index and print a summary.
fn cmd_index(
    mut config: Config,
    root: &Path,
    prune: bool,
    force: bool,
    rebuild: bool,
) -> anyhow::Result<()> {
    if !root.exists() {
        anyhow::bail!("Folder not found: {}", root.display());
    }
    if rebuild {
        IndexStore::destroy(config::index_location(&config))?;
    }
    config.scan.prune_missing |= prune;

    let mut session = open_searchable(config)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} Indexing [{bar:40.cyan/blue}] {pos}/{len} emails ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let (tree, report) = session.sync(
        root,
        force || rebuild,
        Some(&|current, total| {
            pb.set_length(total as u64);
            pb.set_position(current as u64);
            true
        }),
    )?;
    pb.finish_and_clear();

    let indexed_total = session.store().map_or(Ok(0), IndexStore::len)?;
    session.close()?;

    println!();
    println!("  {:<20} {}", "Root", tree.path.display());
    println!("  {:<20} {}", "Email files", report.files_seen);
    println!("  {:<20} {}", "Indexed", report.indexed);
    println!("  {:<20} {}", "Unchanged", report.unchanged);
    if report.pruned > 0 {
        println!("  {:<20} {}", "Pruned", report.pruned);
    }
    println!("  {:<20} {}", "Failed", report.failed.len());
    println!("  {:<20} {}", "Index total", indexed_total);
    println!("  {:<20} {:.2?}", "Time", report.elapsed);

    if !report.failed.is_empty() {
        println!();
        println!("  Files that could not be indexed:");
        for failure in &report.failed {
            println!("    {}: {}", failure.path.display(), failure.reason);
        }
    }
    println!();

    Ok(())
}

/// Search the index and print results.
fn cmd_search(config: Config, request: &SearchRequest, json: bool) -> anyhow::Result<()> {
    let date_format = config.general.date_format.clone();
    let session = open_searchable(config)?;
    let results = session.search(request)?;

    if json {
        print_search_results_json(&results)?;
    } else {
        print_search_results_table(&results, &date_format);
    }
    Ok(())
}

/// Print the folder tree of a root.
fn cmd_tree(config: Config, root: &Path) -> anyhow::Result<()> {
    let session = Session::open(config);
    let tree = session.browse(root)?;
    println!("{} ({})", tree.name, tree.total_emails());
    print_tree(&tree, 1);
    Ok(())
}

fn print_tree(node: &FolderNode, depth: usize) {
    let indent = "  ".repeat(depth);
    for child in &node.children {
        println!("{indent}{} ({})", child.name, child.total_emails());
        print_tree(child, depth + 1);
    }
    if node.has_emails() && depth > 1 {
        println!("{indent}Emails ({})", node.email_files.len());
    }
}

/// Display an email.
fn cmd_show(config: Config, path: &Path, json: bool) -> anyhow::Result<()> {
    let date_format = config.general.date_format.clone();
    let mut session = Session::open(config);
    let view = session.show(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let to: Vec<String> = view.to.iter().map(|a| a.display()).collect();
    println!("  {:<10} {}", "From", view.from);
    println!("  {:<10} {}", "To", to.join(", "));
    println!("  {:<10} {}", "Date", view.date.format(&date_format));
    println!("  {:<10} {}", "Subject", view.subject);
    println!("  {:<10} {} / {}", "Folder", view.client, view.project);
    if !view.attachments.is_empty() {
        println!("  {:<10} {}", "Attached", view.attachments.join(", "));
    }
    println!();
    println!("{}", view.body);
    Ok(())
}

/// List recently viewed emails.
fn cmd_recent(config: Config) -> anyhow::Result<()> {
    let session = Session::open(config);
    if session.recent().is_empty() {
        println!("  No recently viewed emails.");
    }
    for (i, path) in session.recent().iter().enumerate() {
        println!("  {:<3} {}", i + 1, path.display());
    }
    Ok(())
}

/// Show statistics of the index.
fn cmd_stats(config: Config, json: bool) -> anyhow::Result<()> {
    let location = config::index_location(&config);
    let session = open_searchable(config)?;
    let stats = session.stats()?;

    if json {
        print_stats_json(&location, &stats)?;
    } else {
        print_stats_table(&location, &stats);
    }
    Ok(())
}

/// Print search results as a human-readable table.
fn print_search_results_table(results: &[SearchResult], date_format: &str) {
    println!();
    println!("  {} result(s)", results.len());
    println!();

    if results.is_empty() {
        return;
    }

    println!(
        "  {:<4} {:<17} {:<20} {:<25} {:<40} {:>6}",
        "#", "Date", "Client/Project", "From", "Subject", "Score"
    );
    println!("  {}", "-".repeat(116));

    for (i, result) in results.iter().enumerate() {
        let date = result.date.format(date_format).to_string();
        let folder: String = format!("{}/{}", result.client, result.project)
            .chars()
            .take(19)
            .collect();
        let from_trunc: String = result.sender.chars().take(24).collect();
        let subj_trunc: String = result.subject.chars().take(39).collect();

        println!(
            "  {:<4} {:<17} {:<20} {:<25} {:<40} {:>6.2}",
            i + 1,
            date,
            folder,
            from_trunc,
            subj_trunc,
            result.score
        );
    }
    println!();
}

/// Print search results as JSON.
fn print_search_results_json(results: &[SearchResult]) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "result_count": results.len(),
        "results": results,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print statistics in a human-readable table.
fn print_stats_table(location: &Path, stats: &IndexStats) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Index", location.display());
    println!("  {:<20} {}", "Emails", stats.documents);
    println!(
        "  {:<20} {}",
        "Size on disk",
        format_size(stats.size_on_disk, BINARY)
    );

    if let Some((min, max)) = stats.date_range {
        println!(
            "  {:<20} {} to {}",
            "Date range",
            min.format("%Y-%m-%d"),
            max.format("%Y-%m-%d")
        );
    }

    if !stats.clients.is_empty() {
        println!();
        println!("  Clients:");
        for (client, count) in &stats.clients {
            println!("    {count:>6}  {client}");
        }
    }

    if !stats.top_senders.is_empty() {
        println!();
        println!("  Top senders:");
        for (sender, count) in &stats.top_senders {
            println!("    {count:>6}  {sender}");
        }
    }
    println!();
}

/// Print statistics as JSON.
fn print_stats_json(location: &Path, stats: &IndexStats) -> anyhow::Result<()> {
    let date_range = stats.date_range.map(|(min, max)| {
        serde_json::json!({
            "oldest": min.to_rfc3339(),
            "newest": max.to_rfc3339(),
        })
    });

    let counts = |items: &[(String, usize)]| -> Vec<serde_json::Value> {
        items
            .iter()
            .map(|(name, count)| serde_json::json!({ "name": name, "count": count }))
            .collect()
    };

    let output = serde_json::json!({
        "index": location.to_string_lossy(),
        "email_count": stats.documents,
        "size_on_disk": stats.size_on_disk,
        "date_range": date_range,
        "clients": counts(&stats.clients),
        "top_senders": counts(&stats.top_senders),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
