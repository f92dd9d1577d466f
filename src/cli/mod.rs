//! CLI layer: argument parsing, command dispatch, and subcommand
//! implementations. Every broker capability is also reachable directly
//! from the command line.

pub mod args;
mod serve;

pub use args::*;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{Days, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::cache::PostCache;
use crate::error::{Result, SocialError};
use crate::fetch::{FetchCoordinator, Scope};
use crate::git;
use crate::protocol::PostType;
use crate::social;
use crate::store::repos::{default_storage_root, RepoStore};
use crate::timeline::{TimelineService, WeekOptions};

// ─── CLI ─────────────────────────────────────────────────────────────

/// Decentralized social interactions over plain git
#[derive(Parser, Debug)]
#[command(name = "gitsocial", version, about, after_help = "\
Run 'gitsocial <COMMAND> --help' for detailed options and examples.\n\
Common options: -w <DIR> (workspace), -s <DIR> (storage root)")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Start the webview broker over stdio.
    Serve(ServeArgs),

    /// Create a post on the social branch.
    Post(PostArgs),

    /// Show a week of posts for a scope.
    Timeline(TimelineArgs),

    /// Fetch updates for followed repositories.
    Fetch(FetchArgs),

    /// Show all lists in the workspace.
    Lists(ListsArgs),

    /// Push the social branch and lists to origin.
    Push(PushArgs),

    /// Show workspace settings and known isolated clones.
    Info(InfoArgs),

    /// Remove isolated clones no list or timeline references anymore.
    Cleanup(InfoArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => {
            serve::cmd_serve(args);
            Ok(())
        }
        Commands::Post(args) => cmd_post(args),
        Commands::Timeline(args) => cmd_timeline(args),
        Commands::Fetch(args) => cmd_fetch(args),
        Commands::Lists(args) => cmd_lists(args),
        Commands::Push(args) => cmd_push(args),
        Commands::Info(args) => cmd_info(args),
        Commands::Cleanup(args) => cmd_cleanup(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Storage root: explicit flag, then the `gitsocial.storage` config key,
/// then the per-user data directory.
pub(crate) fn resolve_storage(workdir: &Path, flag: Option<String>) -> PathBuf {
    if let Some(storage) = flag {
        return PathBuf::from(storage);
    }
    if let Ok(Some(storage)) = git::config_get(workdir, "gitsocial.storage") {
        return PathBuf::from(storage);
    }
    default_storage_root()
}

fn build_service(workdir: &Path, storage_flag: Option<String>) -> TimelineService {
    let storage = resolve_storage(workdir, storage_flag);
    let store = Arc::new(RepoStore::new(storage));
    let cache = Arc::new(RwLock::new(PostCache::default()));
    TimelineService::new(Arc::new(FetchCoordinator::new(store, cache)))
}

fn parse_scope(raw: &str) -> Result<Scope> {
    Scope::parse(raw).ok_or_else(|| SocialError::Validation(format!("unknown scope '{}'", raw)))
}

// ─── Commands ───────────────────────────────────────────────────────

pub(crate) fn cmd_post(args: PostArgs) -> Result<()> {
    let workdir = PathBuf::from(&args.workdir);
    let hash = social::create_post(&workdir, &args.content)?;
    eprintln!("Posted #commit:{} on '{}'", &hash[..12], social::social_branch(&workdir));
    Ok(())
}

pub(crate) fn cmd_timeline(args: TimelineArgs) -> Result<()> {
    let workdir = PathBuf::from(&args.workdir);
    let service = build_service(&workdir, args.storage);

    let week_start = match &args.week_start {
        Some(raw) => raw
            .parse::<NaiveDate>()
            .map_err(|e| SocialError::Validation(format!("bad week start '{}': {}", raw, e)))?
            .and_hms_opt(0, 0, 0)
            .expect("midnight exists")
            .and_utc(),
        None => Utc::now() - Days::new(7),
    };
    let week_end = week_start + Days::new(7);

    let types = match &args.types {
        None => None,
        Some(raw) => Some(
            raw.split(',')
                .map(|t| {
                    serde_json::from_value::<PostType>(serde_json::json!(t.trim()))
                        .map_err(|_| SocialError::Validation(format!("unknown post type '{}'", t)))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
    };

    let opts = WeekOptions {
        scope: parse_scope(&args.scope)?,
        types,
        fetch: !args.no_fetch,
        prefetch: false,
    };
    let week = service.get_week_posts(&workdir, week_start, week_end, &opts)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&week)?);
        return Ok(());
    }

    for outcome in &week.repositories {
        if !outcome.ok {
            eprintln!(
                "warning: {} failed: {}",
                outcome.repository,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    for post in &week.posts {
        println!(
            "{}  {:7}  {} <{}>  {}",
            post.timestamp.format("%Y-%m-%d %H:%M"),
            post.post_type.to_string(),
            post.author.name,
            post.author.email,
            post.clean_content.lines().next().unwrap_or(""),
        );
    }
    eprintln!("{} post(s)", week.posts.len());
    Ok(())
}

pub(crate) fn cmd_fetch(args: FetchArgs) -> Result<()> {
    let workdir = PathBuf::from(&args.workdir);
    let service = build_service(&workdir, args.storage);

    let scope = parse_scope(&args.scope)?;
    let summary = service.coordinator().fetch_updates(&workdir, &scope)?;

    for outcome in &summary.outcomes {
        if outcome.ok {
            eprintln!("fetched {}", outcome.repository);
        } else {
            eprintln!(
                "failed  {}: {}",
                outcome.repository,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    eprintln!("{} fetched, {} failed", summary.fetched, summary.failed);
    Ok(())
}

pub(crate) fn cmd_lists(args: ListsArgs) -> Result<()> {
    let workdir = PathBuf::from(&args.workdir);
    let lists = social::lists::get_all(&workdir)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&lists)?);
        return Ok(());
    }

    for list in &lists {
        let kind = if list.source.is_some() { "followed" } else { "local" };
        println!("{}  ({}, {} repositories)", list.id, kind, list.repositories.len());
        for repo in &list.repositories {
            println!("    {}", repo);
        }
    }
    eprintln!("{} list(s)", lists.len());
    Ok(())
}

pub(crate) fn cmd_push(args: PushArgs) -> Result<()> {
    let workdir = PathBuf::from(&args.workdir);
    let pushed = social::push_to_remote(&workdir)?;
    eprintln!("Pushed {} post(s) and {} list update(s)", pushed.posts, pushed.lists);
    Ok(())
}

pub(crate) fn cmd_cleanup(args: InfoArgs) -> Result<()> {
    let workdir = PathBuf::from(&args.workdir);
    let storage = resolve_storage(&workdir, args.storage);
    let store = RepoStore::new(&storage);

    eprintln!("Scanning for collectable clones in {}...", storage.display());
    let removed = store.cleanup_collectable()?;
    if removed == 0 {
        eprintln!("No collectable clones found.");
    } else {
        eprintln!("Removed {} clone(s).", removed);
    }
    Ok(())
}

pub(crate) fn cmd_info(args: InfoArgs) -> Result<()> {
    let workdir = PathBuf::from(&args.workdir);
    let storage = resolve_storage(&workdir, args.storage);
    let store = RepoStore::new(&storage);

    println!("workspace: {}", workdir.display());
    println!("social branch: {}", social::social_branch(&workdir));
    println!("storage root: {}", storage.display());

    let repos = store.known_repositories()?;
    println!("isolated clones: {}", repos.len());
    for (url, path) in repos {
        let config = store.read_config(&path)?;
        let ranges: Vec<String> = config
            .fetched_ranges
            .iter()
            .map(|r| format!("{}..{}", r.start, r.end))
            .collect();
        println!(
            "  {}  lastFetch={}  ranges=[{}]",
            url,
            config
                .last_fetch
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
            ranges.join(", "),
        );
    }
    Ok(())
}
