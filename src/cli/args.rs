//! CLI argument structs for all subcommands.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(after_long_help = r#"WHAT THE BROKER IS:
  A line-oriented JSON request/response protocol over stdio. UI surfaces
  (webview panels, a sidebar) send messages like
    {"type":"social.getPosts","id":"1","scope":"timeline"}
  and receive correlated responses:
    {"type":"posts","requestId":"1","data":{...}}

EXAMPLES:
  Basic:            gitsocial serve
  Explicit paths:   gitsocial serve --workdir ~/social --storage ~/.local/share/gitsocial
  Verbose logging:  gitsocial serve --log-level debug

HOW IT WORKS:
  1. On startup: opens the workspace and the isolated-clone storage root
  2. Starts the JSON event loop on stdin/stdout
  3. Timeline queries fetch only date windows not already fetched
  4. Adjacent weeks are prefetched in the background after each query
  5. Logging goes to stderr (never pollutes the protocol on stdout)
"#)]
pub struct ServeArgs {
    /// Workspace repository (the user's own social repo).
    #[arg(short, long, default_value = ".")]
    pub workdir: String,

    /// Storage root for isolated clones (default: gitsocial.storage
    /// config key, then the per-user data directory).
    #[arg(short, long)]
    pub storage: Option<String>,

    /// Log level for stderr output (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Parser, Debug)]
pub struct PostArgs {
    /// Post content (subject line + optional body).
    pub content: String,

    /// Workspace repository.
    #[arg(short, long, default_value = ".")]
    pub workdir: String,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"EXAMPLES:
  This week's timeline:   gitsocial timeline
  One repository:         gitsocial timeline --scope repository:https://github.com/a/b
  A list:                 gitsocial timeline --scope list:reading
  Own posts only:         gitsocial timeline --scope repository:my
  Specific week:          gitsocial timeline --week-start 2025-03-03
  Only comments:          gitsocial timeline --types comment
  Cache only (no fetch):  gitsocial timeline --no-fetch
"#)]
pub struct TimelineArgs {
    /// Workspace repository.
    #[arg(short, long, default_value = ".")]
    pub workdir: String,

    /// Storage root for isolated clones.
    #[arg(short, long)]
    pub storage: Option<String>,

    /// Scope: timeline, list:<id>, repository:<url>, repository:my.
    #[arg(long, default_value = "timeline")]
    pub scope: String,

    /// Week start (YYYY-MM-DD). Defaults to seven days ago.
    #[arg(long)]
    pub week_start: Option<String>,

    /// Post types to include, comma-separated (post,comment,repost,quote).
    #[arg(long)]
    pub types: Option<String>,

    /// Serve from cache only; never fetch.
    #[arg(long)]
    pub no_fetch: bool,

    /// Emit raw JSON instead of readable lines.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Workspace repository.
    #[arg(short, long, default_value = ".")]
    pub workdir: String,

    /// Storage root for isolated clones.
    #[arg(short, long)]
    pub storage: Option<String>,

    /// Scope: following, list:<id>, repository:<url>.
    #[arg(long, default_value = "following")]
    pub scope: String,
}

#[derive(Parser, Debug)]
pub struct ListsArgs {
    /// Workspace repository.
    #[arg(short, long, default_value = ".")]
    pub workdir: String,

    /// Emit raw JSON instead of readable lines.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct PushArgs {
    /// Workspace repository.
    #[arg(short, long, default_value = ".")]
    pub workdir: String,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Workspace repository.
    #[arg(short, long, default_value = ".")]
    pub workdir: String,

    /// Storage root for isolated clones.
    #[arg(short, long)]
    pub storage: Option<String>,
}
