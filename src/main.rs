//! Decentralized social interactions over plain git: posts, comments,
//! reposts and curated lists as commits, exchanged through ordinary
//! fetch/push.
//!
//! Binary crate entry point. All CLI logic is in the `cli` module.

// Re-export core primitives from the library crate
pub use gitsocial::protocol;
pub use gitsocial::{
    add_range, branched_identity, normalize_url, ranges_cover, repo_slug, split_identity,
    DateRange,
};

mod broker;
mod cache;
mod cli;
mod error;
mod fetch;
mod git;
mod social;
mod store;
mod timeline;

pub use error::SocialError;

fn main() {
    cli::run();
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
