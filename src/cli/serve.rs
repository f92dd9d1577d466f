//! Broker startup and configuration.

use std::path::PathBuf;

use tracing::info;

use crate::broker::handlers::{default_registry, HandlerContext};
use crate::broker::server;
use crate::cli::args::ServeArgs;

pub fn cmd_serve(args: ServeArgs) {
    let log_level = match args.log_level.as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let workdir = PathBuf::from(&args.workdir);
    let storage = super::resolve_storage(&workdir, args.storage);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        built = env!("BUILD_DATETIME"),
        workdir = %workdir.display(),
        storage = %storage.display(),
        "starting gitsocial broker"
    );

    let ctx = HandlerContext::new(workdir, storage);
    let registry = default_registry();
    server::run_server(ctx, registry);
}
