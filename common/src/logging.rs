//! Common logging initializer
//!

use eyre::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_tree::HierarchicalLayer;

#[tracing::instrument]
pub fn init_logging(name: &'static str, use_tree: bool, use_file: Option<String>) -> Result<()> {
    // Initialise logging early
    //
    // Load filters from environment
    //
    let filter = EnvFilter::from_default_env();

    // Do we want hierarchical output?  Otherwise a compact line format.
    //
    let (tree, plain) = if use_tree {
        let tree = HierarchicalLayer::new(2)
            .with_ansi(true)
            .with_span_retrace(true)
            .with_span_modes(true)
            .with_targets(true)
            .with_bracketed_fields(true);
        (Some(tree), None)
    } else {
        let plain = fmt::layer().with_target(false).compact();
        (None, Some(plain))
    };

    // Log to file?
    //
    let file = if let Some(dir) = use_file {
        // Basic append-only rolling file for all traces.
        //
        let file_appender = tracing_appender::rolling::hourly(dir, name);
        Some(fmt::layer().with_writer(file_appender))
    } else {
        None
    };

    // Combine filters & outputs
    //
    tracing_subscriber::registry()
        .with(filter)
        .with(tree)
        .with(plain)
        .with(file)
        .init();

    Ok(())
}
