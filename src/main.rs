//! Fieldtrip - free museum activity aggregation and crawling system.
//!
//! A tool for collecting, normalizing, and serving free teen/kids activity
//! listings from museum websites.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if fieldtrip::cli::is_verbose() {
        "fieldtrip=info"
    } else {
        "fieldtrip=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    fieldtrip::cli::run().await
}
