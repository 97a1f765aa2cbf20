//! # Circa - Circular Design Toolkit
//!
//! The main binary for the Circa design graph engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - Websocket live channel for change events
//! - CLI interface for project, material and node operations
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      apps/circa (THE BINARY)                    │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │  Live Registry   │     │
//! │  │  (clap)     │    │   (axum)    │    │   (websocket)    │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    ▲               │
//! │         └──────────────────┼────────────────────┘ events        │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │  circa-core   │                            │
//! │                    │ (THE LOGIC)   │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! circa server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! circa load -f chair.json
//! circa graph -p 1
//! circa score -p 1
//! ```

use circa::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // CIRCA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CIRCA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "circa=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(category = e.category(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Circa startup banner.
fn print_banner() {
    println!(
        r#"
   ██████╗██╗██████╗  ██████╗ █████╗
  ██╔════╝██║██╔══██╗██╔════╝██╔══██╗
  ██║     ██║██████╔╝██║     ███████║
  ██║     ██║██╔══██╗██║     ██╔══██║
  ╚██████╗██║██║  ██║╚██████╗██║  ██║
   ╚═════╝╚═╝╚═╝  ╚═╝ ╚═════╝╚═╝  ╚═╝

  Circular Design Toolkit v{}

  Aggregate • Score • Reuse
"#,
        env!("CARGO_PKG_VERSION")
    );
}
