//! BSL Language Server Protocol implementation.
//!
//! The server speaks JSON-RPC over stdio through `lsp-server`. It is
//! typically started as `bsl lsp` or through the standalone `bsl-lsp`
//! binary.

mod conversions;
mod server;
mod session;

pub use conversions::{DiagnosticData, IntoEngine, IntoLsp};
pub use server::{serve, server_capabilities, SETTINGS_SECTION};
pub use session::{OpenDocument, Phase, SessionError, Sessions};

/// Initialize tracing for the language server.
///
/// Safe to call when a subscriber is already installed (as under `bsl lsp`);
/// initialization is simply skipped.
pub fn init_tracing() -> bool {
    // stdout carries the protocol, so logs go to stderr without colors
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .is_ok()
}

/// Run the BSL language server over stdio until the client exits.
pub fn run_server() -> anyhow::Result<()> {
    init_tracing();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting BSL language server");

    let (connection, io_threads) = lsp_server::Connection::stdio();
    serve(&connection)?;
    drop(connection);
    io_threads.join()?;

    tracing::info!("BSL language server stopped");
    Ok(())
}
