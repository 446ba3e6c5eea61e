//! Standalone BSL Language Server binary
//!
//! A thin wrapper over [`bsl_lsp::run_server`]. The `bsl lsp` subcommand
//! runs the same server.

fn main() -> anyhow::Result<()> {
    bsl_lsp::run_server()
}
