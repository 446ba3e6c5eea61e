//! Language server command
//!
//! Serves the Language Server Protocol over stdio until the client exits.

use anyhow::Result;

pub fn run() -> Result<()> {
    bsl_lsp::run_server()
}
