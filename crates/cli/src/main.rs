mod commands;
mod exit_code;
mod progress;

use clap::{Parser, Subcommand};
use colored::Colorize;
use exit_code::ExitCode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bsl")]
#[command(about = "Static analysis for 1C:Enterprise (BSL) and OneScript sources", long_about = None)]
#[command(version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Path to a configuration file (default: nearest `.bsl-language-server.json`)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Force colored output even when not a TTY
    #[arg(long, global = true, conflicts_with = "no_color")]
    color: bool,

    /// Disable colored output
    #[arg(long, global = true, conflicts_with = "color")]
    no_color: bool,

    /// Suppress all output except diagnostics and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Suppress progress indicators (spinners)
    #[arg(long, global = true)]
    no_progress: bool,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output verbosity options
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    /// Whether to show progress indicators (spinners)
    pub show_progress: bool,
    /// Whether to show informational output (summaries, timings)
    pub show_info: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every `.bsl` and `.os` file under a path
    ///
    /// Exits with 1 if any diagnostic of severity error is reported and
    /// with 2 on configuration or usage errors.
    Analyze {
        /// File or directory to analyze
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// List the available rules and their configured severity
    Rules {
        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Start the Language Server Protocol (LSP) server
    ///
    /// The server communicates via stdio using JSON-RPC.
    Lsp,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Human,
    /// JSON output for tooling
    Json,
}

fn main() {
    let cli = Cli::parse();

    // The server installs its own subscriber without ANSI colors; a CLI
    // subscriber installed first would win and leak escape codes into the
    // editor's log.
    if matches!(cli.command, Commands::Lsp) {
        if let Err(error) = commands::lsp::run() {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::ConfigError.exit();
        }
        return;
    }

    init_tracing(cli.verbose);
    configure_colors(cli.color, cli.no_color);

    let output = OutputOptions {
        show_progress: !cli.quiet && !cli.no_progress,
        show_info: !cli.quiet,
    };
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Analyze { path, format } => commands::analyze::run(path, config, format, output),
        Commands::Rules { format } => commands::rules::run(config, format),
        Commands::Completions { shell } => {
            commands::completions::run(shell);
            Ok(ExitCode::Success)
        }
        Commands::Lsp => Ok(ExitCode::Success),
    };

    let code = result.unwrap_or_else(|error| {
        eprintln!("{} {error:#}", "error:".red().bold());
        ExitCode::ConfigError
    });
    tracing::debug!(code = code.code(), "Exiting: {code}");
    code.exit();
}

/// Logs go to stderr so they never mix with reports on stdout.
///
/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Configure colored output based on flags and environment variables.
///
/// Priority order (highest to lowest):
/// 1. `--color` flag (force colors on)
/// 2. `--no-color` flag (force colors off)
/// 3. `NO_COLOR` environment variable (if set to any value, disable colors)
/// 4. `CLICOLOR_FORCE` environment variable (if set to non-zero, force colors)
/// 5. `CLICOLOR` environment variable (if set to "0", disable colors)
/// 6. Default: colors enabled if stdout is a TTY (handled by `colored` crate)
///
/// See: <https://no-color.org/> and <https://bixense.com/clicolors/>
fn configure_colors(force_color: bool, no_color: bool) {
    use colored::control;

    if force_color {
        control::set_override(true);
    } else if no_color || std::env::var_os("NO_COLOR").is_some() {
        control::set_override(false);
    } else if let Ok(val) = std::env::var("CLICOLOR_FORCE") {
        if !val.is_empty() && val != "0" {
            control::set_override(true);
        }
    } else if std::env::var("CLICOLOR").is_ok_and(|val| val == "0") {
        control::set_override(false);
    }
}
