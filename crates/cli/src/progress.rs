use indicatif::{ProgressBar, ProgressStyle};

use crate::OutputOptions;

/// Detect if we're running in a CI environment
fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS", "JENKINS_URL"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Spinner for a long-running step, or `None` when progress is off.
///
/// In CI the spinner is hidden, so callers never need to special-case it.
#[allow(clippy::expect_used)]
pub fn spinner(message: &str, output: OutputOptions) -> Option<ProgressBar> {
    if !output.show_progress {
        return None;
    }
    let pb = if is_ci() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .expect("Failed to set progress style"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    Some(pb)
}
