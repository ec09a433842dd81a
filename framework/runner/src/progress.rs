use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Displays a progress bar over the planned simulator invocations.
pub fn start_progress(total_invocations: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_invocations);
    match ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} invocations [{elapsed_precise}]",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::warn!("Failed to set progress style: {e}"),
    }
    pb.enable_steady_tick(Duration::from_millis(250));
    pb
}
