use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use parmforge::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// One progress bar over all input files of a `build` invocation. Each file's
/// pipeline reports its phases through [`CliProgressHandler::callback_for`].
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new(total_files: u64) -> Self {
        let pb = ProgressBar::new(total_files).with_style(Self::bar_style());
        pb.set_draw_target(ProgressDrawTarget::stderr());
        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    /// A hidden handler, used when output is quiet.
    pub fn hidden(total_files: u64) -> Self {
        let pb = ProgressBar::with_draw_target(Some(total_files), ProgressDrawTarget::hidden())
            .with_style(Self::bar_style());
        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn callback_for(&self, label: String) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();

        Box::new(move |progress: Progress| {
            let Ok(pb_guard) = pb_clone.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    pb_guard.set_message(format!("{label}: {name}"));
                }
                Progress::Message(msg) => {
                    pb_guard.println(format!("  {label}: {msg}"));
                }
                Progress::PhaseFinish
                | Progress::TaskStart { .. }
                | Progress::TaskIncrement
                | Progress::TaskFinish => {}
            }
        })
    }

    pub fn file_finished(&self) {
        if let Ok(pb) = self.pb.lock() {
            pb.inc(1);
        }
    }

    pub fn finish(&self) {
        if let Ok(pb) = self.pb.lock() {
            pb.finish_with_message("✓ Done");
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<32} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-")
    }
}
