//! Progress bar for plan execution.

use std::time::Duration;

use gradesync::executor::{ActionStatus, ExecutionEvent, ExecutionObserver};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str = "{spinner:.green} {msg:40!} [{bar:40.cyan/blue}] {pos}/{len}";

/// Drives an indicatif bar from executor events. Failures are printed above
/// the bar so they stay visible after it is cleared.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(hidden: bool) -> Self {
        let bar = ProgressBar::new(0);
        if hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE) {
            bar.set_style(style.progress_chars("█▓▒░"));
        }
        Self { bar }
    }
}

impl ExecutionObserver for ProgressObserver {
    fn report(&self, event: ExecutionEvent<'_>) {
        match event {
            ExecutionEvent::Started { intent, total } => {
                self.bar.set_length(total as u64);
                self.bar.set_message(format!("{} ", intent));
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
            ExecutionEvent::ActionStarted { action } => {
                self.bar.set_message(action.action.to_string());
            }
            ExecutionEvent::ActionFinished { action, status } => {
                if status == ActionStatus::Failed {
                    self.bar.println(format!("  ✗ {} {}", action.id, action.action));
                }
                self.bar.inc(1);
            }
            ExecutionEvent::Finished { .. } => self.bar.finish_and_clear(),
        }
    }
}
