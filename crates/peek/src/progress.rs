use std::{borrow::Cow, time::Duration};

use indicatif::ProgressBar;

/// Interval between spinner frames.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal spinner animated from a background thread.
///
/// The animation carries no data and never affects the command outcome. Stopping
/// is synchronous: [`Spinner::stop`] returns only after the ticking thread has
/// been joined, so whatever is printed next appears after the final frame.
/// Dropping a running spinner stops it as well, which covers early returns.
pub(crate) struct Spinner {
    /// Underlying progress bar.
    bar: ProgressBar,
}

impl Spinner {
    /// Start a spinner with an initial message.
    pub(crate) fn start(message: impl Into<Cow<'static, str>>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_message(message);
        bar.enable_steady_tick(TICK_INTERVAL);
        Self { bar }
    }

    /// Spinner that draws nothing.
    #[cfg(test)]
    pub(crate) fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Replace the current message.
    pub(crate) fn set_message(&self, message: impl Into<Cow<'static, str>>) {
        self.bar.set_message(message);
    }

    /// Stop the animation and leave `message` as the final line.
    pub(crate) fn stop(self, message: impl Into<Cow<'static, str>>) {
        // Joins the ticker thread.
        self.bar.disable_steady_tick();
        self.bar.finish_with_message(message);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.disable_steady_tick();
            self.bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_finishes_the_bar() {
        let spinner = Spinner::hidden();
        let bar = spinner.bar.clone();

        spinner.set_message("Uploading...");
        spinner.stop("done");

        assert!(bar.is_finished());
        assert_eq!(bar.message(), "done");
    }

    #[test]
    fn drop_finishes_the_bar() {
        let spinner = Spinner::hidden();
        let bar = spinner.bar.clone();

        drop(spinner);

        assert!(bar.is_finished());
    }
}
