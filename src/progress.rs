use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::ui;

/// Completed vs. total steps of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    completed: usize,
    total: usize,
}

impl RunProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.total
    }

    /// Moves forward one step. Returns `false`, unchanged, once `total` is reached.
    pub fn advance(&mut self) -> bool {
        if self.completed >= self.total {
            return false;
        }
        self.completed += 1;
        true
    }
}

/// Receives progress after each finished step.
pub trait ProgressSink {
    fn report(&mut self, progress: RunProgress, step: &str);

    fn finish(&mut self) {}
}

/// In-place console bar. While it is alive, `ui` status lines print above it.
pub struct ConsoleProgress {
    bar: ProgressBar,
    attached: bool,
}

impl ConsoleProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stdout());
        let style = ProgressStyle::with_template("[{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        ui::attach_bar(&bar);
        Self {
            bar,
            attached: true,
        }
    }

    pub fn hidden(total: usize) -> Self {
        Self {
            bar: ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden()),
            attached: false,
        }
    }

    fn detach(&mut self) {
        if self.attached {
            ui::detach_bar();
            self.attached = false;
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&mut self, progress: RunProgress, step: &str) {
        self.bar.set_length(progress.total() as u64);
        self.bar.set_position(progress.completed() as u64);
        self.bar.set_message(step.to_string());
    }

    fn finish(&mut self) {
        self.bar.finish_with_message("done");
        self.detach();
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Keeps every report for assertions.
    #[derive(Default)]
    pub struct Recorder {
        pub seen: Vec<(RunProgress, String)>,
        pub finished: bool,
    }

    impl ProgressSink for Recorder {
        fn report(&mut self, progress: RunProgress, step: &str) {
            self.seen.push((progress, step.to_string()));
        }

        fn finish(&mut self) {
            self.finished = true;
        }
    }

    #[test]
    fn advance_is_bounded() {
        let mut p = RunProgress::new(2);
        assert!(p.advance());
        assert!(p.advance());
        assert!(p.is_done());
        assert!(!p.advance());
        assert_eq!(p.completed(), 2);
    }

    #[test]
    fn empty_run_is_already_done() {
        let mut p = RunProgress::new(0);
        assert!(p.is_done());
        assert!(!p.advance());
    }

    #[test]
    fn hidden_bar_accepts_reports() {
        let mut sink = ConsoleProgress::hidden(3);
        assert!(!sink.attached);
        let mut p = RunProgress::new(3);
        p.advance();
        sink.report(p, "PsList");
        assert_eq!(sink.bar.position(), 1);
        sink.finish();
        assert!(sink.bar.is_finished());
    }
}
