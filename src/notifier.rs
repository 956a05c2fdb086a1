//! Console implementation of the progress/event sink.
//!
//! [`Notifier`] wraps `env_logger` (text logs) and `indicatif`
//! (spinners/bars) under a single verbosity switch:
//! - [`VerbosityLevel::Quiet`] → no text logs; a live spinner plus a
//!   per-job progress bar.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/
//!   [`VerbosityLevel::Trace`] → standard timestamped logs, no bars.
//!
//! The core never sees any of this: it talks to
//! [`crate::sink::ProgressSink`], and this type is just the CLI's
//! implementation of it.

use crate::sink::{EventLevel, ProgressSink};
use env_logger::Env;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Record};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0, // progress bars, no text logs
    Info = 1,  // text logs at info level
    Debug = 2, // text logs at debug level
    Trace = 3, // text logs at trace level
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    logger: env_logger::Logger,
    multi_progress: Option<Arc<MultiProgress>>,
    active_spinner: RefCell<Option<ProgressBar>>,
    active_bar: RefCell<Option<ProgressBar>>,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        let verbosity = VerbosityLevel::from(verbosity_level);

        let logger = env_logger::Builder::from_env(Env::default())
            .filter_level(verbosity.to_log_level())
            .build();

        let multi_progress = if verbosity == VerbosityLevel::Quiet {
            Some(Arc::new(MultiProgress::new()))
        } else {
            None
        };

        Self {
            verbosity,
            logger,
            multi_progress,
            active_spinner: RefCell::new(None),
            active_bar: RefCell::new(None),
        }
    }

    pub fn use_beautiful_progress(&self) -> bool {
        self.verbosity == VerbosityLevel::Quiet
    }

    pub fn verbosity_level(&self) -> VerbosityLevel {
        self.verbosity
    }

    fn log(&self, level: Level, message: &str) {
        self.logger.log(
            &Record::builder()
                .args(format_args!("{}", message))
                .level(level)
                .target(module_path!())
                .build(),
        );
    }

    fn spinner_message(&self, message: &str) {
        // Lazy initialize spinner on first message
        if self.active_spinner.borrow().is_none() {
            if let Some(multi_progress) = &self.multi_progress {
                let spinner_style = ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap();

                let spinner = multi_progress.add(ProgressBar::new_spinner());
                spinner.set_style(spinner_style);
                spinner.enable_steady_tick(Duration::from_millis(100));

                *self.active_spinner.borrow_mut() = Some(spinner);
            }
        }

        if let Some(spinner) = self.active_spinner.borrow().as_ref() {
            spinner.set_message(message.to_string());
        }
    }

    fn bar_progress(&self, completed: usize, total: usize, current: &str) {
        let Some(multi_progress) = &self.multi_progress else {
            return;
        };

        let mut slot = self.active_bar.borrow_mut();
        let stale = slot
            .as_ref()
            .map(|bar| bar.length() != Some(total as u64))
            .unwrap_or(true);
        if stale {
            if let Some(old) = slot.take() {
                old.finish_and_clear();
            }
            let style = ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
                )
                .unwrap()
                .progress_chars("=> ");
            let bar = multi_progress.add(ProgressBar::new(total as u64));
            bar.set_style(style);
            *slot = Some(bar);
        }

        if let Some(bar) = slot.as_ref() {
            bar.set_position(completed as u64);
            bar.set_message(current.to_string());
            if completed >= total {
                bar.finish_and_clear();
                *slot = None;
            }
        }
    }
}

impl ProgressSink for Notifier {
    fn progress(&self, completed: usize, total: usize, current: &str) {
        if self.use_beautiful_progress() {
            self.bar_progress(completed, total, current);
        } else if completed % 100 == 0 || completed == total {
            self.log(
                Level::Info,
                &format!("{}/{}: {}", completed, total, current),
            );
        }
    }

    fn event(&self, level: EventLevel, message: &str) {
        match (level, self.use_beautiful_progress()) {
            (EventLevel::Info, true) => self.spinner_message(message),
            // Quiet mode renders bars only; failures surface through the
            // job result, not interleaved text.
            (_, true) => {}
            (EventLevel::Info, false) => self.log(Level::Info, message),
            (EventLevel::Debug, false) => self.log(Level::Debug, message),
            (EventLevel::Note, false) => self.log(Level::Info, &format!("note: {}", message)),
            (EventLevel::Warn, false) => self.log(Level::Warn, message),
            (EventLevel::Error, false) => self.log(Level::Error, message),
            (EventLevel::Fatal, false) => self.log(Level::Error, message),
        }
    }
}
