//! Platform surface: user interaction, device metrics and output
//!
//! The capture pipeline talks to its host only through these traits, so a
//! terminal, a test harness or an embedding application can each provide
//! their own implementation.

pub mod device;
pub mod output;

pub use device::DeviceMetrics;
pub use output::{
    Delivery, DeliveryKind, DirectorySurface, MemorySurface, OutputSurface, PreviewHandle,
    ShareCapabilities,
};

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::Mutex;

/// Notices, confirmations and the wait indicator.
pub trait Interaction: Send + Sync {
    fn notify(&self, message: &str);

    /// Ask a yes/no question; `true` means go ahead.
    fn confirm(&self, message: &str) -> bool;

    fn show_progress(&self, message: &str);

    fn hide_progress(&self);
}

/// Something the user was shown or asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvent {
    Notice(String),
    Confirm(String),
    ProgressShown(String),
    ProgressHidden,
}

/// Records every interaction and answers confirmations from a script.
pub struct ScriptedInteraction {
    answers: Mutex<VecDeque<bool>>,
    default_answer: bool,
    events: Mutex<Vec<InteractionEvent>>,
}

impl ScriptedInteraction {
    /// Answer every confirmation with `answer`.
    pub fn answering(answer: bool) -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            default_answer: answer,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Answer confirmations in order, then fall back to `false`.
    pub fn with_answers(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            default_answer: false,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<InteractionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                InteractionEvent::Notice(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn confirmations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                InteractionEvent::Confirm(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Whether the wait indicator is currently up.
    pub fn progress_visible(&self) -> bool {
        let mut visible = false;
        for e in self.events() {
            match e {
                InteractionEvent::ProgressShown(_) => visible = true,
                InteractionEvent::ProgressHidden => visible = false,
                _ => {}
            }
        }
        visible
    }

    fn record(&self, event: InteractionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Interaction for ScriptedInteraction {
    fn notify(&self, message: &str) {
        self.record(InteractionEvent::Notice(message.to_string()));
    }

    fn confirm(&self, message: &str) -> bool {
        self.record(InteractionEvent::Confirm(message.to_string()));
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .unwrap_or(self.default_answer)
    }

    fn show_progress(&self, message: &str) {
        self.record(InteractionEvent::ProgressShown(message.to_string()));
    }

    fn hide_progress(&self) {
        self.record(InteractionEvent::ProgressHidden);
    }
}

/// Terminal interaction: notices on stderr, confirmations read from stdin.
pub struct ConsoleInteraction {
    assume_yes: bool,
}

impl ConsoleInteraction {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Interaction for ConsoleInteraction {
    fn notify(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            log::info!("{} [assumed yes]", message);
            return true;
        }
        eprint!("{} [y/N] ", message);
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }

    fn show_progress(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn hide_progress(&self) {}
}
