//! Operator prompts and inputs (spec.md §4.2, §6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Input widget kind solicited from the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Csv,
    Table,
    Buttons,
    Text,
    Number,
}

/// A blocking request for operator-supplied data.
#[derive(Debug, Clone)]
pub struct InputRequest {
    pub message: String,
    pub input_type: InputType,
    pub options: Option<Vec<String>>,
}

/// A non-blocking operator prompt. The handle stays truthy until the
/// operator dismisses it (spec.md §4.2).
pub struct Prompt {
    message: String,
    pause_recipe: bool,
    dismissed: Arc<AtomicBool>,
}

impl Prompt {
    pub fn new(message: impl Into<String>, pause_recipe: bool) -> Self {
        Self {
            message: message.into(),
            pause_recipe,
            dismissed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn pauses_recipe(&self) -> bool {
        self.pause_recipe
    }

    /// Whether the operator has dismissed this prompt.
    pub fn is_dismissed(&self) -> bool {
        self.dismissed.load(Ordering::SeqCst)
    }

    /// A cloneable handle the host can use to dismiss this prompt
    /// asynchronously (e.g. from a UI button handler).
    pub fn dismiss_handle(&self) -> PromptDismissHandle {
        PromptDismissHandle {
            dismissed: self.dismissed.clone(),
        }
    }

    /// Dismiss directly - used by test doubles and the reference host.
    pub fn dismiss(&self) {
        self.dismissed.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct PromptDismissHandle {
    dismissed: Arc<AtomicBool>,
}

impl PromptDismissHandle {
    pub fn dismiss(&self) {
        self.dismissed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_starts_undismissed_and_can_be_dismissed_via_handle() {
        let p = Prompt::new("overpressure on P2", false);
        assert!(!p.is_dismissed());
        let handle = p.dismiss_handle();
        handle.dismiss();
        assert!(p.is_dismissed());
    }
}
