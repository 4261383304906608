use shared::console::{LineKind, Tag, classify_line};

/// How a completed device line changes local input handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptEvent {
    /// The device asked for a secret; mask input.
    Masked,
    /// The secret was refused but the device keeps prompting.
    Rejected,
    /// Secret entry ended without success; unmask.
    Abandoned,
    /// A status line ended secret entry; unmask.
    Released,
}

/// Follows device output line by line to know when the user is typing a
/// secret.
#[derive(Debug, Default)]
pub struct PromptTracker {
    line: String,
    masked: bool,
}

impl PromptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_masked(&self) -> bool {
        self.masked
    }

    pub fn reset(&mut self) {
        self.line.clear();
        self.masked = false;
    }

    /// Consume a chunk of device output. Partial lines are kept until their
    /// terminator arrives.
    pub fn feed(&mut self, text: &str) -> Vec<PromptEvent> {
        let mut events = Vec::new();
        for ch in text.chars() {
            if ch == '\r' || ch == '\n' {
                let line = std::mem::take(&mut self.line);
                if let Some(event) = self.complete_line(&line) {
                    events.push(event);
                }
            } else {
                self.line.push(ch);
            }
        }
        events
    }

    fn complete_line(&mut self, line: &str) -> Option<PromptEvent> {
        if line.trim().is_empty() {
            return None;
        }

        match classify_line(line) {
            LineKind::SecretPrompt => {
                self.masked = true;
                Some(PromptEvent::Masked)
            }
            LineKind::SecretRejected => Some(PromptEvent::Rejected),
            LineKind::SecretAbandoned => {
                self.masked = false;
                Some(PromptEvent::Abandoned)
            }
            LineKind::Tagged(tag) if self.masked && releases_prompt(tag) => {
                self.masked = false;
                Some(PromptEvent::Released)
            }
            LineKind::Tagged(_) | LineKind::Plain => None,
        }
    }
}

fn releases_prompt(tag: Tag) -> bool {
    matches!(
        tag,
        Tag::Reg | Tag::Auth | Tag::Boot | Tag::Mode | Tag::Cmd | Tag::Error
    )
}
