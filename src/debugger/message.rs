use std::collections::VecDeque;
use std::fmt;

use crate::output::Kind;

/// Human-readable note about an operation, shown once by the front end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub kind: Kind,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Messages(VecDeque<Message>);

impl Messages {
    pub fn push(&mut self, kind: Kind, text: impl Into<String>) {
        self.0.push_back(Message {
            kind,
            text: text.into(),
        });
    }

    /// Remove and return every queued message, oldest first.
    pub fn take(&mut self) -> Vec<Message> {
        self.0.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.0.iter()
    }
}
