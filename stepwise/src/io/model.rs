//! Language-model client seam.
//!
//! The core only consumes completion text and produces prompts. Concrete
//! network clients live outside this crate; tests use scripted models.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use crate::session::Role;

/// One chat message sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Abstraction over completion backends.
pub trait LanguageModel {
    /// Complete the conversation and return the assistant's text.
    fn complete(&self, messages: &[Message]) -> Result<String>;
}

impl<M: LanguageModel + ?Sized> LanguageModel for &M {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        (**self).complete(messages)
    }
}
