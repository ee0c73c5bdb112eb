//! Test-only text generator with canned replies.

use std::sync::Mutex;

use async_trait::async_trait;
use codeindex_core::{CodeIndexError, Result};

use crate::llm::GenerationGateway;

/// Generator that returns a fixed reply, or always fails, and records every
/// prompt it receives.
#[derive(Debug)]
pub struct ScriptedGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    #[must_use]
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of prompts received.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// The most recent prompt, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

#[async_trait]
impl GenerationGateway for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply
            .clone()
            .ok_or_else(|| CodeIndexError::Gateway("mock generator is offline".into()))
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}
