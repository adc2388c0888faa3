use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_rs::{generation::completion::request::GenerationRequest, Ollama};
use tracing::debug;

use crate::settings::OracleSettings;

/// A language-understanding service answering free-form prompts.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// An oracle served by a local Ollama instance.
pub struct OllamaOracle {
    client: Ollama,
    model: String,
    timeout: Duration,
}

impl OllamaOracle {
    pub fn new(settings: &OracleSettings) -> Self {
        Self {
            client: Ollama::new(settings.host.clone(), settings.port),
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerationRequest::new(self.model.clone(), prompt.to_string());
        let response = tokio::time::timeout(self.timeout, self.client.generate(request))
            .await
            .with_context(|| format!("{} did not answer within {:?}", self.model, self.timeout))?
            .with_context(|| format!("generation with {} failed", self.model))?;
        debug!(model = %self.model, "Oracle answered {} bytes", response.response.len());
        Ok(response.response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use anyhow::anyhow;

    use super::*;

    /// Replays canned answers in order and records the prompts it was given.
    pub(crate) struct ScriptedOracle {
        answers: Mutex<VecDeque<String>>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedOracle {
        pub(crate) fn new<I: IntoIterator<Item = &'static str>>(answers: I) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().map(String::from).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn prompt(&self, i: usize) -> String {
            self.prompts.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("oracle has nothing more to say"))
        }
    }

    #[tokio::test]
    async fn unreachable_ollama_times_out_or_fails() {
        let oracle = OllamaOracle::new(&OracleSettings {
            host: "http://127.0.0.1".to_string(),
            port: 9,
            model: "none".to_string(),
            timeout_secs: 2,
        });
        assert!(oracle.complete("hello").await.is_err());
    }
}
