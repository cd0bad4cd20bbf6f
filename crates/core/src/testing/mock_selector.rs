//! Scripted candidate selector.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::{Provider, ProviderError, SearchCandidate};
use crate::resolver::{CandidateSelector, Selection};

/// A recorded prompt.
#[derive(Debug, Clone)]
pub struct RecordedPrompt {
    pub provider: Provider,
    pub title: String,
    pub candidate_ids: Vec<u64>,
}

/// Answers prompts from a script, in order. Once the script is exhausted
/// every prompt is skipped.
#[derive(Debug, Default)]
pub struct ScriptedSelector {
    script: Mutex<VecDeque<Selection>>,
    prompts: Mutex<Vec<RecordedPrompt>>,
}

impl ScriptedSelector {
    pub fn new(script: Vec<Selection>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, selection: Selection) {
        self.script.lock().unwrap().push_back(selection);
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateSelector for ScriptedSelector {
    async fn select(
        &self,
        provider: Provider,
        title: &str,
        candidates: &[SearchCandidate],
    ) -> Result<Selection, ProviderError> {
        self.prompts.lock().unwrap().push(RecordedPrompt {
            provider,
            title: title.to_string(),
            candidate_ids: candidates.iter().map(|c| c.id).collect(),
        });

        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Selection::Skipped))
    }
}
