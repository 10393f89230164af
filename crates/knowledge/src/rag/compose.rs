//! Grounded answer generation.

use crate::rag::citations::extract_citations;
use crate::types::{Answer, AnswerKind, RetrievalResult};
use meeple_core::retry::with_retry;
use meeple_core::{AppError, AppResult, RetryPolicy};
use meeple_llm::{LlmClient, LlmRequest};
use meeple_prompt::{build_prompt, PromptDefinition};
use serde_json::json;
use std::sync::Arc;

/// Turns retrieved passages into a cited answer.
#[derive(Clone)]
pub struct AnswerComposer {
    llm: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    temperature: f32,
    max_tokens: Option<u32>,
    confidence_threshold: f32,
    retry: RetryPolicy,
}

impl AnswerComposer {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, prompt: PromptDefinition) -> Self {
        Self {
            llm,
            model: model.into(),
            prompt,
            temperature: 0.2,
            max_tokens: None,
            confidence_threshold: 0.30,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Top relevance below which the model is told to answer cautiously.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Answer `question` from `retrieved` only.
    ///
    /// An empty retrieval yields the fixed insufficient-information answer
    /// without calling the model.
    pub async fn compose(&self, question: &str, retrieved: &RetrievalResult) -> AppResult<Answer> {
        let Some(top_relevance) = retrieved.top_relevance() else {
            tracing::info!(game = %retrieved.game, "No passages, answering without the model");
            return Ok(Answer::insufficient(retrieved.game.clone(), question));
        };

        let low_confidence = top_relevance < self.confidence_threshold;
        let request = self.build_request(question, retrieved, low_confidence)?;

        tracing::debug!(
            provider = self.llm.provider_name(),
            model = %self.model,
            passages = retrieved.chunks.len(),
            low_confidence,
            "Generating answer"
        );

        // Nothing may be left once unknown markers are stripped
        let parsed = with_retry(&self.retry, "generate", || async {
            let response = self.llm.complete(&request).await?;
            if response.is_blank() {
                return Err(AppError::Generation(
                    "Model returned an empty completion".to_string(),
                ));
            }

            let parsed = extract_citations(&response.content, retrieved);
            if parsed.text.trim().is_empty() {
                return Err(AppError::Generation(
                    "Model reply cited only passages that were not retrieved".to_string(),
                ));
            }
            Ok(parsed)
        })
        .await?;

        tracing::info!(
            game = %retrieved.game,
            citations = parsed.citations.len(),
            "Answer generated (top relevance {:.3})",
            top_relevance
        );

        Ok(Answer {
            game: retrieved.game.clone(),
            question: question.to_string(),
            text: parsed.text,
            citations: parsed.citations,
            kind: AnswerKind::Answered,
            top_relevance: Some(top_relevance),
        })
    }

    fn build_request(
        &self,
        question: &str,
        retrieved: &RetrievalResult,
        low_confidence: bool,
    ) -> AppResult<LlmRequest> {
        let passages: Vec<_> = retrieved
            .chunks
            .iter()
            .map(|c| {
                json!({
                    "id": c.chunk_id.as_str(),
                    "section": c.section,
                    "text": c.text,
                })
            })
            .collect();

        let example_id = retrieved
            .chunks
            .first()
            .map(|c| c.chunk_id.to_string())
            .unwrap_or_default();

        let variables = json!({
            "game": retrieved.game.as_str(),
            "question": question,
            "passages": passages,
            "example_id": example_id,
            "low_confidence": low_confidence,
        });

        let built = build_prompt(&self.prompt, &variables)?;

        let mut request =
            LlmRequest::new(built.user, self.model.clone()).with_temperature(self.temperature);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkId, GameName, RetrievedChunk};
    use meeple_llm::LlmResponse;
    use meeple_prompt::builtin::builtin_prompt;
    use meeple_prompt::GROUNDED_ANSWER_PROMPT_ID;
    use std::sync::Mutex;

    /// Records requests and replies with a fixed completion.
    #[derive(Default)]
    struct Recorder {
        reply: String,
        requests: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for Recorder {
        fn provider_name(&self) -> &str {
            "recorder"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(LlmResponse {
                content: self.reply.clone(),
                model: request.model.clone(),
                usage: Default::default(),
            })
        }
    }

    fn composer(llm: Arc<Recorder>) -> AnswerComposer {
        let prompt = builtin_prompt(GROUNDED_ANSWER_PROMPT_ID).unwrap().unwrap();
        AnswerComposer::new(llm, "test-model", prompt).with_retry(RetryPolicy::none())
    }

    fn result(relevances: &[f32]) -> RetrievalResult {
        let game = GameName::parse("monopoly").unwrap();
        RetrievalResult {
            game: game.clone(),
            question: "How much is rent?".to_string(),
            chunks: relevances
                .iter()
                .enumerate()
                .map(|(seq, &relevance)| RetrievedChunk {
                    chunk_id: ChunkId::new(&game, seq),
                    sequence: seq,
                    text: format!("Rent rule number {}.", seq),
                    section: Some("RENT".to_string()),
                    relevance,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_empty_result_skips_model() {
        let llm = Arc::new(Recorder::default());
        let answer = composer(Arc::clone(&llm))
            .compose("Who wins?", &result(&[]))
            .await
            .unwrap();

        assert!(answer.is_insufficient());
        assert!(answer.citations.is_empty());
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_lists_passages_in_rank_order() {
        let llm = Arc::new(Recorder {
            reply: "Rent doubles [monopoly#1].".to_string(),
            ..Default::default()
        });
        let answer = composer(Arc::clone(&llm))
            .compose("How much is rent?", &result(&[0.9, 0.8]))
            .await
            .unwrap();

        let requests = llm.requests.lock().unwrap();
        let prompt = &requests[0].prompt;
        let first = prompt.find("[monopoly#0]").unwrap();
        let second = prompt.find("[monopoly#1]").unwrap();
        assert!(first < second);
        assert!(prompt.contains("Question: How much is rent?"));
        assert_eq!(requests[0].model, "test-model");
        assert!(!requests[0].system.as_deref().unwrap().contains("weak match"));

        assert_eq!(answer.kind, AnswerKind::Answered);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].chunk_id.as_str(), "monopoly#1");
    }

    #[tokio::test]
    async fn test_low_confidence_note() {
        let llm = Arc::new(Recorder {
            reply: "Probably 10 dollars.".to_string(),
            ..Default::default()
        });
        composer(Arc::clone(&llm))
            .compose("How much is rent?", &result(&[0.25]))
            .await
            .unwrap();

        let requests = llm.requests.lock().unwrap();
        assert!(requests[0].system.as_deref().unwrap().contains("weak match"));
    }

    #[tokio::test]
    async fn test_blank_completion_is_generation_error() {
        let llm = Arc::new(Recorder {
            reply: "  \n".to_string(),
            ..Default::default()
        });
        let result = composer(llm).compose("How much is rent?", &result(&[0.9])).await;
        assert!(matches!(result, Err(AppError::Generation(_))));
    }

    #[tokio::test]
    async fn test_reply_citing_only_unknown_passages_is_generation_error() {
        let llm = Arc::new(Recorder {
            reply: "[monopoly#7]".to_string(),
            ..Default::default()
        });
        let result = composer(Arc::clone(&llm))
            .with_retry(RetryPolicy {
                max_attempts: 2,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
            })
            .compose("How much is rent?", &result(&[0.9]))
            .await;

        assert!(matches!(result, Err(AppError::Generation(_))));
        assert_eq!(llm.requests.lock().unwrap().len(), 2);
    }
}
