//! Retrieval-augmented answering over chat sessions

use serde::Serialize;
use std::sync::Arc;

use super::prompt::PromptBuilder;
use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::retrieval::{QueryService, ScoredChunk};
use crate::session::{ChatMessage, Role, SessionStore};

/// History text used when there is no conversation to draw on
const NO_HISTORY: &str = "No previous conversation.";

/// A generated answer with the chunks it was grounded on
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    /// Retrieved chunks, most similar first
    pub sources: Vec<ScoredChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Assistant message appended to the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
}

/// Retrieve, prompt, generate and record
pub struct RagChain {
    query: Arc<QueryService>,
    sessions: Arc<SessionStore>,
    llm: Arc<dyn LlmProvider>,
    history_window: usize,
}

impl RagChain {
    pub fn new(
        query: Arc<QueryService>,
        sessions: Arc<SessionStore>,
        llm: Arc<dyn LlmProvider>,
        history_window: usize,
    ) -> Self {
        Self {
            query,
            sessions,
            llm,
            history_window,
        }
    }

    /// Answer a one-off question with no conversation history
    pub async fn ask(
        &self,
        question: &str,
        top_k: usize,
        collection: Option<&str>,
    ) -> Result<Answer> {
        let results = self.query.query(question, top_k, collection).await?;
        let answer = self.generate(question, &results, NO_HISTORY).await?;

        Ok(Answer {
            answer,
            sources: results,
            session_id: None,
            message: None,
        })
    }

    /// Answer within a session and append both turns to it
    ///
    /// The session must already exist. Retrieval uses the session's
    /// collection unless `collection` overrides it, and the prompt carries
    /// the turns that preceded this question. The question stays in the
    /// session even when generation fails.
    pub async fn ask_in_session(
        &self,
        session_id: &str,
        question: &str,
        top_k: usize,
        collection: Option<&str>,
    ) -> Result<Answer> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Config("Query text must not be empty".to_string()));
        }
        let collection = collection.unwrap_or(&session.collection);

        let history = self
            .sessions
            .formatted_history(session_id, self.history_window)?;
        self.sessions
            .add_message(session_id, Role::User, question, Vec::new())?;

        let results = self.query.query(question, top_k, Some(collection)).await?;
        let answer = self.generate(question, &results, &history).await?;

        let message = self.sessions.add_message(
            session_id,
            Role::Assistant,
            answer.clone(),
            PromptBuilder::source_names(&results),
        )?;
        tracing::info!(
            "[{}] Answered from {} chunks of '{}'",
            session_id,
            results.len(),
            collection
        );

        Ok(Answer {
            answer,
            sources: results,
            session_id: Some(session_id.to_string()),
            message: Some(message),
        })
    }

    async fn generate(
        &self,
        question: &str,
        results: &[ScoredChunk],
        history: &str,
    ) -> Result<String> {
        let context = PromptBuilder::build_context(results);
        let prompt = PromptBuilder::build_rag_prompt(question, &context, history);
        tracing::debug!(
            "Generating with {} ({} prompt chars)",
            self.llm.model(),
            prompt.len()
        );
        self.llm.generate(&prompt).await
    }

    /// Whether the LLM provider is reachable
    pub async fn health(&self) -> bool {
        self.llm.health_check().await.unwrap_or(false)
    }

    /// Name and model of the LLM provider
    pub fn model(&self) -> (&str, &str) {
        (self.llm.name(), self.llm.model())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        EmbeddingProvider, InMemoryVectorStore, VectorRecord, VectorStoreProvider,
    };
    use crate::types::Metadata;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(if text.contains("cats") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "axis"
        }
    }

    /// Records prompts; fails every call when `reply` is `None`
    struct ScriptedLlm {
        reply: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn replying(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            self.reply
                .map(str::to_string)
                .ok_or_else(|| Error::llm("model overloaded"))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(self.reply.is_some())
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }
    }

    async fn chain_over(
        collection: &str,
        llm: Arc<ScriptedLlm>,
    ) -> (RagChain, Arc<SessionStore>) {
        let vectors = Arc::new(InMemoryVectorStore::new());
        let records = [
            ("cats", vec![0.9, 0.1], "cats.txt"),
            ("dogs", vec![0.1, 0.9], "dogs.txt"),
        ]
        .into_iter()
        .map(|(id, embedding, file)| {
            let metadata: Metadata =
                serde_json::from_value(json!({ "original_filename": file })).unwrap();
            VectorRecord {
                id: id.to_string(),
                embedding,
                document: format!("Everything about {}.", id),
                metadata,
            }
        })
        .collect::<Vec<_>>();
        vectors.upsert(collection, &records).await.unwrap();

        let query = Arc::new(QueryService::new(Arc::new(AxisEmbedder), vectors, "docs"));
        let sessions = Arc::new(SessionStore::new());
        let chain = RagChain::new(query, Arc::clone(&sessions), llm, 10);
        (chain, sessions)
    }

    #[tokio::test]
    async fn test_session_answer_appends_both_turns() {
        let llm = ScriptedLlm::replying("Cats sleep most of the day.");
        let (chain, sessions) = chain_over("docs", Arc::clone(&llm)).await;
        sessions.create("docs", Some("s".into()));
        sessions.add_message("s", Role::User, "hello", vec![]).unwrap();
        sessions.add_message("s", Role::Assistant, "hi there", vec![]).unwrap();

        let answer = chain
            .ask_in_session("s", "tell me about cats", 1, None)
            .await
            .unwrap();
        assert_eq!(answer.answer, "Cats sleep most of the day.");
        assert_eq!(answer.sources[0].id, "cats");
        assert_eq!(answer.session_id.as_deref(), Some("s"));

        let session = sessions.get("s").unwrap();
        assert_eq!(session.messages.len(), 4);
        assert_eq!(session.messages[2].role, Role::User);
        assert_eq!(session.messages[2].content, "tell me about cats");
        assert_eq!(session.messages[3].role, Role::Assistant);
        assert_eq!(session.messages[3].sources, vec!["cats.txt"]);

        let prompts = llm.prompts.lock();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[Source 1: cats.txt - Relevance:"));
        assert!(prompts[0].contains("Human: hello\nAssistant: hi there"));
        assert!(!prompts[0].contains("Human: tell me about cats"));
        assert!(prompts[0].contains("User Question: tell me about cats"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let llm = ScriptedLlm::replying("unused");
        let (chain, _) = chain_over("docs", Arc::clone(&llm)).await;

        let err = chain
            .ask_in_session("missing", "tell me about cats", 2, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
        assert!(llm.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_session_collection_is_used_by_default() {
        let (chain, sessions) = chain_over("pets", ScriptedLlm::replying("ok")).await;
        sessions.create("pets", Some("s".into()));

        let answer = chain.ask_in_session("s", "dogs?", 2, None).await.unwrap();
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].id, "dogs");

        let other = chain
            .ask_in_session("s", "dogs?", 2, Some("docs"))
            .await
            .unwrap();
        assert!(other.sources.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_question_only() {
        let (chain, sessions) = chain_over("docs", ScriptedLlm::failing()).await;
        sessions.create("docs", Some("s".into()));

        let err = chain
            .ask_in_session("s", "tell me about cats", 2, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Llm(_)));

        let session = sessions.get("s").unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::User);
        assert!(!chain.health().await);
    }

    #[tokio::test]
    async fn test_one_off_answer_has_no_history() {
        let llm = ScriptedLlm::replying("Dogs bark.");
        let (chain, sessions) = chain_over("docs", Arc::clone(&llm)).await;

        let answer = chain.ask("what about dogs", 1, None).await.unwrap();
        assert_eq!(answer.answer, "Dogs bark.");
        assert!(answer.message.is_none());
        assert!(sessions.list().is_empty());
        assert!(llm.prompts.lock()[0].contains("Chat History:\nNo previous conversation."));
    }
}
