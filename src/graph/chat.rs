//! Conversational question answering over a knowledge graph.

use std::sync::Arc;

use uuid::Uuid;

use super::cypher;
use super::ontology::Ontology;
use super::prompts;
use super::store::{GraphStore, QueryResult};
use crate::error::{KgserveError, Result};
use crate::model::{ChatMessage, LanguageModel, ResponseFormat};

/// Retrieved context handed to the answering prompt is cut to this size
const MAX_CONTEXT_CHARS: usize = 12_000;

/// Stateful chat against one graph.
///
/// Each message goes through two model calls: question to Cypher, then
/// query results to answer. Earlier questions and answers are replayed to
/// the answering call so follow-ups resolve.
pub struct ChatSession {
    id: Uuid,
    graph: String,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn GraphStore>,
    ontology: Ontology,
    cypher_attempts: usize,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub(crate) fn new(
        graph: String,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn GraphStore>,
        ontology: Ontology,
        cypher_attempts: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            graph,
            model,
            store,
            ontology,
            cypher_attempts: cypher_attempts.max(1),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    /// Questions and answers exchanged so far
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Answer `message` from the graph
    pub async fn send_message(&mut self, message: &str) -> Result<String> {
        log::info!("Chat session {} on '{}': new message", self.id, self.graph);

        let retrieved = self.retrieve(message).await?;
        let (query, context) = match &retrieved {
            Some((query, result)) => (Some(query.as_str()), format_context(result)),
            None => (None, "[]".to_string()),
        };

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(prompts::QA_SYSTEM));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(prompts::qa_user(message, query, &context)));

        let answer = self.model.complete(&messages, ResponseFormat::Text).await?;

        self.history.push(ChatMessage::user(message));
        self.history.push(ChatMessage::assistant(answer.clone()));
        Ok(answer)
    }

    /// Generate and run a read-only query for `question`.
    ///
    /// Queries the database rejects are fed back for another attempt. Returns
    /// `None` once attempts run out; transport failures are returned as errors.
    async fn retrieve(&self, question: &str) -> Result<Option<(String, QueryResult)>> {
        let mut previous: Option<(String, String)> = None;

        for attempt in 1..=self.cypher_attempts {
            let messages = [
                ChatMessage::system(prompts::CYPHER_SYSTEM),
                ChatMessage::user(prompts::cypher_user(
                    &self.ontology,
                    question,
                    previous.as_ref().map(|(q, e)| (q.as_str(), e.as_str())),
                )),
            ];
            let reply = self.model.complete(&messages, ResponseFormat::Text).await?;

            let Some(query) = cypher::extract_query(&reply) else {
                log::warn!("Attempt {}/{}: model returned no Cypher query", attempt, self.cypher_attempts);
                previous = Some((reply, "the reply did not contain a Cypher query".to_string()));
                continue;
            };

            if !cypher::is_read_only(&query) {
                log::warn!("Attempt {}/{}: rejected writing query", attempt, self.cypher_attempts);
                previous = Some((query, "the query writes to the graph; only read queries are allowed".to_string()));
                continue;
            }

            match self.store.ro_query(&self.graph, &query).await {
                Ok(result) => {
                    log::debug!("Query returned {} rows: {}", result.rows.len(), query);
                    return Ok(Some((query, result)));
                }
                Err(KgserveError::Query(error)) => {
                    log::warn!("Attempt {}/{}: query failed: {}", attempt, self.cypher_attempts, error);
                    previous = Some((query, error));
                }
                Err(e) => return Err(e),
            }
        }

        log::warn!("No usable query after {} attempts, answering without graph context", self.cypher_attempts);
        Ok(None)
    }
}

fn format_context(result: &QueryResult) -> String {
    let text = serde_json::to_string(&result.records()).unwrap_or_else(|_| "[]".to_string());
    match text.char_indices().nth(MAX_CONTEXT_CHARS) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text,
    }
}
