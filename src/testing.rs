//! In-crate fakes for the model and graph-store seams.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{KgserveError, Result};
use crate::graph::{GraphStore, QueryResult};
use crate::model::{ChatMessage, LanguageModel, ResponseFormat};

/// Replies with scripted completions in order and records every request
pub struct FakeModel {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(Vec<ChatMessage>, ResponseFormat)>>,
}

impl FakeModel {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<ChatMessage>, ResponseFormat)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn model_name(&self) -> &str {
        "fake/model"
    }

    async fn complete(&self, messages: &[ChatMessage], format: ResponseFormat) -> Result<String> {
        self.calls.lock().unwrap().push((messages.to_vec(), format));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| KgserveError::Model("no scripted reply left".to_string()))
    }
}

/// Records queries; answers with queued results (empty result when none queued)
pub struct RecordingStore {
    queries: Mutex<Vec<(String, String)>>,
    results: Mutex<VecDeque<Result<QueryResult>>>,
    graphs: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            graphs: Mutex::new(Vec::new()),
        }
    }

    pub fn push_result(&self, result: QueryResult) {
        self.results.lock().unwrap().push_back(Ok(result));
    }

    pub fn push_error(&self, error: KgserveError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn push_graph(&self, name: &str) {
        self.graphs.lock().unwrap().push(name.to_string());
    }

    /// `(graph, query)` pairs in execution order
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().unwrap().clone()
    }

    fn next(&self, graph: &str, cypher: &str) -> Result<QueryResult> {
        self.queries
            .lock()
            .unwrap()
            .push((graph.to_string(), cypher.to_string()));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryResult::default()))
    }
}

#[async_trait]
impl GraphStore for RecordingStore {
    async fn query(&self, graph: &str, cypher: &str) -> Result<QueryResult> {
        self.next(graph, cypher)
    }

    async fn ro_query(&self, graph: &str, cypher: &str) -> Result<QueryResult> {
        self.next(graph, cypher)
    }

    async fn list_graphs(&self) -> Result<Vec<String>> {
        Ok(self.graphs.lock().unwrap().clone())
    }
}
