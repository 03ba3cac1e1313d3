//! Named knowledge graph bound to a model and a graph store.

use std::sync::Arc;

use serde_json::Value;

use super::chat::ChatSession;
use super::extraction::{extract_graph, merge_entity_query, merge_relation_query};
use super::ontology::Ontology;
use super::store::GraphStore;
use crate::error::{KgserveError, Result};
use crate::model::LanguageModel;
use crate::source::Document;

/// Counts from one `process_documents` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub documents: usize,
    pub entities: usize,
    pub relations: usize,
}

pub struct KnowledgeGraph {
    name: String,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn GraphStore>,
    ontology: Option<Ontology>,
    cypher_attempts: usize,
}

impl KnowledgeGraph {
    /// Bind a handle to graph `name`.
    ///
    /// Without an ontology the handle attaches to whatever graph of that name
    /// already exists; chat sessions load its persisted ontology.
    pub fn new(
        name: impl Into<String>,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn GraphStore>,
        ontology: Option<Ontology>,
    ) -> Self {
        Self {
            name: name.into(),
            model,
            store,
            ontology,
            cypher_attempts: 3,
        }
    }

    pub fn with_cypher_attempts(mut self, attempts: usize) -> Self {
        self.cypher_attempts = attempts.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ontology(&self) -> Option<&Ontology> {
        self.ontology.as_ref()
    }

    /// Whether the graph exists in the database
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.store.list_graphs().await?.iter().any(|g| g == &self.name))
    }

    /// Populate the graph from `documents` according to the ontology.
    ///
    /// The ontology is persisted first so the graph can be reopened by name.
    /// Writes are MERGEs keyed on unique attributes, so re-processing the
    /// same documents extends rather than duplicates.
    pub async fn process_documents(&self, documents: &[Document]) -> Result<ProcessReport> {
        let ontology = self.ontology.as_ref().ok_or_else(|| {
            KgserveError::Ontology(format!("graph '{}' has no ontology to build with", self.name))
        })?;

        ontology.save(self.store.as_ref(), &self.name).await?;
        self.create_indexes(ontology).await?;

        let mut report = ProcessReport::default();
        for document in documents {
            let extraction = extract_graph(self.model.as_ref(), ontology, document)
                .await?
                .conform(ontology);
            if extraction.is_empty() {
                log::warn!("No entities extracted from {}", document.source);
            }

            for entity in &extraction.entities {
                if let Some(query) = merge_entity_query(entity, ontology) {
                    self.store.query(&self.name, &query).await?;
                    report.entities += 1;
                }
            }
            for relation in &extraction.relations {
                if let Some(query) = merge_relation_query(relation, ontology) {
                    self.store.query(&self.name, &query).await?;
                    report.relations += 1;
                }
            }

            report.documents += 1;
            log::info!(
                "Processed {} into '{}': {} entities, {} relations",
                document.source,
                self.name,
                extraction.entities.len(),
                extraction.relations.len()
            );
        }

        Ok(report)
    }

    /// Index the MERGE keys. Also creates the graph itself, so it exists
    /// even when no document yields any entity.
    async fn create_indexes(&self, ontology: &Ontology) -> Result<()> {
        for query in ontology.index_queries() {
            match self.store.query(&self.name, &query).await {
                Ok(_) => {}
                // rebuilding over an existing graph: the index is already there
                Err(KgserveError::Query(e)) => log::debug!("Skipping index on '{}': {}", self.name, e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Number of nodes in the graph
    pub async fn node_count(&self) -> Result<u64> {
        let result = self.store.ro_query(&self.name, "MATCH (n) RETURN count(n)").await?;
        match result.scalar() {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| KgserveError::Query(format!("unexpected node count {}", n))),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| KgserveError::Query(format!("unexpected node count {:?}", s))),
            other => Err(KgserveError::Query(format!("unexpected node count {:?}", other))),
        }
    }

    /// Open a chat session against this graph
    pub async fn chat_session(&self) -> Result<ChatSession> {
        let ontology = match &self.ontology {
            Some(ontology) => ontology.clone(),
            None => match Ontology::load(self.store.as_ref(), &self.name).await? {
                Some(ontology) => ontology,
                None => {
                    log::warn!("No persisted ontology for '{}', chatting without one", self.name);
                    Ontology::default()
                }
            },
        };

        Ok(ChatSession::new(
            self.name.clone(),
            Arc::clone(&self.model),
            Arc::clone(&self.store),
            ontology,
            self.cypher_attempts,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::QueryResult;
    use crate::testing::{FakeModel, RecordingStore};
    use serde_json::json;

    fn ontology() -> Ontology {
        let mut ontology: Ontology = serde_json::from_value(json!({
            "entities": [{"label": "Person"}, {"label": "City"}],
            "relations": [{"label": "LIVES_IN", "source": "Person", "target": "City"}]
        }))
        .unwrap();
        ontology.normalize();
        ontology
    }

    fn doc(source: &str) -> Document {
        Document {
            source: source.to_string(),
            content: "Ada lives in London".to_string(),
        }
    }

    #[tokio::test]
    async fn test_process_documents_writes_merges() {
        let model = Arc::new(FakeModel::new(vec![json!({
            "entities": [
                {"label": "Person", "attributes": {"name": "Ada"}},
                {"label": "Robot", "attributes": {"name": "R2"}}
            ],
            "relations": [{
                "label": "LIVES_IN",
                "source": {"label": "Person", "attributes": {"name": "Ada"}},
                "target": {"label": "City", "attributes": {"name": "London"}}
            }]
        })
        .to_string()]));
        let store = Arc::new(RecordingStore::new());
        let kg = KnowledgeGraph::new("people", model, store.clone(), Some(ontology()));

        let report = kg.process_documents(&[doc("http://example.com/a")]).await.unwrap();
        assert_eq!(report, ProcessReport { documents: 1, entities: 1, relations: 1 });

        let queries = store.queries();
        assert_eq!(queries.len(), 5);
        assert_eq!(queries[0].0, "people_schema");
        assert_eq!(queries[1], ("people".to_string(), "CREATE INDEX FOR (n:Person) ON (n.name)".to_string()));
        assert_eq!(queries[2], ("people".to_string(), "CREATE INDEX FOR (n:City) ON (n.name)".to_string()));
        assert!(queries[3..].iter().all(|(graph, q)| graph == "people" && q.starts_with("MERGE")));
    }

    #[tokio::test]
    async fn test_empty_extraction_still_creates_graph() {
        let model = Arc::new(FakeModel::new(vec![json!({"entities": [], "relations": []}).to_string()]));
        let store = Arc::new(RecordingStore::new());
        let kg = KnowledgeGraph::new("default", model, store.clone(), Some(ontology()));

        let report = kg.process_documents(&[doc("http://example.com/a")]).await.unwrap();
        assert_eq!(report, ProcessReport { documents: 1, entities: 0, relations: 0 });

        let queries = store.queries();
        assert!(queries.iter().any(|(graph, q)| graph == "default" && q.starts_with("CREATE INDEX")));
    }

    #[tokio::test]
    async fn test_existing_indexes_do_not_fail_rebuild() {
        let model = Arc::new(FakeModel::new(vec![json!({
            "entities": [{"label": "Person", "attributes": {"name": "Ada"}}]
        })
        .to_string()]));
        let store = Arc::new(RecordingStore::new());
        store.push_result(QueryResult::default());
        store.push_error(KgserveError::Query("Attribute 'name' is already indexed".to_string()));
        store.push_error(KgserveError::Query("Attribute 'name' is already indexed".to_string()));
        let kg = KnowledgeGraph::new("default", model, store.clone(), Some(ontology()));

        let report = kg.process_documents(&[doc("http://example.com/a")]).await.unwrap();
        assert_eq!(report.entities, 1);
    }

    #[tokio::test]
    async fn test_index_transport_error_aborts_build() {
        let store = Arc::new(RecordingStore::new());
        store.push_result(QueryResult::default());
        store.push_error(KgserveError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        let kg = KnowledgeGraph::new("default", Arc::new(FakeModel::new(vec![])), store, Some(ontology()));

        let err = kg.process_documents(&[doc("http://example.com/a")]).await.unwrap_err();
        assert!(matches!(err, KgserveError::Io(_)));
    }

    #[tokio::test]
    async fn test_process_documents_requires_ontology() {
        let kg = KnowledgeGraph::new(
            "default",
            Arc::new(FakeModel::new(vec![])),
            Arc::new(RecordingStore::new()),
            None,
        );
        let err = kg.process_documents(&[doc("http://example.com/a")]).await.unwrap_err();
        assert!(matches!(err, KgserveError::Ontology(_)));
    }

    #[tokio::test]
    async fn test_node_count() {
        let store = Arc::new(RecordingStore::new());
        store.push_result(QueryResult {
            columns: vec!["count(n)".to_string()],
            rows: vec![vec![json!(42)]],
        });
        let kg = KnowledgeGraph::new("default", Arc::new(FakeModel::new(vec![])), store.clone(), None);

        assert_eq!(kg.node_count().await.unwrap(), 42);
        assert_eq!(store.queries()[0], ("default".to_string(), "MATCH (n) RETURN count(n)".to_string()));
    }

    #[tokio::test]
    async fn test_node_count_without_rows_is_error() {
        let kg = KnowledgeGraph::new(
            "default",
            Arc::new(FakeModel::new(vec![])),
            Arc::new(RecordingStore::new()),
            None,
        );
        assert!(kg.node_count().await.is_err());
    }

    #[tokio::test]
    async fn test_exists() {
        let store = Arc::new(RecordingStore::new());
        store.push_graph("default");
        store.push_graph("default_schema");
        let model: Arc<dyn LanguageModel> = Arc::new(FakeModel::new(vec![]));

        let kg = KnowledgeGraph::new("default", Arc::clone(&model), store.clone(), None);
        assert!(kg.exists().await.unwrap());

        let kg = KnowledgeGraph::new("other", model, store, None);
        assert!(!kg.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_chat_session_loads_persisted_ontology() {
        let store = Arc::new(RecordingStore::new());
        store.push_graph("default");
        store.push_graph("default_schema");
        store.push_result(QueryResult {
            columns: vec!["o.json".to_string()],
            rows: vec![vec![json!(serde_json::to_string(&ontology()).unwrap())]],
        });
        let kg = KnowledgeGraph::new("default", Arc::new(FakeModel::new(vec![])), store, None);

        let session = kg.chat_session().await.unwrap();
        assert_eq!(session.ontology(), &ontology());
        assert_eq!(session.graph(), "default");
    }
}
