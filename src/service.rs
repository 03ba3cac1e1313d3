//! Build and chat operations behind the HTTP handlers.
//!
//! Every call resolves its handles from the `Config` it is given: a model
//! handle, source loader and graph store are created per request and dropped
//! afterwards. Nothing is cached between requests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, GraphConfig};
use crate::error::{KgserveError, Result};
use crate::graph::{FalkorStore, GraphStore, KnowledgeGraph, Ontology};
use crate::model::{LanguageModel, LiteModel};
use crate::source::{load_documents, DocumentLoader, HttpLoader, Source};

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub graph: String,
    pub documents: usize,
    /// Node count after the build, `None` when it could not be read back
    pub nodes: Option<u64>,
}

/// Knowledge-graph operations exposed over HTTP
#[async_trait]
pub trait GraphRag: Send + Sync {
    /// Infer an ontology from `urls` and populate graph `graph` from them
    async fn build(&self, config: &Config, graph: &str, urls: &[String]) -> Result<BuildSummary>;

    /// Answer `message` in a fresh chat session against graph `graph`
    async fn chat(&self, config: &Config, graph: &str, message: &str) -> Result<String>;
}

/// FalkorDB + OpenAI-compatible model backend
#[derive(Debug, Clone, Copy, Default)]
pub struct FalkorGraphRag;

impl FalkorGraphRag {
    fn model(config: &Config) -> Result<LiteModel> {
        LiteModel::new(&config.model)
    }

    fn store(config: &Config) -> Result<FalkorStore> {
        FalkorStore::connect(&config.falkor)
    }
}

#[async_trait]
impl GraphRag for FalkorGraphRag {
    async fn build(&self, config: &Config, graph: &str, urls: &[String]) -> Result<BuildSummary> {
        let loader = HttpLoader::new(config.graph.max_source_chars)?;
        build_graph(
            Arc::new(Self::model(config)?),
            Arc::new(Self::store(config)?),
            &loader,
            &config.graph,
            graph,
            urls,
        )
        .await
    }

    async fn chat(&self, config: &Config, graph: &str, message: &str) -> Result<String> {
        chat_graph(
            Arc::new(Self::model(config)?),
            Arc::new(Self::store(config)?),
            &config.graph,
            graph,
            message,
        )
        .await
    }
}

/// Load `urls`, infer an ontology from them and populate `graph`
pub async fn build_graph(
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn GraphStore>,
    loader: &dyn DocumentLoader,
    settings: &GraphConfig,
    graph: &str,
    urls: &[String],
) -> Result<BuildSummary> {
    let sources = urls
        .iter()
        .map(|u| Source::url(u))
        .collect::<Result<Vec<_>>>()?;
    let documents = load_documents(loader, &sources).await?;

    let ontology = Ontology::from_documents(&documents, model.as_ref()).await?;

    let kg = KnowledgeGraph::new(graph, model, store, Some(ontology))
        .with_cypher_attempts(settings.cypher_attempts);
    let report = kg.process_documents(&documents).await?;

    let nodes = match kg.node_count().await {
        Ok(count) => Some(count),
        Err(e) => {
            log::warn!("Could not count nodes of '{}': {}", graph, e);
            None
        }
    };

    log::info!(
        "Built '{}' from {} documents ({} entities, {} relations written)",
        graph,
        report.documents,
        report.entities,
        report.relations
    );

    Ok(BuildSummary {
        graph: graph.to_string(),
        documents: report.documents,
        nodes,
    })
}

/// Answer `message` against an existing `graph`
pub async fn chat_graph(
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn GraphStore>,
    settings: &GraphConfig,
    graph: &str,
    message: &str,
) -> Result<String> {
    let kg = KnowledgeGraph::new(graph, model, store, None).with_cypher_attempts(settings.cypher_attempts);

    if !kg.exists().await? {
        return Err(KgserveError::GraphNotFound(graph.to_string()));
    }

    let mut session = kg.chat_session().await?;
    session.send_message(message).await
}
