//! Knowledge graph module: ontology inference, graph construction and chat.
//!
//! Graphs live in FalkorDB. The model infers an ontology from source
//! documents, extracts entities and relations that conform to it, and
//! later translates questions into Cypher over the result.

mod chat;
pub mod cypher;
mod extraction;
mod kg;
mod ontology;
mod prompts;
mod store;

pub use chat::ChatSession;
pub use extraction::{extract_graph, ExtractedEntity, ExtractedRelation, Extraction};
pub use kg::{KnowledgeGraph, ProcessReport};
pub use ontology::{schema_graph_name, Attribute, AttributeType, Entity, Ontology, Relation};
pub use store::{FalkorStore, GraphStore, QueryResult};
