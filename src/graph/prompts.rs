//! Prompt text for ontology inference, extraction and graph chat.

use crate::graph::Ontology;
use crate::source::Document;

pub const ONTOLOGY_SYSTEM: &str = "You design knowledge-graph ontologies. \
Given a document, identify the kinds of entities it talks about and the relations between them. \
Prefer a small, general ontology: reuse existing types instead of inventing near-duplicates. \
Entity labels are singular PascalCase nouns, relation labels are UPPER_SNAKE_CASE verbs. \
Every entity needs at least one attribute marked unique that identifies an instance (usually `name`). \
Attribute types are one of: string, number, boolean, list. \
Reply with a single JSON object of the form \
{\"entities\": [{\"label\": str, \"description\": str, \"attributes\": [{\"name\": str, \"type\": str, \"unique\": bool, \"required\": bool}]}], \
\"relations\": [{\"label\": str, \"source\": entity label, \"target\": entity label, \"attributes\": [...]}]}.";

pub fn ontology_user(current: &Ontology, document: &Document) -> String {
    let mut prompt = String::new();
    if !current.is_empty() {
        prompt.push_str("Ontology so far (extend it, keep existing labels):\n");
        prompt.push_str(&ontology_json(current));
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!("Document ({}):\n{}", document.source, document.content));
    prompt
}

pub const EXTRACTION_SYSTEM: &str = "You extract knowledge-graph data from documents. \
Use only the entity labels, relation labels and attribute names of the given ontology. \
Always include the unique attributes of every entity so instances can be matched. \
Do not invent facts that the document does not state. \
Reply with a single JSON object of the form \
{\"entities\": [{\"label\": str, \"attributes\": {name: value}}], \
\"relations\": [{\"label\": str, \"source\": {\"label\": str, \"attributes\": {...}}, \
\"target\": {\"label\": str, \"attributes\": {...}}, \"attributes\": {...}}]}.";

pub fn extraction_user(ontology: &Ontology, document: &Document) -> String {
    format!(
        "Ontology:\n{}\n\nDocument ({}):\n{}",
        ontology_json(ontology),
        document.source,
        document.content
    )
}

pub const CYPHER_SYSTEM: &str = "You translate questions into read-only Cypher queries for FalkorDB. \
Use only the node labels, relationship types and properties of the given ontology; \
relationship direction follows the ontology's source and target. \
Never write to the graph (no CREATE, MERGE, SET, DELETE or REMOVE). \
Return property values rather than whole nodes, and reply with the query alone in a ```cypher code block.";

pub fn cypher_user(ontology: &Ontology, question: &str, previous: Option<(&str, &str)>) -> String {
    let mut prompt = format!("Ontology:\n{}\n\nQuestion: {}", ontology_json(ontology), question);
    if let Some((query, error)) = previous {
        prompt.push_str(&format!(
            "\n\nThe previous query failed, fix it.\nQuery:\n{}\nError:\n{}",
            query, error
        ));
    }
    prompt
}

pub const QA_SYSTEM: &str = "You answer questions using results retrieved from a knowledge graph. \
Treat the results as authoritative and answer in plain language. \
If the results are empty or do not contain the answer, say that you don't know. \
Do not mention Cypher, queries or the graph itself.";

pub fn qa_user(question: &str, query: Option<&str>, context: &str) -> String {
    match query {
        Some(query) => format!(
            "Question: {}\n\nQuery used:\n{}\n\nResults:\n{}",
            question, query, context
        ),
        None => format!("Question: {}\n\nResults:\n{}", question, context),
    }
}

fn ontology_json(ontology: &Ontology) -> String {
    serde_json::to_string_pretty(ontology).unwrap_or_else(|_| "{}".to_string())
}
