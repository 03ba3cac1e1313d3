//! Entity and relation extraction from document content (model-based).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::cypher;
use super::ontology::{Entity, Ontology};
use super::prompts;
use crate::error::Result;
use crate::model::{parse_json_reply, ChatMessage, LanguageModel, ResponseFormat};
use crate::source::Document;

/// One entity instance found in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub label: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// One relation instance between two entity instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub label: String,
    pub source: ExtractedEntity,
    pub target: ExtractedEntity,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub relations: Vec<ExtractedRelation>,
}

/// Ask the model for the entities and relations of `document`
pub async fn extract_graph(
    model: &dyn LanguageModel,
    ontology: &Ontology,
    document: &Document,
) -> Result<Extraction> {
    let messages = [
        ChatMessage::system(prompts::EXTRACTION_SYSTEM),
        ChatMessage::user(prompts::extraction_user(ontology, document)),
    ];
    let reply = model.complete(&messages, ResponseFormat::Json).await?;
    parse_json_reply(&reply)
}

impl Extraction {
    /// Keep only what `ontology` allows.
    ///
    /// Labels are sanitized like the ontology's and mapped to its spelling, undeclared and null
    /// attributes are removed, and entities missing any unique attribute are
    /// dropped along with relations that touch them.
    pub fn conform(self, ontology: &Ontology) -> Extraction {
        let entities: Vec<ExtractedEntity> = self
            .entities
            .into_iter()
            .filter_map(|e| conform_entity(e, ontology))
            .collect();

        let relations = self
            .relations
            .into_iter()
            .filter_map(|r| {
                let source = conform_entity(r.source, ontology)?;
                let target = conform_entity(r.target, ontology)?;
                let label = cypher::identifier(&r.label);
                let Some(def) = ontology.relation(&label, &source.label, &target.label) else {
                    log::debug!(
                        "Dropping relation {} ({} -> {}) not in ontology",
                        r.label,
                        source.label,
                        target.label
                    );
                    return None;
                };
                let attributes = r
                    .attributes
                    .into_iter()
                    .filter(|(k, v)| !v.is_null() && def.attribute(k).is_some())
                    .collect();
                Some(ExtractedRelation {
                    label: def.label.clone(),
                    source,
                    target,
                    attributes,
                })
            })
            .collect();

        Extraction { entities, relations }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

fn conform_entity(entity: ExtractedEntity, ontology: &Ontology) -> Option<ExtractedEntity> {
    let Some(def) = ontology.entity(&cypher::identifier(&entity.label)) else {
        log::debug!("Dropping entity with unknown label {}", entity.label);
        return None;
    };

    let attributes: Map<String, Value> = entity
        .attributes
        .into_iter()
        .filter(|(k, v)| !v.is_null() && def.attribute(k).is_some())
        .collect();

    if def.unique_attributes().any(|a| !attributes.contains_key(&a.name)) {
        log::debug!("Dropping {} entity without identity attributes", def.label);
        return None;
    }

    Some(ExtractedEntity {
        label: def.label.clone(),
        attributes,
    })
}

/// `(var:Label {unique...})` pattern for an entity instance
fn node_pattern(var: &str, entity: &ExtractedEntity, def: &Entity) -> String {
    let keys = def
        .unique_attributes()
        .filter_map(|a| entity.attributes.get(&a.name).map(|v| (a.name.as_str(), v)));
    format!("({}:{} {})", var, cypher::identifier(&def.label), cypher::property_map(keys))
}

/// `SET` clause for the non-identity attributes, empty when there are none
fn set_clause<'a>(var: &str, attributes: impl Iterator<Item = (&'a String, &'a Value)>) -> String {
    let assignments: Vec<String> = attributes
        .map(|(k, v)| format!("{}.{} = {}", var, cypher::identifier(k), cypher::literal(v)))
        .collect();
    if assignments.is_empty() {
        String::new()
    } else {
        format!(" SET {}", assignments.join(", "))
    }
}

/// MERGE statement upserting a conformed entity
pub fn merge_entity_query(entity: &ExtractedEntity, ontology: &Ontology) -> Option<String> {
    let def = ontology.entity(&entity.label)?;
    let rest = entity
        .attributes
        .iter()
        .filter(|(k, _)| def.attribute(k).map(|a| !a.unique).unwrap_or(false));
    Some(format!("MERGE {}{}", node_pattern("n", entity, def), set_clause("n", rest)))
}

/// MERGE statement upserting both endpoints and the relation between them
pub fn merge_relation_query(relation: &ExtractedRelation, ontology: &Ontology) -> Option<String> {
    let source_def = ontology.entity(&relation.source.label)?;
    let target_def = ontology.entity(&relation.target.label)?;
    Some(format!(
        "MERGE {} MERGE {} MERGE (s)-[r:{}]->(t){}",
        node_pattern("s", &relation.source, source_def),
        node_pattern("t", &relation.target, target_def),
        cypher::identifier(&relation.label),
        set_clause("r", relation.attributes.iter())
    ))
}
