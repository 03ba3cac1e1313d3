//! Ontology: the entity and relation types a knowledge graph is built from.

use serde::{Deserialize, Serialize};

use crate::error::{KgserveError, Result};
use crate::graph::cypher;
use crate::graph::prompts;
use crate::graph::store::GraphStore;
use crate::model::{parse_json_reply, ChatMessage, LanguageModel, ResponseFormat};
use crate::source::Document;

/// Attribute value type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Number,
    Boolean,
    List,
    #[default]
    #[serde(other)]
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: AttributeType,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub required: bool,
}

impl Attribute {
    fn identity(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: AttributeType::String,
            unique: true,
            required: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Entity {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attributes that identify an instance (the MERGE key)
    pub fn unique_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.unique)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub label: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Relation {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ontology {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

/// Graph holding the persisted ontology of `graph`
pub fn schema_graph_name(graph: &str) -> String {
    format!("{}_schema", graph)
}

impl Ontology {
    /// Infer an ontology from `documents`, one model call per document.
    pub async fn from_documents(documents: &[Document], model: &dyn LanguageModel) -> Result<Self> {
        let mut ontology = Ontology::default();

        for document in documents {
            let messages = [
                ChatMessage::system(prompts::ONTOLOGY_SYSTEM),
                ChatMessage::user(prompts::ontology_user(&ontology, document)),
            ];
            let reply = model.complete(&messages, ResponseFormat::Json).await?;
            let inferred: Ontology = parse_json_reply(&reply)?;
            log::debug!(
                "Ontology from {}: {} entities, {} relations",
                document.source,
                inferred.entities.len(),
                inferred.relations.len()
            );
            ontology.merge_with(inferred);
        }

        ontology.normalize();
        if ontology.entities.is_empty() {
            return Err(KgserveError::Ontology(
                "no entity types could be inferred from the sources".to_string(),
            ));
        }

        log::info!(
            "Inferred ontology with {} entities and {} relations from {} documents",
            ontology.entities.len(),
            ontology.relations.len(),
            documents.len()
        );
        Ok(ontology)
    }

    pub fn entity(&self, label: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.label.eq_ignore_ascii_case(label))
    }

    pub fn relation(&self, label: &str, source: &str, target: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| {
            r.label.eq_ignore_ascii_case(label)
                && r.source.eq_ignore_ascii_case(source)
                && r.target.eq_ignore_ascii_case(target)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    /// Union `other` into `self`. Entities match by label, relations by
    /// (label, source, target); attributes are unioned by name.
    pub fn merge_with(&mut self, other: Ontology) {
        for entity in other.entities {
            match self
                .entities
                .iter_mut()
                .find(|e| e.label.eq_ignore_ascii_case(&entity.label))
            {
                Some(existing) => {
                    if existing.description.is_empty() {
                        existing.description = entity.description;
                    }
                    merge_attributes(&mut existing.attributes, entity.attributes);
                }
                None => self.entities.push(entity),
            }
        }

        for relation in other.relations {
            match self.relations.iter_mut().find(|r| {
                r.label.eq_ignore_ascii_case(&relation.label)
                    && r.source.eq_ignore_ascii_case(&relation.source)
                    && r.target.eq_ignore_ascii_case(&relation.target)
            }) {
                Some(existing) => merge_attributes(&mut existing.attributes, relation.attributes),
                None => self.relations.push(relation),
            }
        }
    }

    /// Make the ontology usable for graph construction:
    /// labels become Cypher-safe, every entity gets a unique attribute
    /// (`name` when it has none), and relations whose endpoints are not
    /// entities are dropped.
    pub fn normalize(&mut self) {
        for entity in &mut self.entities {
            entity.label = cypher::identifier(&entity.label);
            if entity.unique_attributes().next().is_none() {
                match entity.attributes.iter_mut().find(|a| a.name == "name") {
                    Some(name) => {
                        name.unique = true;
                        name.required = true;
                    }
                    None => entity.attributes.insert(0, Attribute::identity("name")),
                }
            }
        }

        for relation in &mut self.relations {
            relation.label = cypher::identifier(&relation.label).to_uppercase();
            relation.source = cypher::identifier(&relation.source);
            relation.target = cypher::identifier(&relation.target);
        }

        let before = self.relations.len();
        let entities = &self.entities;
        self.relations.retain(|r| {
            entities.iter().any(|e| e.label.eq_ignore_ascii_case(&r.source))
                && entities.iter().any(|e| e.label.eq_ignore_ascii_case(&r.target))
        });
        if self.relations.len() < before {
            log::debug!("Dropped {} relations with unknown endpoints", before - self.relations.len());
        }
    }

    /// `CREATE INDEX` statements over each entity's unique attributes
    pub fn index_queries(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter_map(|entity| {
                let keys: Vec<String> = entity
                    .unique_attributes()
                    .map(|a| format!("n.{}", cypher::identifier(&a.name)))
                    .collect();
                (!keys.is_empty()).then(|| {
                    format!(
                        "CREATE INDEX FOR (n:{}) ON ({})",
                        cypher::identifier(&entity.label),
                        keys.join(", ")
                    )
                })
            })
            .collect()
    }

    /// Persist to `<graph>_schema` so later sessions can attach by name
    pub async fn save(&self, store: &dyn GraphStore, graph: &str) -> Result<()> {
        let json = serde_json::to_string(self)?;
        let query = format!(
            "MERGE (o:Ontology {{graph: {}}}) SET o.json = {}",
            cypher::quote(graph),
            cypher::quote(&json)
        );
        store.query(&schema_graph_name(graph), &query).await?;
        Ok(())
    }

    /// Load the ontology persisted for `graph`, if any
    pub async fn load(store: &dyn GraphStore, graph: &str) -> Result<Option<Self>> {
        let schema = schema_graph_name(graph);
        if !store.list_graphs().await?.iter().any(|g| g == &schema) {
            return Ok(None);
        }

        let query = format!(
            "MATCH (o:Ontology {{graph: {}}}) RETURN o.json LIMIT 1",
            cypher::quote(graph)
        );
        let result = store.ro_query(&schema, &query).await?;
        match result.scalar() {
            Some(serde_json::Value::String(json)) => Ok(Some(serde_json::from_str(json)?)),
            _ => Ok(None),
        }
    }
}

fn merge_attributes(existing: &mut Vec<Attribute>, incoming: Vec<Attribute>) {
    for attribute in incoming {
        match existing.iter_mut().find(|a| a.name == attribute.name) {
            Some(current) => {
                current.unique |= attribute.unique;
                current.required |= attribute.required;
            }
            None => existing.push(attribute),
        }
    }
}
