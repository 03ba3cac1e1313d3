//! Graph database access.
//!
//! FalkorDB is a Redis module, so commands go through the `redis` crate:
//! `GRAPH.QUERY`, `GRAPH.RO_QUERY` and `GRAPH.LIST`.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Value as RedisValue;
use serde_json::{Map, Number, Value};

use crate::config::FalkorConfig;
use crate::error::{KgserveError, Result};

/// Tabular result of a graph query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// First cell of the first row
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Rows as `{column: value}` objects
    pub fn records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(record)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Named-graph query interface
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run a (possibly writing) query against `graph`, creating it if needed
    async fn query(&self, graph: &str, cypher: &str) -> Result<QueryResult>;

    /// Run a read-only query against `graph`
    async fn ro_query(&self, graph: &str, cypher: &str) -> Result<QueryResult>;

    /// Names of all graphs in the database
    async fn list_graphs(&self) -> Result<Vec<String>>;
}

/// FalkorDB-backed graph store. Opens a fresh connection per call.
pub struct FalkorStore {
    client: redis::Client,
}

impl FalkorStore {
    /// Bind to FalkorDB at `host:port`. No connection is made until first use.
    pub fn connect(config: &FalkorConfig) -> Result<Self> {
        let client = redis::Client::open(format!("redis://{}:{}/", config.host, config.port))?;
        Ok(Self { client })
    }

    /// Address the store dials
    pub fn address(&self) -> &redis::ConnectionAddr {
        &self.client.get_connection_info().addr
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Round-trip a PING to check reachability
    pub async fn ping(&self) -> Result<String> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong)
    }

    async fn run(&self, command: &str, graph: &str, cypher: &str) -> Result<QueryResult> {
        let mut conn = self.connection().await?;
        log::debug!("{} {}: {}", command, graph, cypher);
        let reply: RedisValue = redis::cmd(command)
            .arg(graph)
            .arg(cypher)
            .query_async(&mut conn)
            .await
            .map_err(classify)?;
        parse_reply(reply)
    }
}

#[async_trait]
impl GraphStore for FalkorStore {
    async fn query(&self, graph: &str, cypher: &str) -> Result<QueryResult> {
        self.run("GRAPH.QUERY", graph, cypher).await
    }

    async fn ro_query(&self, graph: &str, cypher: &str) -> Result<QueryResult> {
        self.run("GRAPH.RO_QUERY", graph, cypher).await
    }

    async fn list_graphs(&self) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;
        let graphs: Vec<String> = redis::cmd("GRAPH.LIST").query_async(&mut conn).await?;
        Ok(graphs)
    }
}

/// Transport failures stay `Graph`; errors the server sent back are `Query`.
fn classify(err: redis::RedisError) -> KgserveError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
        KgserveError::Graph(err)
    } else {
        KgserveError::Query(err.to_string())
    }
}

/// Decode a verbose `GRAPH.QUERY` reply.
///
/// Queries that return rows reply `[header, rows, statistics]`; queries
/// without `RETURN` reply `[statistics]` only.
fn parse_reply(reply: RedisValue) -> Result<QueryResult> {
    let mut parts = match reply {
        RedisValue::Array(parts) => parts,
        other => return Err(KgserveError::Query(format!("unexpected graph reply: {:?}", other))),
    };
    if parts.len() < 3 {
        return Ok(QueryResult::default());
    }

    let rows = parts.swap_remove(1);
    let header = parts.swap_remove(0);

    let columns = match header {
        RedisValue::Array(cols) => cols.into_iter().map(column_name).collect(),
        _ => Vec::new(),
    };
    let rows = match rows {
        RedisValue::Array(rows) => rows
            .into_iter()
            .map(|row| match row {
                RedisValue::Array(cells) => cells.into_iter().map(to_json).collect(),
                other => vec![to_json(other)],
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(QueryResult { columns, rows })
}

fn column_name(value: RedisValue) -> String {
    match to_json(value) {
        Value::String(s) => s,
        // compact headers are [type, name]
        Value::Array(mut pair) if pair.len() == 2 => match pair.pop() {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        },
        other => other.to_string(),
    }
}

fn to_json(value: RedisValue) -> Value {
    match value {
        RedisValue::Nil => Value::Null,
        RedisValue::Int(i) => Value::from(i),
        RedisValue::BulkString(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        RedisValue::SimpleString(s) => Value::String(s),
        RedisValue::Okay => Value::String("OK".to_string()),
        RedisValue::Double(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        RedisValue::Boolean(b) => Value::Bool(b),
        RedisValue::Array(items) | RedisValue::Set(items) => Value::Array(items.into_iter().map(to_json).collect()),
        RedisValue::Map(pairs) => {
            let map: Map<String, Value> = pairs
                .into_iter()
                .map(|(k, v)| {
                    let key = match to_json(k) {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, to_json(v))
                })
                .collect();
            Value::Object(map)
        }
        RedisValue::VerbatimString { text, .. } => Value::String(text),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bulk(s: &str) -> RedisValue {
        RedisValue::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_parse_reply_with_rows() {
        let reply = RedisValue::Array(vec![
            RedisValue::Array(vec![bulk("name"), bulk("age")]),
            RedisValue::Array(vec![
                RedisValue::Array(vec![bulk("Ada"), RedisValue::Int(36)]),
                RedisValue::Array(vec![bulk("Alan"), RedisValue::Nil]),
            ]),
            RedisValue::Array(vec![bulk("Query internal execution time: 0.1 milliseconds")]),
        ]);

        let result = parse_reply(reply).unwrap();
        assert_eq!(result.columns, vec!["name", "age"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.scalar(), Some(&json!("Ada")));
        assert_eq!(result.records()[1], json!({"name": "Alan", "age": null}));
    }

    #[test]
    fn test_parse_reply_statistics_only() {
        let reply = RedisValue::Array(vec![RedisValue::Array(vec![bulk("Nodes created: 1")])]);
        let result = parse_reply(reply).unwrap();
        assert!(result.is_empty());
        assert!(result.columns.is_empty());
    }

    #[test]
    fn test_parse_reply_rejects_scalar() {
        assert!(parse_reply(RedisValue::Int(1)).is_err());
    }

    #[test]
    fn test_compact_header_column_name() {
        let col = RedisValue::Array(vec![RedisValue::Int(1), bulk("count(n)")]);
        assert_eq!(column_name(col), "count(n)");
    }

    #[test]
    fn test_classify_server_error_as_query() {
        let err = redis::RedisError::from((redis::ErrorKind::ExtensionError, "errMsg", "Invalid input".to_string()));
        assert!(matches!(classify(err), KgserveError::Query(_)));

        let err = redis::RedisError::from(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"));
        assert!(matches!(classify(err), KgserveError::Graph(_)));
    }

    #[test]
    fn test_connect_does_not_dial() {
        let store = FalkorStore::connect(&FalkorConfig {
            host: "falkor.internal".to_string(),
            port: 1,
        })
        .unwrap();
        match store.address() {
            redis::ConnectionAddr::Tcp(host, port) => {
                assert_eq!(host, "falkor.internal");
                assert_eq!(*port, 1);
            }
            other => panic!("unexpected address {:?}", other),
        }
    }
}
