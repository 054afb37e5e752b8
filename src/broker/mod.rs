//! The tool broker.
//!
//! Every request an agent makes goes through [`ToolBroker::invoke`]: the name is
//! resolved against the allow-list, the arguments are validated into an
//! [`Operation`], and only then is a backing store touched. Nothing reachable
//! from here removes data.

mod operation;
mod tools;

pub use operation::{
    Domain, Operation, OperationRequest, RelationalOp, SearchQuery, ToolName, VectorOp,
};
pub use tools::{definition, ToolDefinition};

use crate::config::Settings;
use crate::embedding::{create_embedder, Embedder};
use crate::error::{BrokerError, Result};
use crate::relational::{open_relational_store, RelationalStore};
use crate::vector_store::{open_vector_store, Document, VectorStore};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Which domains a broker exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    Relational,
    Vector,
    #[default]
    All,
}

impl Scope {
    pub fn allows(self, domain: Domain) -> bool {
        match self {
            Scope::All => true,
            Scope::Relational => domain == Domain::Relational,
            Scope::Vector => domain == Domain::Vector,
        }
    }
}

impl From<Domain> for Scope {
    fn from(domain: Domain) -> Self {
        match domain {
            Domain::Relational => Scope::Relational,
            Domain::Vector => Scope::Vector,
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Scope::All),
            other => Domain::from_str(other).map(Scope::from),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Relational => write!(f, "relational"),
            Scope::Vector => write!(f, "vector"),
            Scope::All => write!(f, "all"),
        }
    }
}

/// Defaults applied when a request omits its limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub read: u32,
    pub search: u32,
    pub list: u32,
    pub min_score: f32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            read: 100,
            search: 5,
            list: 20,
            min_score: 0.0,
        }
    }
}

impl Limits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            read: settings.database.read_limit,
            search: settings.vector_store.search_limit,
            list: settings.vector_store.list_limit,
            min_score: settings.vector_store.min_score,
        }
    }
}

/// Mediates all agent access to the relational store and the document index.
#[derive(Clone)]
pub struct ToolBroker {
    relational: Arc<dyn RelationalStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    limits: Limits,
    scope: Scope,
}

impl ToolBroker {
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            relational,
            vectors,
            embedder,
            limits: Limits::default(),
            scope: Scope::All,
        }
    }

    /// Open both stores and the embedder described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let relational = open_relational_store(&settings.database, &settings.database_path())?;
        let vectors = open_vector_store(&settings.vector_store, &settings.vector_store_path())?;
        let embedder = create_embedder(&settings.embedding)?;

        Ok(Self::new(relational, vectors, embedder).with_limits(Limits::from_settings(settings)))
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.vectors)
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Tools visible under the current scope.
    pub fn tools(&self) -> Vec<ToolDefinition> {
        ToolName::ALL
            .into_iter()
            .filter(|tool| self.scope.allows(tool.domain()))
            .map(definition)
            .collect()
    }

    /// Resolve and validate a request without executing it.
    pub fn validate(&self, name: &str, arguments: Option<&Value>) -> Result<Operation> {
        let tool = ToolName::from_str(name)?;
        if !self.scope.allows(tool.domain()) {
            return Err(BrokerError::UnknownOperation(name.to_string()));
        }
        Operation::parse(name, arguments)
    }

    /// Validate and execute a tool call, returning its JSON payload.
    #[instrument(skip(self, arguments))]
    pub async fn invoke(&self, name: &str, arguments: Option<&Value>) -> Result<Value> {
        let result = match self.validate(name, arguments) {
            Ok(op) => self.execute(&op).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => info!("Tool {} succeeded", name),
            Err(e) => warn!("Tool {} failed ({}): {}", name, e.kind(), e),
        }
        result
    }

    pub async fn invoke_request(&self, request: &OperationRequest) -> Result<Value> {
        self.invoke(&request.name, request.arguments.as_ref()).await
    }

    /// Execute an already-validated operation.
    pub async fn execute(&self, op: &Operation) -> Result<Value> {
        if !self.scope.allows(op.domain()) {
            return Err(BrokerError::UnknownOperation(op.tool().to_string()));
        }
        match op {
            Operation::Relational(op) => self.execute_relational(op).await,
            Operation::Vector(op) => self.execute_vector(op).await,
        }
    }

    async fn execute_relational(&self, op: &RelationalOp) -> Result<Value> {
        match op {
            RelationalOp::CreateRecord { table, data } => {
                let id = self.relational.insert(table, data).await?;
                Ok(json!({ "success": true, "id": id, "table": table.as_str() }))
            }
            RelationalOp::ReadRecords {
                table,
                filters,
                limit,
            } => {
                let limit = limit.unwrap_or(self.limits.read);
                let records = self.relational.select(table, filters.as_ref(), limit).await?;
                Ok(json!({
                    "success": true,
                    "table": table.as_str(),
                    "count": records.len(),
                    "records": records,
                }))
            }
            RelationalOp::UpdateRecord {
                table,
                filters,
                data,
            } => {
                let rows = self.relational.update(table, filters, data).await?;
                Ok(json!({ "success": true, "rows_affected": rows, "table": table.as_str() }))
            }
            RelationalOp::ExecuteQuery { query } => {
                let records = self.relational.query(query).await?;
                Ok(json!({ "success": true, "count": records.len(), "records": records }))
            }
            RelationalOp::ListTables => {
                let tables = self.relational.list_tables().await?;
                Ok(json!({ "success": true, "count": tables.len(), "tables": tables }))
            }
            RelationalOp::DescribeTable { table } => {
                let columns = self.relational.describe_table(table).await?;
                Ok(json!({ "success": true, "table": table.as_str(), "columns": columns }))
            }
        }
    }

    async fn execute_vector(&self, op: &VectorOp) -> Result<Value> {
        match op {
            VectorOp::SearchDocuments { query, limit } => {
                let limit = limit.unwrap_or(self.limits.search) as usize;
                let (echo, embedding) = match query {
                    SearchQuery::Text(text) => (json!(text), self.embedder.embed(text).await?),
                    SearchQuery::Vector(vector) => {
                        if vector.len() != self.embedder.dimensions() {
                            return Err(BrokerError::Validation(format!(
                                "'vector' has {} dimensions, the index uses {}",
                                vector.len(),
                                self.embedder.dimensions()
                            )));
                        }
                        (Value::Null, vector.clone())
                    }
                };

                let results = self
                    .vectors
                    .search_with_threshold(&embedding, limit, self.limits.min_score)
                    .await?;
                debug!("Search returned {} documents", results.len());

                let documents: Vec<Value> = results
                    .iter()
                    .map(|r| {
                        let mut value = document_json(&r.document);
                        value["score"] = json!(r.score);
                        value
                    })
                    .collect();

                Ok(json!({
                    "success": true,
                    "query": echo,
                    "count": documents.len(),
                    "documents": documents,
                }))
            }
            VectorOp::ListDocuments { limit } => {
                let limit = limit.unwrap_or(self.limits.list) as usize;
                let docs = self.vectors.list(limit).await?;
                let documents: Vec<Value> = docs
                    .iter()
                    .map(|d| {
                        json!({
                            "id": d.id,
                            "source": d.source,
                            "metadata": d.metadata,
                            "content_preview": d.preview(),
                        })
                    })
                    .collect();
                Ok(json!({ "success": true, "count": documents.len(), "documents": documents }))
            }
            VectorOp::GetDocument { document_id } => match self.vectors.get(document_id).await? {
                Some(doc) => Ok(json!({ "success": true, "document": document_json(&doc) })),
                None => Err(BrokerError::NotFound(format!("document '{}'", document_id))),
            },
        }
    }
}

fn document_json(doc: &Document) -> Value {
    json!({
        "id": doc.id,
        "content": doc.content,
        "source": doc.source,
        "metadata": doc.metadata,
    })
}
