//! Access to the data query surface, either through the in-process store or
//! over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    database::Database,
    endpoint,
    error::ExecutionError,
    intent::{NormalizedIntent, Query},
    model::{Field, Record},
};

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Key of the metric column in group rows.
pub const COUNT_KEY: &str = "count";
pub const AVERAGE_KEY: &str = "average";

#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Count(u64),
    /// `None` when no row of the group carries the averaged field.
    Average(Option<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: Value,
    pub metric: Metric,
}

impl GroupRow {
    /// The row as served: the grouping field and its metric.
    pub fn to_record(&self, group_by: Field) -> Record {
        let mut record = Record::new();
        record.insert(group_by.as_str().to_string(), self.key.clone());
        match self.metric {
            Metric::Count(n) => record.insert(COUNT_KEY.to_string(), json!(n)),
            Metric::Average(avg) => record.insert(AVERAGE_KEY.to_string(), json!(avg)),
        };
        record
    }

    fn from_record(mut record: Record, group_by: Field) -> Option<Self> {
        let key = record.remove(group_by.as_str()).unwrap_or(Value::Null);
        let metric = if let Some(count) = record.get(COUNT_KEY) {
            Metric::Count(count.as_u64()?)
        } else {
            match record.get(AVERAGE_KEY)? {
                Value::Null => Metric::Average(None),
                v => Metric::Average(Some(v.as_f64()?)),
            }
        };
        Some(Self { key, metric })
    }
}

/// What the surface answered, shaped by the operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    Records(Vec<Record>),
    Single(Record),
    Count(u64),
    Groups(Vec<GroupRow>),
    Distinct(Vec<Value>),
}

impl RawResult {
    /// Whether the answer carries nothing; a zero count is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            RawResult::Records(rows) => rows.is_empty(),
            RawResult::Single(record) => record.is_empty(),
            RawResult::Count(n) => *n == 0,
            RawResult::Groups(rows) => rows.is_empty(),
            RawResult::Distinct(values) => values.is_empty(),
        }
    }

    /// The JSON body served for this answer.
    pub fn to_json(&self, query: &Query) -> Value {
        match self {
            RawResult::Records(rows) => json!(rows),
            RawResult::Single(record) => json!(record),
            RawResult::Count(n) => json!({ COUNT_KEY: n }),
            RawResult::Groups(rows) => {
                let group_by = match query {
                    Query::GroupCount { group_by, .. } | Query::GroupAvg { group_by, .. } => {
                        *group_by
                    }
                    _ => return json!([]),
                };
                Value::Array(
                    rows.iter()
                        .map(|row| Value::Object(row.to_record(group_by)))
                        .collect(),
                )
            }
            RawResult::Distinct(values) => json!(values),
        }
    }

    fn from_json(query: &Query, body: Value) -> Option<Self> {
        match (query, body) {
            (Query::List, Value::Array(rows)) => rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(RawResult::Records),
            (Query::GetById(_), Value::Object(record)) => Some(RawResult::Single(record)),
            (Query::Count, Value::Object(body)) => body
                .get(COUNT_KEY)
                .and_then(Value::as_u64)
                .map(RawResult::Count),
            (
                Query::GroupCount { group_by, .. } | Query::GroupAvg { group_by, .. },
                Value::Array(rows),
            ) => rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(record) => GroupRow::from_record(record, *group_by),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(RawResult::Groups),
            (Query::Distinct { .. }, Value::Array(values)) => Some(RawResult::Distinct(values)),
            _ => None,
        }
    }
}

/// A source of query answers.
#[async_trait]
pub trait DataSurface: Send + Sync {
    async fn fetch(&self, intent: &NormalizedIntent) -> Result<RawResult, ExecutionError>;
}

#[async_trait]
impl DataSurface for Database {
    async fn fetch(&self, intent: &NormalizedIntent) -> Result<RawResult, ExecutionError> {
        self.run(intent)
    }
}

#[derive(Deserialize)]
struct Detail {
    detail: String,
}

/// The data query surface reached over HTTP.
pub struct HttpSurface {
    client: Client,
    base: Url,
}

impl HttpSurface {
    /// # Errors
    ///
    /// Returns an error if `api_base` is not an absolute URL or the HTTP client
    /// cannot be built.
    pub fn new(api_base: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let base = Url::parse(api_base)?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, base })
    }
}

#[async_trait]
impl DataSurface for HttpSurface {
    async fn fetch(&self, intent: &NormalizedIntent) -> Result<RawResult, ExecutionError> {
        let url = endpoint::url(&self.base, intent)
            .map_err(|e| ExecutionError::Unreachable(e.to_string()))?;
        debug!(%url, "Querying data surface");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExecutionError::Unreachable(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            if let Query::GetById(id) = intent.query {
                return Err(ExecutionError::NotFound {
                    entity: intent.entity,
                    id,
                });
            }
        }
        if status.is_client_error() {
            let detail = match response.json::<Detail>().await {
                Ok(body) => body.detail,
                Err(_) => status.to_string(),
            };
            return Err(ExecutionError::Rejected(detail));
        }
        if !status.is_success() {
            return Err(ExecutionError::Unreachable(format!(
                "data surface answered {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ExecutionError::Unreachable(e.to_string()))?;
        RawResult::from_json(&intent.query, body).ok_or_else(|| {
            ExecutionError::Unreachable(format!(
                "unexpected response shape for {}",
                endpoint::path(intent)
            ))
        })
    }
}
