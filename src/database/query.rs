use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
};

use serde_json::Value;

use super::Database;
use crate::{
    error::ExecutionError,
    intent::{Filters, NormalizedIntent, Query, SortOrder},
    model::{Field, FieldKind, Record},
    surface::{GroupRow, Metric, RawResult},
};

enum Matcher {
    Integer(i64),
    Float(f64),
    Contains(String),
    OneOf(Vec<String>),
}

struct Condition {
    field: Field,
    matcher: Matcher,
}

impl Condition {
    fn compile(field: Field, value: &str) -> Result<Self, ExecutionError> {
        let value = value.trim();
        let invalid = || ExecutionError::InvalidValue {
            field,
            value: value.to_string(),
        };
        let matcher = match field.kind() {
            FieldKind::Identifier => Matcher::Integer(value.parse().map_err(|_| invalid())?),
            FieldKind::Numeric => Matcher::Float(value.parse().map_err(|_| invalid())?),
            FieldKind::Classification => Matcher::OneOf(
                value
                    .split(',')
                    .map(|v| v.trim().to_lowercase())
                    .filter(|v| !v.is_empty())
                    .collect(),
            ),
            FieldKind::Text => Matcher::Contains(value.to_lowercase()),
        };
        Ok(Self { field, matcher })
    }

    fn matches(&self, record: &Record) -> bool {
        let Some(value) = record.get(self.field.as_str()) else {
            return false;
        };
        match &self.matcher {
            Matcher::Integer(n) => value.as_i64() == Some(*n),
            Matcher::Float(x) => value.as_f64() == Some(*x),
            Matcher::Contains(needle) => value
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(needle.as_str())),
            Matcher::OneOf(allowed) => value
                .as_str()
                .is_some_and(|s| allowed.contains(&s.trim().to_lowercase())),
        }
    }
}

fn compile(filters: &Filters) -> Result<Vec<Condition>, ExecutionError> {
    filters
        .iter()
        .map(|(field, value)| Condition::compile(*field, value))
        .collect()
}

impl Database {
    /// Answers `intent` from the stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if a filter value does not fit its field, the
    /// requested identifier is absent, or the store cannot be read.
    pub fn run(&self, intent: &NormalizedIntent) -> Result<RawResult, ExecutionError> {
        let conditions = compile(&intent.filters)?;

        if let Query::GetById(id) = intent.query {
            return self
                .record(intent.entity, id)?
                .map(RawResult::Single)
                .ok_or(ExecutionError::NotFound {
                    entity: intent.entity,
                    id,
                });
        }

        let limit = match intent.query {
            Query::List => Some(intent.limit()),
            _ => None,
        };
        let mut rows = Vec::new();
        for record in self.records(intent.entity) {
            if limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }
            let record = record?;
            if conditions.iter().all(|c| c.matches(&record)) {
                rows.push(record);
            }
        }

        let result = match &intent.query {
            Query::List => RawResult::Records(rows),
            Query::Count => RawResult::Count(rows.len() as u64),
            Query::GroupCount { group_by, order } => {
                RawResult::Groups(group(&rows, *group_by, None, *order, intent.limit()))
            }
            Query::GroupAvg {
                group_by,
                avg_field,
                order,
            } => RawResult::Groups(group(
                &rows,
                *group_by,
                Some(*avg_field),
                *order,
                intent.limit(),
            )),
            Query::Distinct { field } => RawResult::Distinct(distinct(&rows, *field)),
            Query::GetById(_) => unreachable!("answered above"),
        };
        Ok(result)
    }
}

#[derive(Default)]
struct Accumulator {
    key: Value,
    rows: u64,
    sum: f64,
    samples: u64,
}

fn group(
    rows: &[Record],
    group_by: Field,
    avg_field: Option<Field>,
    order: SortOrder,
    limit: usize,
) -> Vec<GroupRow> {
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    for record in rows {
        let key = record.get(group_by.as_str()).cloned().unwrap_or(Value::Null);
        let acc = groups.entry(key.to_string()).or_insert_with(|| Accumulator {
            key,
            ..Default::default()
        });
        acc.rows += 1;
        if let Some(x) = avg_field.and_then(|f| record.get(f.as_str())).and_then(Value::as_f64) {
            acc.sum += x;
            acc.samples += 1;
        }
    }

    let mut result: Vec<GroupRow> = groups
        .into_values()
        .map(|acc| GroupRow {
            metric: if avg_field.is_some() {
                Metric::Average((acc.samples > 0).then(|| acc.sum / acc.samples as f64))
            } else {
                Metric::Count(acc.rows)
            },
            key: acc.key,
        })
        .collect();
    result.sort_by(|a, b| {
        let ord = compare_metric(&a.metric, &b.metric);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
    result.truncate(limit);
    result
}

/// Missing averages order below every number.
fn compare_metric(a: &Metric, b: &Metric) -> Ordering {
    match (a, b) {
        (Metric::Count(a), Metric::Count(b)) => a.cmp(b),
        (Metric::Average(a), Metric::Average(b)) => match (a, b) {
            (Some(a), Some(b)) => a.total_cmp(b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

fn distinct(rows: &[Record], field: Field) -> Vec<Value> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|record| record.get(field.as_str()))
        .filter(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
        .filter(|value| seen.insert(value.to_string()))
        .cloned()
        .collect()
}
