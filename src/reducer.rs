use std::fmt;

use serde_json::Value;

use crate::{
    intent::Query,
    model::{Field, Record},
    surface::{GroupRow, Metric, RawResult},
};

/// A result ready for presentation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReducedResult {
    Empty,
    ScalarCount(u64),
    RecordList(Vec<Record>),
    GroupedRows { group_by: Field, rows: Vec<GroupRow> },
}

impl ReducedResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, ReducedResult::Empty)
    }

    /// Concatenates the results of several intents, in order. The combination
    /// is empty only when every part is.
    pub fn combine(parts: Vec<ReducedResult>) -> Vec<ReducedResult> {
        let parts: Vec<ReducedResult> = parts.into_iter().filter(|r| !r.is_empty()).collect();
        if parts.is_empty() {
            vec![ReducedResult::Empty]
        } else {
            parts
        }
    }
}

/// The `fields` of `record`, absent ones as null.
pub fn select_fields(record: &Record, fields: &[Field]) -> Record {
    fields
        .iter()
        .map(|f| {
            let value = record.get(f.as_str()).cloned().unwrap_or(Value::Null);
            (f.as_str().to_string(), value)
        })
        .collect()
}

/// Keeps only `fields` of `record`. `None` when every requested field is
/// null.
pub fn project_record(record: &Record, fields: &[Field]) -> Option<Record> {
    if fields.is_empty() {
        return Some(record.clone());
    }
    let projected = select_fields(record, fields);
    if projected.values().all(Value::is_null) {
        None
    } else {
        Some(projected)
    }
}

/// Turns a raw answer to `query` into its presentation shape.
///
/// `count_distinct` reduces a distinct answer to the number of values, for
/// questions asking how many kinds of something exist.
pub fn reduce(raw: RawResult, query: &Query, fields: &[Field], count_distinct: bool) -> ReducedResult {
    match raw {
        RawResult::Count(n) => ReducedResult::ScalarCount(n),
        RawResult::Distinct(values) if count_distinct => {
            ReducedResult::ScalarCount(values.len() as u64)
        }
        RawResult::Distinct(values) => {
            let Query::Distinct { field } = query else {
                return ReducedResult::Empty;
            };
            let rows: Vec<Record> = values
                .into_iter()
                .map(|v| Record::from_iter([(field.as_str().to_string(), v)]))
                .collect();
            list(rows)
        }
        RawResult::Records(records) => list(
            records
                .iter()
                .filter_map(|r| project_record(r, fields))
                .collect(),
        ),
        RawResult::Single(record) => list(project_record(&record, fields).into_iter().collect()),
        RawResult::Groups(rows) => match query {
            Query::GroupCount { group_by, .. } | Query::GroupAvg { group_by, .. }
                if !rows.is_empty() =>
            {
                ReducedResult::GroupedRows {
                    group_by: *group_by,
                    rows,
                }
            }
            _ => ReducedResult::Empty,
        },
    }
}

fn list(rows: Vec<Record>) -> ReducedResult {
    if rows.is_empty() {
        ReducedResult::Empty
    } else {
        ReducedResult::RecordList(rows)
    }
}

impl fmt::Display for ReducedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducedResult::Empty => f.write_str(crate::explainer::NO_RESULTS),
            ReducedResult::ScalarCount(n) => write!(f, "Count: {n}"),
            ReducedResult::RecordList(rows) => {
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    let cells: Vec<String> = row
                        .iter()
                        .map(|(key, value)| format!("{key}: {}", display_value(value)))
                        .collect();
                    write!(f, "{}. {}", i + 1, cells.join(", "))?;
                }
                Ok(())
            }
            ReducedResult::GroupedRows { group_by, rows } => {
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    let metric = match row.metric {
                        Metric::Count(n) => format!("count {n}"),
                        Metric::Average(Some(avg)) => format!("average {avg:.4}"),
                        Metric::Average(None) => "average n/a".to_string(),
                    };
                    write!(f, "{}. {group_by}: {}, {metric}", i + 1, display_value(&row.key))?;
                }
                Ok(())
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
