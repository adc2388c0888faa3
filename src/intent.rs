use std::collections::BTreeMap;

use crate::{
    error::ExecutionError,
    model::{Entity, Field},
};

/// Row cap applied to list-shaped queries that do not ask for one.
pub const DEFAULT_ROW_LIMIT: usize = 10;

/// The filter dropped by result relaxation.
pub const PLACE_FILTER: Field = Field::PopName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    GetById(i64),
    Count,
    GroupCount,
    GroupAvg,
    Distinct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// What the user asked for, as produced by an interpreter.
///
/// Field names and filter keys are still untrusted strings here; they are
/// checked against the entity's attribute set by [`NormalizedIntent::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryIntent {
    pub entity: Entity,
    pub operation: Operation,
    pub filters: BTreeMap<String, String>,
    /// Empty means all fields.
    pub output_fields: Vec<String>,
    pub row_limit: Option<usize>,
    pub group_by: Option<String>,
    pub avg_field: Option<String>,
    pub distinct_field: Option<String>,
    pub order: Option<SortOrder>,
}

impl QueryIntent {
    pub fn new(entity: Entity, operation: Operation) -> Self {
        Self {
            entity,
            operation,
            filters: BTreeMap::new(),
            output_fields: Vec::new(),
            row_limit: None,
            group_by: None,
            avg_field: None,
            distinct_field: None,
            order: None,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, key: &str, value: &str) -> Self {
        self.filters.insert(key.to_string(), value.to_string());
        self
    }
}

pub type Filters = BTreeMap<Field, String>;

/// A validated operation together with its typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    List,
    GetById(i64),
    Count,
    GroupCount {
        group_by: Field,
        order: SortOrder,
    },
    GroupAvg {
        group_by: Field,
        avg_field: Field,
        order: SortOrder,
    },
    Distinct {
        field: Field,
    },
}

impl Query {
    pub fn operation(&self) -> Operation {
        match self {
            Query::List => Operation::List,
            Query::GetById(id) => Operation::GetById(*id),
            Query::Count => Operation::Count,
            Query::GroupCount { .. } => Operation::GroupCount,
            Query::GroupAvg { .. } => Operation::GroupAvg,
            Query::Distinct { .. } => Operation::Distinct,
        }
    }

    /// Whether an empty answer may be retried without the place filter.
    pub fn is_relaxable(&self) -> bool {
        matches!(self, Query::List | Query::Count | Query::Distinct { .. })
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self, Query::GroupCount { .. } | Query::GroupAvg { .. })
    }

    /// Whether the operation returns a bounded list of rows.
    pub fn is_list_shaped(&self) -> bool {
        matches!(self, Query::List | Query::GetById(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedIntent {
    pub entity: Entity,
    pub query: Query,
    pub filters: Filters,
    pub output_fields: Vec<Field>,
    pub row_limit: Option<usize>,
}

impl NormalizedIntent {
    /// Checks every field name in `intent` against its entity and types the
    /// operation parameters. Values are taken as they are.
    ///
    /// # Errors
    ///
    /// Returns an error if a field name is unknown for the entity, a required
    /// parameter is missing, or the averaged field is not numeric.
    pub fn validate(intent: &QueryIntent) -> Result<Self, ExecutionError> {
        let entity = intent.entity;
        let resolve = |param: &'static str, name: &str| {
            entity
                .field(name)
                .ok_or_else(|| ExecutionError::InvalidField {
                    entity,
                    param,
                    name: name.to_string(),
                })
        };

        let mut filters = Filters::new();
        for (key, value) in &intent.filters {
            if value.trim().is_empty() {
                continue;
            }
            // Equipment rows only carry the PoP name, so a state filter is
            // matched against it.
            if entity == Entity::Equipment && key == "state_name" {
                filters.entry(PLACE_FILTER).or_insert_with(|| value.clone());
                continue;
            }
            filters.insert(resolve("filter", key)?, value.clone());
        }

        let mut output_fields = Vec::with_capacity(intent.output_fields.len());
        for name in &intent.output_fields {
            let field = resolve("fields", name)?;
            if !output_fields.contains(&field) {
                output_fields.push(field);
            }
        }

        let order = intent.order.unwrap_or_default();
        let group_by = || {
            intent
                .group_by
                .as_deref()
                .ok_or(ExecutionError::MissingParameter("group_by"))
                .and_then(|name| resolve("group_by", name))
        };
        let query = match intent.operation {
            Operation::List => Query::List,
            Operation::GetById(id) => Query::GetById(id),
            Operation::Count => Query::Count,
            Operation::GroupCount => Query::GroupCount {
                group_by: group_by()?,
                order,
            },
            Operation::GroupAvg => {
                let group_by = group_by()?;
                let avg_field = intent
                    .avg_field
                    .as_deref()
                    .ok_or(ExecutionError::MissingParameter("avg_field"))
                    .and_then(|name| resolve("avg_field", name))?;
                if !avg_field.is_numeric() {
                    return Err(ExecutionError::NonNumericField(avg_field));
                }
                Query::GroupAvg {
                    group_by,
                    avg_field,
                    order,
                }
            }
            Operation::Distinct => Query::Distinct {
                field: intent
                    .distinct_field
                    .as_deref()
                    .ok_or(ExecutionError::MissingParameter("field"))
                    .and_then(|name| resolve("field", name))?,
            },
        };

        Ok(Self {
            entity,
            query,
            filters,
            output_fields,
            row_limit: intent.row_limit,
        })
    }

    pub fn limit(&self) -> usize {
        self.row_limit.unwrap_or(DEFAULT_ROW_LIMIT)
    }

    /// The same query with the place filter removed, if it had one.
    pub fn without_place_filter(&self) -> Option<Self> {
        if !self.filters.contains_key(&PLACE_FILTER) {
            return None;
        }
        let mut relaxed = self.clone();
        relaxed.filters.remove(&PLACE_FILTER);
        Some(relaxed)
    }
}

impl From<&NormalizedIntent> for QueryIntent {
    fn from(n: &NormalizedIntent) -> Self {
        let mut intent = QueryIntent::new(n.entity, n.query.operation());
        intent.filters = n
            .filters
            .iter()
            .map(|(field, value)| (field.as_str().to_string(), value.clone()))
            .collect();
        intent.output_fields = n
            .output_fields
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();
        intent.row_limit = n.row_limit;
        match &n.query {
            Query::GroupCount { group_by, order } => {
                intent.group_by = Some(group_by.as_str().to_string());
                intent.order = Some(*order);
            }
            Query::GroupAvg {
                group_by,
                avg_field,
                order,
            } => {
                intent.group_by = Some(group_by.as_str().to_string());
                intent.avg_field = Some(avg_field.as_str().to_string());
                intent.order = Some(*order);
            }
            Query::Distinct { field } => {
                intent.distinct_field = Some(field.as_str().to_string());
            }
            Query::List | Query::GetById(_) | Query::Count => {}
        }
        intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_filter_key_is_rejected() {
        let intent = QueryIntent::new(Entity::Pop, Operation::List).with_filter("hostname", "x");
        let err = NormalizedIntent::validate(&intent).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::InvalidField { param: "filter", .. }
        ));
    }

    #[test]
    fn equipment_state_filter_matches_pop_name() {
        let intent = QueryIntent::new(Entity::Equipment, Operation::Count)
            .with_filter("state_name", "Delhi");
        let n = NormalizedIntent::validate(&intent).unwrap();
        assert_eq!(n.filters.get(&Field::PopName).map(String::as_str), Some("Delhi"));

        let both = intent.with_filter("pop_name", "Agartala");
        let n = NormalizedIntent::validate(&both).unwrap();
        assert_eq!(n.filters.len(), 1);
        assert_eq!(
            n.filters.get(&Field::PopName).map(String::as_str),
            Some("Agartala")
        );
    }

    #[test]
    fn group_avg_requires_numeric_field() {
        let mut intent = QueryIntent::new(Entity::Pop, Operation::GroupAvg);
        intent.group_by = Some("state_name".to_string());
        intent.avg_field = Some("pop_tier".to_string());
        assert!(matches!(
            NormalizedIntent::validate(&intent),
            Err(ExecutionError::NonNumericField(Field::PopTier))
        ));

        intent.avg_field = None;
        assert!(matches!(
            NormalizedIntent::validate(&intent),
            Err(ExecutionError::MissingParameter("avg_field"))
        ));
    }

    #[test]
    fn group_count_defaults_to_descending() {
        let mut intent = QueryIntent::new(Entity::Equipment, Operation::GroupCount);
        intent.group_by = Some("pop_name".to_string());
        let n = NormalizedIntent::validate(&intent).unwrap();
        assert_eq!(
            n.query,
            Query::GroupCount {
                group_by: Field::PopName,
                order: SortOrder::Desc
            }
        );
    }

    #[test]
    fn empty_filter_values_are_ignored() {
        let intent = QueryIntent::new(Entity::Pop, Operation::List).with_filter("state_name", " ");
        let n = NormalizedIntent::validate(&intent).unwrap();
        assert!(n.filters.is_empty());
    }

    #[test]
    fn place_filter_removal() {
        let intent = QueryIntent::new(Entity::Equipment, Operation::List)
            .with_filter("pop_name", "agartala")
            .with_filter("oem_name", "juniper");
        let n = NormalizedIntent::validate(&intent).unwrap();
        let relaxed = n.without_place_filter().unwrap();
        assert!(!relaxed.filters.contains_key(&Field::PopName));
        assert!(relaxed.filters.contains_key(&Field::OemName));
        assert!(relaxed.without_place_filter().is_none());
    }

    #[test]
    fn validated_intent_converts_back() {
        let mut intent = QueryIntent::new(Entity::Pop, Operation::GroupAvg)
            .with_filter("circle_name", "north");
        intent.group_by = Some("state_name".to_string());
        intent.avg_field = Some("latitude".to_string());
        intent.order = Some(SortOrder::Asc);
        intent.output_fields = vec!["state_name".to_string()];
        let n = NormalizedIntent::validate(&intent).unwrap();
        assert_eq!(QueryIntent::from(&n), intent);
    }
}
