//! Endpoint strings of the data query surface.
//!
//! The oracle describes a query as a surface endpoint such as
//! `/equipment/groupcount/?group_by=pop_name&order=desc&limit=3`, and the HTTP
//! surface receives exactly the same shape, so both go through [`parse`].

use reqwest::Url;

use crate::{
    error::EndpointError,
    intent::{NormalizedIntent, Operation, Query, QueryIntent, SortOrder},
    model::Entity,
};

const PARSE_BASE: &str = "http://surface.invalid/";

/// Parses an endpoint path with its query string into an intent.
///
/// Parameters other than `fields`, `limit`, `group_by`, `avg_field`, `field`
/// and `order` are taken as filters. Percent-encoding is decoded.
///
/// # Errors
///
/// Returns an error if the path does not name an entity and an operation of
/// the surface, or if `limit` or `order` cannot be parsed.
pub fn parse(endpoint: &str) -> Result<QueryIntent, EndpointError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(EndpointError::Malformed(String::new()));
    }
    let url = Url::parse(PARSE_BASE)
        .and_then(|base| base.join(endpoint))
        .map_err(|_| EndpointError::Malformed(endpoint.to_string()))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let (entity, operation) = match segments.as_slice() {
        [entity] => (parse_entity(entity)?, Operation::List),
        [entity, op] => (parse_entity(entity)?, parse_operation(op)?),
        _ => return Err(EndpointError::Malformed(endpoint.to_string())),
    };

    let mut intent = QueryIntent::new(entity, operation);
    for (key, value) in url.query_pairs() {
        let value = value.trim();
        match key.as_ref() {
            "fields" => {
                intent.output_fields = value
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
            "limit" => {
                let limit = value
                    .parse::<usize>()
                    .map_err(|_| EndpointError::InvalidParameter {
                        param: "limit",
                        value: value.to_string(),
                    })?;
                intent.row_limit = Some(limit);
            }
            "order" => {
                let order =
                    SortOrder::from_name(value).ok_or_else(|| EndpointError::InvalidParameter {
                        param: "order",
                        value: value.to_string(),
                    })?;
                intent.order = Some(order);
            }
            "group_by" => intent.group_by = Some(value.to_string()),
            "avg_field" => intent.avg_field = Some(value.to_string()),
            "field" => intent.distinct_field = Some(value.to_string()),
            _ if value.is_empty() => {}
            key => {
                intent.filters.insert(key.to_string(), value.to_string());
            }
        }
    }
    Ok(intent)
}

fn parse_entity(segment: &str) -> Result<Entity, EndpointError> {
    Entity::from_name(segment).ok_or_else(|| EndpointError::UnknownEntity(segment.to_string()))
}

fn parse_operation(segment: &str) -> Result<Operation, EndpointError> {
    match segment {
        "count" => Ok(Operation::Count),
        "groupcount" => Ok(Operation::GroupCount),
        "groupavg" => Ok(Operation::GroupAvg),
        "distinct" => Ok(Operation::Distinct),
        id => id
            .parse::<i64>()
            .map(Operation::GetById)
            .map_err(|_| EndpointError::UnknownOperation(id.to_string())),
    }
}

/// The surface path serving `intent`.
pub fn path(intent: &NormalizedIntent) -> String {
    let entity = intent.entity.as_str();
    match intent.query {
        Query::List => format!("/{entity}/"),
        Query::GetById(id) => format!("/{entity}/{id}"),
        Query::Count => format!("/{entity}/count/"),
        Query::GroupCount { .. } => format!("/{entity}/groupcount/"),
        Query::GroupAvg { .. } => format!("/{entity}/groupavg/"),
        Query::Distinct { .. } => format!("/{entity}/distinct/"),
    }
}

/// The query parameters serving `intent`, filters first.
pub fn query_pairs(intent: &NormalizedIntent) -> Vec<(&'static str, String)> {
    if let Query::GetById(_) = intent.query {
        return Vec::new();
    }
    let mut pairs: Vec<(&'static str, String)> = intent
        .filters
        .iter()
        .map(|(field, value)| (field.as_str(), value.clone()))
        .collect();
    match &intent.query {
        Query::GroupCount { group_by, order } => {
            pairs.push(("group_by", group_by.as_str().to_string()));
            pairs.push(("order", order.as_str().to_string()));
        }
        Query::GroupAvg {
            group_by,
            avg_field,
            order,
        } => {
            pairs.push(("group_by", group_by.as_str().to_string()));
            pairs.push(("avg_field", avg_field.as_str().to_string()));
            pairs.push(("order", order.as_str().to_string()));
        }
        Query::Distinct { field } => pairs.push(("field", field.as_str().to_string())),
        Query::List | Query::GetById(_) | Query::Count => {}
    }
    if matches!(intent.query, Query::List) && !intent.output_fields.is_empty() {
        let fields: Vec<&str> = intent.output_fields.iter().map(|f| f.as_str()).collect();
        pairs.push(("fields", fields.join(",")));
    }
    if matches!(intent.query, Query::List) || intent.query.is_grouped() {
        if let Some(limit) = intent.row_limit {
            pairs.push(("limit", limit.to_string()));
        }
    }
    pairs
}

/// The full request URL for `intent` on the surface rooted at `base`.
///
/// # Errors
///
/// Returns an error if `base` cannot be a base URL.
pub fn url(base: &Url, intent: &NormalizedIntent) -> Result<Url, EndpointError> {
    let mut url = base
        .join(&path(intent))
        .map_err(|_| EndpointError::Malformed(base.to_string()))?;
    let pairs = query_pairs(intent);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;

    #[test]
    fn count_with_filters() {
        let intent = parse("/equipment/count/?oem_name=D-Link&equipment_subtype=switch").unwrap();
        assert_eq!(intent.entity, Entity::Equipment);
        assert_eq!(intent.operation, Operation::Count);
        assert_eq!(intent.filters["oem_name"], "D-Link");
        assert_eq!(intent.filters["equipment_subtype"], "switch");
    }

    #[test]
    fn list_with_fields_and_limit() {
        let intent = parse("/equipment/?pop_name=Agartala&fields=ip_address, hostname&limit=5").unwrap();
        assert_eq!(intent.operation, Operation::List);
        assert_eq!(intent.output_fields, vec!["ip_address", "hostname"]);
        assert_eq!(intent.row_limit, Some(5));
        assert_eq!(intent.filters.len(), 1);
    }

    #[test]
    fn get_by_id_and_group_parameters() {
        assert_eq!(
            parse("/pop/1010010").unwrap().operation,
            Operation::GetById(1_010_010)
        );

        let intent =
            parse("/pop/groupavg/?group_by=state_name&avg_field=latitude&order=asc&limit=3")
                .unwrap();
        assert_eq!(intent.operation, Operation::GroupAvg);
        assert_eq!(intent.group_by.as_deref(), Some("state_name"));
        assert_eq!(intent.avg_field.as_deref(), Some("latitude"));
        assert_eq!(intent.order, Some(SortOrder::Asc));
        assert_eq!(intent.row_limit, Some(3));
        assert!(intent.filters.is_empty());
    }

    #[test]
    fn spaces_and_percent_encoding_are_decoded() {
        let intent = parse("/pop/?state_name=Uttar Pradesh&circle_name=West%20Bengal").unwrap();
        assert_eq!(intent.filters["state_name"], "Uttar Pradesh");
        assert_eq!(intent.filters["circle_name"], "West Bengal");
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert_eq!(
            parse("/router/").unwrap_err(),
            EndpointError::UnknownEntity("router".to_string())
        );
        assert_eq!(
            parse("/pop/top/").unwrap_err(),
            EndpointError::UnknownOperation("top".to_string())
        );
        assert!(matches!(
            parse("/pop/?limit=ten"),
            Err(EndpointError::InvalidParameter { param: "limit", .. })
        ));
        assert!(parse("").is_err());
        assert!(parse("/").is_err());
    }

    #[test]
    fn built_url_parses_back_to_the_same_intent() {
        let mut raw = QueryIntent::new(Entity::Equipment, Operation::GroupCount)
            .with_filter("equipment_subtype", "core router,edge router")
            .with_filter("pop_name", "agartala");
        raw.group_by = Some("pop_name".to_string());
        raw.row_limit = Some(3);
        let n = NormalizedIntent::validate(&raw).unwrap();

        let base = Url::parse("http://127.0.0.1:8000").unwrap();
        let url = url(&base, &n).unwrap();
        assert_eq!(url.path(), "/equipment/groupcount/");

        let endpoint = format!("{}?{}", url.path(), url.query().unwrap());
        let back = NormalizedIntent::validate(&parse(&endpoint).unwrap()).unwrap();
        assert_eq!(back, n);
        assert_eq!(
            back.filters[&Field::EquipmentSubtype],
            "core router,edge router"
        );
    }
}
