use std::{convert::Infallible, net::SocketAddr};

use serde_json::{json, Value};
use tracing::{debug, error, info};
use warp::{
    http::StatusCode,
    path::FullPath,
    reply::{self, Response},
    Filter, Rejection, Reply,
};

use crate::{
    database::Database,
    endpoint,
    error::{EndpointError, ExecutionError},
    intent::{NormalizedIntent, Query, QueryIntent},
    model::{Entity, Field, Record},
    reducer::select_fields,
    surface::RawResult,
    vocabulary::CategoryVocabulary,
};

const SUBTYPES_PATH: &str = "/equipment/subtypes";

pub async fn serve(db: Database, addr: SocketAddr) {
    info!("Data query surface listening on {addr}");
    warp::serve(routes(db)).run(addr).await;
}

/// Every read endpoint of the data query surface.
pub fn routes(db: Database) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let raw_query = warp::query::raw()
        .or(warp::any().map(String::new))
        .unify();
    warp::get()
        .and(warp::path::full())
        .and(raw_query)
        .and(warp::any().map(move || db.clone()))
        .and_then(handle)
}

async fn handle(path: FullPath, query: String, db: Database) -> Result<Response, Infallible> {
    let path = path.as_str();
    if path.trim_end_matches('/') == SUBTYPES_PATH {
        return Ok(respond(subtypes(&db)));
    }
    let endpoint = if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    };
    debug!(%endpoint, "Serving");
    let intent = match endpoint::parse(&endpoint) {
        Ok(intent) => intent,
        Err(e @ EndpointError::InvalidParameter { .. }) => {
            return Ok(error_response(StatusCode::BAD_REQUEST, &e.to_string()));
        }
        Err(e) => {
            debug!("No route: {e}");
            return Ok(error_response(StatusCode::NOT_FOUND, "Not Found"));
        }
    };
    Ok(respond(answer(&db, &intent)))
}

fn answer(db: &Database, intent: &QueryIntent) -> Result<Value, ExecutionError> {
    let intent = NormalizedIntent::validate(intent)?;
    let result = db.run(&intent)?;
    if let (Query::List, RawResult::Records(rows)) = (&intent.query, &result) {
        if !intent.output_fields.is_empty() {
            let rows: Vec<Record> = rows
                .iter()
                .map(|row| select_fields(row, &intent.output_fields))
                .collect();
            return Ok(json!(rows));
        }
    }
    Ok(result.to_json(&intent.query))
}

fn subtypes(db: &Database) -> Result<Value, ExecutionError> {
    let intent = NormalizedIntent {
        entity: Entity::Equipment,
        query: Query::Distinct {
            field: Field::EquipmentSubtype,
        },
        filters: Default::default(),
        output_fields: Vec::new(),
        row_limit: None,
    };
    let RawResult::Distinct(values) = db.run(&intent)? else {
        return Ok(json!({}));
    };
    let vocabulary = CategoryVocabulary::from_values(values.iter().filter_map(Value::as_str));
    Ok(json!({
        "all": vocabulary.all(),
        "switches": vocabulary.switches(),
        "routers": vocabulary.routers(),
        "others": Vec::<String>::new(),
    }))
}

fn respond(result: Result<Value, ExecutionError>) -> Response {
    match result {
        Ok(body) => reply::json(&body).into_response(),
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                error!("{e}");
            }
            error_response(status, &e.to_string())
        }
    }
}

fn error_response(status: StatusCode, detail: &str) -> Response {
    reply::with_status(reply::json(&json!({ "detail": detail })), status).into_response()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use warp::test::request;

    use super::*;
    use crate::database::TestDatabase;

    async fn get(test: &TestDatabase, path: &str) -> (StatusCode, Value) {
        let res = request().path(path).reply(&routes(test.db.clone())).await;
        let body = serde_json::from_slice(res.body()).unwrap();
        (res.status(), body)
    }

    #[tokio::test]
    async fn list_with_projection_and_limit() {
        let test = TestDatabase::seeded();
        let (status, body) = get(&test, "/equipment/?oem_name=d-link&fields=hostname,model_name&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"hostname": "d-link-001", "model_name": null},
                {"hostname": "d-link-002", "model_name": null},
            ])
        );
    }

    #[tokio::test]
    async fn equipment_state_filter_matches_pop_name() {
        let test = TestDatabase::seeded();
        let (_, body) = get(&test, "/equipment/count/?state_name=Connaught").await;
        assert_eq!(body, json!({"count": 2}));
    }

    #[tokio::test]
    async fn get_by_id() {
        let test = TestDatabase::seeded();
        let (status, body) = get(&test, "/pop/1010010").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pop_name"], "Agartala");

        let (status, body) = get(&test, "/pop/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"detail": "POP not found"}));

        let (status, body) = get(&test, "/equipment/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"detail": "Equipment not found"}));
    }

    #[tokio::test]
    async fn group_count_and_average() {
        let test = TestDatabase::seeded();
        let (_, body) = get(
            &test,
            "/equipment/groupcount/?group_by=oem_name&equipment_subtype=L2%20Switch,BNG&order=asc",
        )
        .await;
        assert_eq!(
            body,
            json!([
                {"oem_name": "Fiberhome", "count": 1},
                {"oem_name": "D-Link", "count": 2},
            ])
        );

        let (_, body) = get(
            &test,
            "/pop/groupavg/?group_by=state_name&avg_field=longitude&order=desc&limit=1",
        )
        .await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["state_name"], "Tripura");
        assert!((body[0]["average"].as_f64().unwrap() - 91.38).abs() < 1e-9);
    }

    #[tokio::test]
    async fn distinct_and_subtypes() {
        let test = TestDatabase::seeded();
        let (_, body) = get(&test, "/pop/distinct/?field=state_name").await;
        assert_eq!(body, json!(["Tripura", "Uttar Pradesh", "Delhi"]));

        let (status, body) = get(&test, "/equipment/subtypes/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "all": ["L2 Switch", "Aggregation Switch", "Core Router", "BNG"],
                "switches": ["L2 Switch", "Aggregation Switch"],
                "routers": ["Core Router", "BNG"],
                "others": [],
            })
        );
    }

    #[tokio::test]
    async fn client_errors_carry_a_detail() {
        let test = TestDatabase::seeded();
        let cases = [
            ("/pop/groupcount/?group_by=hostname", "Invalid group_by field for pop: hostname"),
            ("/pop/groupavg/?group_by=state_name", "Missing required parameter: avg_field"),
            ("/equipment/distinct/?field=colour", "Invalid field field for equipment: colour"),
            ("/pop/?limit=many", "invalid value for `limit`: many"),
            ("/pop/?pop_id=x", "Invalid value for pop_id: x"),
        ];
        for (path, detail) in cases {
            let (status, body) = get(&test, path).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
            assert_eq!(body, json!({ "detail": detail }), "{path}");
        }

        let (status, _) = get(&test, "/router/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
