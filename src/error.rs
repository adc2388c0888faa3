use thiserror::Error;
use warp::http::StatusCode;

use crate::model::{Entity, Field};

/// An endpoint string that does not describe a query on the data surface.
#[derive(Debug, Error, PartialEq)]
pub enum EndpointError {
    #[error("malformed endpoint `{0}`")]
    Malformed(String),
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("invalid value for `{param}`: {value}")]
    InvalidParameter { param: &'static str, value: String },
}

/// The oracle's output could not be turned into query intents.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("language oracle failed: {0}")]
    Oracle(String),
    #[error("could not understand the interpretation: {0}")]
    Malformed(String),
}

impl From<EndpointError> for InterpretError {
    fn from(e: EndpointError) -> Self {
        Self::Malformed(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Invalid {param} field for {entity}: {name}")]
    InvalidField {
        entity: Entity,
        param: &'static str,
        name: String,
    },
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Field {0} is not numeric and cannot be averaged")]
    NonNumericField(Field),
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: Field, value: String },
    #[error("{} not found", .entity.label())]
    NotFound { entity: Entity, id: i64 },
    #[error("{0}")]
    Rejected(String),
    #[error("data surface unreachable: {0}")]
    Unreachable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ExecutionError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidField { .. }
            | Self::MissingParameter(_)
            | Self::NonNumericField(_)
            | Self::InvalidValue { .. }
            | Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unreachable(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ExecutionError {
    fn from(e: anyhow::Error) -> Self {
        Self::Storage(format!("{e:#}"))
    }
}

/// Everything that can end a single user turn early.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Interpretation(#[from] InterpretError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("failed to explain the result: {0}")]
    Explanation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct_from_client_errors() {
        let not_found = ExecutionError::NotFound {
            entity: Entity::Pop,
            id: 7,
        };
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "POP not found");

        let invalid = ExecutionError::InvalidField {
            entity: Entity::Equipment,
            param: "group_by",
            name: "location".to_string(),
        };
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            invalid.to_string(),
            "Invalid group_by field for equipment: location"
        );
    }
}
