use serde_json::Value;
use tracing::{info, warn};

use crate::{
    intent::{NormalizedIntent, Query},
    model::{Entity, Field},
    surface::{DataSurface, RawResult},
};

/// Classification values containing this keyword are switch-like.
const SWITCH_KEYWORD: &str = "switch";

/// Coarse device categories a user may name instead of exact subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Switch,
    Router,
    Device,
}

impl Category {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "switch" | "switches" => Some(Category::Switch),
            "router" | "routers" => Some(Category::Router),
            "device" | "devices" => Some(Category::Device),
            _ => None,
        }
    }
}

/// The closed set of equipment subtypes, partitioned into switch-like and
/// router-like values.
///
/// Built once per process; `switches` and `routers` are disjoint and together
/// hold exactly the values of `all`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryVocabulary {
    all: Vec<String>,
    switches: Vec<String>,
    routers: Vec<String>,
}

impl CategoryVocabulary {
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            if !value.trim().is_empty() && !all.contains(&value) {
                all.push(value);
            }
        }
        let (switches, routers): (Vec<String>, Vec<String>) = all
            .iter()
            .cloned()
            .partition(|v| v.to_lowercase().contains(SWITCH_KEYWORD));
        Self {
            all,
            switches,
            routers,
        }
    }

    /// Reads the distinct subtypes from the equipment surface.
    ///
    /// An unreachable surface yields an empty vocabulary, which disables
    /// category expansion instead of failing startup.
    pub async fn resolve<S>(surface: &S) -> Self
    where
        S: DataSurface + ?Sized,
    {
        let intent = NormalizedIntent {
            entity: Entity::Equipment,
            query: Query::Distinct {
                field: Field::EquipmentSubtype,
            },
            filters: Default::default(),
            output_fields: Vec::new(),
            row_limit: None,
        };
        match surface.fetch(&intent).await {
            Ok(RawResult::Distinct(values)) => {
                let vocabulary = Self::from_values(values.iter().filter_map(Value::as_str));
                info!(
                    switches = vocabulary.switches.len(),
                    routers = vocabulary.routers.len(),
                    "Resolved equipment subtypes"
                );
                vocabulary
            }
            Ok(other) => {
                warn!("Unexpected answer to subtype lookup: {other:?}");
                Self::default()
            }
            Err(e) => {
                warn!("Subtype lookup failed, category expansion disabled: {e}");
                Self::default()
            }
        }
    }

    pub fn all(&self) -> &[String] {
        &self.all
    }

    pub fn switches(&self) -> &[String] {
        &self.switches
    }

    pub fn routers(&self) -> &[String] {
        &self.routers
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// The exact subtypes making up `category`.
    pub fn members(&self, category: Category) -> Vec<&str> {
        match category {
            Category::Switch => self.switches.iter().map(String::as_str).collect(),
            Category::Router => self.routers.iter().map(String::as_str).collect(),
            Category::Device => self
                .switches
                .iter()
                .chain(&self.routers)
                .map(String::as_str)
                .collect(),
        }
    }
}
