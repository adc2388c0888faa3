use serde::{Deserialize, Serialize};

use super::Row;

/// A point-of-presence facility.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Pop {
    pub pop_id: i64,
    pub pop_code: Option<String>,
    pub pop_name: Option<String>,
    pub pop_address: Option<String>,
    pub category: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pop_type: Option<String>,
    pub pop_tier: Option<String>,
    pub region_code: Option<String>,
    pub territory_code: Option<String>,
    pub zone_code: Option<String>,
    pub division_code: Option<String>,
    pub state_name: Option<String>,
    pub circle_name: Option<String>,
    pub billing_region_code: Option<String>,
    pub billing_territory_code: Option<String>,
}

impl Row for Pop {
    fn id(&self) -> i64 {
        self.pop_id
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::Pop;

    pub(crate) fn pop(id: i64, name: &str, state: &str, latitude: f64, longitude: f64) -> Pop {
        Pop {
            pop_id: id,
            pop_name: Some(name.to_string()),
            state_name: Some(state.to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }
}
