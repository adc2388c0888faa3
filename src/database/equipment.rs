use serde::{Deserialize, Serialize};

use super::Row;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Equipment {
    pub equipment_id: i64,
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub model_name: Option<String>,
    pub pop_id: Option<i64>,
    pub pop_code: Option<String>,
    pub pop_name: Option<String>,
    pub equipment_subtype_code: Option<String>,
    pub equipment_subtype: Option<String>,
    pub oem_code: Option<String>,
    pub oem_name: Option<String>,
    pub model_code: Option<String>,
}

impl Row for Equipment {
    fn id(&self) -> i64 {
        self.equipment_id
    }
}
