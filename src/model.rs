use std::fmt;

use serde_json::{Map, Value};

/// A record as exchanged between the store, the surfaces, and the reducer.
pub type Record = Map<String, Value>;

/// The two record types the query surface serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Equipment,
    Pop,
}

impl Entity {
    pub fn as_str(self) -> &'static str {
        match self {
            Entity::Equipment => "equipment",
            Entity::Pop => "pop",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "equipment" => Some(Entity::Equipment),
            "pop" => Some(Entity::Pop),
            _ => None,
        }
    }

    /// Human-facing name used in not-found messages.
    pub fn label(self) -> &'static str {
        match self {
            Entity::Equipment => "Equipment",
            Entity::Pop => "POP",
        }
    }

    pub fn id_field(self) -> Field {
        match self {
            Entity::Equipment => Field::EquipmentId,
            Entity::Pop => Field::PopId,
        }
    }

    /// The attribute set of this entity, in schema order.
    pub fn fields(self) -> &'static [Field] {
        match self {
            Entity::Equipment => &EQUIPMENT_FIELDS,
            Entity::Pop => &POP_FIELDS,
        }
    }

    /// Resolves a field name against this entity's attribute set.
    pub fn field(self, name: &str) -> Option<Field> {
        let name = name.trim();
        self.fields().iter().copied().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! fields {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Every attribute name known to either entity.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Field {
            $($variant),+
        }

        impl Field {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Field::$variant => $name),+
                }
            }
        }
    };
}

fields! {
    EquipmentId => "equipment_id",
    Hostname => "hostname",
    IpAddress => "ip_address",
    ModelName => "model_name",
    PopId => "pop_id",
    PopCode => "pop_code",
    PopName => "pop_name",
    EquipmentSubtypeCode => "equipment_subtype_code",
    EquipmentSubtype => "equipment_subtype",
    OemCode => "oem_code",
    OemName => "oem_name",
    ModelCode => "model_code",
    PopAddress => "pop_address",
    Category => "category",
    Latitude => "latitude",
    Longitude => "longitude",
    PopType => "pop_type",
    PopTier => "pop_tier",
    RegionCode => "region_code",
    TerritoryCode => "territory_code",
    ZoneCode => "zone_code",
    DivisionCode => "division_code",
    StateName => "state_name",
    CircleName => "circle_name",
    BillingRegionCode => "billing_region_code",
    BillingTerritoryCode => "billing_territory_code",
}

const EQUIPMENT_FIELDS: [Field; 12] = [
    Field::EquipmentId,
    Field::Hostname,
    Field::IpAddress,
    Field::ModelName,
    Field::PopId,
    Field::PopCode,
    Field::PopName,
    Field::EquipmentSubtypeCode,
    Field::EquipmentSubtype,
    Field::OemCode,
    Field::OemName,
    Field::ModelCode,
];

const POP_FIELDS: [Field; 17] = [
    Field::PopId,
    Field::PopCode,
    Field::PopName,
    Field::PopAddress,
    Field::Category,
    Field::Latitude,
    Field::Longitude,
    Field::PopType,
    Field::PopTier,
    Field::RegionCode,
    Field::TerritoryCode,
    Field::ZoneCode,
    Field::DivisionCode,
    Field::StateName,
    Field::CircleName,
    Field::BillingRegionCode,
    Field::BillingTerritoryCode,
];

/// How a filter value is matched against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer identifier, exact equality.
    Identifier,
    /// Floating point coordinate, exact equality.
    Numeric,
    /// Comma-separated list, case-insensitive exact membership.
    Classification,
    /// Case-insensitive substring.
    Text,
}

impl Field {
    pub fn kind(self) -> FieldKind {
        match self {
            Field::EquipmentId | Field::PopId => FieldKind::Identifier,
            Field::Latitude | Field::Longitude => FieldKind::Numeric,
            Field::EquipmentSubtype => FieldKind::Classification,
            _ => FieldKind::Text,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self.kind(), FieldKind::Identifier | FieldKind::Numeric)
    }

    /// Identifier-like text whose filter values are matched case-insensitively
    /// and therefore lower-cased before execution.
    pub fn is_case_folded(self) -> bool {
        matches!(
            self,
            Field::PopName
                | Field::PopCode
                | Field::Hostname
                | Field::EquipmentSubtype
                | Field::EquipmentSubtypeCode
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_fields_resolve_by_name() {
        assert_eq!(Entity::Pop.field("state_name"), Some(Field::StateName));
        assert_eq!(Entity::Equipment.field("state_name"), None);
        assert_eq!(Entity::Equipment.field(" pop_name "), Some(Field::PopName));
        assert_eq!(Entity::Pop.field("hostname"), None);
    }

    #[test]
    fn shared_fields_belong_to_both_entities() {
        for field in [Field::PopId, Field::PopCode, Field::PopName] {
            assert!(Entity::Equipment.fields().contains(&field));
            assert!(Entity::Pop.fields().contains(&field));
        }
    }

    #[test]
    fn numeric_fields() {
        assert!(Field::Latitude.is_numeric());
        assert!(Field::EquipmentId.is_numeric());
        assert!(!Field::StateName.is_numeric());
    }

    #[test]
    fn entity_names() {
        assert_eq!(Entity::from_name("Equipment"), Some(Entity::Equipment));
        assert_eq!(Entity::from_name("pop"), Some(Entity::Pop));
        assert_eq!(Entity::from_name("router"), None);
    }
}
