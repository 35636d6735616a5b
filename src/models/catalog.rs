//! Attribute and operator catalog models
//!
//! The catalogs drive the authoring compiler: attributes name the typed
//! fields an expression may reference, operators declare which data types
//! they support.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::constants::data_types;

/// Attribute data type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeDataType {
    String,
    Number,
    Date,
    Bool,
    Guid,
    StringArray,
    NumberArray,
}

impl std::str::FromStr for AttributeDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            data_types::STRING => Ok(Self::String),
            data_types::NUMBER => Ok(Self::Number),
            data_types::DATE => Ok(Self::Date),
            data_types::BOOL => Ok(Self::Bool),
            data_types::GUID => Ok(Self::Guid),
            data_types::STRING_ARRAY => Ok(Self::StringArray),
            data_types::NUMBER_ARRAY => Ok(Self::NumberArray),
            other => Err(format!("unknown data type '{}'", other)),
        }
    }
}

impl std::fmt::Display for AttributeDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::String => data_types::STRING,
            Self::Number => data_types::NUMBER,
            Self::Date => data_types::DATE,
            Self::Bool => data_types::BOOL,
            Self::Guid => data_types::GUID,
            Self::StringArray => data_types::STRING_ARRAY,
            Self::NumberArray => data_types::NUMBER_ARRAY,
        };
        write!(f, "{}", s)
    }
}

/// Attribute catalog entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttributeCatalog {
    pub id: Uuid,
    pub entity_logical_name: String,
    pub attribute_logical_name: String,
    pub display_name: String,
    pub data_type: String,
    pub is_exposed: bool,
}

impl AttributeCatalog {
    pub fn parsed_data_type(&self) -> Result<AttributeDataType, String> {
        self.data_type.parse()
    }

    /// The context field name the compiler emits for this attribute:
    /// canonical display name with spaces and dashes turned into underscores.
    pub fn context_field(&self) -> String {
        self.display_name.replace([' ', '-'], "_")
    }
}

/// Operator catalog entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OperatorCatalog {
    pub id: Uuid,
    pub code: String,
    pub display_name: String,
    pub is_active: bool,
}

/// In-memory view of both catalogs, loaded once per compile.
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    pub attributes: HashMap<Uuid, AttributeCatalog>,
    pub operators: HashMap<Uuid, OperatorCatalog>,
    /// operator id → data types it supports
    pub supported_types: HashMap<Uuid, HashSet<String>>,
}

impl Catalogs {
    pub fn attribute(&self, id: Uuid) -> Option<&AttributeCatalog> {
        self.attributes.get(&id)
    }

    pub fn operator(&self, id: Uuid) -> Option<&OperatorCatalog> {
        self.operators.get(&id)
    }

    /// Whether the operator declares support for the attribute's data type.
    /// A missing combination is a warning at compile time, not a failure.
    pub fn operator_supports(&self, operator_id: Uuid, data_type: &str) -> bool {
        self.supported_types
            .get(&operator_id)
            .map(|types| types.contains(data_type))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_field_normalization() {
        let attr = AttributeCatalog {
            id: Uuid::new_v4(),
            entity_logical_name: "contact".to_string(),
            attribute_logical_name: "total_spend".to_string(),
            display_name: "total spend-amount".to_string(),
            data_type: "number".to_string(),
            is_exposed: true,
        };
        assert_eq!(attr.context_field(), "total_spend_amount");
    }

    #[test]
    fn test_data_type_roundtrip() {
        for s in data_types::ALL {
            let dt: AttributeDataType = s.parse().unwrap();
            assert_eq!(&dt.to_string(), s);
        }
        assert!("decimal".parse::<AttributeDataType>().is_err());
    }
}
