//! Authoring response DTOs

use serde::Serialize;
use uuid::Uuid;

use crate::models::{AttributeCatalog, OperatorCatalog};

/// Draft upsert response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftUpsertResponse {
    pub promotion_id: Uuid,
    pub version: i32,
    pub country_iso: String,
    pub workflow_name: String,
    pub warnings: Vec<String>,
}

/// Publish response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub promotion_id: Uuid,
    pub country_iso: String,
    pub version: i32,
}

/// Catalog listing response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogsResponse {
    pub attributes: Vec<AttributeDto>,
    pub operators: Vec<OperatorDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDto {
    pub id: Uuid,
    pub entity: String,
    pub name: String,
    pub display_name: String,
    pub data_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorDto {
    pub id: Uuid,
    pub code: String,
    pub display_name: String,
}

impl From<AttributeCatalog> for AttributeDto {
    fn from(attr: AttributeCatalog) -> Self {
        Self {
            id: attr.id,
            entity: attr.entity_logical_name,
            name: attr.attribute_logical_name,
            display_name: attr.display_name,
            data_type: attr.data_type,
        }
    }
}

impl From<OperatorCatalog> for OperatorDto {
    fn from(op: OperatorCatalog) -> Self {
        Self {
            id: op.id,
            code: op.code,
            display_name: op.display_name,
        }
    }
}
