//! Attribute and operator catalog repository

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{AttributeCatalog, Catalogs, OperatorCatalog},
};

#[derive(Debug, FromRow)]
struct SupportedTypeRow {
    operator_id: Uuid,
    data_type: String,
}

/// Repository for catalog database operations
pub struct CatalogRepository;

impl CatalogRepository {
    /// Exposed attributes
    pub async fn attributes(pool: &PgPool) -> AppResult<Vec<AttributeCatalog>> {
        let attributes = sqlx::query_as::<_, AttributeCatalog>(
            r#"
            SELECT * FROM catalog.attribute_catalog
            WHERE is_exposed
            ORDER BY entity_logical_name, attribute_logical_name
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(attributes)
    }

    /// Active operators
    pub async fn operators(pool: &PgPool) -> AppResult<Vec<OperatorCatalog>> {
        let operators = sqlx::query_as::<_, OperatorCatalog>(
            r#"SELECT * FROM catalog.operator_catalog WHERE is_active ORDER BY code"#,
        )
        .fetch_all(pool)
        .await?;

        Ok(operators)
    }

    /// Load both catalogs plus the operator/data-type support matrix into an
    /// in-memory view for one compile.
    pub async fn load_catalogs(pool: &PgPool) -> AppResult<Catalogs> {
        let attributes = Self::attributes(pool).await?;
        let operators = Self::operators(pool).await?;

        let supported = sqlx::query_as::<_, SupportedTypeRow>(
            r#"SELECT operator_id, data_type FROM catalog.operator_supported_type"#,
        )
        .fetch_all(pool)
        .await?;

        let mut catalogs = Catalogs::default();
        for attribute in attributes {
            catalogs.attributes.insert(attribute.id, attribute);
        }
        for operator in operators {
            catalogs.operators.insert(operator.id, operator);
        }
        for row in supported {
            catalogs
                .supported_types
                .entry(row.operator_id)
                .or_default()
                .insert(row.data_type);
        }

        Ok(catalogs)
    }
}
