//! Product recipes: the ingredient lists that drive order deduction

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::units::UnitOfMeasure;

use crate::error::{AppError, AppResult};

use super::parse_unit;

/// Service for product recipe management
#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
}

/// One ingredient of a product's recipe
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeLine {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub inventory_item_id: Uuid,
    /// Amount per single unit of the product, before waste
    pub quantity_required: Decimal,
    pub unit: String,
    /// Expected preparation loss, percent of the required quantity
    pub waste_percentage: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recipe line joined with its ingredient's catalog data
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeLineDetail {
    pub id: Uuid,
    pub product_id: Uuid,
    pub inventory_item_id: Uuid,
    pub item_name: String,
    pub item_unit: String,
    pub quantity_required: Decimal,
    pub unit: String,
    pub waste_percentage: Decimal,
    pub item_average_cost_cents: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecipeLineInput {
    pub inventory_item_id: Uuid,
    #[validate(custom = "shared::validation::validate_positive_quantity")]
    #[validate(custom = "shared::validation::validate_quantity_scale")]
    pub quantity_required: Decimal,
    pub unit: UnitOfMeasure,
    #[validate(custom = "shared::validation::validate_waste_percentage")]
    pub waste_percentage: Decimal,
}

impl RecipeService {
    /// Create a new RecipeService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Recipe for one product, joined with ingredient details
    pub async fn get(&self, tenant_id: Uuid, product_id: Uuid) -> AppResult<Vec<RecipeLineDetail>> {
        let lines = sqlx::query_as::<_, RecipeLineDetail>(
            r#"
            SELECT r.id, r.product_id, r.inventory_item_id,
                   i.name AS item_name, i.unit AS item_unit,
                   r.quantity_required, r.unit, r.waste_percentage,
                   i.average_cost_cents AS item_average_cost_cents
            FROM product_recipe r
            JOIN inventory_item i ON i.id = r.inventory_item_id
            WHERE r.tenant_id = $1 AND r.product_id = $2 AND i.is_deleted = FALSE
            ORDER BY i.name ASC
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(lines)
    }

    /// Replace a product's recipe wholesale, atomically.
    ///
    /// Every referenced item must exist and its base unit must share a
    /// dimension with the recipe line's unit, so deduction can never hit an
    /// impossible conversion at order time.
    pub async fn replace(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        lines: Vec<RecipeLineInput>,
    ) -> AppResult<Vec<RecipeLine>> {
        for line in &lines {
            line.validate()?;
        }

        let mut seen = std::collections::HashSet::new();
        for line in &lines {
            if !seen.insert(line.inventory_item_id) {
                return Err(AppError::validation(
                    "inventory_item_id",
                    format!("Item {} appears more than once", line.inventory_item_id),
                ));
            }
        }

        let mut tx = self.db.begin().await?;

        for line in &lines {
            let item_unit = sqlx::query_scalar::<_, String>(
                "SELECT unit FROM inventory_item \
                 WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE",
            )
            .bind(line.inventory_item_id)
            .bind(tenant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Inventory item", line.inventory_item_id))?;

            let base_unit = parse_unit(&item_unit)?;
            if line.unit.class() != base_unit.class() {
                return Err(AppError::validation(
                    "unit",
                    format!(
                        "Recipe unit {} cannot convert to item unit {}",
                        line.unit, base_unit
                    ),
                ));
            }
        }

        sqlx::query("DELETE FROM product_recipe WHERE tenant_id = $1 AND product_id = $2")
            .bind(tenant_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let mut saved = Vec::with_capacity(lines.len());
        for line in &lines {
            let row = sqlx::query_as::<_, RecipeLine>(
                r#"
                INSERT INTO product_recipe (
                    tenant_id, product_id, inventory_item_id, quantity_required,
                    unit, waste_percentage
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, tenant_id, product_id, inventory_item_id, quantity_required,
                          unit, waste_percentage, created_at, updated_at
                "#,
            )
            .bind(tenant_id)
            .bind(product_id)
            .bind(line.inventory_item_id)
            .bind(line.quantity_required)
            .bind(line.unit.as_str())
            .bind(line.waste_percentage)
            .fetch_one(&mut *tx)
            .await?;
            saved.push(row);
        }

        tx.commit().await?;

        tracing::info!(
            product_id = %product_id,
            lines = saved.len(),
            "product recipe replaced"
        );
        Ok(saved)
    }

    /// Remove a product's recipe entirely
    pub async fn delete(&self, tenant_id: Uuid, product_id: Uuid) -> AppResult<u64> {
        let result =
            sqlx::query("DELETE FROM product_recipe WHERE tenant_id = $1 AND product_id = $2")
                .bind(tenant_id)
                .bind(product_id)
                .execute(&self.db)
                .await?;
        Ok(result.rows_affected())
    }
}
