//! Inventory item catalog and manual stock adjustments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use shared::models::{ItemCategory, TransactionType};
use shared::types::Pagination;
use shared::units::{convert_units, UnitOfMeasure};

use crate::error::{AppError, AppResult};

use super::ledger::{insert_transaction, NewTransaction};

/// Service for inventory item management
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
}

/// A stocked item. `current_quantity` and `average_cost_cents` are caches
/// maintained by the ledger; the transaction log is authoritative.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub category: String,
    /// Base unit; all stored quantities for this item are in this unit
    pub unit: String,
    pub current_quantity: Decimal,
    pub reorder_level: Decimal,
    pub reorder_quantity: Decimal,
    /// Weighted-average cost per base unit, whole cents
    pub average_cost_cents: i64,
    pub supplier_id: Option<Uuid>,
    pub storage_location: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub sku: Option<String>,
    pub category: ItemCategory,
    pub unit: UnitOfMeasure,
    #[validate(custom = "shared::validation::validate_quantity_scale")]
    pub reorder_level: Decimal,
    #[validate(custom = "shared::validation::validate_quantity_scale")]
    pub reorder_quantity: Decimal,
    pub supplier_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub storage_location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub sku: Option<String>,
    pub category: Option<ItemCategory>,
    pub reorder_level: Option<Decimal>,
    pub reorder_quantity: Option<Decimal>,
    pub supplier_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub storage_location: Option<String>,
    pub is_active: Option<bool>,
}

/// Manual stock correction. Quantity is always supplied positive in any
/// unit compatible with the item's base unit; the adjustment type decides
/// the sign.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StockAdjustmentInput {
    pub adjustment_type: TransactionType,
    #[validate(custom = "shared::validation::validate_positive_quantity")]
    #[validate(custom = "shared::validation::validate_quantity_scale")]
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub category: Option<ItemCategory>,
    pub supplier_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// An item at or below its reorder level, with the quantity worth ordering
#[derive(Debug, Clone, Serialize)]
pub struct LowStockItem {
    #[serde(flatten)]
    pub item: InventoryItem,
    pub suggested_order_quantity: Decimal,
}

const ITEM_COLUMNS: &str = "id, tenant_id, name, sku, category, unit, current_quantity, \
     reorder_level, reorder_quantity, average_cost_cents, supplier_id, storage_location, \
     is_active, is_deleted, created_at, updated_at";

impl ItemService {
    /// Create a new ItemService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an inventory item. SKUs are unique per tenant among live items.
    pub async fn create(&self, tenant_id: Uuid, input: CreateItemInput) -> AppResult<InventoryItem> {
        input.validate()?;

        if input.reorder_level < Decimal::ZERO || input.reorder_quantity < Decimal::ZERO {
            return Err(AppError::validation(
                "reorder_level",
                "Reorder fields must not be negative",
            ));
        }

        if let Some(sku) = &input.sku {
            self.ensure_sku_free(tenant_id, sku, None).await?;
        }

        let item = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            INSERT INTO inventory_item (
                tenant_id, name, sku, category, unit, reorder_level, reorder_quantity,
                supplier_id, storage_location
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(input.category.as_str())
        .bind(input.unit.as_str())
        .bind(input.reorder_level)
        .bind(input.reorder_quantity)
        .bind(input.supplier_id)
        .bind(&input.storage_location)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(item_id = %item.id, name = %item.name, "inventory item created");
        Ok(item)
    }

    /// Fetch one live item
    pub async fn get(&self, tenant_id: Uuid, item_id: Uuid) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_item \
             WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE"
        ))
        .bind(item_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory item", item_id))
    }

    /// Patch item fields. The base unit is fixed at creation; changing it
    /// would silently rescale every stored quantity.
    pub async fn update(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> AppResult<InventoryItem> {
        input.validate()?;

        if let Some(level) = input.reorder_level {
            if level < Decimal::ZERO {
                return Err(AppError::validation(
                    "reorder_level",
                    "Reorder fields must not be negative",
                ));
            }
        }
        if let Some(qty) = input.reorder_quantity {
            if qty < Decimal::ZERO {
                return Err(AppError::validation(
                    "reorder_quantity",
                    "Reorder fields must not be negative",
                ));
            }
        }

        if let Some(sku) = &input.sku {
            self.ensure_sku_free(tenant_id, sku, Some(item_id)).await?;
        }

        sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            UPDATE inventory_item
            SET name = COALESCE($3, name),
                sku = COALESCE($4, sku),
                category = COALESCE($5, category),
                reorder_level = COALESCE($6, reorder_level),
                reorder_quantity = COALESCE($7, reorder_quantity),
                supplier_id = COALESCE($8, supplier_id),
                storage_location = COALESCE($9, storage_location),
                is_active = COALESCE($10, is_active),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(input.category.map(|c| c.as_str()))
        .bind(input.reorder_level)
        .bind(input.reorder_quantity)
        .bind(input.supplier_id)
        .bind(&input.storage_location)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory item", item_id))
    }

    /// Soft-delete an item. History and batches stay; the item leaves
    /// listings and reports.
    pub async fn delete(&self, tenant_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE inventory_item SET is_deleted = TRUE, is_active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE",
        )
        .bind(item_id)
        .bind(tenant_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Inventory item", item_id));
        }

        tracing::info!(item_id = %item_id, "inventory item deleted");
        Ok(())
    }

    /// List live items, name order
    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: ItemFilter,
        page: Pagination,
    ) -> AppResult<Vec<InventoryItem>> {
        let page = page.clamped();
        let search = filter.search.map(|s| format!("%{}%", s.trim()));

        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM inventory_item
            WHERE tenant_id = $1 AND is_deleted = FALSE
              AND ($2::varchar IS NULL OR category = $2)
              AND ($3::uuid IS NULL OR supplier_id = $3)
              AND ($4::boolean IS NULL OR is_active = $4)
              AND ($5::varchar IS NULL OR name ILIKE $5 OR sku ILIKE $5)
            ORDER BY name ASC
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(tenant_id)
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.supplier_id)
        .bind(filter.is_active)
        .bind(search)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// Active items at or below their reorder level, with a suggested order
    /// quantity that restores the reorder level plus the usual top-up.
    pub async fn low_stock(&self, tenant_id: Uuid) -> AppResult<Vec<LowStockItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM inventory_item
            WHERE tenant_id = $1 AND is_deleted = FALSE AND is_active = TRUE
              AND current_quantity <= reorder_level
            ORDER BY name ASC
            "#
        ))
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(items
            .into_iter()
            .map(|item| {
                let suggested = (item.reorder_level - item.current_quantity
                    + item.reorder_quantity)
                    .max(Decimal::ZERO);
                LowStockItem {
                    item,
                    suggested_order_quantity: suggested,
                }
            })
            .collect())
    }

    /// Record a manual stock correction at the item's current average cost.
    ///
    /// Adjustments and waste do not touch batches: a subtraction here is a
    /// bookkeeping correction, not a consumption with a meaningful FIFO
    /// lineage. Only the cached quantity and the ledger move.
    pub async fn adjust_stock(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        input: StockAdjustmentInput,
    ) -> AppResult<super::ledger::InventoryTransaction> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let item = lock_item(&mut tx, tenant_id, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Inventory item", item_id))?;

        let unit = super::parse_unit(&item.unit)?;
        let signed_quantity =
            signed_adjustment_quantity(input.adjustment_type, input.quantity, input.unit, unit)?;
        let new_quantity = item.current_quantity + signed_quantity;

        let transaction = insert_transaction(
            &mut tx,
            NewTransaction {
                tenant_id,
                inventory_item_id: item.id,
                batch_id: None,
                transaction_type: input.adjustment_type,
                quantity: signed_quantity,
                unit,
                unit_cost_cents: item.average_cost_cents,
                balance_after: new_quantity,
                order_id: None,
                purchase_order_id: None,
                notes: input.notes,
                created_by: input.created_by,
            },
        )
        .await?;

        sqlx::query(
            "UPDATE inventory_item SET current_quantity = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(new_quantity)
        .bind(item.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            item_id = %item_id,
            adjustment = %transaction.transaction_type,
            quantity = %signed_quantity,
            "stock adjusted"
        );
        Ok(transaction)
    }

    async fn ensure_sku_free(
        &self,
        tenant_id: Uuid,
        sku: &str,
        exclude_item: Option<Uuid>,
    ) -> AppResult<()> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM inventory_item
                WHERE tenant_id = $1 AND sku = $2 AND is_deleted = FALSE
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(tenant_id)
        .bind(sku)
        .bind(exclude_item)
        .fetch_one(&self.db)
        .await?;

        if taken {
            return Err(AppError::DuplicateEntry(format!(
                "SKU '{}' already exists",
                sku
            )));
        }
        Ok(())
    }
}

/// Signed ledger movement for a manual adjustment, converted into the
/// item's base unit. Additions come out positive, subtractions and waste
/// negative; any other transaction type is rejected.
pub fn signed_adjustment_quantity(
    adjustment_type: TransactionType,
    quantity: Decimal,
    unit: UnitOfMeasure,
    base_unit: UnitOfMeasure,
) -> AppResult<Decimal> {
    let quantity_in_base = convert_units(quantity, unit, base_unit)?;

    match adjustment_type {
        TransactionType::AdjustmentAdd => Ok(quantity_in_base),
        TransactionType::AdjustmentSubtract | TransactionType::Waste => Ok(-quantity_in_base),
        TransactionType::Purchase
        | TransactionType::Sale
        | TransactionType::TransferIn
        | TransactionType::TransferOut => Err(AppError::validation(
            "adjustment_type",
            format!("{} is not a manual adjustment type", adjustment_type),
        )),
    }
}

/// Lock one live item row for the duration of the supplied transaction.
/// All stock mutations go through this lock so concurrent movements on the
/// same item serialize.
pub(crate) async fn lock_item(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    item_id: Uuid,
) -> Result<Option<InventoryItem>, sqlx::Error> {
    sqlx::query_as::<_, InventoryItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_item \
         WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE \
         FOR UPDATE"
    ))
    .bind(item_id)
    .bind(tenant_id)
    .fetch_optional(&mut **tx)
    .await
}
