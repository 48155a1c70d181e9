//! Costing and valuation reports
//!
//! Read-only queries over the catalog, recipes, and batches. Reports use
//! plain snapshot reads; they never lock rows.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use shared::models::{effective_quantity, extended_cost_cents};
use shared::units::convert_units;

use crate::error::AppResult;

use super::parse_unit;

/// Service for cost and valuation reporting
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Cost contribution of one recipe ingredient
#[derive(Debug, Clone, Serialize)]
pub struct IngredientCost {
    pub inventory_item_id: Uuid,
    pub item_name: String,
    /// Quantity per product unit including waste, in the item's base unit
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost_cents: i64,
    pub cost_cents: i64,
}

/// Theoretical cost of producing one unit of a product at current average
/// ingredient costs
#[derive(Debug, Serialize)]
pub struct ProductCostReport {
    pub product_id: Uuid,
    pub ingredients: Vec<IngredientCost>,
    pub total_cost_cents: i64,
}

/// Valuation of one item's on-hand stock
#[derive(Debug, Clone, Serialize)]
pub struct ItemValuation {
    pub inventory_item_id: Uuid,
    pub item_name: String,
    pub unit: String,
    pub current_quantity: Decimal,
    pub average_cost_cents: i64,
    pub value_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct ValuationReport {
    pub items: Vec<ItemValuation>,
    pub total_value_cents: i64,
}

/// Current stock position of one item at average cost
#[derive(Debug, Clone, Serialize)]
pub struct StockLevel {
    pub inventory_item_id: Uuid,
    pub item_name: String,
    pub sku: Option<String>,
    pub unit: String,
    pub current_quantity: Decimal,
    pub reorder_level: Decimal,
    pub average_cost_cents: i64,
    pub value_cents: i64,
    pub below_reorder_level: bool,
}

/// A batch's remaining stake in FIFO valuation
#[derive(Debug, Clone)]
pub struct BatchValue {
    pub quantity_remaining: Decimal,
    pub cost_per_unit_cents: i64,
}

/// Value one item's stock under FIFO.
///
/// Normally the sum of each batch's remaining quantity at its historical
/// cost. Negative stock has no batches behind it, so the whole position
/// falls back to the (negative) quantity at average cost.
pub fn fifo_item_value_cents(
    batches: &[BatchValue],
    current_quantity: Decimal,
    average_cost_cents: i64,
) -> i64 {
    if current_quantity < Decimal::ZERO {
        return extended_cost_cents(current_quantity, average_cost_cents);
    }

    batches
        .iter()
        .filter(|b| b.quantity_remaining > Decimal::ZERO)
        .map(|b| extended_cost_cents(b.quantity_remaining, b.cost_per_unit_cents))
        .sum()
}

impl ReportingService {
    /// Create a new ReportingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Theoretical cost of one unit of a product.
    ///
    /// Each recipe quantity is grossed up by its waste percentage, converted
    /// to the ingredient's base unit, and priced at the ingredient's current
    /// average cost. Deleted ingredients are skipped.
    pub async fn product_cost(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<ProductCostReport> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, Decimal, String, Decimal, i64)>(
            r#"
            SELECT i.id, i.name, i.unit, r.quantity_required, r.unit, r.waste_percentage,
                   i.average_cost_cents
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

        let mut ingredients = Vec::with_capacity(rows.len());
        let mut total_cost_cents = 0i64;

        for (item_id, item_name, item_unit, quantity_required, recipe_unit, waste, avg_cents) in
            rows
        {
            let gross = effective_quantity(quantity_required, Decimal::ONE, waste);
            let from = parse_unit(&recipe_unit)?;
            let to = parse_unit(&item_unit)?;
            let quantity_in_base = convert_units(gross, from, to)?;
            let cost_cents = extended_cost_cents(quantity_in_base, avg_cents);
            total_cost_cents += cost_cents;

            ingredients.push(IngredientCost {
                inventory_item_id: item_id,
                item_name,
                quantity: quantity_in_base,
                unit: item_unit,
                unit_cost_cents: avg_cents,
                cost_cents,
            });
        }

        Ok(ProductCostReport {
            product_id,
            ingredients,
            total_cost_cents,
        })
    }

    /// FIFO valuation of all active stock.
    pub async fn fifo_valuation(&self, tenant_id: Uuid) -> AppResult<ValuationReport> {
        let items = sqlx::query_as::<_, (Uuid, String, String, Decimal, i64)>(
            r#"
            SELECT id, name, unit, current_quantity, average_cost_cents
            FROM inventory_item
            WHERE tenant_id = $1 AND is_deleted = FALSE AND is_active = TRUE
            ORDER BY name ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        let mut valuations = Vec::with_capacity(items.len());
        let mut total_value_cents = 0i64;

        for (item_id, name, unit, current_quantity, average_cost_cents) in items {
            let batches = sqlx::query_as::<_, (Decimal, i64)>(
                "SELECT quantity_remaining, cost_per_unit_cents FROM inventory_batch \
                 WHERE inventory_item_id = $1 AND quantity_remaining > 0",
            )
            .bind(item_id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(|(quantity_remaining, cost_per_unit_cents)| BatchValue {
                quantity_remaining,
                cost_per_unit_cents,
            })
            .collect::<Vec<_>>();

            let value_cents =
                fifo_item_value_cents(&batches, current_quantity, average_cost_cents);
            total_value_cents += value_cents;

            valuations.push(ItemValuation {
                inventory_item_id: item_id,
                item_name: name,
                unit,
                current_quantity,
                average_cost_cents,
                value_cents,
            });
        }

        Ok(ValuationReport {
            items: valuations,
            total_value_cents,
        })
    }

    /// Stock on hand valued at average cost, with reorder flags
    pub async fn stock_levels(&self, tenant_id: Uuid) -> AppResult<Vec<StockLevel>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<String>, String, Decimal, Decimal, i64)>(
            r#"
            SELECT id, name, sku, unit, current_quantity, reorder_level, average_cost_cents
            FROM inventory_item
            WHERE tenant_id = $1 AND is_deleted = FALSE AND is_active = TRUE
            ORDER BY name ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, name, sku, unit, current_quantity, reorder_level, average_cost_cents)| {
                    StockLevel {
                        inventory_item_id: id,
                        item_name: name,
                        sku,
                        unit,
                        current_quantity,
                        reorder_level,
                        average_cost_cents,
                        value_cents: extended_cost_cents(current_quantity, average_cost_cents),
                        below_reorder_level: current_quantity <= reorder_level,
                    }
                },
            )
            .collect())
    }
}
