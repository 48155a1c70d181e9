//! The stock ledger: FIFO batch deduction and the append-only transaction log
//!
//! Every stock-affecting event appends transaction rows and updates the
//! item's cached `current_quantity` in the same database transaction; the
//! transaction log is the source of truth and the cached field is a derived
//! index over it. Deductions consume the oldest batches first at their
//! historical cost, and are allowed to drive an item negative: a stock-out
//! must never block a sale from being recorded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::models::{effective_quantity, extended_cost_cents, TransactionType};
use shared::types::Pagination;
use shared::units::{convert_units, UnitOfMeasure};

use crate::error::{AppError, AppResult};

use super::item::{lock_item, InventoryItem};
use super::parse_unit;

/// Ledger service for FIFO stock deduction and transaction history
#[derive(Clone)]
pub struct LedgerService {
    db: PgPool,
}

/// One discrete receipt of stock, consumed incrementally by FIFO deduction.
/// Created only by purchase-order receiving; never deleted, even at zero.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryBatch {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub inventory_item_id: Uuid,
    pub purchase_order_id: Option<Uuid>,
    /// Optional external batch/lot number
    pub batch_number: Option<String>,
    pub received_at: DateTime<Utc>,
    pub quantity_received: Decimal,
    pub quantity_remaining: Decimal,
    /// Cost at time of receipt, per unit in the item's base unit
    pub cost_per_unit_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger row. Rows are never mutated or deleted; a missing
/// batch reference marks an unbacked (negative-stock) deduction or a manual
/// adjustment.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub inventory_item_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub transaction_type: String,
    /// Positive for additions, negative for deductions
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost_cents: Option<i64>,
    pub total_cost_cents: Option<i64>,
    /// Running balance after this transaction, in the item's base unit
    pub balance_after: Decimal,
    pub order_id: Option<Uuid>,
    pub purchase_order_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Minimal view of a batch used by the FIFO planner
#[derive(Debug, Clone)]
pub struct BatchLot {
    pub id: Uuid,
    pub quantity_remaining: Decimal,
    pub cost_per_unit_cents: i64,
}

/// One planned ledger entry produced by [`plan_deduction`]
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDeduction {
    /// `None` marks the unbacked remainder priced at the average cost
    pub batch_id: Option<Uuid>,
    /// Positive amount taken
    pub quantity: Decimal,
    pub unit_cost_cents: i64,
    pub balance_after: Decimal,
}

/// Linkage and audit context for a deduction
#[derive(Debug, Clone, Default)]
pub struct DeductionContext {
    pub order_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Result of a single-item deduction
#[derive(Debug)]
pub struct DeductionOutcome {
    pub transactions: Vec<InventoryTransaction>,
    /// True when the deduction ran past available batches into negative stock
    pub shortfall: bool,
}

/// Recipe-driven consumption request for one completed sales order
#[derive(Debug, Clone)]
pub struct OrderConsumption {
    pub order_id: Uuid,
    pub lines: Vec<OrderLine>,
}

/// One sold product on an order
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: Decimal,
}

/// Low-stock signal surfaced to the caller instead of blocking the sale
#[derive(Debug, Clone, Serialize)]
pub struct StockShortfall {
    pub inventory_item_id: Uuid,
    pub item_name: String,
    pub required: Decimal,
    pub available: Decimal,
}

/// Result of deducting a whole order
#[derive(Debug)]
pub struct OrderDeductionOutcome {
    pub transactions: Vec<InventoryTransaction>,
    pub shortfalls: Vec<StockShortfall>,
}

/// Filters for transaction history queries
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub inventory_item_id: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
}

/// Walk batches oldest-first and plan how an outgoing quantity is satisfied.
///
/// Batch-backed lines are priced at the batch's historical cost; if the
/// batches run out, one final unbacked line at `average_cost_cents` covers
/// the remainder and the running balance goes negative. Balances strictly
/// decrease in plan order, starting from `balance`.
pub fn plan_deduction(
    batches: &[BatchLot],
    quantity: Decimal,
    average_cost_cents: i64,
    mut balance: Decimal,
) -> Vec<PlannedDeduction> {
    let mut lines = Vec::new();
    let mut remaining = quantity;

    for batch in batches {
        if remaining <= Decimal::ZERO {
            break;
        }
        if batch.quantity_remaining <= Decimal::ZERO {
            continue;
        }

        let take = batch.quantity_remaining.min(remaining);
        balance -= take;
        lines.push(PlannedDeduction {
            batch_id: Some(batch.id),
            quantity: take,
            unit_cost_cents: batch.cost_per_unit_cents,
            balance_after: balance,
        });
        remaining -= take;
    }

    if remaining > Decimal::ZERO {
        balance -= remaining;
        lines.push(PlannedDeduction {
            batch_id: None,
            quantity: remaining,
            unit_cost_cents: average_cost_cents,
            balance_after: balance,
        });
    }

    lines
}

impl LedgerService {
    /// Create a new LedgerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Deduct stock from an item using FIFO, in one atomic transaction.
    ///
    /// `quantity_in_base` must already be expressed in the item's base unit.
    /// Insufficient stock is a warning carried in the outcome, never an
    /// error: the deduction proceeds into negative stock.
    pub async fn deduct(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        quantity_in_base: Decimal,
        transaction_type: TransactionType,
        context: DeductionContext,
    ) -> AppResult<DeductionOutcome> {
        let mut tx = self.db.begin().await?;

        let item = lock_item(&mut tx, tenant_id, item_id)
            .await?
            .ok_or_else(|| AppError::not_found("Inventory item", item_id))?;

        let (transactions, shortfall) =
            deduct_locked(&mut tx, &item, quantity_in_base, transaction_type, &context).await?;

        tx.commit().await?;

        Ok(DeductionOutcome {
            transactions,
            shortfall,
        })
    }

    /// Deduct inventory for all recipe ingredients of a completed order.
    ///
    /// Runs as one atomic transaction covering every line. Ingredients whose
    /// item has been deleted are skipped; low stock is logged and reported
    /// in the outcome but never rejects the order.
    pub async fn deduct_for_order(
        &self,
        tenant_id: Uuid,
        order: &OrderConsumption,
        created_by: Option<Uuid>,
    ) -> AppResult<OrderDeductionOutcome> {
        let mut tx = self.db.begin().await?;

        let mut all_transactions = Vec::new();
        let mut shortfalls = Vec::new();

        for line in &order.lines {
            let recipe = sqlx::query_as::<_, (Uuid, Decimal, String, Decimal)>(
                r#"
                SELECT inventory_item_id, quantity_required, unit, waste_percentage
                FROM product_recipe
                WHERE tenant_id = $1 AND product_id = $2
                "#,
            )
            .bind(tenant_id)
            .bind(line.product_id)
            .fetch_all(&mut *tx)
            .await?;

            for (item_id, quantity_required, unit, waste_percentage) in recipe {
                let Some(item) = lock_item(&mut tx, tenant_id, item_id).await? else {
                    // Deleted ingredient; the recipe line is stale, skip it.
                    continue;
                };

                let needed = effective_quantity(quantity_required, line.quantity, waste_percentage);
                let recipe_unit = parse_unit(&unit)?;
                let base_unit = parse_unit(&item.unit)?;
                let quantity_in_base = convert_units(needed, recipe_unit, base_unit)?;

                if item.current_quantity < quantity_in_base {
                    tracing::warn!(
                        item_id = %item.id,
                        item_name = %item.name,
                        required = %quantity_in_base,
                        available = %item.current_quantity,
                        "low stock while deducting for order"
                    );
                    shortfalls.push(StockShortfall {
                        inventory_item_id: item.id,
                        item_name: item.name.clone(),
                        required: quantity_in_base,
                        available: item.current_quantity,
                    });
                }

                let context = DeductionContext {
                    order_id: Some(order.order_id),
                    notes: Some(format!("Order {} - {}", order.order_id, line.product_name)),
                    created_by,
                };
                let (transactions, _) = deduct_locked(
                    &mut tx,
                    &item,
                    quantity_in_base,
                    TransactionType::Sale,
                    &context,
                )
                .await?;
                all_transactions.extend(transactions);
            }
        }

        tx.commit().await?;

        Ok(OrderDeductionOutcome {
            transactions: all_transactions,
            shortfalls,
        })
    }

    /// Transaction history for a tenant, newest first
    pub async fn transactions(
        &self,
        tenant_id: Uuid,
        filter: TransactionFilter,
        page: Pagination,
    ) -> AppResult<Vec<InventoryTransaction>> {
        let page = page.clamped();
        let transactions = sqlx::query_as::<_, InventoryTransaction>(
            r#"
            SELECT id, tenant_id, inventory_item_id, batch_id, transaction_type, quantity,
                   unit, unit_cost_cents, total_cost_cents, balance_after, order_id,
                   purchase_order_id, notes, created_by, created_at
            FROM inventory_transaction
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR inventory_item_id = $2)
              AND ($3::varchar IS NULL OR transaction_type = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(filter.inventory_item_id)
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(transactions)
    }

    /// Transactions recorded against a single item, newest first
    pub async fn transactions_for_item(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        page: Pagination,
    ) -> AppResult<Vec<InventoryTransaction>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM inventory_item WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE)",
        )
        .bind(item_id)
        .bind(tenant_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::not_found("Inventory item", item_id));
        }

        self.transactions(
            tenant_id,
            TransactionFilter {
                inventory_item_id: Some(item_id),
                transaction_type: None,
            },
            page,
        )
        .await
    }
}

/// Deduct against an item row the caller has already locked `FOR UPDATE`.
///
/// Applies the FIFO plan: decrements each touched batch, appends one ledger
/// row per plan line, and moves the item's cached quantity to the final
/// balance, all within the supplied transaction.
pub(crate) async fn deduct_locked(
    tx: &mut Transaction<'_, Postgres>,
    item: &InventoryItem,
    quantity_in_base: Decimal,
    transaction_type: TransactionType,
    context: &DeductionContext,
) -> AppResult<(Vec<InventoryTransaction>, bool)> {
    match transaction_type {
        TransactionType::Sale
        | TransactionType::Waste
        | TransactionType::AdjustmentSubtract
        | TransactionType::TransferOut => {}
        TransactionType::Purchase
        | TransactionType::AdjustmentAdd
        | TransactionType::TransferIn => {
            return Err(AppError::validation(
                "transaction_type",
                format!("{} is not a deduction type", transaction_type),
            ));
        }
    }

    if quantity_in_base <= Decimal::ZERO {
        return Err(AppError::validation(
            "quantity",
            "Quantity must be positive",
        ));
    }

    let base_unit = parse_unit(&item.unit)?;

    // Oldest first; creation order breaks received_at ties so replays are
    // stable.
    let batches = sqlx::query_as::<_, (Uuid, Decimal, i64)>(
        r#"
        SELECT id, quantity_remaining, cost_per_unit_cents
        FROM inventory_batch
        WHERE inventory_item_id = $1 AND tenant_id = $2 AND quantity_remaining > 0
        ORDER BY received_at ASC, created_at ASC, id ASC
        FOR UPDATE
        "#,
    )
    .bind(item.id)
    .bind(item.tenant_id)
    .fetch_all(&mut **tx)
    .await?
    .into_iter()
    .map(|(id, quantity_remaining, cost_per_unit_cents)| BatchLot {
        id,
        quantity_remaining,
        cost_per_unit_cents,
    })
    .collect::<Vec<_>>();

    let plan = plan_deduction(
        &batches,
        quantity_in_base,
        item.average_cost_cents,
        item.current_quantity,
    );

    let mut transactions = Vec::with_capacity(plan.len());
    let mut shortfall = false;

    for line in &plan {
        let notes = match line.batch_id {
            Some(batch_id) => {
                sqlx::query(
                    "UPDATE inventory_batch SET quantity_remaining = quantity_remaining - $1 WHERE id = $2",
                )
                .bind(line.quantity)
                .bind(batch_id)
                .execute(&mut **tx)
                .await?;
                context.notes.clone()
            }
            None => {
                shortfall = true;
                let base = context.notes.as_deref().unwrap_or("");
                Some(format!("{} [NEGATIVE STOCK]", base).trim().to_string())
            }
        };

        let transaction = insert_transaction(
            tx,
            NewTransaction {
                tenant_id: item.tenant_id,
                inventory_item_id: item.id,
                batch_id: line.batch_id,
                transaction_type,
                quantity: -line.quantity,
                unit: base_unit,
                unit_cost_cents: line.unit_cost_cents,
                balance_after: line.balance_after,
                order_id: context.order_id,
                purchase_order_id: None,
                notes,
                created_by: context.created_by,
            },
        )
        .await?;
        transactions.push(transaction);
    }

    let new_quantity = item.current_quantity - quantity_in_base;
    sqlx::query(
        "UPDATE inventory_item SET current_quantity = $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(new_quantity)
    .bind(item.id)
    .execute(&mut **tx)
    .await?;

    if shortfall {
        tracing::warn!(
            item_id = %item.id,
            item_name = %item.name,
            balance = %new_quantity,
            "deduction ran past available batches into negative stock"
        );
    }

    Ok((transactions, shortfall))
}

/// Fields of a new ledger row; id, timestamps, and total cost are derived.
pub(crate) struct NewTransaction {
    pub tenant_id: Uuid,
    pub inventory_item_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
    pub unit_cost_cents: i64,
    pub balance_after: Decimal,
    pub order_id: Option<Uuid>,
    pub purchase_order_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Append one row to the transaction ledger within an open transaction.
pub(crate) async fn insert_transaction(
    tx: &mut Transaction<'_, Postgres>,
    new: NewTransaction,
) -> Result<InventoryTransaction, sqlx::Error> {
    let total_cost_cents = extended_cost_cents(new.quantity.abs(), new.unit_cost_cents);

    sqlx::query_as::<_, InventoryTransaction>(
        r#"
        INSERT INTO inventory_transaction (
            tenant_id, inventory_item_id, batch_id, transaction_type, quantity, unit,
            unit_cost_cents, total_cost_cents, balance_after, order_id,
            purchase_order_id, notes, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING id, tenant_id, inventory_item_id, batch_id, transaction_type, quantity,
                  unit, unit_cost_cents, total_cost_cents, balance_after, order_id,
                  purchase_order_id, notes, created_by, created_at
        "#,
    )
    .bind(new.tenant_id)
    .bind(new.inventory_item_id)
    .bind(new.batch_id)
    .bind(new.transaction_type.as_str())
    .bind(new.quantity)
    .bind(new.unit.as_str())
    .bind(new.unit_cost_cents)
    .bind(total_cost_cents)
    .bind(new.balance_after)
    .bind(new.order_id)
    .bind(new.purchase_order_id)
    .bind(new.notes)
    .bind(new.created_by)
    .fetch_one(&mut **tx)
    .await
}
