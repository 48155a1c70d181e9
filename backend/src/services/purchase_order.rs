//! Purchase orders: lifecycle, numbering, and goods receiving
//!
//! Receiving is the only way batches enter the system. A receipt runs as a
//! single database transaction covering batch creation, the item's
//! weighted-average cost update, the purchase ledger rows, and the order's
//! own status, so a crash can never leave stock half-recorded.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use shared::models::{
    extended_cost_cents, format_order_number, next_order_sequence, weighted_average_cost_cents,
    PurchaseOrderStatus, TransactionType,
};
use shared::types::Pagination;
use shared::units::{convert_cost_per_unit_cents, convert_units, UnitOfMeasure};

use crate::error::{AppError, AppResult};

use super::item::lock_item;
use super::ledger::{insert_transaction, InventoryBatch, InventoryTransaction, NewTransaction};
use super::{parse_status, parse_unit};

/// Service for purchase order management
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// `PO-YYYYMMDD-XXXX`, sequence per tenant per day
    pub order_number: String,
    pub supplier_id: Uuid,
    pub status: String,
    /// Sum of line totals, whole cents
    pub subtotal_cents: i64,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseOrderLine {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub inventory_item_id: Uuid,
    pub quantity_ordered: Decimal,
    /// Cumulative across partial receipts, in the line's unit
    pub quantity_received: Decimal,
    pub unit: String,
    /// Cost per unit in the line's unit, whole cents
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// An order together with its lines
#[derive(Debug, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub lines: Vec<PurchaseOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderLineInput {
    pub inventory_item_id: Uuid,
    #[validate(custom = "shared::validation::validate_positive_quantity")]
    #[validate(custom = "shared::validation::validate_quantity_scale")]
    pub quantity_ordered: Decimal,
    pub unit: UnitOfMeasure,
    #[validate(range(min = 0))]
    pub unit_cost_cents: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub supplier_id: Uuid,
    pub expected_delivery_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    #[validate]
    #[validate(length(min = 1))]
    pub lines: Vec<CreateOrderLineInput>,
}

/// Draft-only edits. Lines, when present, replace the existing set.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateOrderInput {
    pub supplier_id: Option<Uuid>,
    pub expected_delivery_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate]
    pub lines: Option<Vec<CreateOrderLineInput>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiveLineInput {
    pub line_id: Uuid,
    /// Quantity received now, in the line's unit
    #[validate(custom = "shared::validation::validate_positive_quantity")]
    #[validate(custom = "shared::validation::validate_quantity_scale")]
    pub quantity_received: Decimal,
    /// Overrides the ordered cost when the invoice price differs
    #[validate(range(min = 0))]
    pub cost_per_unit_cents: Option<i64>,
    #[validate(length(max = 100))]
    pub batch_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReceiveGoodsInput {
    #[validate]
    #[validate(length(min = 1))]
    pub lines: Vec<ReceiveLineInput>,
    pub received_by: Option<Uuid>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Everything a receipt produced
#[derive(Debug)]
pub struct ReceiveOutcome {
    pub order: PurchaseOrder,
    pub batches: Vec<InventoryBatch>,
    pub transactions: Vec<InventoryTransaction>,
    pub status: PurchaseOrderStatus,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<PurchaseOrderStatus>,
    pub supplier_id: Option<Uuid>,
}

const ORDER_COLUMNS: &str = "id, tenant_id, order_number, supplier_id, status, subtotal_cents, \
     expected_delivery_date, notes, created_by, received_at, created_at, updated_at";

const LINE_COLUMNS: &str = "id, purchase_order_id, inventory_item_id, quantity_ordered, \
     quantity_received, unit, unit_cost_cents, line_total_cents, created_at";

impl PurchaseOrderService {
    /// Create a new PurchaseOrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a draft order with its lines and a fresh order number.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        input: CreateOrderInput,
    ) -> AppResult<PurchaseOrderDetail> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let supplier_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM supplier WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE)",
        )
        .bind(input.supplier_id)
        .bind(tenant_id)
        .fetch_one(&mut *tx)
        .await?;
        if !supplier_exists {
            return Err(AppError::not_found("Supplier", input.supplier_id));
        }

        for line in &input.lines {
            let item_exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM inventory_item WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE)",
            )
            .bind(line.inventory_item_id)
            .bind(tenant_id)
            .fetch_one(&mut *tx)
            .await?;
            if !item_exists {
                return Err(AppError::not_found("Inventory item", line.inventory_item_id));
            }
        }

        let order_number = generate_order_number(&mut tx, tenant_id).await?;

        let subtotal_cents: i64 = input
            .lines
            .iter()
            .map(|line| extended_cost_cents(line.quantity_ordered, line.unit_cost_cents))
            .sum();

        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            INSERT INTO purchase_order (
                tenant_id, order_number, supplier_id, status, subtotal_cents,
                expected_delivery_date, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(&order_number)
        .bind(input.supplier_id)
        .bind(PurchaseOrderStatus::Draft.as_str())
        .bind(subtotal_cents)
        .bind(input.expected_delivery_date)
        .bind(&input.notes)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let lines = insert_lines(&mut tx, order.id, &input.lines).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            "purchase order created"
        );
        Ok(PurchaseOrderDetail { order, lines })
    }

    /// Fetch an order with its lines
    pub async fn get(&self, tenant_id: Uuid, order_id: Uuid) -> AppResult<PurchaseOrderDetail> {
        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_order WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(order_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Purchase order", order_id))?;

        let lines = sqlx::query_as::<_, PurchaseOrderLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM purchase_order_line \
             WHERE purchase_order_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(PurchaseOrderDetail { order, lines })
    }

    /// List orders, newest first
    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: OrderFilter,
        page: Pagination,
    ) -> AppResult<Vec<PurchaseOrder>> {
        let page = page.clamped();
        let orders = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM purchase_order
            WHERE tenant_id = $1
              AND ($2::varchar IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR supplier_id = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(tenant_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.supplier_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(orders)
    }

    /// Edit a draft order. Any other status rejects the edit.
    pub async fn update(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        input: UpdateOrderInput,
    ) -> AppResult<PurchaseOrderDetail> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, tenant_id, order_id).await?;
        let status = parse_status(&order.status)?;
        if !status.can_edit() {
            return Err(AppError::InvalidStateTransition(format!(
                "order {} is {} and can no longer be edited",
                order.order_number, status
            )));
        }

        if let Some(supplier_id) = input.supplier_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM supplier WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE)",
            )
            .bind(supplier_id)
            .bind(tenant_id)
            .fetch_one(&mut *tx)
            .await?;
            if !exists {
                return Err(AppError::not_found("Supplier", supplier_id));
            }
        }

        let (lines, subtotal_cents) = match &input.lines {
            Some(new_lines) => {
                if new_lines.is_empty() {
                    return Err(AppError::validation(
                        "lines",
                        "An order must have at least one line",
                    ));
                }
                sqlx::query("DELETE FROM purchase_order_line WHERE purchase_order_id = $1")
                    .bind(order_id)
                    .execute(&mut *tx)
                    .await?;
                let lines = insert_lines(&mut tx, order_id, new_lines).await?;
                let subtotal = lines.iter().map(|l| l.line_total_cents).sum::<i64>();
                (lines, Some(subtotal))
            }
            None => {
                let lines = sqlx::query_as::<_, PurchaseOrderLine>(&format!(
                    "SELECT {LINE_COLUMNS} FROM purchase_order_line \
                     WHERE purchase_order_id = $1 ORDER BY created_at ASC, id ASC"
                ))
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await?;
                (lines, None)
            }
        };

        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            UPDATE purchase_order
            SET supplier_id = COALESCE($3, supplier_id),
                expected_delivery_date = COALESCE($4, expected_delivery_date),
                notes = COALESCE($5, notes),
                subtotal_cents = COALESCE($6, subtotal_cents),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(tenant_id)
        .bind(input.supplier_id)
        .bind(input.expected_delivery_date)
        .bind(&input.notes)
        .bind(subtotal_cents)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(PurchaseOrderDetail { order, lines })
    }

    /// Move an order along its lifecycle.
    ///
    /// Legality comes from the transition table, with one extra rule: an
    /// order that has received any goods can never be cancelled, because the
    /// stock it created cannot be unwound.
    pub async fn set_status(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        new_status: PurchaseOrderStatus,
    ) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, tenant_id, order_id).await?;
        let current = parse_status(&order.status)?;

        if !current.can_transition_to(new_status) {
            return Err(AppError::InvalidStateTransition(format!(
                "order {} cannot move from {} to {}",
                order.order_number, current, new_status
            )));
        }

        if new_status == PurchaseOrderStatus::Cancelled {
            let received_any = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM purchase_order_line \
                 WHERE purchase_order_id = $1 AND quantity_received > 0)",
            )
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;
            if received_any {
                return Err(AppError::InvalidStateTransition(format!(
                    "order {} has received goods and cannot be cancelled",
                    order.order_number
                )));
            }
        }

        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "UPDATE purchase_order SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(tenant_id)
        .bind(new_status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            from = %current,
            to = %new_status,
            "purchase order status changed"
        );
        Ok(order)
    }

    /// Cancel an order that has not received any goods.
    pub async fn cancel(&self, tenant_id: Uuid, order_id: Uuid) -> AppResult<PurchaseOrder> {
        self.set_status(tenant_id, order_id, PurchaseOrderStatus::Cancelled)
            .await
    }

    /// Receive goods against an approved or partially received order.
    ///
    /// All requested lines are validated before anything moves. Each received
    /// line creates one batch priced in the item's base unit, recomputes the
    /// item's weighted-average cost, and appends one purchase transaction.
    /// The order becomes `received` only when every line of the order is
    /// fully received, otherwise `partially_received`.
    pub async fn receive(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        input: ReceiveGoodsInput,
    ) -> AppResult<ReceiveOutcome> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let order = lock_order(&mut tx, tenant_id, order_id).await?;
        let status = parse_status(&order.status)?;
        if !status.can_receive() {
            return Err(AppError::InvalidStateTransition(format!(
                "order {} is {} and cannot receive goods",
                order.order_number, status
            )));
        }

        let order_lines = sqlx::query_as::<_, PurchaseOrderLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM purchase_order_line \
             WHERE purchase_order_id = $1 ORDER BY created_at ASC, id ASC FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        validate_receipt_request(&order_lines, &input.lines)?;

        let mut batches = Vec::with_capacity(input.lines.len());
        let mut transactions = Vec::with_capacity(input.lines.len());
        let received_at = Utc::now();

        for receive in &input.lines {
            // Lookup can't fail, the validation pass matched every id.
            let line = order_lines
                .iter()
                .find(|l| l.id == receive.line_id)
                .ok_or_else(|| AppError::not_found("Purchase order line", receive.line_id))?;

            // Re-lock inside the loop: two receive lines may target the same
            // item and the second must see the first's quantities.
            let item = lock_item(&mut tx, tenant_id, line.inventory_item_id)
                .await?
                .ok_or_else(|| AppError::not_found("Inventory item", line.inventory_item_id))?;

            let line_unit = parse_unit(&line.unit)?;
            let base_unit = parse_unit(&item.unit)?;
            let quantity_in_base = convert_units(receive.quantity_received, line_unit, base_unit)?;

            let cost_in_line_unit = receive.cost_per_unit_cents.unwrap_or(line.unit_cost_cents);
            let cost_in_base =
                convert_cost_per_unit_cents(cost_in_line_unit, line_unit, base_unit)?;

            let batch = sqlx::query_as::<_, InventoryBatch>(
                r#"
                INSERT INTO inventory_batch (
                    tenant_id, inventory_item_id, purchase_order_id, batch_number,
                    received_at, quantity_received, quantity_remaining, cost_per_unit_cents
                )
                VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
                RETURNING id, tenant_id, inventory_item_id, purchase_order_id, batch_number,
                          received_at, quantity_received, quantity_remaining,
                          cost_per_unit_cents, created_at
                "#,
            )
            .bind(tenant_id)
            .bind(item.id)
            .bind(order_id)
            .bind(&receive.batch_number)
            .bind(received_at)
            .bind(quantity_in_base)
            .bind(cost_in_base)
            .fetch_one(&mut *tx)
            .await?;

            let new_average = weighted_average_cost_cents(
                item.current_quantity,
                item.average_cost_cents,
                quantity_in_base,
                cost_in_base,
            );
            let new_quantity = item.current_quantity + quantity_in_base;

            sqlx::query(
                "UPDATE inventory_item \
                 SET current_quantity = $1, average_cost_cents = $2, updated_at = NOW() \
                 WHERE id = $3",
            )
            .bind(new_quantity)
            .bind(new_average)
            .bind(item.id)
            .execute(&mut *tx)
            .await?;

            let transaction = insert_transaction(
                &mut tx,
                NewTransaction {
                    tenant_id,
                    inventory_item_id: item.id,
                    batch_id: Some(batch.id),
                    transaction_type: TransactionType::Purchase,
                    quantity: quantity_in_base,
                    unit: base_unit,
                    unit_cost_cents: cost_in_base,
                    balance_after: new_quantity,
                    order_id: None,
                    purchase_order_id: Some(order_id),
                    notes: input
                        .notes
                        .clone()
                        .or_else(|| Some(format!("Received against {}", order.order_number))),
                    created_by: input.received_by,
                },
            )
            .await?;

            sqlx::query(
                "UPDATE purchase_order_line SET quantity_received = quantity_received + $1 \
                 WHERE id = $2",
            )
            .bind(receive.quantity_received)
            .bind(line.id)
            .execute(&mut *tx)
            .await?;

            batches.push(batch);
            transactions.push(transaction);
        }

        // Fullness is judged across every line of the order, not only the
        // lines touched by this receipt.
        let fully_received = sqlx::query_scalar::<_, bool>(
            "SELECT NOT EXISTS(SELECT 1 FROM purchase_order_line \
             WHERE purchase_order_id = $1 AND quantity_received < quantity_ordered)",
        )
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

        let new_status = if fully_received {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::PartiallyReceived
        };

        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            r#"
            UPDATE purchase_order
            SET status = $3,
                received_at = CASE WHEN $4 THEN $5 ELSE received_at END,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(tenant_id)
        .bind(new_status.as_str())
        .bind(fully_received)
        .bind(received_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            order_number = %order.order_number,
            status = %new_status,
            batches = batches.len(),
            "goods received"
        );
        Ok(ReceiveOutcome {
            order,
            batches,
            transactions,
            status: new_status,
        })
    }
}

/// Check a receipt request against the order's lines before anything moves.
///
/// Several input entries may name the same line; their sum, not each entry
/// alone, is judged against the line's outstanding quantity.
pub fn validate_receipt_request(
    order_lines: &[PurchaseOrderLine],
    inputs: &[ReceiveLineInput],
) -> AppResult<()> {
    let mut requested: HashMap<Uuid, Decimal> = HashMap::new();
    for input in inputs {
        *requested.entry(input.line_id).or_default() += input.quantity_received;
    }

    for (line_id, total) in requested {
        let line = order_lines
            .iter()
            .find(|l| l.id == line_id)
            .ok_or_else(|| AppError::not_found("Purchase order line", line_id))?;

        let remaining = line.quantity_ordered - line.quantity_received;
        if total > remaining {
            return Err(AppError::validation(
                "quantity_received",
                format!(
                    "line {} has only {} remaining to receive, {} requested",
                    line_id, remaining, total
                ),
            ));
        }
    }

    Ok(())
}

/// Lock an order row for the duration of the transaction. Receipts and
/// status changes on the same order serialize on this lock.
async fn lock_order(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    order_id: Uuid,
) -> AppResult<PurchaseOrder> {
    sqlx::query_as::<_, PurchaseOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM purchase_order \
         WHERE id = $1 AND tenant_id = $2 FOR UPDATE"
    ))
    .bind(order_id)
    .bind(tenant_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::not_found("Purchase order", order_id))
}

/// Allocate the next `PO-YYYYMMDD-XXXX` number for the tenant's current day.
/// The highest existing number for the day is locked so two concurrent
/// creations cannot allocate the same sequence.
async fn generate_order_number(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
) -> AppResult<String> {
    let today = Utc::now().date_naive();
    let prefix = format!("PO-{}-%", today.format("%Y%m%d"));

    // Longer numbers first: past 9999 the sequence gains a digit and would
    // otherwise sort below the 4-digit numbers.
    let last = sqlx::query_scalar::<_, String>(
        "SELECT order_number FROM purchase_order \
         WHERE tenant_id = $1 AND order_number LIKE $2 \
         ORDER BY LENGTH(order_number) DESC, order_number DESC LIMIT 1 FOR UPDATE",
    )
    .bind(tenant_id)
    .bind(&prefix)
    .fetch_optional(&mut **tx)
    .await?;

    let sequence = next_order_sequence(last.as_deref());
    Ok(format_order_number(today, sequence))
}

async fn insert_lines(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    inputs: &[CreateOrderLineInput],
) -> AppResult<Vec<PurchaseOrderLine>> {
    let mut lines = Vec::with_capacity(inputs.len());
    for input in inputs {
        let line_total_cents = extended_cost_cents(input.quantity_ordered, input.unit_cost_cents);
        let line = sqlx::query_as::<_, PurchaseOrderLine>(&format!(
            r#"
            INSERT INTO purchase_order_line (
                purchase_order_id, inventory_item_id, quantity_ordered, unit,
                unit_cost_cents, line_total_cents
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {LINE_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(input.inventory_item_id)
        .bind(input.quantity_ordered)
        .bind(input.unit.as_str())
        .bind(input.unit_cost_cents)
        .bind(line_total_cents)
        .fetch_one(&mut **tx)
        .await?;
        lines.push(line);
    }
    Ok(lines)
}
