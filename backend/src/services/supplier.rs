//! Supplier directory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::types::Pagination;

use crate::error::{AppError, AppResult};

/// Service for supplier management
#[derive(Clone)]
pub struct SupplierService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSupplierInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

const SUPPLIER_COLUMNS: &str = "id, tenant_id, name, contact_name, email, phone, address, \
     notes, is_active, is_deleted, created_at, updated_at";

impl SupplierService {
    /// Create a new SupplierService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        input: CreateSupplierInput,
    ) -> AppResult<Supplier> {
        input.validate()?;

        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            INSERT INTO supplier (tenant_id, name, contact_name, email, phone, address, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.contact_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(supplier_id = %supplier.id, name = %supplier.name, "supplier created");
        Ok(supplier)
    }

    pub async fn get(&self, tenant_id: Uuid, supplier_id: Uuid) -> AppResult<Supplier> {
        sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM supplier \
             WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE"
        ))
        .bind(supplier_id)
        .bind(tenant_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Supplier", supplier_id))
    }

    pub async fn update(
        &self,
        tenant_id: Uuid,
        supplier_id: Uuid,
        input: UpdateSupplierInput,
    ) -> AppResult<Supplier> {
        input.validate()?;

        sqlx::query_as::<_, Supplier>(&format!(
            r#"
            UPDATE supplier
            SET name = COALESCE($3, name),
                contact_name = COALESCE($4, contact_name),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                address = COALESCE($7, address),
                notes = COALESCE($8, notes),
                is_active = COALESCE($9, is_active),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(supplier_id)
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.contact_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.notes)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Supplier", supplier_id))
    }

    /// Soft-delete a supplier; existing items and purchase orders keep their
    /// reference.
    pub async fn delete(&self, tenant_id: Uuid, supplier_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE supplier SET is_deleted = TRUE, is_active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 AND is_deleted = FALSE",
        )
        .bind(supplier_id)
        .bind(tenant_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Supplier", supplier_id));
        }
        Ok(())
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        active_only: bool,
        page: Pagination,
    ) -> AppResult<Vec<Supplier>> {
        let page = page.clamped();
        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            r#"
            SELECT {SUPPLIER_COLUMNS}
            FROM supplier
            WHERE tenant_id = $1 AND is_deleted = FALSE
              AND ($2::boolean = FALSE OR is_active = TRUE)
            ORDER BY name ASC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(tenant_id)
        .bind(active_only)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(suppliers)
    }
}
