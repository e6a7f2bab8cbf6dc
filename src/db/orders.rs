//! Order store over Postgres: create, conditional status updates, lookups.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::model::order::validate_transition;
use crate::model::{NewOrder, Order, OrderId, Status};
use crate::store::OrderStore;

const ORDER_COLUMNS: &str =
    "identity, owner_identity, url, count, status, deleted, created_at, updated_at";

/// [`OrderStore`] backed by the `orders` table.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, identity: OrderId, new: &NewOrder) -> Result<Order> {
        new.validate()?;

        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO orders (identity, owner_identity, url, count, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&identity.0)
        .bind(&new.owner_identity)
        .bind(&new.url)
        .bind(new.count)
        .bind(Status::Pending.code())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::Conflict(format!("identity {identity} already exists"))
            }
            other => Error::Database(other),
        })?;

        row.try_into_order()
    }

    async fn transition(&self, identity: &OrderId, from: Status, to: Status) -> Result<bool> {
        validate_transition(from, to)?;

        // Claiming a deleted order is refused; an in-flight order finishes
        // regardless of the flag.
        let allow_deleted = from != Status::Pending;

        let rows_affected = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = now()
             WHERE identity = $2 AND status = $3 AND ($4 OR NOT deleted)",
        )
        .bind(to.code())
        .bind(&identity.0)
        .bind(from.code())
        .bind(allow_deleted)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn mark_deleted(&self, identity: &OrderId) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE orders SET deleted = TRUE, updated_at = now()
             WHERE identity = $1 AND NOT deleted",
        )
        .bind(&identity.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn list_pending_identities(&self) -> Result<Vec<OrderId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT identity FROM orders
             WHERE status = $1 AND NOT deleted
             ORDER BY created_at, id",
        )
        .bind(Status::Pending.code())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| OrderId(id)).collect())
    }

    async fn get(&self, identity: &OrderId) -> Result<Order> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE identity = $1"
        ))
        .bind(&identity.0)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("order {identity}")))?
            .try_into_order()
    }

    async fn list_by_owner(&self, owner_identity: &str) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE owner_identity = $1 AND NOT deleted
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_identity)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::try_into_order).collect()
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct OrderRow {
    identity: String,
    owner_identity: String,
    url: String,
    count: i32,
    status: i16,
    deleted: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl OrderRow {
    fn try_into_order(self) -> Result<Order> {
        Ok(Order {
            identity: OrderId(self.identity),
            owner_identity: self.owner_identity,
            url: self.url,
            count: self.count,
            status: Status::try_from(self.status)?,
            deleted: self.deleted,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
