//! # Reference Data Repository
//!
//! Master-data snapshots (products, customers, accounts).
//!
//! Reference data is replaced wholesale per domain, never patched
//! field-by-field: partial patches risk mixing stale and fresh rows. The
//! swap runs inside one transaction, so an interrupted refresh leaves the
//! previous snapshot fully intact.

use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::StoreResult;
use meridian_core::{Money, ReferenceCatalog, ReferenceDomain, ReferenceItem};

/// Repository for reference-data operations.
#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    pool: SqlitePool,
}

/// Database row shape; converted to/from the core type at the edge.
#[derive(Debug, FromRow)]
struct ReferenceItemRow {
    barcode: String,
    sku: String,
    variant: String,
    name: String,
    list_price: i64,
    special_price: Option<i64>,
    stock_qty: Option<i64>,
    category: Option<String>,
}

impl From<ReferenceItemRow> for ReferenceItem {
    fn from(row: ReferenceItemRow) -> Self {
        ReferenceItem {
            barcode: row.barcode,
            sku: row.sku,
            variant: row.variant,
            name: row.name,
            list_price: Money::from_minor(row.list_price),
            special_price: row.special_price.map(Money::from_minor),
            stock_qty: row.stock_qty,
            category: row.category,
        }
    }
}

impl ReferenceRepository {
    /// Creates a new ReferenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReferenceRepository { pool }
    }

    /// Atomically swaps the entire reference set for a domain.
    ///
    /// All-or-nothing from the caller's point of view: the delete and every
    /// insert commit together or not at all. Callers must fetch and
    /// validate the full remote payload *before* calling this.
    pub async fn replace_all(
        &self,
        domain: ReferenceDomain,
        items: &[ReferenceItem],
    ) -> StoreResult<()> {
        info!(domain = %domain, count = items.len(), "replacing reference snapshot");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM reference_items WHERE domain = ?1")
            .bind(domain.as_str())
            .execute(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO reference_items (
                    domain, barcode, sku, variant, name,
                    list_price, special_price, stock_qty, category
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(domain.as_str())
            .bind(&item.barcode)
            .bind(&item.sku)
            .bind(&item.variant)
            .bind(&item.name)
            .bind(item.list_price.minor())
            .bind(item.special_price.map(|p| p.minor()))
            .bind(item.stock_qty)
            .bind(&item.category)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(domain = %domain, "reference snapshot committed");
        Ok(())
    }

    /// Returns every item sharing a barcode (size variants included).
    pub async fn find_by_barcode(
        &self,
        domain: ReferenceDomain,
        barcode: &str,
    ) -> StoreResult<Vec<ReferenceItem>> {
        let rows: Vec<ReferenceItemRow> = sqlx::query_as(
            r#"
            SELECT barcode, sku, variant, name, list_price, special_price, stock_qty, category
            FROM reference_items
            WHERE domain = ?1 AND barcode = ?2
            ORDER BY variant
            "#,
        )
        .bind(domain.as_str())
        .bind(barcode)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReferenceItem::from).collect())
    }

    /// Loads the whole domain into an in-memory barcode catalog for
    /// free-scan lookups.
    pub async fn load_catalog(&self, domain: ReferenceDomain) -> StoreResult<ReferenceCatalog> {
        let rows: Vec<ReferenceItemRow> = sqlx::query_as(
            r#"
            SELECT barcode, sku, variant, name, list_price, special_price, stock_qty, category
            FROM reference_items
            WHERE domain = ?1
            ORDER BY barcode, variant
            "#,
        )
        .bind(domain.as_str())
        .fetch_all(&self.pool)
        .await?;

        debug!(domain = %domain, count = rows.len(), "loaded reference catalog");
        Ok(ReferenceCatalog::from_items(
            rows.into_iter().map(ReferenceItem::from).collect(),
        ))
    }

    /// Counts items in a domain.
    pub async fn count(&self, domain: ReferenceDomain) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reference_items WHERE domain = ?1")
                .bind(domain.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
