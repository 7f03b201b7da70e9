use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resale_catalog::{CodePool, PooledCode};
use resale_core::repository::SaleRepository;
use resale_core::{CoreError, CoreResult, SaleFilter};
use resale_order::{
    attach_codes, demands_match, AllocatedCode, CodeDemand, LineProduct, Sale, SaleItem, SaleStatus,
};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::map_db_err;

pub struct StoreSaleRepository {
    pool: PgPool,
}

impl StoreSaleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct SaleRow {
    id: Uuid,
    owner_id: Uuid,
    customer_id: Uuid,
    total_cents: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct SaleItemRow {
    id: Uuid,
    sale_id: Uuid,
    product_kind: String,
    app_id: Option<Uuid>,
    combo_id: Option<Uuid>,
    name: String,
    quantity: i32,
    price_cents: i64,
}

impl SaleItemRow {
    fn product(&self) -> CoreResult<LineProduct> {
        match (self.product_kind.as_str(), self.app_id, self.combo_id) {
            ("app", Some(app_id), _) => Ok(LineProduct::App { app_id }),
            ("combo", _, Some(combo_id)) => Ok(LineProduct::Combo { combo_id }),
            (kind, _, _) => Err(CoreError::Storage(format!("sale item {} has malformed product '{}'", self.id, kind))),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SaleCodeRow {
    sale_item_id: Uuid,
    code_id: Uuid,
    app_id: Uuid,
    code: String,
}

#[derive(sqlx::FromRow)]
struct AvailableCodeRow {
    id: Uuid,
    app_id: Uuid,
    code: String,
}

const SALE_COLUMNS: &str = "id, owner_id, customer_id, total_cents, status, created_at, updated_at, confirmed_at";

/// Loads items and delivered codes for a batch of sale rows.
async fn load_sales(conn: &mut PgConnection, rows: Vec<SaleRow>) -> CoreResult<Vec<Sale>> {
    let sale_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let item_rows = sqlx::query_as::<_, SaleItemRow>(
        r#"
        SELECT id, sale_id, product_kind, app_id, combo_id, name, quantity, price_cents
        FROM sale_items
        WHERE sale_id = ANY($1)
        ORDER BY sale_id, position
        "#,
    )
    .bind(&sale_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_err)?;

    let item_ids: Vec<Uuid> = item_rows.iter().map(|i| i.id).collect();
    let code_rows = sqlx::query_as::<_, SaleCodeRow>(
        r#"
        SELECT sc.sale_item_id, c.id AS code_id, c.app_id, c.code
        FROM sale_codes sc
        JOIN codes c ON c.id = sc.code_id
        WHERE sc.sale_item_id = ANY($1)
        ORDER BY c.seq
        "#,
    )
    .bind(&item_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_err)?;

    let mut codes: HashMap<Uuid, Vec<AllocatedCode>> = HashMap::new();
    for row in code_rows {
        codes.entry(row.sale_item_id).or_default().push(AllocatedCode {
            code_id: row.code_id,
            app_id: row.app_id,
            code: row.code,
        });
    }

    let mut items: HashMap<Uuid, Vec<SaleItem>> = HashMap::new();
    for row in item_rows {
        let product = row.product()?;
        items.entry(row.sale_id).or_default().push(SaleItem {
            id: row.id,
            product,
            name: row.name,
            quantity: u32::try_from(row.quantity).unwrap_or_default(),
            price_cents: row.price_cents,
            codes: codes.remove(&row.id).unwrap_or_default(),
        });
    }

    rows.into_iter()
        .map(|row| {
            let status = row
                .status
                .parse::<SaleStatus>()
                .map_err(|e| CoreError::Storage(e.to_string()))?;
            Ok(Sale {
                id: row.id,
                owner_id: row.owner_id,
                customer_id: row.customer_id,
                items: items.remove(&row.id).unwrap_or_default(),
                total_cents: row.total_cents,
                status,
                created_at: row.created_at,
                updated_at: row.updated_at,
                confirmed_at: row.confirmed_at,
            })
        })
        .collect()
}

async fn insert_items(conn: &mut PgConnection, sale: &Sale) -> CoreResult<()> {
    for (position, item) in sale.items.iter().enumerate() {
        let (app_id, combo_id) = match item.product {
            LineProduct::App { app_id } => (Some(app_id), None),
            LineProduct::Combo { combo_id } => (None, Some(combo_id)),
        };
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| CoreError::Validation(format!("quantity of '{}' is too large", item.name)))?;

        sqlx::query(
            r#"
            INSERT INTO sale_items (id, sale_id, position, product_kind, app_id, combo_id, name, quantity, price_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id)
        .bind(sale.id)
        .bind(position as i32)
        .bind(item.product.kind())
        .bind(app_id)
        .bind(combo_id)
        .bind(&item.name)
        .bind(quantity)
        .bind(item.price_cents)
        .execute(&mut *conn)
        .await
        .map_err(map_db_err)?;
    }
    Ok(())
}

async fn fetch_sale(conn: &mut PgConnection, owner_id: Uuid, id: Uuid, lock: bool) -> CoreResult<Option<Sale>> {
    let sql = format!(
        "SELECT {} FROM sales WHERE id = $1 AND owner_id = $2{}",
        SALE_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_err)?;

    match row {
        Some(row) => Ok(load_sales(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[async_trait]
impl SaleRepository for StoreSaleRepository {
    async fn create_sale(&self, sale: &Sale) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        sqlx::query(
            r#"
            INSERT INTO sales (id, owner_id, customer_id, total_cents, status, created_at, updated_at, confirmed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(sale.id)
        .bind(sale.owner_id)
        .bind(sale.customer_id)
        .bind(sale.total_cents)
        .bind(sale.status.as_str())
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.confirmed_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        insert_items(&mut tx, sale).await?;

        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn get_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await.map_err(map_db_err)?;
        fetch_sale(&mut conn, owner_id, id, false).await
    }

    async fn list_sales(&self, owner_id: Uuid, filter: &SaleFilter) -> CoreResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await.map_err(map_db_err)?;
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            r#"
            SELECT {}
            FROM sales
            WHERE owner_id = $1
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::UUID IS NULL OR customer_id = $3)
            ORDER BY created_at DESC
            "#,
            SALE_COLUMNS
        ))
        .bind(owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.customer_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_err)?;

        load_sales(&mut conn, rows).await
    }

    async fn update_sale(&self, sale: &Sale, expected: SaleStatus) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let result = sqlx::query(
            r#"
            UPDATE sales
            SET customer_id = $3, total_cents = $4, status = $5, updated_at = $6
            WHERE id = $1 AND owner_id = $2 AND status = $7
            "#,
        )
        .bind(sale.id)
        .bind(sale.owner_id)
        .bind(sale.customer_id)
        .bind(sale.total_cents)
        .bind(sale.status.as_str())
        .bind(sale.updated_at)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            let exists = fetch_sale(&mut tx, sale.owner_id, sale.id, false).await?.is_some();
            return Err(if exists {
                CoreError::Conflict(format!("sale {} changed concurrently", sale.id))
            } else {
                CoreError::NotFound(format!("sale {}", sale.id))
            });
        }

        // Pending sales carry no codes, so items are rewritten wholesale
        sqlx::query("DELETE FROM sale_items WHERE sale_id = $1")
            .bind(sale.id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        insert_items(&mut tx, sale).await?;

        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn confirm_sale(&self, owner_id: Uuid, sale_id: Uuid, demands: &[CodeDemand]) -> CoreResult<Sale> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        // 1. Lock the sale row
        let mut sale = fetch_sale(&mut tx, owner_id, sale_id, true)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("sale {}", sale_id)))?;
        if sale.status != SaleStatus::Pending {
            return Err(CoreError::InvalidTransition {
                from: sale.status,
                to: SaleStatus::Confirmed,
            });
        }
        if !demands_match(&sale.items, demands) {
            return Err(CoreError::Conflict(format!("sale {} changed concurrently", sale_id)));
        }

        // 2. Reserve the earliest unused codes per app
        let mut totals: Vec<(Uuid, i64)> = Vec::new();
        for demand in demands {
            match totals.iter_mut().find(|(app_id, _)| *app_id == demand.app_id) {
                Some((_, total)) => *total += i64::from(demand.quantity),
                None => totals.push((demand.app_id, i64::from(demand.quantity))),
            }
        }

        let mut reserved = Vec::new();
        for (app_id, total) in &totals {
            let rows = sqlx::query_as::<_, AvailableCodeRow>(
                r#"
                SELECT id, app_id, code
                FROM codes
                WHERE app_id = $1 AND owner_id = $2 AND NOT used
                ORDER BY seq
                LIMIT $3
                FOR UPDATE SKIP LOCKED
                "#,
            )
            .bind(app_id)
            .bind(owner_id)
            .bind(total)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_db_err)?;

            reserved.extend(rows.into_iter().map(|row| PooledCode {
                id: row.id,
                app_id: row.app_id,
                code: row.code,
                used: false,
            }));
        }

        // Shortage returns early; dropping `tx` rolls everything back
        let mut pool = CodePool::new(reserved);
        let wanted: Vec<(Uuid, u32)> = demands.iter().map(|d| (d.app_id, d.quantity)).collect();
        let allocations = pool.allocate(&wanted)?;

        // 3. Flag codes used and link them to their items
        let code_ids: Vec<Uuid> = allocations.iter().flatten().map(|c| c.id).collect();
        sqlx::query("UPDATE codes SET used = TRUE WHERE id = ANY($1)")
            .bind(&code_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        for (demand, codes) in demands.iter().zip(&allocations) {
            for code in codes {
                sqlx::query("INSERT INTO sale_codes (sale_item_id, code_id) VALUES ($1, $2)")
                    .bind(demand.item_id)
                    .bind(code.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_db_err)?;
            }
        }

        // 4. Mark the sale confirmed
        sale.confirm()?;
        sqlx::query("UPDATE sales SET status = $2, updated_at = $3, confirmed_at = $4 WHERE id = $1")
            .bind(sale.id)
            .bind(sale.status.as_str())
            .bind(sale.updated_at)
            .bind(sale.confirmed_at)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;

        let allocated = allocations
            .into_iter()
            .map(|codes| {
                codes
                    .into_iter()
                    .map(|c| AllocatedCode {
                        code_id: c.id,
                        app_id: c.app_id,
                        code: c.code,
                    })
                    .collect()
            })
            .collect();
        attach_codes(&mut sale, demands, allocated);
        Ok(sale)
    }

    async fn delete_sale(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        // Items and code links cascade; the codes themselves stay used
        let result = sqlx::query("DELETE FROM sales WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("sale {}", id)));
        }
        Ok(())
    }
}
