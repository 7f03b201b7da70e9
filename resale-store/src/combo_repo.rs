use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resale_catalog::{Combo, ComboApp};
use resale_core::repository::ComboRepository;
use resale_core::{CoreError, CoreResult};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::map_db_err;

pub struct StoreComboRepository {
    pool: PgPool,
}

impl StoreComboRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attaches member apps (in combo order) to each combo row.
    async fn assemble(&self, rows: Vec<ComboRow>) -> CoreResult<Vec<Combo>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let members = sqlx::query_as::<_, ComboMemberRow>(
            r#"
            SELECT i.combo_id, a.id, a.name, a.price_cents
            FROM app_combo_items i
            JOIN apps a ON a.id = i.app_id
            WHERE i.combo_id = ANY($1)
            ORDER BY i.combo_id, i.position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let mut apps: HashMap<Uuid, Vec<ComboApp>> = HashMap::new();
        for m in members {
            apps.entry(m.combo_id).or_default().push(ComboApp {
                id: m.id,
                name: m.name,
                price_cents: m.price_cents,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Combo {
                apps: apps.remove(&row.id).unwrap_or_default(),
                id: row.id,
                owner_id: row.owner_id,
                name: row.name,
                price_cents: row.price_cents,
                created_at: row.created_at,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct ComboRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    price_cents: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ComboMemberRow {
    combo_id: Uuid,
    id: Uuid,
    name: String,
    price_cents: i64,
}

#[async_trait]
impl ComboRepository for StoreComboRepository {
    async fn create_combo(&self, combo: &Combo) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        sqlx::query("INSERT INTO app_combos (id, owner_id, name, price_cents, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(combo.id)
            .bind(combo.owner_id)
            .bind(&combo.name)
            .bind(combo.price_cents)
            .bind(combo.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        for (position, app) in combo.apps.iter().enumerate() {
            sqlx::query("INSERT INTO app_combo_items (combo_id, app_id, position) VALUES ($1, $2, $3)")
                .bind(combo.id)
                .bind(app.id)
                .bind(position as i32)
                .execute(&mut *tx)
                .await
                .map_err(map_db_err)?;
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn get_combo(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<Combo>> {
        let rows = sqlx::query_as::<_, ComboRow>(
            "SELECT id, owner_id, name, price_cents, created_at FROM app_combos WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(self.assemble(rows).await?.pop())
    }

    async fn list_combos(&self, owner_id: Uuid) -> CoreResult<Vec<Combo>> {
        let rows = sqlx::query_as::<_, ComboRow>(
            "SELECT id, owner_id, name, price_cents, created_at FROM app_combos WHERE owner_id = $1 ORDER BY name",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        self.assemble(rows).await
    }

    async fn delete_combo(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM app_combos WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match map_db_err(e) {
                CoreError::Conflict(_) => CoreError::Conflict("combo is referenced by sales".into()),
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("combo {}", id)));
        }
        Ok(())
    }
}
