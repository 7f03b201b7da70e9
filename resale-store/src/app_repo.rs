use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resale_catalog::{App, Code};
use resale_core::repository::AppRepository;
use resale_core::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_db_err;

pub struct StoreAppRepository {
    pool: PgPool,
}

impl StoreAppRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AppRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    price_cents: i64,
    codes_available: i64,
    created_at: DateTime<Utc>,
}

impl From<AppRow> for App {
    fn from(row: AppRow) -> Self {
        App {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            price_cents: row.price_cents,
            codes_available: row.codes_available,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CodeRow {
    id: Uuid,
    app_id: Uuid,
    code: String,
    used: bool,
    created_at: DateTime<Utc>,
}

impl From<CodeRow> for Code {
    fn from(row: CodeRow) -> Self {
        Code {
            id: row.id,
            app_id: row.app_id,
            code: row.code,
            used: row.used,
            created_at: row.created_at,
        }
    }
}

const APP_SELECT: &str = r#"
    SELECT a.id, a.owner_id, a.name, a.price_cents, a.created_at,
           (SELECT COUNT(*) FROM codes c WHERE c.app_id = a.id AND NOT c.used) AS codes_available
    FROM apps a
"#;

#[async_trait]
impl AppRepository for StoreAppRepository {
    async fn create_app(&self, app: &App) -> CoreResult<()> {
        sqlx::query("INSERT INTO apps (id, owner_id, name, price_cents, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(app.id)
            .bind(app.owner_id)
            .bind(&app.name)
            .bind(app.price_cents)
            .bind(app.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn get_app(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<App>> {
        let row = sqlx::query_as::<_, AppRow>(&format!("{} WHERE a.id = $1 AND a.owner_id = $2", APP_SELECT))
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(row.map(App::from))
    }

    async fn list_apps(&self, owner_id: Uuid) -> CoreResult<Vec<App>> {
        let rows = sqlx::query_as::<_, AppRow>(&format!("{} WHERE a.owner_id = $1 ORDER BY a.name", APP_SELECT))
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(App::from).collect())
    }

    async fn update_app(&self, app: &App) -> CoreResult<()> {
        let result = sqlx::query("UPDATE apps SET name = $3, price_cents = $4 WHERE id = $1 AND owner_id = $2")
            .bind(app.id)
            .bind(app.owner_id)
            .bind(&app.name)
            .bind(app.price_cents)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("app {}", app.id)));
        }
        Ok(())
    }

    async fn delete_app(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        // Codes cascade; combo and sale references block the delete
        let result = sqlx::query("DELETE FROM apps WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match map_db_err(e) {
                CoreError::Conflict(_) => CoreError::Conflict("app is referenced by a combo or sale".into()),
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("app {}", id)));
        }
        Ok(())
    }

    async fn list_code_values(&self, owner_id: Uuid) -> CoreResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT code FROM codes WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn insert_codes(&self, owner_id: Uuid, codes: &[Code]) -> CoreResult<usize> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        for code in codes {
            sqlx::query(
                r#"
                INSERT INTO codes (id, app_id, owner_id, code, used, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(code.id)
            .bind(code.app_id)
            .bind(owner_id)
            .bind(&code.code)
            .bind(code.used)
            .bind(code.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| match map_db_err(e) {
                CoreError::Conflict(_) => CoreError::Conflict(format!("code {} already exists", code.code)),
                other => other,
            })?;
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(codes.len())
    }

    async fn list_codes(&self, owner_id: Uuid, app_id: Uuid, used: Option<bool>) -> CoreResult<Vec<Code>> {
        let rows = sqlx::query_as::<_, CodeRow>(
            r#"
            SELECT id, app_id, code, used, created_at
            FROM codes
            WHERE owner_id = $1 AND app_id = $2 AND ($3::BOOLEAN IS NULL OR used = $3)
            ORDER BY seq
            "#,
        )
        .bind(owner_id)
        .bind(app_id)
        .bind(used)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Code::from).collect())
    }

    async fn delete_code(&self, owner_id: Uuid, code_id: Uuid) -> CoreResult<()> {
        let used = sqlx::query_scalar::<_, bool>("SELECT used FROM codes WHERE id = $1 AND owner_id = $2")
            .bind(code_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("code {}", code_id)))?;
        if used {
            return Err(CoreError::Conflict("code was already sold".into()));
        }

        // A confirmation may have claimed the code meanwhile
        let result = sqlx::query("DELETE FROM codes WHERE id = $1 AND owner_id = $2 AND NOT used")
            .bind(code_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict("code was already sold".into()));
        }
        Ok(())
    }
}
