use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resale_core::repository::CustomerRepository;
use resale_core::{CoreError, CoreResult, Customer};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_db_err;

pub struct StoreCustomerRepository {
    pool: PgPool,
}

impl StoreCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    email: String,
    phone: String,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CustomerRepository for StoreCustomerRepository {
    async fn create_customer(&self, customer: &Customer) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, owner_id, name, email, phone, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(customer.id)
        .bind(customer.owner_id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn get_customer(&self, owner_id: Uuid, id: Uuid) -> CoreResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, owner_id, name, email, phone, created_at FROM customers WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.map(Customer::from))
    }

    async fn list_customers(&self, owner_id: Uuid) -> CoreResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, owner_id, name, email, phone, created_at FROM customers WHERE owner_id = $1 ORDER BY name",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    async fn update_customer(&self, customer: &Customer) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE customers SET name = $3, email = $4, phone = $5 WHERE id = $1 AND owner_id = $2",
        )
        .bind(customer.id)
        .bind(customer.owner_id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("customer {}", customer.id)));
        }
        Ok(())
    }

    async fn delete_customer(&self, owner_id: Uuid, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match map_db_err(e) {
                CoreError::Conflict(_) => CoreError::Conflict("customer still has sales".into()),
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("customer {}", id)));
        }
        Ok(())
    }
}
