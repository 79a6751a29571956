//! Database service for invoice-service.
//!
//! All SQL lives here, including the invoice creation transaction: the
//! header and its line items are written inside one `sqlx::Transaction`,
//! which rolls back on drop unless explicitly committed. Every error
//! exit path therefore leaves the store unchanged.

use crate::config::DatabaseConfig;
use crate::models::{
    generate_invoice_number, CreateInvoice, Customer, CustomerInput, Invoice, InvoiceItem,
    InvoiceStatus, Item, ItemInput, ListInvoicesFilter, UpdateInvoice,
};
use crate::services::metrics::{DB_QUERY_DURATION, INVOICES_TOTAL};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, customer_id, issue_date, due_date, \
     total_amount, status, created_at, updated_at";

/// Database connection pool wrapper, passed explicitly through
/// application state rather than held as process-global.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    transaction_timeout: Duration,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(config), fields(service = "invoice-service"))]
    pub async fn new(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self {
            pool,
            transaction_timeout: Duration::from_secs(config.transaction_timeout_secs),
        })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Customer Operations
    // -------------------------------------------------------------------------

    /// Create a new customer.
    #[instrument(skip(self, input))]
    pub async fn create_customer(&self, input: &CustomerInput) -> Result<Customer, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let customer_id = Uuid::new_v4();
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (customer_id, name, email, address)
            VALUES ($1, $2, $3, $4)
            RETURNING customer_id, name, email, address, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create customer: {}", e)))?;

        timer.observe_duration();

        info!(customer_id = %customer.customer_id, "Customer created");

        Ok(customer)
    }

    /// Get a customer by ID.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, name, email, address, created_at, updated_at
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get customer: {}", e)))?;

        timer.observe_duration();

        Ok(customer)
    }

    /// List customers, paginated.
    #[instrument(skip(self))]
    pub async fn list_customers(&self, page: i64, limit: i64) -> Result<Vec<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT customer_id, name, email, address, created_at, updated_at
            FROM customers
            ORDER BY created_at, customer_id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(page.saturating_sub(1).saturating_mul(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list customers: {}", e)))?;

        timer.observe_duration();

        Ok(customers)
    }

    /// Replace a customer's mutable fields.
    #[instrument(skip(self, input), fields(customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        input: &CustomerInput,
    ) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET name = $2, email = $3, address = $4, updated_at = NOW()
            WHERE customer_id = $1
            RETURNING customer_id, name, email, address, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update customer: {}", e)))?;

        timer.observe_duration();

        Ok(customer)
    }

    /// Delete a customer. Customers still referenced by invoices are
    /// protected by the foreign key and surface as a conflict.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn delete_customer(&self, customer_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_customer"])
            .start_timer();

        let result = sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Customer has invoices and cannot be deleted"
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete customer: {}", e)),
            })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Item Operations
    // -------------------------------------------------------------------------

    /// Create a new catalog item.
    #[instrument(skip(self, input))]
    pub async fn create_item(&self, input: &ItemInput) -> Result<Item, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_item"])
            .start_timer();

        let item_id = Uuid::new_v4();
        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (item_id, name, price)
            VALUES ($1, $2, $3)
            RETURNING item_id, name, price, created_at, updated_at
            "#,
        )
        .bind(item_id)
        .bind(&input.name)
        .bind(input.price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create item: {}", e)))?;

        timer.observe_duration();

        info!(item_id = %item.item_id, "Item created");

        Ok(item)
    }

    /// Get an item by ID.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn get_item(&self, item_id: Uuid) -> Result<Option<Item>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_item"])
            .start_timer();

        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT item_id, name, price, created_at, updated_at
            FROM items
            WHERE item_id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get item: {}", e)))?;

        timer.observe_duration();

        Ok(item)
    }

    /// List catalog items, paginated.
    #[instrument(skip(self))]
    pub async fn list_items(&self, page: i64, limit: i64) -> Result<Vec<Item>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_items"])
            .start_timer();

        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT item_id, name, price, created_at, updated_at
            FROM items
            ORDER BY created_at, item_id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(page.saturating_sub(1).saturating_mul(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// Replace an item's mutable fields. Existing invoice lines keep
    /// their snapshot price.
    #[instrument(skip(self, input), fields(item_id = %item_id))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: &ItemInput,
    ) -> Result<Option<Item>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_item"])
            .start_timer();

        let item = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET name = $2, price = $3, updated_at = NOW()
            WHERE item_id = $1
            RETURNING item_id, name, price, created_at, updated_at
            "#,
        )
        .bind(item_id)
        .bind(&input.name)
        .bind(input.price)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update item: {}", e)))?;

        timer.observe_duration();

        Ok(item)
    }

    /// Delete an item. Items referenced by invoice lines are protected
    /// by the foreign key so historical snapshots stay resolvable.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn delete_item(&self, item_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_item"])
            .start_timer();

        let result = sqlx::query("DELETE FROM items WHERE item_id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Item is referenced by invoices and cannot be deleted"
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete item: {}", e)),
            })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice header plus its line items as one atomic unit.
    ///
    /// The total is computed from current catalog prices; each line
    /// records the price resolved at this moment as an immutable
    /// snapshot. On any failure (unknown customer, unknown item, store
    /// error, timeout) the transaction rolls back and no rows persist.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let invoice_id =
            match tokio::time::timeout(self.transaction_timeout, self.run_invoice_creation(input))
                .await
            {
                Ok(result) => result?,
                // The cancelled future drops the open transaction, which
                // rolls it back when the connection returns to the pool.
                Err(_) => {
                    return Err(AppError::DatabaseError(anyhow::anyhow!(
                        "Invoice creation timed out after {:?}",
                        self.transaction_timeout
                    )));
                }
            };

        // Re-read the committed header so the caller sees exactly what
        // any other reader would.
        let invoice = self.get_invoice(invoice_id).await?.ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!("Committed invoice disappeared"))
        })?;

        timer.observe_duration();

        INVOICES_TOTAL
            .with_label_values(&[InvoiceStatus::Unpaid.as_str()])
            .inc();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            line_count = input.items.len(),
            "Invoice created"
        );

        Ok(invoice)
    }

    /// The transactional body of invoice creation. Returns the new
    /// invoice id after commit; any `?` before the commit drops the
    /// transaction and rolls back.
    async fn run_invoice_creation(&self, input: &CreateInvoice) -> Result<Uuid, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let customer: Option<Uuid> =
            sqlx::query_scalar("SELECT customer_id FROM customers WHERE customer_id = $1")
                .bind(input.customer_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to look up customer: {}", e))
                })?;
        if customer.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Customer {} not found",
                input.customer_id
            )));
        }

        let invoice_id = Uuid::new_v4();
        let invoice_number = generate_invoice_number();

        // Header goes in first with a placeholder total so the line
        // items have a parent row to reference.
        sqlx::query(
            r#"
            INSERT INTO invoices (invoice_id, invoice_number, customer_id, issue_date, due_date, total_amount, status)
            VALUES ($1, $2, $3, $4, $5, 0, 'unpaid')
            "#,
        )
        .bind(invoice_id)
        .bind(&invoice_number)
        .bind(input.customer_id)
        .bind(input.issue_date)
        .bind(input.due_date)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number {} already exists",
                    invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice: {}", e)),
        })?;

        let mut total_amount = Decimal::ZERO;

        for line in &input.items {
            let price: Option<Decimal> =
                sqlx::query_scalar("SELECT price FROM items WHERE item_id = $1")
                    .bind(line.item_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to look up item price: {}",
                            e
                        ))
                    })?;

            let price = price.ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Item {} not found", line.item_id))
            })?;

            sqlx::query(
                r#"
                INSERT INTO invoice_items (invoice_item_id, invoice_id, item_id, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(price)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;

            total_amount += price * Decimal::from(line.quantity);
        }

        sqlx::query("UPDATE invoices SET total_amount = $2 WHERE invoice_id = $1")
            .bind(invoice_id)
            .bind(total_amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice total: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        Ok(invoice_id)
    }

    /// Get an invoice header by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get the line items of an invoice, in insertion order.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT invoice_item_id, invoice_id, item_id, quantity, price, created_at
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY created_at, invoice_item_id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// List invoices with AND-composed filters, paginated.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::date IS NULL OR issue_date >= $2)
              AND ($3::date IS NULL OR issue_date <= $3)
            ORDER BY created_at, invoice_id
            LIMIT $4 OFFSET $5
            "#,
            INVOICE_COLUMNS
        ))
        .bind(&status_str)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.limit)
        .bind(filter.page.saturating_sub(1).saturating_mul(filter.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Partially update an invoice's mutable fields. Omitted fields
    /// keep their prior values; `updated_at` is always refreshed. Line
    /// items and the total are never touched here.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET issue_date = COALESCE($2, issue_date),
                due_date = COALESCE($3, due_date),
                status = COALESCE($4, status),
                updated_at = NOW()
            WHERE invoice_id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(invoice_id = %inv.invoice_id, "Invoice updated");
        }

        Ok(invoice)
    }

    /// Mark an invoice as paid. Idempotent: marking an already-paid
    /// invoice is a no-op that succeeds with the current row.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn mark_invoice_paid(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_invoice_paid"])
            .start_timer();

        // Only rows actually transitioning match, so the counter below
        // tracks transitions rather than pay calls.
        let transitioned = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'paid', updated_at = NOW()
            WHERE invoice_id = $1 AND status <> 'paid'
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark invoice paid: {}", e))
        })?;

        timer.observe_duration();

        if let Some(inv) = transitioned {
            INVOICES_TOTAL
                .with_label_values(&[InvoiceStatus::Paid.as_str()])
                .inc();
            info!(invoice_id = %inv.invoice_id, "Invoice marked paid");
            return Ok(Some(inv));
        }

        // Already paid, or missing entirely; the caller distinguishes
        // the two from the returned row.
        self.get_invoice(invoice_id).await
    }

    /// Delete an invoice and its line items as one atomic unit: child
    /// rows first, then the header, in a single transaction.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete line items: {}", e))
            })?;

        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the line-item delete.
            return Ok(false);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice delete: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, "Invoice deleted");

        Ok(true)
    }
}
