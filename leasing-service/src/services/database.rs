//! PostgreSQL record store for leasing-service.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::metrics::DB_QUERY_DURATION;
use super::store::{LeaseStore, UnitOfWork};
use crate::models::{
    page_limit, Apartment, ApartmentStatus, Contract, Invoice, ListApartmentsFilter,
    ListContractsFilter, ListInvoicesFilter, ListMaintenanceFilter, ListPaymentsFilter,
    Maintenance, Page, Payment,
};

const APARTMENT_COLUMNS: &str = "apartment_id, number, location, level, rooms, amenities, status, created_utc, updated_utc";

const CONTRACT_COLUMNS: &str = "contract_id, apartment_id, tenant_name, tenant_phone, tenant_id_image_path, contract_file_path, duration_years, payment_frequency, start_date, end_date, total_amount, is_active, created_utc, updated_utc";

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, contract_id, apartment_id, tenant_name, tenant_phone, amount, paid_amount, due_date, status, description, period_index, maintenance_related, maintenance_id, created_utc, updated_utc";

const PAYMENT_COLUMNS: &str = "payment_id, invoice_id, amount, payment_date, method, receipt_number, description, created_utc, updated_utc";

const MAINTENANCE_COLUMNS: &str = "maintenance_id, apartment_id, description, cost, maintenance_date, completion_date, provider_name, provider_contact, provider_company, status, bill_to_tenant, invoice_id, invoice_file_path, created_utc, updated_utc";

/// Map a driver error, keeping the cases callers can act on distinguishable.
fn db_error(context: &str, e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return AppError::Conflict(anyhow::anyhow!("{}: {}", context, db_err.message()));
        }
        // serialization_failure, deadlock_detected
        if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01")) {
            return AppError::TransactionAborted(anyhow::anyhow!(
                "{}: {}",
                context,
                db_err.message()
            ));
        }
    }
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

fn ensure_affected(rows: u64, entity: &str, id: Uuid) -> Result<(), AppError> {
    if rows == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "{} {} does not exist",
            entity,
            id
        )));
    }
    Ok(())
}

/// Connection pool wrapper.
#[derive(Clone)]
pub struct PgLeaseStore {
    pool: PgPool,
}

impl PgLeaseStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "leasing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
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

    async fn open(&self, for_update: bool) -> Result<Box<dyn UnitOfWork>, AppError> {
        let tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;
        Ok(Box::new(PgUnitOfWork { tx, for_update }))
    }
}

#[async_trait]
impl LeaseStore for PgLeaseStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        self.open(true).await
    }

    async fn snapshot(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        self.open(false).await
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }
}

/// One database transaction. Read-write units lock every row they read with
/// `FOR UPDATE`, which serializes concurrent payments against one invoice.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    for_update: bool,
}

impl PgUnitOfWork {
    fn lock_clause(&self) -> &'static str {
        if self.for_update {
            " FOR UPDATE"
        } else {
            ""
        }
    }

    fn writable(&self) -> Result<(), AppError> {
        if self.for_update {
            Ok(())
        } else {
            Err(AppError::InternalError(anyhow::anyhow!(
                "Write attempted through a read-only unit of work"
            )))
        }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    // -------------------------------------------------------------------------
    // Apartments
    // -------------------------------------------------------------------------

    #[instrument(skip(self, apartment), fields(apartment_id = %apartment.apartment_id))]
    async fn insert_apartment(&mut self, apartment: &Apartment) -> Result<(), AppError> {
        self.writable()?;
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_apartment"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO apartments (apartment_id, number, location, level, rooms, amenities, status, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(apartment.apartment_id)
        .bind(&apartment.number)
        .bind(&apartment.location)
        .bind(apartment.level)
        .bind(apartment.rooms)
        .bind(&apartment.amenities)
        .bind(&apartment.status)
        .bind(apartment.created_utc)
        .bind(apartment.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to create apartment", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_apartment(&mut self, apartment_id: Uuid) -> Result<Option<Apartment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_apartment"])
            .start_timer();

        let sql = format!(
            "SELECT {} FROM apartments WHERE apartment_id = $1{}",
            APARTMENT_COLUMNS,
            self.lock_clause()
        );
        let apartment = sqlx::query_as::<_, Apartment>(&sql)
            .bind(apartment_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to get apartment", e))?;

        timer.observe_duration();
        Ok(apartment)
    }

    #[instrument(skip(self))]
    async fn set_apartment_status(
        &mut self,
        apartment_id: Uuid,
        status: ApartmentStatus,
    ) -> Result<(), AppError> {
        self.writable()?;
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_apartment_status"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE apartments SET status = $2, updated_utc = NOW() WHERE apartment_id = $1",
        )
        .bind(apartment_id)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update apartment status", e))?;

        timer.observe_duration();
        ensure_affected(result.rows_affected(), "Apartment", apartment_id)
    }

    #[instrument(skip(self, filter))]
    async fn list_apartments(
        &mut self,
        filter: &ListApartmentsFilter,
    ) -> Result<Page<Apartment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_apartments"])
            .start_timer();
        let limit = page_limit(filter.page_size);

        let sql = format!(
            r#"
            SELECT {} FROM apartments
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR apartment_id > (SELECT apartment_id FROM apartments WHERE apartment_id = $2))
            ORDER BY apartment_id
            LIMIT $3
            "#,
            APARTMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Apartment>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.page_token)
            .bind(limit as i64 + 1)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to list apartments", e))?;

        timer.observe_duration();
        Ok(Page::from_overfetch(rows, limit))
    }

    #[instrument(skip(self, apartment), fields(apartment_id = %apartment.apartment_id))]
    async fn update_apartment(&mut self, apartment: &Apartment) -> Result<(), AppError> {
        self.writable()?;
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_apartment"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE apartments SET
                number = $2, location = $3, level = $4, rooms = $5, amenities = $6,
                status = $7, updated_utc = $8
            WHERE apartment_id = $1
            "#,
        )
        .bind(apartment.apartment_id)
        .bind(&apartment.number)
        .bind(&apartment.location)
        .bind(apartment.level)
        .bind(apartment.rooms)
        .bind(&apartment.amenities)
        .bind(&apartment.status)
        .bind(apartment.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update apartment", e))?;

        timer.observe_duration();
        ensure_affected(result.rows_affected(), "Apartment", apartment.apartment_id)
    }

    #[instrument(skip(self))]
    async fn delete_apartment(&mut self, apartment_id: Uuid) -> Result<(), AppError> {
        self.writable()?;
        let result = sqlx::query("DELETE FROM apartments WHERE apartment_id = $1")
            .bind(apartment_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to delete apartment", e))?;
        ensure_affected(result.rows_affected(), "Apartment", apartment_id)
    }

    #[instrument(skip(self))]
    async fn apartment_has_records(&mut self, apartment_id: Uuid) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM contracts WHERE apartment_id = $1)
                OR EXISTS (SELECT 1 FROM maintenance WHERE apartment_id = $1)
            "#,
        )
        .bind(apartment_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to check apartment references", e))
    }

    // -------------------------------------------------------------------------
    // Contracts
    // -------------------------------------------------------------------------

    #[instrument(skip(self, contract), fields(contract_id = %contract.contract_id))]
    async fn insert_contract(&mut self, contract: &Contract) -> Result<(), AppError> {
        self.writable()?;
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_contract"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO contracts (
                contract_id, apartment_id, tenant_name, tenant_phone, tenant_id_image_path,
                contract_file_path, duration_years, payment_frequency, start_date, end_date,
                total_amount, is_active, created_utc, updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(contract.contract_id)
        .bind(contract.apartment_id)
        .bind(&contract.tenant_name)
        .bind(&contract.tenant_phone)
        .bind(&contract.tenant_id_image_path)
        .bind(&contract.contract_file_path)
        .bind(contract.duration_years)
        .bind(&contract.payment_frequency)
        .bind(contract.start_date)
        .bind(contract.end_date)
        .bind(contract.total_amount)
        .bind(contract.is_active)
        .bind(contract.created_utc)
        .bind(contract.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to create contract", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_contract(&mut self, contract_id: Uuid) -> Result<Option<Contract>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_contract"])
            .start_timer();

        let sql = format!(
            "SELECT {} FROM contracts WHERE contract_id = $1{}",
            CONTRACT_COLUMNS,
            self.lock_clause()
        );
        let contract = sqlx::query_as::<_, Contract>(&sql)
            .bind(contract_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to get contract", e))?;

        timer.observe_duration();
        Ok(contract)
    }

    #[instrument(skip(self, contract), fields(contract_id = %contract.contract_id))]
    async fn update_contract(&mut self, contract: &Contract) -> Result<(), AppError> {
        self.writable()?;
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_contract"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE contracts SET
                apartment_id = $2, tenant_name = $3, tenant_phone = $4, tenant_id_image_path = $5,
                contract_file_path = $6, duration_years = $7, payment_frequency = $8,
                start_date = $9, end_date = $10, total_amount = $11, is_active = $12,
                updated_utc = $13
            WHERE contract_id = $1
            "#,
        )
        .bind(contract.contract_id)
        .bind(contract.apartment_id)
        .bind(&contract.tenant_name)
        .bind(&contract.tenant_phone)
        .bind(&contract.tenant_id_image_path)
        .bind(&contract.contract_file_path)
        .bind(contract.duration_years)
        .bind(&contract.payment_frequency)
        .bind(contract.start_date)
        .bind(contract.end_date)
        .bind(contract.total_amount)
        .bind(contract.is_active)
        .bind(contract.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update contract", e))?;

        timer.observe_duration();
        ensure_affected(result.rows_affected(), "Contract", contract.contract_id)
    }

    #[instrument(skip(self))]
    async fn delete_contract(&mut self, contract_id: Uuid) -> Result<(), AppError> {
        self.writable()?;
        let result = sqlx::query("DELETE FROM contracts WHERE contract_id = $1")
            .bind(contract_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to delete contract", e))?;
        ensure_affected(result.rows_affected(), "Contract", contract_id)
    }

    #[instrument(skip(self))]
    async fn active_contracts_for_apartment(
        &mut self,
        apartment_id: Uuid,
    ) -> Result<Vec<Contract>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM contracts
            WHERE apartment_id = $1 AND is_active = TRUE
            ORDER BY start_date DESC, contract_id DESC{}
            "#,
            CONTRACT_COLUMNS,
            self.lock_clause()
        );
        sqlx::query_as::<_, Contract>(&sql)
            .bind(apartment_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to find active contracts", e))
    }

    #[instrument(skip(self, filter))]
    async fn list_contracts(
        &mut self,
        filter: &ListContractsFilter,
    ) -> Result<Page<Contract>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_contracts"])
            .start_timer();
        let limit = page_limit(filter.page_size);

        let sql = format!(
            r#"
            SELECT {} FROM contracts
            WHERE ($1::uuid IS NULL OR apartment_id = $1)
              AND ($2::bool IS NULL OR is_active = $2)
              AND ($3::uuid IS NULL OR contract_id > (SELECT contract_id FROM contracts WHERE contract_id = $3))
            ORDER BY contract_id
            LIMIT $4
            "#,
            CONTRACT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Contract>(&sql)
            .bind(filter.apartment_id)
            .bind(filter.is_active)
            .bind(filter.page_token)
            .bind(limit as i64 + 1)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to list contracts", e))?;

        timer.observe_duration();
        Ok(Page::from_overfetch(rows, limit))
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id))]
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError> {
        self.writable()?;
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, contract_id, apartment_id, tenant_name, tenant_phone,
                amount, paid_amount, due_date, status, description, period_index,
                maintenance_related, maintenance_id, created_utc, updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.contract_id)
        .bind(invoice.apartment_id)
        .bind(&invoice.tenant_name)
        .bind(&invoice.tenant_phone)
        .bind(invoice.amount)
        .bind(invoice.paid_amount)
        .bind(invoice.due_date)
        .bind(&invoice.status)
        .bind(&invoice.description)
        .bind(invoice.period_index)
        .bind(invoice.maintenance_related)
        .bind(invoice.maintenance_id)
        .bind(invoice.created_utc)
        .bind(invoice.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to create invoice", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_invoice(&mut self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let sql = format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1{}",
            INVOICE_COLUMNS,
            self.lock_clause()
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to get invoice", e))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn invoices_for_contract(
        &mut self,
        contract_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoices_for_contract"])
            .start_timer();

        let sql = format!(
            "SELECT {} FROM invoices WHERE contract_id = $1 ORDER BY due_date, invoice_id{}",
            INVOICE_COLUMNS,
            self.lock_clause()
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(contract_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to get contract invoices", e))?;

        timer.observe_duration();
        Ok(invoices)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id))]
    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError> {
        self.writable()?;
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                amount = $2, paid_amount = $3, due_date = $4, status = $5, description = $6,
                maintenance_id = $7, updated_utc = $8
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(invoice.amount)
        .bind(invoice.paid_amount)
        .bind(invoice.due_date)
        .bind(&invoice.status)
        .bind(&invoice.description)
        .bind(invoice.maintenance_id)
        .bind(invoice.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update invoice", e))?;

        timer.observe_duration();
        ensure_affected(result.rows_affected(), "Invoice", invoice.invoice_id)
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<(), AppError> {
        self.writable()?;
        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to delete invoice", e))?;
        ensure_affected(result.rows_affected(), "Invoice", invoice_id)
    }

    #[instrument(skip(self, filter))]
    async fn list_invoices(
        &mut self,
        filter: &ListInvoicesFilter,
    ) -> Result<Page<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();
        let limit = page_limit(filter.page_size);

        let sql = format!(
            r#"
            SELECT {} FROM invoices
            WHERE ($1::uuid IS NULL OR contract_id = $1)
              AND ($2::uuid IS NULL OR apartment_id = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::uuid IS NULL OR (due_date, invoice_id) >
                  (SELECT due_date, invoice_id FROM invoices WHERE invoice_id = $4))
            ORDER BY due_date, invoice_id
            LIMIT $5
            "#,
            INVOICE_COLUMNS
        );
        let rows = sqlx::query_as::<_, Invoice>(&sql)
            .bind(filter.contract_id)
            .bind(filter.apartment_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.page_token)
            .bind(limit as i64 + 1)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to list invoices", e))?;

        timer.observe_duration();
        Ok(Page::from_overfetch(rows, limit))
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    #[instrument(skip(self, payment), fields(payment_id = %payment.payment_id, invoice_id = %payment.invoice_id))]
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        self.writable()?;
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_payment"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO payments (
                payment_id, invoice_id, amount, payment_date, method, receipt_number,
                description, created_utc, updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.payment_id)
        .bind(payment.invoice_id)
        .bind(payment.amount)
        .bind(payment.payment_date)
        .bind(&payment.method)
        .bind(&payment.receipt_number)
        .bind(&payment.description)
        .bind(payment.created_utc)
        .bind(payment.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to record payment", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE payment_id = $1{}",
            PAYMENT_COLUMNS,
            self.lock_clause()
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to get payment", e))
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.payment_id))]
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), AppError> {
        self.writable()?;
        let result = sqlx::query(
            r#"
            UPDATE payments SET method = $2, payment_date = $3, description = $4, updated_utc = $5
            WHERE payment_id = $1
            "#,
        )
        .bind(payment.payment_id)
        .bind(&payment.method)
        .bind(payment.payment_date)
        .bind(&payment.description)
        .bind(payment.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update payment", e))?;
        ensure_affected(result.rows_affected(), "Payment", payment.payment_id)
    }

    #[instrument(skip(self))]
    async fn delete_payment(&mut self, payment_id: Uuid) -> Result<(), AppError> {
        self.writable()?;
        let result = sqlx::query("DELETE FROM payments WHERE payment_id = $1")
            .bind(payment_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to delete payment", e))?;
        ensure_affected(result.rows_affected(), "Payment", payment_id)
    }

    #[instrument(skip(self, filter))]
    async fn list_payments(
        &mut self,
        filter: &ListPaymentsFilter,
    ) -> Result<Page<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();
        let limit = page_limit(filter.page_size);

        let sql = format!(
            r#"
            SELECT {} FROM payments
            WHERE ($1::uuid IS NULL OR invoice_id = $1)
              AND ($2::uuid IS NULL OR (payment_date, created_utc, payment_id) <
                  (SELECT payment_date, created_utc, payment_id FROM payments WHERE payment_id = $2))
            ORDER BY payment_date DESC, created_utc DESC, payment_id DESC
            LIMIT $3
            "#,
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Payment>(&sql)
            .bind(filter.invoice_id)
            .bind(filter.page_token)
            .bind(limit as i64 + 1)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to list payments", e))?;

        timer.observe_duration();
        Ok(Page::from_overfetch(rows, limit))
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    #[instrument(skip(self, maintenance), fields(maintenance_id = %maintenance.maintenance_id))]
    async fn insert_maintenance(&mut self, maintenance: &Maintenance) -> Result<(), AppError> {
        self.writable()?;
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_maintenance"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO maintenance (
                maintenance_id, apartment_id, description, cost, maintenance_date, completion_date,
                provider_name, provider_contact, provider_company, status, bill_to_tenant,
                invoice_id, invoice_file_path, created_utc, updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(maintenance.maintenance_id)
        .bind(maintenance.apartment_id)
        .bind(&maintenance.description)
        .bind(maintenance.cost)
        .bind(maintenance.maintenance_date)
        .bind(maintenance.completion_date)
        .bind(&maintenance.provider_name)
        .bind(&maintenance.provider_contact)
        .bind(&maintenance.provider_company)
        .bind(&maintenance.status)
        .bind(maintenance.bill_to_tenant)
        .bind(maintenance.invoice_id)
        .bind(&maintenance.invoice_file_path)
        .bind(maintenance.created_utc)
        .bind(maintenance.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to create maintenance", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_maintenance(
        &mut self,
        maintenance_id: Uuid,
    ) -> Result<Option<Maintenance>, AppError> {
        let sql = format!(
            "SELECT {} FROM maintenance WHERE maintenance_id = $1{}",
            MAINTENANCE_COLUMNS,
            self.lock_clause()
        );
        sqlx::query_as::<_, Maintenance>(&sql)
            .bind(maintenance_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to get maintenance", e))
    }

    #[instrument(skip(self))]
    async fn maintenance_for_invoice(
        &mut self,
        invoice_id: Uuid,
    ) -> Result<Option<Maintenance>, AppError> {
        let sql = format!(
            "SELECT {} FROM maintenance WHERE invoice_id = $1 LIMIT 1{}",
            MAINTENANCE_COLUMNS,
            self.lock_clause()
        );
        sqlx::query_as::<_, Maintenance>(&sql)
            .bind(invoice_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to find maintenance for invoice", e))
    }

    #[instrument(skip(self, maintenance), fields(maintenance_id = %maintenance.maintenance_id))]
    async fn update_maintenance(&mut self, maintenance: &Maintenance) -> Result<(), AppError> {
        self.writable()?;
        let result = sqlx::query(
            r#"
            UPDATE maintenance SET
                description = $2, cost = $3, maintenance_date = $4, completion_date = $5,
                provider_name = $6, provider_contact = $7, provider_company = $8, status = $9,
                bill_to_tenant = $10, invoice_id = $11, invoice_file_path = $12, updated_utc = $13
            WHERE maintenance_id = $1
            "#,
        )
        .bind(maintenance.maintenance_id)
        .bind(&maintenance.description)
        .bind(maintenance.cost)
        .bind(maintenance.maintenance_date)
        .bind(maintenance.completion_date)
        .bind(&maintenance.provider_name)
        .bind(&maintenance.provider_contact)
        .bind(&maintenance.provider_company)
        .bind(&maintenance.status)
        .bind(maintenance.bill_to_tenant)
        .bind(maintenance.invoice_id)
        .bind(&maintenance.invoice_file_path)
        .bind(maintenance.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("Failed to update maintenance", e))?;
        ensure_affected(
            result.rows_affected(),
            "Maintenance",
            maintenance.maintenance_id,
        )
    }

    #[instrument(skip(self))]
    async fn delete_maintenance(&mut self, maintenance_id: Uuid) -> Result<(), AppError> {
        self.writable()?;
        let result = sqlx::query("DELETE FROM maintenance WHERE maintenance_id = $1")
            .bind(maintenance_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to delete maintenance", e))?;
        ensure_affected(result.rows_affected(), "Maintenance", maintenance_id)
    }

    #[instrument(skip(self, filter))]
    async fn list_maintenance(
        &mut self,
        filter: &ListMaintenanceFilter,
    ) -> Result<Page<Maintenance>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_maintenance"])
            .start_timer();
        let limit = page_limit(filter.page_size);

        let sql = format!(
            r#"
            SELECT {} FROM maintenance
            WHERE ($1::uuid IS NULL OR apartment_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR (maintenance_date, maintenance_id) <
                  (SELECT maintenance_date, maintenance_id FROM maintenance WHERE maintenance_id = $3))
            ORDER BY maintenance_date DESC, maintenance_id DESC
            LIMIT $4
            "#,
            MAINTENANCE_COLUMNS
        );
        let rows = sqlx::query_as::<_, Maintenance>(&sql)
            .bind(filter.apartment_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.page_token)
            .bind(limit as i64 + 1)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("Failed to list maintenance", e))?;

        timer.observe_duration();
        Ok(Page::from_overfetch(rows, limit))
    }

    #[instrument(skip(self))]
    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.writable()?;
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))
    }
}
