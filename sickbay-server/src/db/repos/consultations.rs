//! Consultation (sale) repository
//!
//! A consultation is a header row plus dispensed items and payments. Creating
//! and voiding one are single transactions: either every item is dispensed,
//! ledgered and paid for, or nothing is written.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool, Row};
use uuid::Uuid;

use super::stock::{apply_movement, ensure_staff_member, flag_if_suspicious, Movement};
use super::{DbError, SuspiciousActivity};
use crate::models::{
    AntiTheftPolicy, BillLine, BillTotals, Money, Paginated, Pagination, PaymentKind, Quantity,
    StockReason,
};

pub(crate) const CONSULTATION_COLUMNS: &str = "c.id, c.warehouse_id, c.student_id, \
    s.first_name || ' ' || s.last_name AS student_name, s.matric_number, c.user_id, \
    c.complaint, c.diagnosis, c.notes, c.total_amount, c.amount_paid, c.balance, \
    c.sync, c.synced_at, c.created_at, c.updated_at";

pub(crate) const CONSULTATION_FROM: &str =
    "FROM consultations c JOIN students s ON s.id = c.student_id";

/// Consultation header, joined with the student's name
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Consultation {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub matric_number: String,
    pub user_id: Option<Uuid>,
    pub complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance: Decimal,
    pub sync: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConsultationItem {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub dosage: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Header with its lines and payments
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationDetail {
    #[serde(flatten)]
    pub consultation: Consultation,
    pub items: Vec<ConsultationItem>,
    pub payments: Vec<Payment>,
}

/// Requested line; the unit price defaults to the product's retail price.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub unit_price: Option<Money>,
    pub dosage: Option<String>,
}

/// Clinical free-text fields
#[derive(Debug, Clone, Default)]
pub struct ClinicalNotes {
    pub complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub student_id: Uuid,
    pub user_id: Option<Uuid>,
    pub clinical: ClinicalNotes,
    pub items: Vec<NewItem>,
    pub payments: Vec<(PaymentKind, Money)>,
}

/// List filters
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsultationFilter {
    pub warehouse_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}

/// Result of creating a consultation
#[derive(Debug, Clone, Serialize)]
pub struct CreatedConsultation {
    pub consultation: ConsultationDetail,
    pub flagged: Vec<SuspiciousActivity>,
}

/// Consultation repository
pub struct ConsultationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ConsultationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a consultation, dispense its items and take payment.
    pub async fn create(
        &self,
        warehouse_id: Uuid,
        new: NewConsultation,
        policy: &AntiTheftPolicy,
    ) -> Result<CreatedConsultation, DbError> {
        let mut tx = self.pool.begin().await?;

        let student_ok: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM students s
                JOIN warehouses w ON w.id = s.warehouse_id
                WHERE s.id = $1 AND s.warehouse_id = $2
                  AND NOT s.is_deleted AND NOT w.is_deleted
            )
            "#,
        )
        .bind(new.student_id)
        .bind(warehouse_id)
        .fetch_one(&mut *tx)
        .await?;

        if !student_ok {
            return Err(DbError::not_found("student", new.student_id));
        }

        ensure_staff_member(&mut *tx, warehouse_id, new.user_id).await?;

        // Price every line before writing anything
        let mut lines = Vec::with_capacity(new.items.len());
        for item in &new.items {
            let retail: Decimal = sqlx::query_scalar(
                "SELECT retail_price FROM products WHERE id = $1 AND warehouse_id = $2 AND NOT is_deleted",
            )
            .bind(item.product_id)
            .bind(warehouse_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("product", item.product_id))?;

            let unit_price = match item.unit_price {
                Some(price) => price,
                None => Money::new("unit price", retail)?,
            };
            lines.push(BillLine {
                quantity: item.quantity,
                unit_price,
            });
        }

        let payments: Vec<Money> = new.payments.iter().map(|(_, amount)| *amount).collect();
        let totals = BillTotals::compute(&lines, &payments)?;

        let consultation_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO consultations (
                warehouse_id, student_id, user_id, complaint, diagnosis, notes,
                total_amount, amount_paid, balance
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(warehouse_id)
        .bind(new.student_id)
        .bind(new.user_id)
        .bind(&new.clinical.complaint)
        .bind(&new.clinical.diagnosis)
        .bind(&new.clinical.notes)
        .bind(totals.total_amount)
        .bind(totals.amount_paid)
        .bind(totals.balance)
        .fetch_one(&mut *tx)
        .await?;

        for (item, line) in new.items.iter().zip(&lines) {
            sqlx::query(
                r#"
                INSERT INTO consultation_items (
                    consultation_id, product_id, quantity, unit_price, line_total, dosage
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(consultation_id)
            .bind(item.product_id)
            .bind(line.quantity.get())
            .bind(line.unit_price.value())
            .bind(line.line_total())
            .bind(&item.dosage)
            .execute(&mut *tx)
            .await?;

            apply_movement(
                &mut *tx,
                &Movement {
                    warehouse_id,
                    product_id: item.product_id,
                    user_id: new.user_id,
                    consultation_id: Some(consultation_id),
                    change: -line.quantity.get(),
                    reason: StockReason::Consultation,
                    notes: None,
                },
            )
            .await?;
        }

        for (method, amount) in &new.payments {
            sqlx::query(
                "INSERT INTO payment_methods (consultation_id, method, amount) VALUES ($1, $2, $3)",
            )
            .bind(consultation_id)
            .bind(method.as_str())
            .bind(amount.value())
            .execute(&mut *tx)
            .await?;
        }

        let now = Utc::now();
        let dispensed: BTreeSet<Uuid> = new.items.iter().map(|i| i.product_id).collect();
        let mut flagged = Vec::new();
        for product_id in dispensed {
            if let Some(activity) =
                flag_if_suspicious(&mut *tx, policy, warehouse_id, product_id, new.user_id, now)
                    .await?
            {
                flagged.push(activity);
            }
        }

        let detail = load_detail(&mut *tx, consultation_id).await?;
        tx.commit().await?;

        tracing::info!(
            consultation_id = %consultation_id,
            warehouse_id = %warehouse_id,
            items = detail.items.len(),
            total = %totals.total_amount,
            balance = %totals.balance,
            "Consultation recorded"
        );

        Ok(CreatedConsultation {
            consultation: detail,
            flagged,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<ConsultationDetail, DbError> {
        let mut conn = self.pool.acquire().await?;
        load_detail(&mut conn, id).await
    }

    /// List live consultation headers, newest first.
    pub async fn list(
        &self,
        filter: ConsultationFilter,
        page: Pagination,
    ) -> Result<Paginated<Consultation>, DbError> {
        let sql = format!(
            r#"
            SELECT {CONSULTATION_COLUMNS}, COUNT(*) OVER() AS total
            {CONSULTATION_FROM}
            WHERE NOT c.is_deleted
              AND ($1::uuid IS NULL OR c.warehouse_id = $1)
              AND ($2::uuid IS NULL OR c.student_id = $2)
            ORDER BY c.created_at DESC
            LIMIT $3 OFFSET $4
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(filter.warehouse_id)
            .bind(filter.student_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows
            .iter()
            .map(Consultation::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page.wrap(items, total))
    }

    /// Update clinical fields only; billing lines are immutable.
    pub async fn update_clinical(
        &self,
        id: Uuid,
        clinical: ClinicalNotes,
    ) -> Result<ConsultationDetail, DbError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE consultations
            SET complaint = $2, diagnosis = $3, notes = $4,
                sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .bind(&clinical.complaint)
        .bind(&clinical.diagnosis)
        .bind(&clinical.notes)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("consultation", id));
        }

        let detail = load_detail(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Void a consultation: tombstone it and return every dispensed unit
    /// to stock with a `void` ledger row.
    pub async fn void(&self, id: Uuid, user_id: Option<Uuid>) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let warehouse_id: Uuid = sqlx::query_scalar(
            r#"
            UPDATE consultations
            SET is_deleted = TRUE, sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING warehouse_id
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("consultation", id))?;

        ensure_staff_member(&mut *tx, warehouse_id, user_id).await?;

        let items: Vec<(Uuid, i32)> = sqlx::query_as(
            r#"
            UPDATE consultation_items
            SET is_deleted = TRUE, sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE consultation_id = $1 AND NOT is_deleted
            RETURNING product_id, quantity
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for (product_id, quantity) in &items {
            let restored = apply_movement(
                &mut *tx,
                &Movement {
                    warehouse_id,
                    product_id: *product_id,
                    user_id,
                    consultation_id: Some(id),
                    change: *quantity,
                    reason: StockReason::Void,
                    notes: Some("consultation voided"),
                },
            )
            .await;

            match restored {
                Ok(_) => {}
                // A product deleted since the sale cannot take stock back
                Err(DbError::NotFound { .. }) => {
                    tracing::warn!(product_id = %product_id, "Skipping restock of deleted product");
                }
                Err(e) => return Err(e),
            }
        }

        sqlx::query(
            r#"
            UPDATE payment_methods
            SET is_deleted = TRUE, sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE consultation_id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(consultation_id = %id, items = items.len(), "Consultation voided");
        Ok(())
    }
}

async fn load_detail(conn: &mut PgConnection, id: Uuid) -> Result<ConsultationDetail, DbError> {
    let sql = format!(
        "SELECT {CONSULTATION_COLUMNS} {CONSULTATION_FROM} WHERE c.id = $1 AND NOT c.is_deleted"
    );
    let consultation: Consultation = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("consultation", id))?;

    let items: Vec<ConsultationItem> = sqlx::query_as(
        r#"
        SELECT i.id, i.consultation_id, i.product_id, p.name AS product_name,
               i.quantity, i.unit_price, i.line_total, i.dosage
        FROM consultation_items i
        JOIN products p ON p.id = i.product_id
        WHERE i.consultation_id = $1 AND NOT i.is_deleted
        ORDER BY i.created_at, i.id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let payments: Vec<Payment> = sqlx::query_as(
        r#"
        SELECT id, consultation_id, method, amount, created_at
        FROM payment_methods
        WHERE consultation_id = $1 AND NOT is_deleted
        ORDER BY created_at, id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ConsultationDetail {
        consultation,
        items,
        payments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::{
        PriceSet, ProductFields, ProductRepo, StockRepo, StudentFields, StudentRepo,
        WarehouseFields, WarehouseRepo,
    };
    use crate::models::ValidationError;

    struct Fixture {
        pool: PgPool,
        warehouse_id: Uuid,
        student_id: Uuid,
        product_id: Uuid,
    }

    async fn fixture(stock: i32) -> Fixture {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool");
        crate::db::migrations::run(&pool).await.expect("migrations");

        let warehouse = WarehouseRepo::new(&pool)
            .create(WarehouseFields {
                name: format!("clinic-{}", Uuid::new_v4()),
                location: None,
                phone: None,
            })
            .await
            .expect("warehouse");
        let student = StudentRepo::new(&pool)
            .create(
                warehouse.id,
                StudentFields {
                    matric_number: "MED/001".to_owned(),
                    first_name: "Tunde".to_owned(),
                    last_name: "Bello".to_owned(),
                    ..Default::default()
                },
            )
            .await
            .expect("student");
        let price = Money::new("price", Decimal::new(250, 2)).unwrap();
        let product = ProductRepo::new(&pool)
            .create(
                warehouse.id,
                ProductFields {
                    name: "Vitamin C".to_owned(),
                    barcode: None,
                    description: None,
                    reorder_level: 0,
                    expiry_date: None,
                },
                PriceSet {
                    cost_price: price,
                    retail_price: price,
                    wholesale_price: price,
                },
                stock,
                None,
            )
            .await
            .expect("product");

        Fixture {
            pool,
            warehouse_id: warehouse.id,
            student_id: student.id,
            product_id: product.id,
        }
    }

    fn sale(f: &Fixture, quantity: i64, paid_cents: Option<i64>) -> NewConsultation {
        NewConsultation {
            student_id: f.student_id,
            user_id: None,
            clinical: ClinicalNotes {
                complaint: Some("headache".to_owned()),
                ..Default::default()
            },
            items: vec![NewItem {
                product_id: f.product_id,
                quantity: Quantity::new("quantity", quantity).unwrap(),
                unit_price: None,
                dosage: Some("1 tab bd".to_owned()),
            }],
            payments: paid_cents
                .map(|c| {
                    vec![(
                        PaymentKind::Cash,
                        Money::positive("amount", Decimal::new(c, 2)).unwrap(),
                    )]
                })
                .unwrap_or_default(),
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn create_dispenses_and_bills() {
        let f = fixture(10).await;
        let repo = ConsultationRepo::new(&f.pool);

        let created = repo
            .create(f.warehouse_id, sale(&f, 4, Some(500)), &AntiTheftPolicy::default())
            .await
            .expect("create");
        let header = &created.consultation.consultation;
        assert_eq!(header.total_amount, Decimal::new(1000, 2));
        assert_eq!(header.balance, Decimal::new(500, 2));
        assert_eq!(created.consultation.items.len(), 1);

        let product = ProductRepo::new(&f.pool).get(f.product_id).await.unwrap();
        assert_eq!(product.quantity, 6);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn insufficient_stock_writes_nothing() {
        let f = fixture(2).await;
        let repo = ConsultationRepo::new(&f.pool);

        let err = repo
            .create(f.warehouse_id, sale(&f, 3, None), &AntiTheftPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { .. }));

        let listed = repo
            .list(
                ConsultationFilter {
                    warehouse_id: Some(f.warehouse_id),
                    student_id: None,
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(listed.total, 0);
        let product = ProductRepo::new(&f.pool).get(f.product_id).await.unwrap();
        assert_eq!(product.quantity, 2);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn void_restores_stock() {
        let f = fixture(10).await;
        let repo = ConsultationRepo::new(&f.pool);

        let created = repo
            .create(f.warehouse_id, sale(&f, 7, None), &AntiTheftPolicy::default())
            .await
            .expect("create");
        let id = created.consultation.consultation.id;

        repo.void(id, None).await.expect("void");
        assert!(matches!(repo.get(id).await, Err(DbError::NotFound { .. })));

        let product = ProductRepo::new(&f.pool).get(f.product_id).await.unwrap();
        assert_eq!(product.quantity, 10);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn consultation_dispensing_raises_flag() {
        let f = fixture(20).await;
        let policy = AntiTheftPolicy {
            threshold: 5,
            window_hours: 1,
        };

        let (_, flagged) = StockRepo::new(&f.pool)
            .dispense(
                f.warehouse_id,
                f.product_id,
                Quantity::new("quantity", 3).unwrap(),
                None,
                None,
                &policy,
            )
            .await
            .expect("counter dispense");
        assert!(flagged.is_none());

        let created = ConsultationRepo::new(&f.pool)
            .create(f.warehouse_id, sale(&f, 3, None), &policy)
            .await
            .expect("create");
        assert_eq!(created.flagged.len(), 1);
        let flag = &created.flagged[0];
        assert_eq!(flag.product_id, f.product_id);
        assert_eq!(flag.total_dispensed, 6);
        assert_eq!(flag.threshold, 5);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn total_beyond_money_column_is_rejected() {
        let f = fixture(5).await;
        let mut new = sale(&f, 2, None);
        new.items[0].unit_price = Some(Money::new("unit price", Money::max()).unwrap());

        let err = ConsultationRepo::new(&f.pool)
            .create(f.warehouse_id, new, &AntiTheftPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::OutOfRange { field: "total amount", .. })
        ));

        let product = ProductRepo::new(&f.pool).get(f.product_id).await.unwrap();
        assert_eq!(product.quantity, 5);
    }
}
