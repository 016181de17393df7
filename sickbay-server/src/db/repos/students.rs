//! Student (patient) repository

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::DbError;
use crate::models::{Paginated, Pagination};

const STUDENT_COLUMNS: &str = "id, warehouse_id, matric_number, first_name, last_name, gender, \
    date_of_birth, phone, email, department, level, blood_group, genotype, allergies, \
    emergency_contact_name, emergency_contact_phone, address, sync, synced_at, created_at, updated_at";

/// Student record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub matric_number: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub level: Option<String>,
    pub blood_group: Option<String>,
    pub genotype: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub address: Option<String>,
    pub sync: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated student fields for insert/update.
///
/// Enum-valued columns hold their canonical string form.
#[derive(Debug, Clone, Default)]
pub struct StudentFields {
    pub matric_number: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub level: Option<String>,
    pub blood_group: Option<String>,
    pub genotype: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub address: Option<String>,
}

impl From<Student> for StudentFields {
    fn from(s: Student) -> Self {
        Self {
            matric_number: s.matric_number,
            first_name: s.first_name,
            last_name: s.last_name,
            gender: s.gender,
            date_of_birth: s.date_of_birth,
            phone: s.phone,
            email: s.email,
            department: s.department,
            level: s.level,
            blood_group: s.blood_group,
            genotype: s.genotype,
            allergies: s.allergies,
            emergency_contact_name: s.emergency_contact_name,
            emergency_contact_phone: s.emergency_contact_phone,
            address: s.address,
        }
    }
}

/// Student repository
pub struct StudentRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> StudentRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Register a student. The matric number is unique per warehouse
    /// among live records.
    pub async fn create(
        &self,
        warehouse_id: Uuid,
        fields: StudentFields,
    ) -> Result<Student, DbError> {
        let mut tx = self.pool.begin().await?;

        let warehouse_live: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1 AND NOT is_deleted)",
        )
        .bind(warehouse_id)
        .fetch_one(&mut *tx)
        .await?;

        if !warehouse_live {
            return Err(DbError::not_found("warehouse", warehouse_id));
        }

        let sql = format!(
            r#"
            INSERT INTO students (
                warehouse_id, matric_number, first_name, last_name, gender, date_of_birth,
                phone, email, department, level, blood_group, genotype, allergies,
                emergency_contact_name, emergency_contact_phone, address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {STUDENT_COLUMNS}
            "#
        );

        let student: Student = sqlx::query_as(&sql)
            .bind(warehouse_id)
            .bind(&fields.matric_number)
            .bind(&fields.first_name)
            .bind(&fields.last_name)
            .bind(&fields.gender)
            .bind(fields.date_of_birth)
            .bind(&fields.phone)
            .bind(&fields.email)
            .bind(&fields.department)
            .bind(&fields.level)
            .bind(&fields.blood_group)
            .bind(&fields.genotype)
            .bind(&fields.allergies)
            .bind(&fields.emergency_contact_name)
            .bind(&fields.emergency_contact_phone)
            .bind(&fields.address)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                DbError::from_write(
                    e,
                    &format!("matric number '{}' is already registered", fields.matric_number),
                    "warehouse",
                )
            })?;

        tx.commit().await?;
        Ok(student)
    }

    /// List live students. `search` matches first name, last name, their
    /// concatenation, or matric number, case-insensitively.
    pub async fn list_for_warehouse(
        &self,
        warehouse_id: Uuid,
        search: Option<&str>,
        page: Pagination,
    ) -> Result<Paginated<Student>, DbError> {
        let pattern = search.map(|s| format!("%{}%", escape_like(s.trim())));

        let sql = format!(
            r#"
            SELECT {STUDENT_COLUMNS}, COUNT(*) OVER() AS total
            FROM students
            WHERE warehouse_id = $1
              AND NOT is_deleted
              AND (
                $2::text IS NULL
                OR matric_number ILIKE $2
                OR first_name ILIKE $2
                OR last_name ILIKE $2
                OR (first_name || ' ' || last_name) ILIKE $2
              )
            ORDER BY last_name ASC, first_name ASC
            LIMIT $3 OFFSET $4
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(warehouse_id)
            .bind(pattern)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows
            .iter()
            .map(Student::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<Student, DbError> {
        let sql =
            format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1 AND NOT is_deleted");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("student", id))
    }

    pub async fn update(&self, id: Uuid, fields: StudentFields) -> Result<Student, DbError> {
        let sql = format!(
            r#"
            UPDATE students
            SET matric_number = $2, first_name = $3, last_name = $4, gender = $5,
                date_of_birth = $6, phone = $7, email = $8, department = $9, level = $10,
                blood_group = $11, genotype = $12, allergies = $13,
                emergency_contact_name = $14, emergency_contact_phone = $15, address = $16,
                sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING {STUDENT_COLUMNS}
            "#
        );

        sqlx::query_as(&sql)
            .bind(id)
            .bind(&fields.matric_number)
            .bind(&fields.first_name)
            .bind(&fields.last_name)
            .bind(&fields.gender)
            .bind(fields.date_of_birth)
            .bind(&fields.phone)
            .bind(&fields.email)
            .bind(&fields.department)
            .bind(&fields.level)
            .bind(&fields.blood_group)
            .bind(&fields.genotype)
            .bind(&fields.allergies)
            .bind(&fields.emergency_contact_name)
            .bind(&fields.emergency_contact_phone)
            .bind(&fields.address)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| {
                DbError::from_write(
                    e,
                    &format!("matric number '{}' is already registered", fields.matric_number),
                    "warehouse",
                )
            })?
            .ok_or_else(|| DbError::not_found("student", id))
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE students
            SET is_deleted = TRUE, sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("student", id));
        }
        Ok(())
    }
}

/// Escape `%`, `_` and `\` so user search text matches literally.
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::{WarehouseFields, WarehouseRepo};

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("ada"), "ada");
    }

    async fn pool_with_warehouse() -> (PgPool, Uuid) {
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
        (pool, warehouse.id)
    }

    fn student(matric: &str) -> StudentFields {
        StudentFields {
            matric_number: matric.to_owned(),
            first_name: "Ada".to_owned(),
            last_name: "Obi".to_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_matric_conflicts_within_warehouse() {
        let (pool, warehouse_id) = pool_with_warehouse().await;
        let repo = StudentRepo::new(&pool);

        repo.create(warehouse_id, student("CSC/1")).await.expect("first");
        let err = repo.create(warehouse_id, student("CSC/1")).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn soft_deleted_student_excluded_from_list() {
        let (pool, warehouse_id) = pool_with_warehouse().await;
        let repo = StudentRepo::new(&pool);

        let kept = repo.create(warehouse_id, student("CSC/2")).await.expect("kept");
        let gone = repo.create(warehouse_id, student("CSC/3")).await.expect("gone");
        repo.soft_delete(gone.id).await.expect("delete");

        let page = repo
            .list_for_warehouse(warehouse_id, None, Pagination::default())
            .await
            .expect("list");
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, kept.id);

        let searched = repo
            .list_for_warehouse(warehouse_id, Some("ada obi"), Pagination::default())
            .await
            .expect("search");
        assert_eq!(searched.total, 1);
    }
}
