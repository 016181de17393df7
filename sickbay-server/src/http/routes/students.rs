//! Student (patient) endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::db::repos::{
    Consultation, ConsultationFilter, ConsultationRepo, Student, StudentFields, StudentRepo,
    WarehouseRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidQuery, ValidUuid};
use crate::http::server::AppState;
use crate::models::{
    optional_text, parse_optional, required_text, BloodGroup, Email, Gender, Genotype,
    MatricNumber, Paginated, Pagination, PaginationParams, ValidationError, LONG_TEXT_MAX,
    SHORT_TEXT_MAX,
};

/// Body for both create and patch. On patch, absent fields keep their
/// stored value and blank optional fields are cleared.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentPayload {
    pub matric_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
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

impl StudentPayload {
    /// Fill absent fields from `base`.
    fn over(self, base: StudentFields) -> Self {
        Self {
            matric_number: self.matric_number.or(Some(base.matric_number)),
            first_name: self.first_name.or(Some(base.first_name)),
            last_name: self.last_name.or(Some(base.last_name)),
            gender: self.gender.or(base.gender),
            date_of_birth: self.date_of_birth.or(base.date_of_birth),
            phone: self.phone.or(base.phone),
            email: self.email.or(base.email),
            department: self.department.or(base.department),
            level: self.level.or(base.level),
            blood_group: self.blood_group.or(base.blood_group),
            genotype: self.genotype.or(base.genotype),
            allergies: self.allergies.or(base.allergies),
            emergency_contact_name: self.emergency_contact_name.or(base.emergency_contact_name),
            emergency_contact_phone: self.emergency_contact_phone.or(base.emergency_contact_phone),
            address: self.address.or(base.address),
        }
    }

    fn validate(self, today: NaiveDate) -> Result<StudentFields, ValidationError> {
        let short =
            |field, value: Option<String>| optional_text(field, value.as_deref(), SHORT_TEXT_MAX);

        if let Some(dob) = self.date_of_birth {
            if dob > today {
                return Err(ValidationError::OutOfRange {
                    field: "date of birth",
                    reason: "cannot be in the future",
                });
            }
        }

        Ok(StudentFields {
            matric_number: MatricNumber::new(self.matric_number.as_deref().unwrap_or_default())?
                .as_str()
                .to_owned(),
            first_name: required_text(
                "first name",
                self.first_name.as_deref().unwrap_or_default(),
                SHORT_TEXT_MAX,
            )?,
            last_name: required_text(
                "last name",
                self.last_name.as_deref().unwrap_or_default(),
                SHORT_TEXT_MAX,
            )?,
            gender: parse_optional(self.gender.as_deref(), Gender::parse)?
                .map(|g| g.as_str().to_owned()),
            date_of_birth: self.date_of_birth,
            phone: optional_text("phone", self.phone.as_deref(), 32)?,
            email: Email::parse_optional(self.email.as_deref())?.map(Email::into_string),
            department: short("department", self.department)?,
            level: optional_text("level", self.level.as_deref(), 16)?,
            blood_group: parse_optional(self.blood_group.as_deref(), BloodGroup::parse)?
                .map(|b| b.as_str().to_owned()),
            genotype: parse_optional(self.genotype.as_deref(), Genotype::parse)?
                .map(|g| g.as_str().to_owned()),
            allergies: optional_text("allergies", self.allergies.as_deref(), LONG_TEXT_MAX)?,
            emergency_contact_name: short("emergency contact name", self.emergency_contact_name)?,
            emergency_contact_phone: optional_text(
                "emergency contact phone",
                self.emergency_contact_phone.as_deref(),
                32,
            )?,
            address: optional_text("address", self.address.as_deref(), LONG_TEXT_MAX)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

/// POST /api/warehouses/{warehouse_id}/students
async fn create_student(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidJson(req): ValidJson<StudentPayload>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let fields = req.validate(Utc::now().date_naive())?;
    let student = StudentRepo::new(&state.pool).create(warehouse_id, fields).await?;
    tracing::info!(student_id = %student.id, warehouse_id = %warehouse_id, "Student registered");
    Ok((StatusCode::CREATED, Json(student)))
}

/// GET /api/warehouses/{warehouse_id}/students
async fn list_students(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidQuery(params): ValidQuery<StudentListParams>,
) -> Result<Json<Paginated<Student>>, ApiError> {
    WarehouseRepo::new(&state.pool).ensure_exists(warehouse_id).await?;
    let page = Pagination::from(PaginationParams {
        page: params.page,
        per_page: params.per_page,
    });
    let search = params.search.as_deref().filter(|s| !s.trim().is_empty());

    let students = StudentRepo::new(&state.pool)
        .list_for_warehouse(warehouse_id, search, page)
        .await?;
    Ok(Json(students))
}

/// GET /api/students/{id}
async fn get_student(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Student>, ApiError> {
    Ok(Json(StudentRepo::new(&state.pool).get(id).await?))
}

/// PATCH /api/students/{id}
async fn update_student(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<StudentPayload>,
) -> Result<Json<Student>, ApiError> {
    let repo = StudentRepo::new(&state.pool);
    let current = StudentFields::from(repo.get(id).await?);
    let fields = req.over(current).validate(Utc::now().date_naive())?;
    Ok(Json(repo.update(id, fields).await?))
}

/// DELETE /api/students/{id}
async fn delete_student(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    StudentRepo::new(&state.pool).soft_delete(id).await?;
    tracing::info!(student_id = %id, "Student deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/students/{id}/consultations - visit history, newest first
async fn student_history(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<Consultation>>, ApiError> {
    StudentRepo::new(&state.pool).get(id).await?;
    let history = ConsultationRepo::new(&state.pool)
        .list(
            ConsultationFilter {
                warehouse_id: None,
                student_id: Some(id),
            },
            Pagination::from(params),
        )
        .await?;
    Ok(Json(history))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/warehouses/{warehouse_id}/students",
            get(list_students).post(create_student),
        )
        .route(
            "/api/students/{id}",
            get(get_student).patch(update_student).delete(delete_student),
        )
        .route("/api/students/{id}/consultations", get(student_history))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn payload() -> StudentPayload {
        StudentPayload {
            matric_number: Some("csc/2020/014".into()),
            first_name: Some("Amaka".into()),
            last_name: Some("Eze".into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_normalizes_enums() {
        let fields = StudentPayload {
            gender: Some("F".into()),
            blood_group: Some("o+".into()),
            genotype: Some("as".into()),
            ..payload()
        }
        .validate(today())
        .unwrap();

        assert_eq!(fields.matric_number, "CSC/2020/014");
        assert_eq!(fields.gender.as_deref(), Some("female"));
        assert_eq!(fields.blood_group.as_deref(), Some("O+"));
        assert_eq!(fields.genotype.as_deref(), Some("AS"));
    }

    #[test]
    fn missing_required_field_is_empty_error() {
        let err = StudentPayload {
            last_name: None,
            ..payload()
        }
        .validate(today())
        .unwrap_err();
        assert_eq!(err, ValidationError::Empty { field: "last name" });
    }

    #[test]
    fn future_birth_date_rejected() {
        let err = StudentPayload {
            date_of_birth: NaiveDate::from_ymd_opt(2030, 1, 1),
            ..payload()
        }
        .validate(today())
        .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { field: "date of birth", .. }));
    }

    #[test]
    fn patch_overlays_and_clears() {
        let base = StudentFields {
            matric_number: "CSC/2020/014".into(),
            first_name: "Amaka".into(),
            last_name: "Eze".into(),
            allergies: Some("penicillin".into()),
            phone: Some("0803".into()),
            ..Default::default()
        };
        let fields = StudentPayload {
            first_name: Some("Ada".into()),
            phone: Some("".into()),
            ..Default::default()
        }
        .over(base)
        .validate(today())
        .unwrap();

        assert_eq!(fields.first_name, "Ada");
        assert_eq!(fields.last_name, "Eze");
        assert_eq!(fields.allergies.as_deref(), Some("penicillin"));
        assert_eq!(fields.phone, None);
    }
}
