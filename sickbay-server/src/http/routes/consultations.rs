//! Consultation (sale) endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::{
    ClinicalNotes, Consultation, ConsultationDetail, ConsultationFilter, ConsultationRepo,
    CreatedConsultation, NewConsultation, NewItem, WarehouseRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidQuery, ValidUuid};
use crate::http::server::AppState;
use crate::models::{
    optional_text, Money, Paginated, Pagination, PaginationParams, PaymentKind, Quantity,
    ValidationError, LONG_TEXT_MAX, SHORT_TEXT_MAX,
};

/// Most lines accepted on one consultation.
const MAX_ITEMS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct ItemRequest {
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
    pub dosage: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub method: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConsultationRequest {
    pub student_id: Uuid,
    pub user_id: Option<Uuid>,
    pub complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemRequest>,
    #[serde(default)]
    pub payments: Vec<PaymentRequest>,
}

fn clinical(
    complaint: Option<&str>,
    diagnosis: Option<&str>,
    notes: Option<&str>,
) -> Result<ClinicalNotes, ValidationError> {
    Ok(ClinicalNotes {
        complaint: optional_text("complaint", complaint, LONG_TEXT_MAX)?,
        diagnosis: optional_text("diagnosis", diagnosis, LONG_TEXT_MAX)?,
        notes: optional_text("notes", notes, LONG_TEXT_MAX)?,
    })
}

impl CreateConsultationRequest {
    fn validate(self) -> Result<NewConsultation, ValidationError> {
        if self.items.len() > MAX_ITEMS {
            return Err(ValidationError::OutOfRange {
                field: "items",
                reason: "too many lines on one consultation",
            });
        }

        let items = self
            .items
            .into_iter()
            .map(|item| -> Result<NewItem, ValidationError> {
                Ok(NewItem {
                    product_id: item.product_id,
                    quantity: Quantity::new("quantity", item.quantity)?,
                    unit_price: Money::parse_optional("unit price", item.unit_price)?,
                    dosage: optional_text("dosage", item.dosage.as_deref(), SHORT_TEXT_MAX)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let payments = self
            .payments
            .into_iter()
            .map(|p| -> Result<(PaymentKind, Money), ValidationError> {
                Ok((PaymentKind::parse(&p.method)?, Money::positive("amount", p.amount)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewConsultation {
            student_id: self.student_id,
            user_id: self.user_id,
            clinical: clinical(
                self.complaint.as_deref(),
                self.diagnosis.as_deref(),
                self.notes.as_deref(),
            )?,
            items,
            payments,
        })
    }
}

/// Clinical fields only; absent fields are kept, blank ones cleared.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateConsultationRequest {
    pub complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
}

impl UpdateConsultationRequest {
    fn merge(self, current: &Consultation) -> Result<ClinicalNotes, ValidationError> {
        clinical(
            self.complaint.as_deref().or(current.complaint.as_deref()),
            self.diagnosis.as_deref().or(current.diagnosis.as_deref()),
            self.notes.as_deref().or(current.notes.as_deref()),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsultationListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoidParams {
    /// Staff member voiding the consultation
    pub user_id: Option<Uuid>,
}

/// POST /api/warehouses/{warehouse_id}/consultations
async fn create_consultation(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidJson(req): ValidJson<CreateConsultationRequest>,
) -> Result<(StatusCode, Json<CreatedConsultation>), ApiError> {
    let new = req.validate()?;
    let created = ConsultationRepo::new(&state.pool)
        .create(warehouse_id, new, &state.anti_theft)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/warehouses/{warehouse_id}/consultations
async fn list_consultations(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidQuery(params): ValidQuery<ConsultationListParams>,
) -> Result<Json<Paginated<Consultation>>, ApiError> {
    WarehouseRepo::new(&state.pool).ensure_exists(warehouse_id).await?;
    let page = Pagination::from(PaginationParams {
        page: params.page,
        per_page: params.per_page,
    });

    let consultations = ConsultationRepo::new(&state.pool)
        .list(
            ConsultationFilter {
                warehouse_id: Some(warehouse_id),
                student_id: params.student_id,
            },
            page,
        )
        .await?;
    Ok(Json(consultations))
}

/// GET /api/consultations/{id}
async fn get_consultation(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ConsultationDetail>, ApiError> {
    Ok(Json(ConsultationRepo::new(&state.pool).get(id).await?))
}

/// PATCH /api/consultations/{id}
async fn update_consultation(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<UpdateConsultationRequest>,
) -> Result<Json<ConsultationDetail>, ApiError> {
    let repo = ConsultationRepo::new(&state.pool);
    let current = repo.get(id).await?;
    let notes = req.merge(&current.consultation)?;
    Ok(Json(repo.update_clinical(id, notes).await?))
}

/// DELETE /api/consultations/{id} - void and return stock
async fn void_consultation(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidQuery(params): ValidQuery<VoidParams>,
) -> Result<StatusCode, ApiError> {
    ConsultationRepo::new(&state.pool)
        .void(id, params.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/warehouses/{warehouse_id}/consultations",
            get(list_consultations).post(create_consultation),
        )
        .route(
            "/api/consultations/{id}",
            get(get_consultation)
                .patch(update_consultation)
                .delete(void_consultation),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateConsultationRequest {
        CreateConsultationRequest {
            student_id: Uuid::nil(),
            user_id: None,
            complaint: Some(" fever ".into()),
            diagnosis: Some("".into()),
            notes: None,
            items: vec![ItemRequest {
                product_id: Uuid::nil(),
                quantity: 2,
                unit_price: None,
                dosage: Some("2x daily".into()),
            }],
            payments: vec![PaymentRequest {
                method: "POS".into(),
                amount: Decimal::new(500, 2),
            }],
        }
    }

    #[test]
    fn valid_request_maps_to_new_consultation() {
        let new = request().validate().unwrap();
        assert_eq!(new.clinical.complaint.as_deref(), Some("fever"));
        assert_eq!(new.clinical.diagnosis, None);
        assert_eq!(new.items[0].quantity.get(), 2);
        assert!(new.items[0].unit_price.is_none());
        assert_eq!(new.payments[0].0, PaymentKind::Card);
    }

    #[test]
    fn zero_quantity_rejected() {
        let mut req = request();
        req.items[0].quantity = 0;
        assert!(matches!(
            req.validate().unwrap_err(),
            ValidationError::OutOfRange { field: "quantity", .. }
        ));
    }

    #[test]
    fn zero_payment_rejected() {
        let mut req = request();
        req.payments[0].amount = Decimal::ZERO;
        assert!(matches!(
            req.validate().unwrap_err(),
            ValidationError::OutOfRange { field: "amount", .. }
        ));
    }

    #[test]
    fn unknown_payment_method_rejected() {
        let mut req = request();
        req.payments[0].method = "barter".into();
        assert!(matches!(
            req.validate().unwrap_err(),
            ValidationError::InvalidVariant { field: "payment method", .. }
        ));
    }
}
