use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::{validate_client_id, validate_status_filter};
use super::{
    ApiError, ApiJson, ApiResponse, AppState, ClientDetailResponse, ClientListParams,
    ClientListResponse, OkResponse, PhoneResponse, UpdateStatusRequest,
};
use crate::services::client_service::parse_amount;
use crate::services::{ClientListQuery, ReceiptUpload};

const AMOUNT_FIELD: &str = "amount";
const RECEIPT_FIELD: &str = "receiptPdf";

/// GET /clients
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClientListParams>,
) -> Result<Json<ApiResponse<ClientListResponse>>, ApiError> {
    let status = validate_status_filter(params.status.as_deref())?;

    let page = state
        .clients()
        .list(ClientListQuery {
            search: params.search,
            status,
            page: params.page,
            page_size: params.page_size,
        })
        .await?;

    Ok(Json(ApiResponse::success(page.into())))
}

/// GET /clients/{id}
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ClientDetailResponse>>, ApiError> {
    let id = validate_client_id(id)?;
    let details = state.clients().get(id).await?;
    Ok(Json(ApiResponse::success(details.into())))
}

/// PUT /clients/{id}/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OkResponse>>, ApiError> {
    let id = validate_client_id(id)?;

    state
        .clients()
        .update_status(id, payload.status, payload.notes.as_deref(), current.user.id)
        .await?;

    Ok(Json(ApiResponse::success(OkResponse::ok())))
}

/// POST /clients/{id}/sale
///
/// Multipart form with an `amount` text field and a `receiptPdf` file.
pub async fn create_sale(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<OkResponse>>, ApiError> {
    let id = validate_client_id(id)?;

    let mut amount: Option<String> = None;
    let mut receipt: Option<ReceiptUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some(AMOUNT_FIELD) => {
                amount = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::validation(format!("Invalid amount field: {e}")))?,
                );
            }
            Some(RECEIPT_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Invalid receipt upload: {e}")))?;
                receipt = Some(ReceiptUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let amount = parse_amount(amount.as_deref().unwrap_or_default())?;
    let receipt = receipt.ok_or_else(|| ApiError::validation("A receipt PDF is required"))?;

    let sale_id = state
        .clients()
        .create_sale(id, amount, receipt, current.user.id)
        .await?;

    Ok(Json(ApiResponse::success(OkResponse::sale(sale_id))))
}

/// GET /clients/{id}/sale/receipt
///
/// Raw PDF bytes, not wrapped in the JSON envelope.
pub async fn download_receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Response, ApiError> {
    let id = validate_client_id(id)?;
    let receipt = state.clients().receipt(id).await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        receipt.file_name
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        receipt.bytes,
    )
        .into_response())
}

/// POST /clients/{id}/phone/refresh
pub async fn refresh_phone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PhoneResponse>>, ApiError> {
    let id = validate_client_id(id)?;
    let phone = state.clients().refresh_phone(id).await?;
    Ok(Json(ApiResponse::success(PhoneResponse { phone })))
}
