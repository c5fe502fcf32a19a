//! Flag endpoints. Create and edit take multipart form data so the evidence
//! slip can ride along with the proposed values.

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use reporttracker_core::evidence::SlipUpload;
use reporttracker_core::types::FlagRecord;
use reporttracker_core::workflow::{CreateFlagRequest, EditFlagRequest, ProposedValues};

use crate::auth::AuthPrincipal;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Default)]
struct FlagForm {
    daily_data_id: Option<Uuid>,
    proposed: ProposedValues,
    remark_text: Option<String>,
    remark_tags: Option<Vec<String>>,
    slip: Option<SlipUpload>,
}

async fn read_text(field: Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))
}

async fn parse_number(name: &str, field: Field<'_>) -> ApiResult<Option<f64>> {
    let text = read_text(field).await?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("{name} must be a number")))
}

/// Tags arrive either as a JSON array string or comma-separated.
fn parse_tags(raw: &str) -> Vec<String> {
    if let Ok(tags) = serde_json::from_str::<Vec<String>>(raw) {
        return tags;
    }
    raw.split(',')
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

async fn read_flag_form(mut multipart: Multipart) -> ApiResult<FlagForm> {
    let mut form = FlagForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "slip" => {
                let filename = field.file_name().unwrap_or("slip").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(err.to_string()))?;
                form.slip = Some(SlipUpload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            "dailyDataId" => {
                let text = read_text(field).await?;
                let id = Uuid::parse_str(text.trim())
                    .map_err(|_| ApiError::bad_request("dailyDataId must be a UUID"))?;
                form.daily_data_id = Some(id);
            }
            "liters" => form.proposed.liters = parse_number("liters", field).await?,
            "dryKilos" => form.proposed.dry_kilos = parse_number("dryKilos", field).await?,
            "metrolac" => form.proposed.metrolac = parse_number("metrolac", field).await?,
            "nh3Volume" => form.proposed.nh3_volume = parse_number("nh3Volume", field).await?,
            "tmtDVolume" => {
                form.proposed.tmt_d_volume = parse_number("tmtDVolume", field).await?
            }
            "remarkText" => form.remark_text = Some(read_text(field).await?),
            "remarkTags" => form.remark_tags = Some(parse_tags(&read_text(field).await?)),
            _ => {}
        }
    }
    Ok(form)
}

pub async fn create_flag(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<FlagRecord>)> {
    let form = read_flag_form(multipart).await?;
    let daily_data_id = form
        .daily_data_id
        .ok_or_else(|| ApiError::bad_request("dailyDataId is required"))?;

    let flag = state
        .workflow
        .create(
            &principal,
            CreateFlagRequest {
                daily_data_id,
                proposed: form.proposed,
                remark_text: form.remark_text,
                remark_tags: form.remark_tags.unwrap_or_default(),
                slip: form.slip,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(flag)))
}

pub async fn list_flags(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> ApiResult<Json<Vec<FlagRecord>>> {
    Ok(Json(state.workflow.list(&principal).await?))
}

pub async fn get_flag(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FlagRecord>> {
    Ok(Json(state.workflow.get(&principal, id).await?))
}

pub async fn edit_flag(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<FlagRecord>> {
    let form = read_flag_form(multipart).await?;
    let flag = state
        .workflow
        .edit(
            &principal,
            id,
            EditFlagRequest {
                proposed: form.proposed,
                remark_text: form.remark_text,
                remark_tags: form.remark_tags,
                slip: form.slip,
            },
        )
        .await?;
    Ok(Json(flag))
}

pub async fn accept_flag(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.workflow.accept(&principal, id).await?;
    Ok(Json(json!({ "message": "Flag accepted and daily data updated" })))
}

pub async fn discard_flag(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.workflow.discard(&principal, id).await?;
    Ok(Json(json!({ "message": "Flag discarded and record restored" })))
}

pub async fn revive_flag(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.workflow.revive(&principal, id).await?;
    Ok(Json(json!({ "message": "Flag revived" })))
}
