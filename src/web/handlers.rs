use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use super::extract::{ApiJson, ApiPath, ApiQuery, CurrentActor};
use super::models::{
    ApiMessage, ApiResponse, ColumnUpdateRequest, CreateRowRequest, CreateSheetRequest,
    ListSheetsQuery, MoveRequest, RenameSheetRequest, ShareRequest, UpdatePermissionsRequest,
    UpdateRowRequest,
};
use super::{ApiResult, AppState};
use crate::access::{SheetGrant, SheetPermission, UserId};
use crate::core::{ColumnChange, Position, PositionedRecord, Sheet, SheetId, SheetSnapshot};

pub async fn healthcheck() -> Json<ApiResponse<ApiMessage>> {
    Json(ApiResponse {
        data: ApiMessage {
            message: "ok".to_string(),
        },
    })
}

// ----------------------------------------------------------------------------
// Sheets
// ----------------------------------------------------------------------------

pub async fn create_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(payload): ApiJson<CreateSheetRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SheetSnapshot>>)> {
    let created = state
        .sheets
        .create_sheet(&actor, &payload.name, payload.columns)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse { data: created })))
}

pub async fn list_sheets(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<ListSheetsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Sheet>>>> {
    let sheets = state
        .sheets
        .list_sheets(&actor, query.search.as_deref())
        .await?;
    Ok(Json(ApiResponse { data: sheets }))
}

pub async fn get_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<SheetId>,
) -> ApiResult<Json<ApiResponse<SheetSnapshot>>> {
    let sheet = state.sheets.get_sheet(&actor, id).await?;
    Ok(Json(ApiResponse { data: sheet }))
}

pub async fn rename_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<SheetId>,
    ApiJson(payload): ApiJson<RenameSheetRequest>,
) -> ApiResult<Json<ApiResponse<Sheet>>> {
    let sheet = state.sheets.rename_sheet(&actor, id, &payload.name).await?;
    Ok(Json(ApiResponse { data: sheet }))
}

pub async fn delete_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<SheetId>,
) -> ApiResult<StatusCode> {
    state.sheets.delete_sheet(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_columns(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<SheetId>,
    ApiJson(payload): ApiJson<ColumnUpdateRequest>,
) -> ApiResult<Json<ApiResponse<SheetSnapshot>>> {
    let change = payload.into_change()?;
    let sheet = state.sheets.change_columns(&actor, id, change).await?;
    Ok(Json(ApiResponse { data: sheet }))
}

pub async fn move_column(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<SheetId>,
    ApiJson(payload): ApiJson<MoveRequest>,
) -> ApiResult<Json<ApiResponse<SheetSnapshot>>> {
    let change = ColumnChange::Move {
        source: payload.source_index,
        target: payload.target_index,
    };
    let sheet = state.sheets.change_columns(&actor, id, change).await?;
    Ok(Json(ApiResponse { data: sheet }))
}

// ----------------------------------------------------------------------------
// Sharing
// ----------------------------------------------------------------------------

pub async fn share_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<SheetId>,
    ApiJson(payload): ApiJson<ShareRequest>,
) -> ApiResult<Json<ApiResponse<Vec<SheetGrant>>>> {
    let permissions = payload.parsed_permissions()?;
    let users = payload
        .users
        .into_iter()
        .map(|u| (u.user_id, u.role))
        .collect();
    let grants = state.sheets.share(&actor, id, users, permissions).await?;
    Ok(Json(ApiResponse { data: grants }))
}

pub async fn update_permissions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<SheetId>,
    ApiJson(payload): ApiJson<UpdatePermissionsRequest>,
) -> ApiResult<Json<ApiResponse<SheetGrant>>> {
    let permissions = SheetPermission::parse_all(&payload.permissions)?;
    let grant = state
        .sheets
        .set_permissions(&actor, id, payload.user_id, permissions)
        .await?;
    Ok(Json(ApiResponse { data: grant }))
}

pub async fn list_grants(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<SheetId>,
) -> ApiResult<Json<ApiResponse<Vec<SheetGrant>>>> {
    let grants = state.sheets.grants(&actor, id).await?;
    Ok(Json(ApiResponse { data: grants }))
}

pub async fn remove_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath((id, user_id)): ApiPath<(SheetId, UserId)>,
) -> ApiResult<StatusCode> {
    state.sheets.remove_user(&actor, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Rows
// ----------------------------------------------------------------------------

pub async fn create_row(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(payload): ApiJson<CreateRowRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PositionedRecord>>)> {
    let row = state
        .sheets
        .insert_row(&actor, payload.spreadsheet_id, payload.row, payload.position)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse { data: row })))
}

pub async fn list_rows(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(sheet_id): ApiPath<SheetId>,
) -> ApiResult<Json<ApiResponse<Vec<PositionedRecord>>>> {
    let rows = state.sheets.list_rows(&actor, sheet_id).await?;
    Ok(Json(ApiResponse { data: rows }))
}

pub async fn update_row(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath((sheet_id, position)): ApiPath<(SheetId, Position)>,
    ApiJson(payload): ApiJson<UpdateRowRequest>,
) -> ApiResult<Json<ApiResponse<PositionedRecord>>> {
    let row = state
        .sheets
        .update_row(&actor, sheet_id, position, payload.row)
        .await?;
    Ok(Json(ApiResponse { data: row }))
}

pub async fn move_row(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(sheet_id): ApiPath<SheetId>,
    ApiJson(payload): ApiJson<MoveRequest>,
) -> ApiResult<Json<ApiResponse<Vec<PositionedRecord>>>> {
    let rows = state
        .sheets
        .move_row(&actor, sheet_id, payload.source_index, payload.target_index)
        .await?;
    Ok(Json(ApiResponse { data: rows }))
}

pub async fn delete_row(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath((sheet_id, position)): ApiPath<(SheetId, Position)>,
) -> ApiResult<Json<ApiResponse<PositionedRecord>>> {
    let deleted = state.sheets.delete_row(&actor, sheet_id, position).await?;
    Ok(Json(ApiResponse { data: deleted }))
}
