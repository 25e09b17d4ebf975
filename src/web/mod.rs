//! HTTP surface.
//!
//! JSON over axum. Successful responses are wrapped as `{"data": ...}`,
//! failures as `{"error", "code"}` with the status chosen from the
//! [`SheetError`] kind. The caller is identified by headers set by an
//! upstream authentication layer (see [`extract`]).

pub mod extract;
pub mod handlers;
pub mod models;

use crate::core::SheetError;
use crate::sheets::SheetService;
use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{Level, event};

#[derive(Clone)]
pub struct AppState {
    pub sheets: SheetService,
}

impl AppState {
    pub fn new(sheets: SheetService) -> Self {
        Self { sheets }
    }
}

pub fn build_router(state: AppState) -> Router {
    let sheets = Router::new()
        .route("/", get(handlers::list_sheets).post(handlers::create_sheet))
        .route(
            "/:id",
            get(handlers::get_sheet)
                .put(handlers::rename_sheet)
                .delete(handlers::delete_sheet),
        )
        .route("/:id/columns", put(handlers::update_columns))
        .route("/:id/columns/move", put(handlers::move_column))
        .route("/:id/share", put(handlers::share_sheet))
        .route("/:id/permissions", put(handlers::update_permissions))
        .route("/:id/users", get(handlers::list_grants))
        .route("/:id/users/:user_id", delete(handlers::remove_user));

    let rows = Router::new()
        .route("/", post(handlers::create_row))
        .route("/:sheet_id", get(handlers::list_rows))
        .route("/:sheet_id/move", put(handlers::move_row))
        .route(
            "/:sheet_id/position/:position",
            put(handlers::update_row).delete(handlers::delete_row),
        );

    Router::new()
        .route("/health", get(handlers::healthcheck))
        .nest("/api/sheets", sheets)
        .nest("/api/sheet-data", rows)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error("{0}")]
    Unauthorized(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Sheet(err) => match err {
                SheetError::InvalidArgument(_) | SheetError::OutOfRange { .. } => {
                    StatusCode::BAD_REQUEST
                }
                SheetError::NotFound(_) => StatusCode::NOT_FOUND,
                SheetError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                SheetError::ConstraintViolation(_) | SheetError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Sheet(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            event!(Level::ERROR, error = %self, code = self.code(), "request failed");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}
