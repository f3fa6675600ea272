use crate::AppState;
use crate::api::error::AppError;
use crate::models::Principal;
use crate::services::hooks::{HookName, HookRequest};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

pub const HOOK_NAME_HEADER: &str = "hook-name";

#[derive(Serialize, ToSchema)]
pub struct HookResponse {
    pub result: String,
    pub msg: String,
}

impl HookResponse {
    pub fn success() -> Self {
        Self {
            result: "success".to_string(),
            msg: String::new(),
        }
    }
}

/// Entry point for the upload daemon's HTTP hooks.
///
/// The hook name is resolved before the body is looked at, so an unknown
/// hook is rejected whatever the payload contains.
#[utoipa::path(
    post,
    path = "/tusd/hooks",
    request_body = HookRequest,
    params(
        ("secret" = String, Query, description = "Shared secret configured for the daemon"),
        ("Hook-Name" = String, Header, description = "Either `pre-create` or `pre-finish`")
    ),
    responses(
        (status = 200, description = "Daemon may proceed", body = HookResponse),
        (status = 400, description = "Upload rejected"),
        (status = 401, description = "Unauthenticated"),
        (status = 500, description = "Finalization failed")
    ),
    tag = "hooks"
)]
pub async fn handle_tusd_hook(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<HookResponse>, AppError> {
    let raw_name = headers
        .get(HOOK_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Some(hook) = HookName::parse(raw_name) else {
        warn!(hook_name = %raw_name, "Unexpected hook");
        return Err(AppError::UnrecognizedHook);
    };

    let payload: HookRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(hook = hook.as_str(), error = %e, "Malformed hook payload");
        AppError::InvalidUpload("Malformed hook payload.".to_string())
    })?;

    match hook {
        HookName::PreCreate => {
            state
                .hook_service
                .pre_create(&principal, &payload.upload)
                .await?;
        }
        HookName::PreFinish => {
            state
                .hook_service
                .pre_finish(&principal, &payload.upload)
                .await?;
        }
    }

    Ok(Json(HookResponse::success()))
}
