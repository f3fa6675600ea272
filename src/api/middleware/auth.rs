use crate::api::error::AppError;
use crate::entities::prelude::{Realms, Users};
use crate::models::Principal;
use crate::utils::auth::{secrets_match, validate_jwt};
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use tracing::warn;

#[derive(Deserialize)]
struct HookQuery {
    secret: Option<String>,
}

/// Guards the hook endpoint: the caller must be a local peer presenting the
/// shared secret, and the forwarded client session must resolve to an
/// active user. The resolved [`Principal`] is attached to the request.
pub async fn hook_auth_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.config.require_loopback_hooks && !is_loopback(peer.ip()) {
        warn!(%peer, "Hook call from non-local peer rejected");
        return Err(AppError::Unauthenticated("Access denied".to_string()));
    }

    let query = req.uri().query().unwrap_or_default();
    let secret = serde_urlencoded::from_str::<HookQuery>(query)
        .ok()
        .and_then(|q| q.secret)
        .unwrap_or_default();

    if !secrets_match(&secret, &state.config.shared_secret) {
        warn!("Hook call with missing or invalid shared secret rejected");
        return Err(AppError::Unauthenticated("Access denied".to_string()));
    }

    let principal = authenticate_session(&state, req.headers()).await?;
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

async fn authenticate_session(state: &AppState, headers: &HeaderMap) -> Result<Principal, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(AppError::not_logged_in)?;

    let claims =
        validate_jwt(token, &state.config.jwt_secret).map_err(|_| AppError::not_logged_in())?;

    match Users::find_by_id(claims.sub)
        .find_also_related(Realms)
        .one(&state.db)
        .await?
    {
        Some((user, Some(realm))) if user.is_active => Ok(Principal { user, realm }),
        _ => Err(AppError::not_logged_in()),
    }
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or(v6.is_loopback(), |v4| v4.is_loopback()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback("127.0.0.1".parse().unwrap()));
        assert!(is_loopback("127.1.2.3".parse().unwrap()));
        assert!(is_loopback("::1".parse().unwrap()));
        assert!(is_loopback("::ffff:127.0.0.1".parse().unwrap()));
        assert!(!is_loopback("10.0.0.5".parse().unwrap()));
        assert!(!is_loopback("::ffff:10.0.0.5".parse().unwrap()));
    }
}
