//! Verbos JSON de la API de la cola.
//!
//! Encolar, eliminar, recolocar, pausar y saltar. La identidad llega ya
//! validada por el middleware de acceso; aquí sólo se consume.

use crate::auth::{user_from_headers, RadioUser};
use crate::error::{EmisoraError, Result};
use crate::fetch;
use crate::fetch::depends::youtube;
use crate::queue::{Requester, TrackPayload, TrackSource};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use std::sync::Arc;

/// POST /api/queue — resuelve metadatos y encola. 201 con el track creado.
pub async fn enqueue_track(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<RadioUser>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse> {
    let raw = body
        .get("url")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EmisoraError::BadRequest("falta url".into()))?;

    let source = fetch::classify_url(raw).ok_or_else(|| {
        EmisoraError::UnsupportedUrl("la URL no es ni un video ni un track reconocible".into())
    })?;

    let cfg = state.engine.fetcher_config();
    if source == TrackSource::Soundcloud && cfg.soundcloud_client_id.is_none() {
        return Err(EmisoraError::FeatureDisabled(
            "SoundCloud está deshabilitado en este despliegue".into(),
        ));
    }

    // La reproducción siempre empieza en 0: fuera marcas de tiempo
    let url = match source {
        TrackSource::Youtube => youtube::normalize_url(raw),
        TrackSource::Soundcloud => raw.to_string(),
    };

    let meta = fetch::resolve_metadata(source, &url, cfg, &state.http).await?;
    let track = state
        .engine
        .enqueue(TrackPayload {
            title: meta.title,
            url,
            thumbnail: meta.thumbnail,
            duration: meta.duration,
            source,
            requested_by: Requester {
                id: user.id,
                display_name: user.display_name,
                avatar: user.avatar,
            },
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "track": track })),
    ))
}

/// DELETE /api/queue/:id
pub async fn remove_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if state.engine.remove_track(&id).await {
        Ok(Json(serde_json::json!({ "ok": true })))
    } else {
        Err(EmisoraError::NotFound("el track no está en la cola".into()))
    }
}

/// PATCH /api/queue/:id — body `{ index }`; el índice se recorta al rango.
pub async fn move_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    let index = body
        .get("index")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| EmisoraError::BadRequest("index ausente o inválido".into()))?;
    if state.engine.move_track(&id, index as isize).await {
        Ok(Json(serde_json::json!({ "ok": true })))
    } else {
        Err(EmisoraError::NotFound("el track no está en la cola".into()))
    }
}

/// POST /api/pause — body `{ paused }`.
pub async fn set_paused(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    let want = body
        .get("paused")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| EmisoraError::BadRequest("paused ausente o inválido".into()))?;
    let paused = state.engine.set_paused(want).await;
    Ok(Json(serde_json::json!({ "ok": true, "paused": paused })))
}

/// POST /api/skip
pub async fn skip_track(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.engine.skip_current().await;
    Json(serde_json::json!({ "ok": true }))
}

/// GET /api/me — identidad (si la hay) y veredicto de la política.
pub async fn me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<serde_json::Value> {
    let user = user_from_headers(&headers, &state.access);
    let can_queue = user
        .as_ref()
        .map(|u| state.access.can_queue(&u.id))
        .unwrap_or(false);
    Json(serde_json::json!({ "user": user, "canQueue": can_queue }))
}
