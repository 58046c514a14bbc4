//! Proxy de miniaturas.
//!
//! Sirve la carátula de la fuente en reproducción recodificada a PNG. Las
//! de SoundCloud se recortan a 256×256 con encuadre de cubierta.

use crate::error::{EmisoraError, Result};
use crate::queue::TrackSource;
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
};
use std::sync::Arc;

const COVER_SIZE: u32 = 256;

pub async fn youtube_thumbnail(State(state): State<Arc<AppState>>) -> Result<Response> {
    serve_thumbnail(&state, TrackSource::Youtube, false).await
}

pub async fn soundcloud_thumbnail(State(state): State<Arc<AppState>>) -> Result<Response> {
    serve_thumbnail(&state, TrackSource::Soundcloud, true).await
}

async fn serve_thumbnail(state: &AppState, source: TrackSource, cover: bool) -> Result<Response> {
    let url = state
        .engine
        .thumbnail_for(source)
        .await
        .ok_or_else(|| EmisoraError::NotFound("no suena nada de esa fuente".into()))?;

    let resp = state.http.get(&url).send().await?;
    if !resp.status().is_success() {
        return Err(EmisoraError::UpstreamFailure(format!(
            "la miniatura respondió {}",
            resp.status()
        )));
    }
    let raw = resp.bytes().await?;

    let mut img = image::load_from_memory(&raw)
        .map_err(|e| EmisoraError::UpstreamFailure(format!("imagen no decodificable: {}", e)))?;
    if cover {
        img = img.resize_to_fill(COVER_SIZE, COVER_SIZE, image::imageops::FilterType::Lanczos3);
    }

    let mut png = std::io::Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| EmisoraError::Internal(format!("recodificación PNG falló: {}", e)))?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(png.into_inner()))
        .unwrap())
}
