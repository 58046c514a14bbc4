//! Fetcher HTTP genérico.
//!
//! Descarga audio directo desde una URL arbitraria con política estricta:
//! como mucho 5 redirecciones, 10 s por salto y content-type de audio.

use crate::error::{EmisoraError, Result};
use crate::fetch::AudioInput;
use crate::state::FetcherConfig;
use reqwest::header;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::io::StreamReader;

const MAX_REDIRECTS: usize = 5;
const HOP_TIMEOUT: Duration = Duration::from_secs(10);

/// GET con política de redirecciones/timeout y validación del tipo de
/// contenido. Devuelve el cuerpo como stream de bytes para el encoder.
pub async fn fetch_direct(url: &str, cfg: &FetcherConfig) -> Result<AudioInput> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .connect_timeout(HOP_TIMEOUT)
        .read_timeout(HOP_TIMEOUT)
        .build()
        .map_err(|e| EmisoraError::Internal(format!("cliente HTTP no construible: {}", e)))?;

    let mut req = client.get(url);
    if let Some(ua) = &cfg.youtube_user_agent {
        req = req.header(header::USER_AGENT, ua);
    }
    let resp = req.send().await?;

    if !resp.status().is_success() {
        return Err(EmisoraError::UpstreamFailure(format!(
            "upstream respondió {}",
            resp.status()
        )));
    }

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !is_audio_content_type(&content_type) {
        return Err(EmisoraError::UpstreamFailure(format!(
            "content-type no es audio: {:?}",
            content_type
        )));
    }

    let stream = resp
        .bytes_stream()
        .map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string())));
    Ok(AudioInput::Stream(Box::new(StreamReader::new(stream))))
}

fn is_audio_content_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or("").trim();
    essence.starts_with("audio/") || essence == "application/octet-stream"
}
