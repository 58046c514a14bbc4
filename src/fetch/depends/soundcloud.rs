//! Fetcher de SoundCloud.
//!
//! Resuelve la URL pública contra api-v2 con el client id configurado y
//! obtiene un stream de audio directo. Sólo se aceptan tracks individuales
//! con duración conocida; las playlists se rechazan. Si la resolución
//! falla, se cae al subproceso fetcher genérico.

use crate::error::{EmisoraError, Result};
use crate::fetch::{AudioInput, FetchedAudio, TrackMetadata};
use crate::state::FetcherConfig;
use serde::Deserialize;

const RESOLVE_ENDPOINT: &str = "https://api-v2.soundcloud.com/resolve";

pub fn is_soundcloud_host(host: &str) -> bool {
    host == "soundcloud.com" || host.ends_with(".soundcloud.com")
}

#[derive(Debug, Deserialize)]
struct ResolvedTrack {
    kind: String,
    title: Option<String>,
    /// Milisegundos
    duration: Option<u64>,
    artwork_url: Option<String>,
    media: Option<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    transcodings: Vec<Transcoding>,
}

#[derive(Debug, Deserialize)]
struct Transcoding {
    url: String,
    format: TranscodingFormat,
}

#[derive(Debug, Deserialize)]
struct TranscodingFormat {
    protocol: String,
}

#[derive(Debug, Deserialize)]
struct StreamLocation {
    url: String,
}

async fn resolve(url: &str, client_id: &str, http: &reqwest::Client) -> Result<ResolvedTrack> {
    let resolved: ResolvedTrack = http
        .get(RESOLVE_ENDPOINT)
        .query(&[("url", url), ("client_id", client_id)])
        .send()
        .await?
        .error_for_status()
        .map_err(|e| EmisoraError::UpstreamFailure(format!("resolve falló: {}", e)))?
        .json()
        .await?;

    // Sólo tracks individuales con duración conocida; nada de playlists
    if resolved.kind != "track" || resolved.duration.is_none() {
        return Err(EmisoraError::UnsupportedUrl(
            "sólo se aceptan tracks individuales de SoundCloud".into(),
        ));
    }
    Ok(resolved)
}

pub async fn metadata(url: &str, client_id: &str, http: &reqwest::Client) -> Result<TrackMetadata> {
    let resolved = resolve(url, client_id, http).await?;
    Ok(TrackMetadata {
        title: resolved.title.unwrap_or_else(|| "Sin título".into()),
        duration: resolved.duration.map(|ms| ms / 1000),
        thumbnail: resolved.artwork_url,
    })
}

pub async fn fetch(
    url: &str,
    cfg: &FetcherConfig,
    http: &reqwest::Client,
) -> Result<FetchedAudio> {
    let Some(client_id) = cfg.soundcloud_client_id.as_deref() else {
        return Err(EmisoraError::FeatureDisabled("SoundCloud sin client id".into()));
    };

    match stream_input(url, client_id, cfg, http).await {
        Ok(fetched) => Ok(fetched),
        Err(err) if !cfg.disable_external_fetcher => {
            log::warn!(
                "Resolución de SoundCloud falló ({}), probando el fetcher externo",
                err
            );
            super::youtube::fetch_subprocess(url, cfg).await
        }
        Err(err) => Err(err),
    }
}

async fn stream_input(
    url: &str,
    client_id: &str,
    cfg: &FetcherConfig,
    http: &reqwest::Client,
) -> Result<FetchedAudio> {
    let resolved = resolve(url, client_id, http).await?;
    let transcodings = resolved
        .media
        .map(|m| m.transcodings)
        .unwrap_or_default();

    // Preferir el stream progresivo; HLS sólo si no hay otra cosa
    let chosen = transcodings
        .iter()
        .find(|t| t.format.protocol == "progressive")
        .or_else(|| transcodings.iter().find(|t| t.format.protocol == "hls"))
        .ok_or_else(|| {
            EmisoraError::UpstreamFailure("el track no expone ningún transcoding".into())
        })?;

    let location: StreamLocation = http
        .get(&chosen.url)
        .query(&[("client_id", client_id)])
        .send()
        .await?
        .error_for_status()
        .map_err(|e| EmisoraError::UpstreamFailure(format!("stream no disponible: {}", e)))?
        .json()
        .await?;

    if chosen.format.protocol == "hls" {
        // El encoder abre el manifiesto por sí mismo
        return Ok(FetchedAudio {
            input: AudioInput::Remote {
                url: location.url,
                headers: Vec::new(),
                hls: true,
            },
            fetcher: None,
        });
    }

    let input = super::http::fetch_direct(&location.url, cfg).await?;
    Ok(FetchedAudio {
        input,
        fetcher: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_soundcloud_host() {
        assert!(is_soundcloud_host("soundcloud.com"));
        assert!(is_soundcloud_host("m.soundcloud.com"));
        assert!(!is_soundcloud_host("soundcloud.com.evil.example"));
        assert!(!is_soundcloud_host("example.com"));
    }

    #[test]
    fn test_playlist_shape_is_rejected() {
        let body = serde_json::json!({
            "kind": "playlist",
            "title": "Mi lista",
            "duration": null,
        });
        let resolved: ResolvedTrack = serde_json::from_value(body).unwrap();
        assert_eq!(resolved.kind, "playlist");
        assert!(resolved.duration.is_none());
    }

    #[test]
    fn test_track_shape_parses_transcodings() {
        let body = serde_json::json!({
            "kind": "track",
            "title": "Canción",
            "duration": 185000,
            "artwork_url": "https://i1.sndcdn.com/artworks-x-large.jpg",
            "media": { "transcodings": [
                { "url": "https://api-v2.soundcloud.com/t/1", "format": { "protocol": "hls" } },
                { "url": "https://api-v2.soundcloud.com/t/2", "format": { "protocol": "progressive" } }
            ]}
        });
        let resolved: ResolvedTrack = serde_json::from_value(body).unwrap();
        assert_eq!(resolved.duration, Some(185000));
        let transcodings = resolved.media.unwrap().transcodings;
        let progressive = transcodings
            .iter()
            .find(|t| t.format.protocol == "progressive")
            .unwrap();
        assert!(progressive.url.ends_with("/t/2"));
    }
}
