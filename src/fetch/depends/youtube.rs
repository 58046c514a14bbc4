//! Fetcher de YouTube.
//!
//! Dos estrategias: un cliente en-proceso rápido (rusty_ytdl) y un
//! subproceso yt-dlp más lento pero más robusto. Por defecto se intenta el
//! cliente en-proceso con 5 s de margen de arranque y se cae al subproceso
//! con 90 s (el ensamblado de fragmentos HLS puede tardar).

use crate::error::{EmisoraError, Result};
use crate::fetch::{AudioInput, FetchedAudio, TrackMetadata};
use crate::state::FetcherConfig;
use rusty_ytdl::{RequestOptions, Video, VideoOptions, VideoQuality, VideoSearchOptions};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use url::Url;

/// Margen de arranque del cliente en-proceso.
const IN_PROCESS_START_TIMEOUT: Duration = Duration::from_secs(5);
/// Margen de arranque del subproceso fetcher.
const SUBPROCESS_START_TIMEOUT: Duration = Duration::from_secs(90);
/// Selector de formato por defecto: audio directo, evitando HLS.
const DEFAULT_EXTERNAL_FORMAT: &str = "bestaudio[protocol!*=m3u8]/bestaudio/best";

/// Parámetros de query que codifican marca de tiempo y se eliminan para
/// que la reproducción siempre empiece en 0.
const TIMESTAMP_PARAMS: [&str; 4] = ["t", "start", "time_continue", "timestamp"];

pub fn is_youtube_host(host: &str) -> bool {
    const HOSTS: [&str; 3] = ["youtube.com", "youtu.be", "music.youtube.com"];
    HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
}

/// Normaliza una URL de YouTube: quita los parámetros de timestamp y el
/// fragmento si codifica uno. Las URLs de otros hosts pasan sin tocar.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let Some(host) = url.host_str() else {
        return raw.to_string();
    };
    if !is_youtube_host(host) {
        return raw.to_string();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TIMESTAMP_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    if let Some(frag) = url.fragment() {
        if frag.starts_with("t=") || frag.starts_with("time_continue=") {
            url.set_fragment(None);
        }
    }

    url.to_string()
}

fn video_options(cfg: &FetcherConfig) -> VideoOptions {
    VideoOptions {
        quality: VideoQuality::HighestAudio,
        filter: VideoSearchOptions::Audio,
        request_options: RequestOptions {
            cookies: cfg.youtube_cookie.clone(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Política primario/fallback gobernada por la configuración.
pub async fn fetch(url: &str, cfg: &FetcherConfig) -> Result<FetchedAudio> {
    if cfg.external_fetcher_first {
        if cfg.disable_external_fetcher {
            return Err(EmisoraError::Internal(
                "configuración contradictoria: externalFetcherFirst con el fetcher externo apagado"
                    .into(),
            ));
        }
        return fetch_subprocess(url, cfg).await;
    }

    match fetch_in_process(url, cfg).await {
        Ok(fetched) => Ok(fetched),
        Err(err) if !cfg.disable_external_fetcher => {
            log::warn!(
                "Cliente en-proceso falló ({}), probando el subproceso fetcher",
                err
            );
            fetch_subprocess(url, cfg).await
        }
        Err(err) => Err(err),
    }
}

/// Cliente en-proceso: arrancado cuando su primer chunk está disponible.
async fn fetch_in_process(url: &str, cfg: &FetcherConfig) -> Result<FetchedAudio> {
    let video = Video::new_with_options(url, video_options(cfg))
        .map_err(|e| EmisoraError::UpstreamFailure(format!("video no resoluble: {}", e)))?;
    let stream = video
        .stream()
        .await
        .map_err(|e| EmisoraError::UpstreamFailure(format!("sin stream de audio: {}", e)))?;

    let first = tokio::time::timeout(IN_PROCESS_START_TIMEOUT, stream.chunk())
        .await
        .map_err(|_| EmisoraError::Timeout("cliente en-proceso no arrancó en 5 s".into()))?
        .map_err(|e| EmisoraError::UpstreamFailure(format!("stream de audio roto: {}", e)))?
        .ok_or_else(|| EmisoraError::UpstreamFailure("stream de audio vacío".into()))?;

    // Puente chunk-pull → AsyncRead para el pipe de entrada del encoder
    let (tx, rx) = mpsc::channel::<std::io::Result<bytes::Bytes>>(8);
    let _ = tx.try_send(Ok(first));
    tokio::spawn(async move {
        loop {
            match stream.chunk().await {
                Ok(Some(chunk)) => {
                    if tx.send(Ok(chunk)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx
                        .send(Err(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            e.to_string(),
                        )))
                        .await;
                    break;
                }
            }
        }
    });

    Ok(FetchedAudio {
        input: AudioInput::Stream(Box::new(StreamReader::new(ReceiverStream::new(rx)))),
        fetcher: None,
    })
}

/// Subproceso yt-dlp: arrancado cuando aparece el primer byte en stdout.
/// También es el fallback genérico para SoundCloud cuando la resolución
/// por api-v2 falla.
pub(crate) async fn fetch_subprocess(url: &str, cfg: &FetcherConfig) -> Result<FetchedAudio> {
    let mut cmd = Command::new("yt-dlp");
    cmd.arg("-o")
        .arg("-")
        .arg("--no-warnings")
        .arg("--no-progress")
        .arg("--no-playlist")
        .arg("-f")
        .arg(
            cfg.external_fetcher_format
                .as_deref()
                .unwrap_or(DEFAULT_EXTERNAL_FORMAT),
        );
    if let Some(ua) = &cfg.youtube_user_agent {
        cmd.arg("--user-agent").arg(ua);
    }
    if let Some(cookies) = super::cookies::cookie_file(cfg) {
        cmd.arg("--cookies").arg(cookies);
    }
    cmd.arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| EmisoraError::Internal(format!("no se pudo lanzar yt-dlp: {}", e)))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| EmisoraError::Internal("yt-dlp sin stdout".into()))?;

    let mut first = vec![0u8; 16 * 1024];
    let n = match tokio::time::timeout(SUBPROCESS_START_TIMEOUT, stdout.read(&mut first)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            let _ = child.start_kill();
            return Err(EmisoraError::Io(e));
        }
        Err(_) => {
            let _ = child.start_kill();
            return Err(EmisoraError::Timeout(
                "el subproceso fetcher no arrancó en 90 s".into(),
            ));
        }
    };
    if n == 0 {
        let _ = child.start_kill();
        return Err(EmisoraError::UpstreamFailure(
            "el subproceso fetcher no produjo audio".into(),
        ));
    }
    first.truncate(n);

    let reader = std::io::Cursor::new(first).chain(stdout);
    Ok(FetchedAudio {
        input: AudioInput::Stream(Box::new(reader)),
        fetcher: Some(child),
    })
}

/// Metadatos vía el cliente en-proceso. El fallo se propaga: el enqueue
/// responde con error y el track no entra en la cola.
pub async fn metadata(url: &str, cfg: &FetcherConfig) -> Result<TrackMetadata> {
    let video = Video::new_with_options(url, video_options(cfg))
        .map_err(|e| EmisoraError::UpstreamFailure(format!("video no resoluble: {}", e)))?;
    let info = video
        .get_basic_info()
        .await
        .map_err(|e| EmisoraError::UpstreamFailure(format!("sin metadatos: {}", e)))?;
    let details = info.video_details;
    Ok(TrackMetadata {
        title: details.title,
        duration: details.length_seconds.parse().ok(),
        thumbnail: details.thumbnails.last().map(|t| t.url.clone()),
    })
}
