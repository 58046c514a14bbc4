//! Resolución de fuentes de audio.
//!
//! Convierte la URL de un track en un `AudioInput` que el encoder puede
//! consumir: o bien un stream de bytes de audio comprimido, o bien una URL
//! con cabeceras que el propio encoder abre (streams HLS).

pub mod depends;

use crate::error::{EmisoraError, Result};
use crate::queue::TrackSource;
use crate::state::FetcherConfig;
use tokio::io::AsyncRead;
use tokio::process::Child;
use url::Url;

/// Entrada de audio para el encoder: suma de las dos formas que existen.
pub enum AudioInput {
    /// Bytes de audio comprimido que el encoder lee por su pipe de entrada.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    /// URL remota que el encoder abre por sí mismo.
    Remote {
        url: String,
        headers: Vec<(String, String)>,
        /// Activa la allowlist de protocolos TLS/HTTP/file/crypto del encoder
        hls: bool,
    },
}

/// Resultado de un fetch: la entrada más el subproceso fetcher (si lo hay)
/// que habrá que matar al destruir el pipeline.
pub struct FetchedAudio {
    pub input: AudioInput,
    pub fetcher: Option<Child>,
}

/// Metadatos mínimos de un track, resueltos en el momento del enqueue.
#[derive(Clone, Debug)]
pub struct TrackMetadata {
    pub title: String,
    pub duration: Option<u64>,
    pub thumbnail: Option<String>,
}

/// Clasifica una URL por su host. `None` si no es de ninguna fuente conocida.
pub fn classify_url(raw: &str) -> Option<TrackSource> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    if depends::youtube::is_youtube_host(host) {
        Some(TrackSource::Youtube)
    } else if depends::soundcloud::is_soundcloud_host(host) {
        Some(TrackSource::Soundcloud)
    } else {
        None
    }
}

/// Resuelve la URL de un track en audio, según la política por fuente.
pub async fn resolve_input(
    source: TrackSource,
    url: &str,
    cfg: &FetcherConfig,
    http: &reqwest::Client,
) -> Result<FetchedAudio> {
    match source {
        TrackSource::Youtube => depends::youtube::fetch(url, cfg).await,
        TrackSource::Soundcloud => depends::soundcloud::fetch(url, cfg, http).await,
    }
}

/// Busca título, duración y miniatura para la URL. Un fallo aquí se
/// propaga al cliente HTTP: ningún track parcial entra en la cola.
pub async fn resolve_metadata(
    source: TrackSource,
    url: &str,
    cfg: &FetcherConfig,
    http: &reqwest::Client,
) -> Result<TrackMetadata> {
    match source {
        TrackSource::Youtube => depends::youtube::metadata(url, cfg).await,
        TrackSource::Soundcloud => {
            let client_id = cfg
                .soundcloud_client_id
                .as_deref()
                .ok_or_else(|| EmisoraError::FeatureDisabled("SoundCloud sin client id".into()))?;
            depends::soundcloud::metadata(url, client_id, http).await
        }
    }
}
