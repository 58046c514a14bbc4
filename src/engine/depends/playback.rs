//! Estado interno del motor de emisión.
//!
//! Todo el estado mutable (cola, reproducción, contabilidad de pausa,
//! oyentes, caché de miniaturas) vive junto bajo un único lock: los
//! invariantes cruzan campos y un lock por campo los rompería.

use crate::bus::FanoutBus;
use crate::encoder::EncoderPipeline;
use crate::queue::{Track, TrackQueue, TrackSource};
use bytes::Bytes;
use std::time::Duration;

/// Estado etiquetado de la máquina de reproducción. La pausa no es un
/// estado aparte sino un flag sobre `Playing`: el snapshot sólo necesita
/// el booleano y las transiciones lo tratan así.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Sin track; el timer de reposo alimenta a los oyentes
    Idle,
    /// Track retirado de la cola, fetcher/encoder arrancando
    Starting,
    /// El encoder emite frames
    Playing,
    /// Ventana de enfriamiento tras un skip
    Skipping,
}

/// Avance tras el `end` normal del encoder.
pub const ADVANCE_AFTER_END: Duration = Duration::from_millis(100);
/// Avance tras un fallo de fetch (da aire al upstream).
pub const ADVANCE_AFTER_FETCH_FAILURE: Duration = Duration::from_secs(1);
/// Enfriamiento del skip: absorbe los eventos del encoder moribundo.
pub const SKIP_COOLDOWN: Duration = Duration::from_millis(150);
/// Si el encoder no produce nada en este margen, el track está atascado.
pub const ENCODER_START_TIMEOUT: Duration = Duration::from_secs(30);

/// Mensajes hacia el bucle serial del motor. Cada uno lleva la generación
/// del pipeline que lo produjo; el bucle descarta los rezagados.
#[derive(Debug)]
pub struct EngineEvent {
    pub generation: u64,
    pub kind: EngineEventKind,
}

#[derive(Debug)]
pub enum EngineEventKind {
    /// Un chunk MP3 del encoder
    EncoderData(Bytes),
    /// stdout del encoder cerrado: fin de track
    EncoderEnd,
    /// El encoder murió con error
    EncoderError(String),
    /// Ningún fetcher consiguió audio para el track
    FetchFailed(String),
    /// 30 s sin primer byte: pipeline atascado
    StartTimeout,
    /// Timer de avance: intentar reproducir el siguiente
    Advance,
}

/// Caché de miniaturas por fuente para el proxy de imágenes. Al empezar
/// un track se registra su miniatura y se limpia la de la otra fuente.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    youtube: Option<String>,
    soundcloud: Option<String>,
}

impl ThumbnailCache {
    pub fn record(&mut self, source: TrackSource, url: Option<String>) {
        match source {
            TrackSource::Youtube => {
                self.youtube = url;
                self.soundcloud = None;
            }
            TrackSource::Soundcloud => {
                self.soundcloud = url;
                self.youtube = None;
            }
        }
    }

    pub fn get(&self, source: TrackSource) -> Option<&str> {
        match source {
            TrackSource::Youtube => self.youtube.as_deref(),
            TrackSource::Soundcloud => self.soundcloud.as_deref(),
        }
    }
}

/// Todos los campos mutables del motor, bajo el lock del motor.
pub struct EngineState {
    pub queue: TrackQueue,
    pub status: PlaybackStatus,
    pub paused: bool,
    pub current: Option<Track>,
    /// Último track sonado, visible entre tracks; se limpia al vaciarse la cola
    pub last_played: Option<Track>,
    /// Momento (epoch ms) de la pausa en curso
    pub paused_at: Option<i64>,
    /// Pausa acumulada y consolidada en reanudaciones
    pub total_paused_ms: i64,
    /// Generación del pipeline vigente; los eventos de otras se descartan
    pub generation: u64,
    pub pipeline: Option<EncoderPipeline>,
    pub bus: FanoutBus,
    pub thumbnails: ThumbnailCache,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            queue: TrackQueue::new(),
            status: PlaybackStatus::Idle,
            paused: false,
            current: None,
            last_played: None,
            paused_at: None,
            total_paused_ms: 0,
            generation: 0,
            pipeline: None,
            bus: FanoutBus::new(),
            thumbnails: ThumbnailCache::default(),
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_cache_clears_other_source() {
        let mut cache = ThumbnailCache::default();
        cache.record(TrackSource::Youtube, Some("https://i.ytimg.com/x.jpg".into()));
        assert_eq!(cache.get(TrackSource::Youtube), Some("https://i.ytimg.com/x.jpg"));
        assert_eq!(cache.get(TrackSource::Soundcloud), None);

        cache.record(
            TrackSource::Soundcloud,
            Some("https://i1.sndcdn.com/y.jpg".into()),
        );
        assert_eq!(cache.get(TrackSource::Youtube), None);
        assert_eq!(cache.get(TrackSource::Soundcloud), Some("https://i1.sndcdn.com/y.jpg"));
    }
}
