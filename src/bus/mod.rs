//! Bus de distribución: un productor, N oyentes.
//!
//! Reparte cada chunk MP3 a todos los sinks conectados sin bloquear nunca
//! al productor. El conjunto de sinks vive dentro del estado del motor y se
//! muta bajo el mismo lock que las transiciones de reproducción, así el
//! contador de oyentes siempre es coherente con `paused` y `current`.

pub mod depends;

pub use depends::silence::{pause_flush_block, silence_frame, SILENCE_FRAME};

use bytes::Bytes;
use tokio::sync::mpsc;

/// Cadencia del timer de silencio en reposo.
pub const IDLE_TICK_MS: u64 = 50;

/// Chunks que puede acumular un oyente antes de darlo por muerto.
/// A 128 kbps son varios segundos de audio por detrás del directo.
const SINK_CAPACITY: usize = 256;

/// Canal de escritura hacia la respuesta HTTP de un oyente.
struct ListenerSink {
    id: u64,
    tx: mpsc::Sender<Bytes>,
}

/// Conjunto de oyentes + generador de silencio.
#[derive(Default)]
pub struct FanoutBus {
    sinks: Vec<ListenerSink>,
    next_id: u64,
}

impl FanoutBus {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            next_id: 0,
        }
    }

    /// Registra un oyente nuevo y le escribe un frame de silencio inmediato
    /// para arrancar su decoder antes de que llegue audio real.
    pub fn attach(&mut self) -> (u64, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(SINK_CAPACITY);
        let id = self.next_id;
        self.next_id += 1;
        let _ = tx.try_send(silence_frame());
        self.sinks.push(ListenerSink { id, tx });
        log::info!("🎧 Oyente conectado (id={}, total={})", id, self.sinks.len());
        (id, rx)
    }

    /// Retira un oyente (desconexión del cliente).
    pub fn detach(&mut self, id: u64) {
        let before = self.sinks.len();
        self.sinks.retain(|s| s.id != id);
        if self.sinks.len() != before {
            log::info!("🎧 Oyente desconectado (id={}, total={})", id, self.sinks.len());
        }
    }

    pub fn listeners(&self) -> usize {
        self.sinks.len()
    }

    /// Escribe `chunk` a todos los sinks. Con `paused`, cada chunk saliente
    /// se sustituye por un frame de silencio para que los bytes ya
    /// bufferizados del encoder no suenen.
    pub fn broadcast(&mut self, chunk: Bytes, paused: bool) {
        let payload = if paused { silence_frame() } else { chunk };
        self.write_all(payload);
    }

    /// Un frame de silencio en cada frontera de track, antes de que el
    /// siguiente encoder produzca nada.
    pub fn gap_frame(&mut self) {
        self.write_all(silence_frame());
    }

    /// Tick del timer de reposo: un frame para que los decoders no se
    /// queden sin datos entre tracks.
    pub fn idle_frame(&mut self) {
        self.write_all(silence_frame());
    }

    /// Purga de pausa: ~1 s de silencio de golpe a cada oyente para vaciar
    /// su buffer de audio y que la pausa se oiga al instante.
    pub fn pause_flush(&mut self) {
        self.write_all(pause_flush_block());
    }

    fn write_all(&mut self, payload: Bytes) {
        self.sinks.retain(|sink| match sink.tx.try_send(payload.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("Sink {} cerrado, retirado del bus", sink.id);
                false
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Un oyente con el canal lleno va segundos por detrás:
                // la conexión está muerta aunque el socket no lo sepa aún.
                log::warn!("Sink {} saturado, retirado del bus", sink.id);
                false
            }
        });
    }
}
