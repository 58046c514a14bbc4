//! Cola de reproducción compartida.
//!
//! Secuencia ordenada en memoria de tracks pendientes. El track que suena
//! ahora mismo NO vive en la cola: `dequeue` transfiere la propiedad al
//! motor de emisión al empezar a reproducir.

use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// Fuente de la que proviene un track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    Youtube,
    Soundcloud,
}

/// Quién pidió el track.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Un track encolado o en reproducción.
///
/// Tras el enqueue sólo muta `started_at`, y una única vez: el instante
/// (epoch ms) en que el encoder emitió su primer frame MP3.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    pub source: TrackSource,
    pub requested_by: Requester,
}

/// Datos de un track antes de asignarle identidad.
#[derive(Clone, Debug)]
pub struct TrackPayload {
    pub title: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub duration: Option<u64>,
    pub source: TrackSource,
    pub requested_by: Requester,
}

/// Cola FIFO mutable con operaciones por id.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Asigna un id fresco y añade al final. Devuelve una copia del track.
    pub fn enqueue(&mut self, payload: TrackPayload) -> Track {
        let track = Track {
            id: Uuid::new_v4().to_string(),
            title: payload.title,
            url: payload.url,
            thumbnail: payload.thumbnail,
            duration: payload.duration,
            started_at: None,
            source: payload.source,
            requested_by: payload.requested_by,
        };
        self.items.push_back(track.clone());
        track
    }

    /// Retira y devuelve la cabeza de la cola.
    pub fn dequeue(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Copia estable del contenido, en orden.
    pub fn snapshot(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    /// Elimina por id. `false` si no está en la cola.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|t| t.id != id);
        self.items.len() != before
    }

    /// Mueve un track a `new_index`, recortado a `[0, len-1]`.
    /// `false` si el id no está.
    pub fn move_to(&mut self, id: &str, new_index: isize) -> bool {
        let Some(pos) = self.items.iter().position(|t| t.id == id) else {
            return false;
        };
        let track = self.items.remove(pos).unwrap();
        let last = self.items.len(); // tras el remove, insertar en len == final
        let dest = new_index.clamp(0, last as isize) as usize;
        self.items.insert(dest, track);
        true
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn peek(&self) -> Option<&Track> {
        self.items.front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn payload(title: &str) -> TrackPayload {
        TrackPayload {
            title: title.to_string(),
            url: format!("https://youtu.be/{}", title),
            thumbnail: None,
            duration: Some(180),
            source: TrackSource::Youtube,
            requested_by: Requester {
                id: "u1".into(),
                display_name: "Usuario Uno".into(),
                avatar: None,
            },
        }
    }

    #[test]
    fn test_enqueue_assigns_unique_ids() {
        let mut q = TrackQueue::new();
        let mut seen = HashSet::new();
        for i in 0..100 {
            let t = q.enqueue(payload(&format!("t{}", i)));
            assert!(seen.insert(t.id.clone()), "id repetido: {}", t.id);
        }
        assert_eq!(q.size(), 100);
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let mut q = TrackQueue::new();
        q.enqueue(payload("a"));
        q.enqueue(payload("b"));
        assert_eq!(q.dequeue().unwrap().title, "a");
        assert_eq!(q.dequeue().unwrap().title, "b");
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn test_remove_by_id() {
        let mut q = TrackQueue::new();
        let a = q.enqueue(payload("a"));
        q.enqueue(payload("b"));
        assert!(q.remove(&a.id));
        assert!(!q.remove(&a.id));
        assert_eq!(q.size(), 1);
        assert_eq!(q.peek().unwrap().title, "b");
    }

    #[test]
    fn test_move_clamps_negative_to_front() {
        let mut q = TrackQueue::new();
        q.enqueue(payload("a"));
        q.enqueue(payload("b"));
        let c = q.enqueue(payload("c"));
        assert!(q.move_to(&c.id, -5));
        let titles: Vec<_> = q.snapshot().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_move_clamps_overflow_to_back() {
        let mut q = TrackQueue::new();
        let a = q.enqueue(payload("a"));
        q.enqueue(payload("b"));
        q.enqueue(payload("c"));
        assert!(q.move_to(&a.id, 99));
        let titles: Vec<_> = q.snapshot().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_move_to_middle() {
        let mut q = TrackQueue::new();
        q.enqueue(payload("a"));
        q.enqueue(payload("b"));
        let c = q.enqueue(payload("c"));
        assert!(q.move_to(&c.id, 1));
        let titles: Vec<_> = q.snapshot().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_move_missing_id() {
        let mut q = TrackQueue::new();
        q.enqueue(payload("a"));
        assert!(!q.move_to("no-such-id", 0));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut q = TrackQueue::new();
        q.enqueue(payload("a"));
        let snap = q.snapshot();
        q.dequeue();
        assert_eq!(snap.len(), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn test_track_wire_shape() {
        let mut q = TrackQueue::new();
        let t = q.enqueue(payload("a"));
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["source"], "youtube");
        assert_eq!(v["requestedBy"]["displayName"], "Usuario Uno");
        // Opcionales ausentes no se serializan
        assert!(v.get("startedAt").is_none());
        assert!(v.get("thumbnail").is_none());
    }
}
