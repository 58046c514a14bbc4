//! Estado observable de la emisión.
//!
//! Derivación pura de los campos internos del motor al snapshot que
//! consume el endpoint de estado y el render de progreso de los clientes.

use crate::engine::EngineState;
use crate::queue::Track;
use crate::AppState;
use axum::{extract::State, response::Json};
use serde::Serialize;
use std::sync::Arc;

/// Forma de cable del estado: `{ current, queue, listeners, paused }`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamState {
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub listeners: usize,
    pub paused: bool,
}

/// Construye el snapshot desde el estado del motor, ya bajo su lock.
///
/// `current` es el track sonando (con `started_at` ajustado por pausa), o
/// el último sonado si estamos entre tracks, o null con la cola drenada.
/// El ajuste usa sólo la pausa consolidada: durante una pausa en curso el
/// valor reportado no se mueve, y la barra de progreso del cliente queda
/// clavada exactamente en el punto de pausa.
pub fn derive_snapshot(st: &EngineState) -> StreamState {
    let current = st
        .current
        .clone()
        .or_else(|| st.last_played.clone())
        .map(|mut track| {
            if let Some(started) = track.started_at {
                track.started_at = Some(started + st.total_paused_ms);
            }
            track
        });

    StreamState {
        current,
        queue: st.queue.snapshot(),
        listeners: st.bus.listeners(),
        paused: st.paused,
    }
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StreamState> {
    Json(state.engine.snapshot().await)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlaybackStatus;
    use crate::queue::{Requester, TrackSource};

    fn track(title: &str, started_at: Option<i64>) -> Track {
        Track {
            id: title.to_string(),
            title: title.to_string(),
            url: format!("https://youtu.be/{}", title),
            thumbnail: None,
            duration: Some(120),
            started_at,
            source: TrackSource::Youtube,
            requested_by: Requester {
                id: "u".into(),
                display_name: "U".into(),
                avatar: None,
            },
        }
    }

    #[test]
    fn test_snapshot_adjusts_started_at() {
        let mut st = EngineState::new();
        st.status = PlaybackStatus::Playing;
        st.current = Some(track("a", Some(1_000_000)));
        st.total_paused_ms = 30_000;
        let snap = derive_snapshot(&st);
        assert_eq!(snap.current.unwrap().started_at, Some(1_030_000));
    }

    #[test]
    fn test_snapshot_falls_back_to_last_played() {
        let mut st = EngineState::new();
        st.last_played = Some(track("anterior", Some(5)));
        let snap = derive_snapshot(&st);
        assert_eq!(snap.current.unwrap().title, "anterior");
    }

    #[test]
    fn test_snapshot_null_when_drained() {
        let st = EngineState::new();
        let snap = derive_snapshot(&st);
        assert!(snap.current.is_none());
        assert!(snap.queue.is_empty());
        assert_eq!(snap.listeners, 0);
        assert!(!snap.paused);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let mut st = EngineState::new();
        st.current = Some(track("a", Some(99)));
        st.paused = true;
        let v = serde_json::to_value(derive_snapshot(&st)).unwrap();
        assert_eq!(v["paused"], true);
        assert_eq!(v["current"]["startedAt"], 99);
        assert!(v["listeners"].is_number());
    }
}
