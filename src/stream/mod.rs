//! Conexión de oyentes al stream.
//!
//! Cada GET /stream crea un sink ligado al cuerpo de la respuesta, lo
//! registra en el bus y lo retira cuando el cliente se desconecta. El
//! servidor nunca cierra el cuerpo mientras el cliente siga conectado.

use crate::engine::Engine;
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Retira el sink del bus cuando el cuerpo de la respuesta muere con la
/// conexión, para que el contador de oyentes no se quede inflado.
struct DetachGuard {
    engine: Arc<Engine>,
    id: u64,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        let engine = Arc::clone(&self.engine);
        let id = self.id;
        tokio::spawn(async move {
            engine.detach_listener(id).await;
        });
    }
}

#[axum::debug_handler]
pub async fn stream_audio_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (id, mut rx) = state.engine.attach_listener().await;
    let guard = DetachGuard {
        engine: Arc::clone(&state.engine),
        id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(chunk) = rx.recv().await {
            yield Ok::<_, std::io::Error>(chunk);
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::CACHE_CONTROL, "no-store")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .unwrap()
}
