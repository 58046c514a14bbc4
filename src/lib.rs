pub mod api;
pub mod auth;
pub mod bus;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod queue;
pub mod state;
pub mod status;
pub mod stream;
pub mod thumbs;

use crate::auth::AccessPolicy;
use crate::engine::Engine;
use std::sync::Arc;

/// Estado compartido de la aplicación: una instancia del motor por
/// proceso, construida en main y pasada a todos los handlers.
pub struct AppState {
    pub engine: Arc<Engine>,
    pub access: AccessPolicy,
    pub http: reqwest::Client,
}
