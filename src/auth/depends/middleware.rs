//! Middleware de acceso para los verbos autenticados.
//!
//! La federación OpenID vive fuera: el proveedor de identidad (proxy
//! inverso) ya verificó al usuario y nos lo entrega en cabeceras. Aquí
//! sólo se exige que la identidad exista y que la política la apruebe.

use crate::auth::user_from_headers;
use crate::error::EmisoraError;
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub async fn require_access_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(user) = user_from_headers(req.headers(), &state.access) else {
        return EmisoraError::Unauthenticated("identidad ausente".into()).into_response();
    };
    if !state.access.can_queue(&user.id) {
        log::warn!("Acceso denegado a {} ({})", user.display_name, user.id);
        return EmisoraError::Forbidden("usuario fuera de la lista de acceso".into())
            .into_response();
    }
    req.extensions_mut().insert(user);
    next.run(req).await
}
