//! Tipos de error personalizados para Emisora.
//!
//! Proporciona errores estructurados con contexto para mejor debugging
//! y manejo de errores en producción.

use std::fmt;

/// Error principal de la aplicación Emisora
#[derive(Debug)]
pub enum EmisoraError {
    /// Cuerpo o parámetros de la petición inválidos
    BadRequest(String),
    /// Falta identidad de usuario
    Unauthenticated(String),
    /// Usuario identificado pero sin acceso
    Forbidden(String),
    /// Recurso inexistente (track fuera de la cola, miniatura ausente)
    NotFound(String),
    /// URL que no es ni video ni track reconocible
    UnsupportedUrl(String),
    /// Función apagada por configuración (p.ej. SoundCloud sin client id)
    FeatureDisabled(String),
    /// Fallo de un servicio externo (resolución, streams, miniaturas)
    UpstreamFailure(String),
    /// Un fetcher o el encoder excedió su timeout de arranque
    Timeout(String),
    /// Errores de I/O
    Io(std::io::Error),
    /// Errores genéricos
    Internal(String),
}

impl fmt::Display for EmisoraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmisoraError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            EmisoraError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            EmisoraError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            EmisoraError::NotFound(msg) => write!(f, "Not found: {}", msg),
            EmisoraError::UnsupportedUrl(msg) => write!(f, "Unsupported URL: {}", msg),
            EmisoraError::FeatureDisabled(msg) => write!(f, "Feature disabled: {}", msg),
            EmisoraError::UpstreamFailure(msg) => write!(f, "Upstream failure: {}", msg),
            EmisoraError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            EmisoraError::Io(err) => write!(f, "IO error: {}", err),
            EmisoraError::Internal(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for EmisoraError {}

impl From<std::io::Error> for EmisoraError {
    fn from(err: std::io::Error) -> Self {
        EmisoraError::Io(err)
    }
}

impl From<reqwest::Error> for EmisoraError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmisoraError::Timeout(format!("HTTP request timed out: {}", err))
        } else {
            EmisoraError::UpstreamFailure(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EmisoraError {
    fn from(err: serde_json::Error) -> Self {
        EmisoraError::Internal(format!("JSON error: {}", err))
    }
}

impl From<&str> for EmisoraError {
    fn from(err: &str) -> Self {
        EmisoraError::Internal(err.to_string())
    }
}

impl From<String> for EmisoraError {
    fn from(err: String) -> Self {
        EmisoraError::Internal(err)
    }
}

impl axum::response::IntoResponse for EmisoraError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            EmisoraError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EmisoraError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            EmisoraError::Forbidden(_) => StatusCode::FORBIDDEN,
            EmisoraError::NotFound(_) => StatusCode::NOT_FOUND,
            EmisoraError::UnsupportedUrl(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EmisoraError::FeatureDisabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            EmisoraError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            EmisoraError::Timeout(_) | EmisoraError::Io(_) | EmisoraError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        axum::response::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(
                serde_json::json!({ "error": self.to_string() }).to_string(),
            ))
            .unwrap()
    }
}

/// Result type alias para simplificar el código
pub type Result<T> = std::result::Result<T, EmisoraError>;
