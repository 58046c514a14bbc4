//! Identidad y acceso para Emisora.
//!
//! El proveedor de identidad externo termina la sesión OpenID y reenvía
//! la identidad verificada en cabeceras; este módulo las interpreta y
//! aplica la política de listas.

pub mod depends;

pub use depends::middleware::require_access_middleware;
pub use depends::policy::AccessPolicy;

use axum::http::HeaderMap;
use serde::Serialize;

/// Cabeceras que inyecta el proxy de identidad.
pub const USER_ID_HEADER: &str = "x-radio-user-id";
pub const USER_NAME_HEADER: &str = "x-radio-user-name";
pub const USER_AVATAR_HEADER: &str = "x-radio-user-avatar";

/// Usuario ya verificado aguas arriba.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioUser {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub admin: bool,
}

/// Extrae la identidad de las cabeceras del proxy. `None` si no hay
/// usuario (petición anónima).
pub fn user_from_headers(headers: &HeaderMap, policy: &AccessPolicy) -> Option<RadioUser> {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let id = header_str(USER_ID_HEADER)?;
    let display_name = header_str(USER_NAME_HEADER).unwrap_or_else(|| id.clone());
    Some(RadioUser {
        admin: policy.is_admin(&id),
        id,
        display_name,
        avatar: header_str(USER_AVATAR_HEADER),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_anonymous_without_id_header() {
        let headers = HeaderMap::new();
        assert!(user_from_headers(&headers, &AccessPolicy::default()).is_none());
    }

    #[test]
    fn test_user_from_headers_full() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("alice"));
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Alice"));
        headers.insert(
            USER_AVATAR_HEADER,
            HeaderValue::from_static("https://example.com/a.png"),
        );
        let user = user_from_headers(&headers, &AccessPolicy::default()).unwrap();
        assert_eq!(user.id, "alice");
        assert_eq!(user.display_name, "Alice");
        assert_eq!(user.avatar.as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("bob"));
        let user = user_from_headers(&headers, &AccessPolicy::default()).unwrap();
        assert_eq!(user.display_name, "bob");
        assert!(user.avatar.is_none());
    }
}
