//! Estados y configuraciones separados para AppState.
//!
//! Separa las responsabilidades de AppState en structs más pequeños y enfocados.

use std::path::PathBuf;

/// Configuración del servidor HTTP
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Origen permitido para CORS (el frontend)
    pub client_origin: Option<String>,
}

/// Configuración de los fetchers de audio externos
#[derive(Clone, Debug, Default)]
pub struct FetcherConfig {
    /// Sin client id, las URLs de SoundCloud se rechazan con 503
    pub soundcloud_client_id: Option<String>,
    /// Cookies de YouTube en formato de cabecera ("a=b; c=d")
    pub youtube_cookie: Option<String>,
    /// Ruta a un archivo de cookies Netscape ya materializado
    pub youtube_cookie_file: Option<PathBuf>,
    pub youtube_user_agent: Option<String>,
    /// Selector de formato para el fetcher subproceso (yt-dlp -f)
    pub external_fetcher_format: Option<String>,
    /// Nunca lanzar el subproceso fetcher
    pub disable_external_fetcher: bool,
    /// Saltar el cliente en-proceso e ir directo al subproceso
    pub external_fetcher_first: bool,
}

/// Listas de acceso evaluadas por la política
#[derive(Clone, Debug, Default)]
pub struct AccessConfig {
    pub allowed_ids: Vec<String>,
    pub admin_ids: Vec<String>,
}

/// Lee una lista separada por comas desde una variable de entorno.
pub fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Interpreta "1"/"true" como verdadero (mismo criterio que el resto de flags).
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_list_parses_and_trims() {
        std::env::set_var("EMISORA_TEST_LIST", "alice, bob ,,carol");
        assert_eq!(env_list("EMISORA_TEST_LIST"), vec!["alice", "bob", "carol"]);
        std::env::remove_var("EMISORA_TEST_LIST");
        assert!(env_list("EMISORA_TEST_LIST").is_empty());
    }

    #[test]
    fn test_env_flag_variants() {
        std::env::set_var("EMISORA_TEST_FLAG", "TRUE");
        assert!(env_flag("EMISORA_TEST_FLAG"));
        std::env::set_var("EMISORA_TEST_FLAG", "0");
        assert!(!env_flag("EMISORA_TEST_FLAG"));
        std::env::remove_var("EMISORA_TEST_FLAG");
        assert!(!env_flag("EMISORA_TEST_FLAG"));
    }
}
