//! Materialización de cookies de YouTube.
//!
//! El subproceso fetcher necesita las cookies en un archivo con formato
//! Netscape. Se escribe una sola vez bajo el directorio temporal del
//! proceso y la ruta queda cacheada durante toda la vida del servidor.

use crate::state::FetcherConfig;
use std::path::PathBuf;
use std::sync::OnceLock;

static COOKIE_FILE: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Ruta al archivo de cookies para el subproceso, o `None` si no hay
/// cookies configuradas (o su escritura falló, que se loguea y se sigue
/// sin cookies).
pub fn cookie_file(cfg: &FetcherConfig) -> Option<PathBuf> {
    if let Some(path) = &cfg.youtube_cookie_file {
        return Some(path.clone());
    }
    let header = cfg.youtube_cookie.clone()?;
    COOKIE_FILE
        .get_or_init(|| match materialize(&header) {
            Ok(path) => {
                log::info!("🍪 Cookies de YouTube materializadas en {}", path.display());
                Some(path)
            }
            Err(err) => {
                log::error!("No se pudo escribir el archivo de cookies: {}", err);
                None
            }
        })
        .clone()
}

fn materialize(header: &str) -> std::io::Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("emisora-{}-cookies.txt", std::process::id()));
    let mut body = String::from("# Netscape HTTP Cookie File\n");
    for (name, value) in parse_cookie_header(header) {
        body.push_str(&format!(
            ".youtube.com\tTRUE\t/\tTRUE\t0\t{}\t{}\n",
            name, value
        ));
    }
    std::fs::write(&path, body)?;
    Ok(path)
}

/// Trocea "a=b; c=d" en pares nombre/valor.
fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
