use axum::body::Body;
use axum::{
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use dotenvy::dotenv;
use std::{env, net::SocketAddr, path::PathBuf, sync::Arc, time::Instant};
use tower_http::cors::CorsLayer;

use emisora::{
    api, auth, engine::Engine, state, status, stream, thumbs, AppState,
};

use auth::{require_access_middleware, AccessPolicy};
use log::{info, warn};
use state::{env_flag, env_list, AccessConfig, FetcherConfig, ServerConfig};

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();
    info!("→ {} {}", method, uri);

    let response = next.run(req).await;
    let status = response.status();
    let elapsed = started.elapsed();
    info!(
        "← {} {} {} ({} ms)",
        method,
        uri,
        status.as_u16(),
        elapsed.as_millis()
    );

    response
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    simplelog::SimpleLogger::init(log::LevelFilter::Info, simplelog::Config::default()).unwrap();

    let server_cfg = ServerConfig {
        listen_addr: env::var("RADIO_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        client_origin: env::var("RADIO_CLIENT_ORIGIN").ok(),
    };

    let fetcher_cfg = FetcherConfig {
        soundcloud_client_id: env::var("RADIO_SOUNDCLOUD_CLIENT_ID").ok(),
        youtube_cookie: env::var("RADIO_YOUTUBE_COOKIE").ok(),
        youtube_cookie_file: env::var("RADIO_YOUTUBE_COOKIE_FILE").ok().map(PathBuf::from),
        youtube_user_agent: env::var("RADIO_YOUTUBE_USER_AGENT").ok(),
        external_fetcher_format: env::var("RADIO_EXTERNAL_FETCHER_FORMAT").ok(),
        disable_external_fetcher: env_flag("RADIO_DISABLE_EXTERNAL_FETCHER"),
        external_fetcher_first: env_flag("RADIO_EXTERNAL_FETCHER_FIRST"),
    };

    let access_cfg = AccessConfig {
        allowed_ids: env_list("RADIO_ALLOWED_IDS"),
        admin_ids: env_list("RADIO_ADMIN_IDS"),
    };

    if fetcher_cfg.soundcloud_client_id.is_none() {
        warn!("Sin RADIO_SOUNDCLOUD_CLIENT_ID: las URLs de SoundCloud se rechazarán con 503");
    }

    let http = reqwest::Client::builder().build()?;

    let (engine, engine_events) = Engine::new(fetcher_cfg, http.clone());
    tokio::spawn(Arc::clone(&engine).run(engine_events));
    tokio::spawn(Arc::clone(&engine).run_idle_ticker());

    let state = Arc::new(AppState {
        engine: Arc::clone(&engine),
        access: AccessPolicy::new(&access_cfg),
        http,
    });

    // Configuración de CORS: el origen del frontend, con credenciales
    let cors = match &server_cfg.client_origin {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(origin) => CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::PATCH])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]),
            Err(_) => {
                warn!("RADIO_CLIENT_ORIGIN inválido, CORS permisivo");
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    };

    // Router PÚBLICO: estado, stream de audio y miniaturas
    let public_routes = Router::new()
        .route("/health", get(status::health))
        .route("/api/status", get(status::get_status))
        .route("/api/me", get(api::me))
        .route("/stream", get(stream::stream_audio_handler))
        .route("/youtube/thumbnail.png", get(thumbs::youtube_thumbnail))
        .route("/soundcloud/thumbnail.png", get(thumbs::soundcloud_thumbnail));

    // Router PROTEGIDO: verbos de la cola, tras la política de acceso
    let authed_routes = Router::new()
        .route("/api/queue", post(api::enqueue_track))
        .route(
            "/api/queue/:id",
            delete(api::remove_track).patch(api::move_track),
        )
        .route("/api/pause", post(api::set_paused))
        .route("/api/skip", post(api::skip_track))
        .layer(from_fn_with_state(state.clone(), require_access_middleware));

    let app = public_routes
        .merge(authed_routes)
        .layer(from_fn(log_requests))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = server_cfg.listen_addr.parse()?;
    info!("📻 Emisora escuchando en http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Señal de apagado recibida, parando el servidor...");
        })
        .await?;

    // No dejar un ffmpeg huérfano codificando a la nada
    engine.shutdown().await;
    info!("Servidor apagado limpiamente");
    Ok(())
}
