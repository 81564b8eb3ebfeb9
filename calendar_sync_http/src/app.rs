use axum::http::{Method, StatusCode};
use log::debug;
use stack_string::format_sstr;
use std::{convert::TryInto, net::SocketAddr};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use calendar_sync_lib::{
    calendar_sync::{CalendarSync, PgCalendarSync},
    config::Config,
    pgpool::PgPool,
};

use crate::{
    errors::ServiceError as Error,
    routes::{ApiDoc, get_calendar_path},
};

#[derive(Clone)]
pub struct AppState {
    pub cal_sync: PgCalendarSync,
}

/// # Errors
/// Returns error if `init_config` or the server fails
pub async fn start_app() -> Result<(), Error> {
    let config = Config::init_config()?;
    run_app(&config).await
}

async fn run_app(config: &Config) -> Result<(), Error> {
    let pool = PgPool::new(&config.database_url, config.n_db_workers)?;
    let app = AppState {
        cal_sync: CalendarSync::new(config.clone(), pool),
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(["content-type".try_into()?])
        .allow_origin(Any);

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(get_calendar_path(&app))
        .split_for_parts();

    let spec_json = serde_json::to_string_pretty(&api)?;

    let router = router
        .route(
            "/api/openapi/json",
            axum::routing::get(|| async move {
                (
                    StatusCode::OK,
                    [("content-type", "application/json")],
                    spec_json,
                )
            }),
        )
        .layer(cors);

    let host = &config.host;
    let port = config.port;

    let addr: SocketAddr = format_sstr!("{host}:{port}").parse()?;
    debug!("{addr:?}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(Into::into)
}
