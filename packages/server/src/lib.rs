#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the micro-zone indicators.
//!
//! The exported indicator table is loaded and scored once at start-up and
//! shared read-only by every worker. Routes live under `/api`.

mod handlers;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use microzone_query::{MicrozoneTable, QueryError, load_criteria};
use microzone_query_models::{CriticalityCriteria, DEFAULT_LIMIT, MAX_LIMIT};

/// Shared application state.
pub struct AppState {
    /// Scored indicator table.
    pub table: MicrozoneTable,
    /// Page size used when a request does not set `limit`.
    pub default_limit: usize,
}

/// Errors that can stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The criteria file or the indicator table could not be loaded.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Binding or running the HTTP server failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Server settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `MICROZONE_CSV`
    pub table_path: PathBuf,
    /// `MICROZONE_CRITERIA`
    pub criteria_path: Option<PathBuf>,
    /// `MICROZONE_DEFAULT_LIMIT`
    pub default_limit: usize,
    /// `MICROZONE_MAX_LIMIT`
    pub max_limit: usize,
    /// `BIND_ADDR`
    pub bind_addr: String,
    /// `PORT`
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            table_path: PathBuf::from("data/processed/microzonas.csv"),
            criteria_path: None,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable lookup. Unset or
    /// unparsable values keep their defaults; the default limit never
    /// exceeds the maximum.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |name: &str| {
            lookup(name).and_then(|v| match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    log::warn!("Ignoring invalid {name}={v}");
                    None
                }
            })
        };

        let max_limit = number("MICROZONE_MAX_LIMIT").unwrap_or(defaults.max_limit);
        let default_limit = number("MICROZONE_DEFAULT_LIMIT")
            .unwrap_or(defaults.default_limit)
            .min(max_limit);

        Self {
            table_path: lookup("MICROZONE_CSV").map_or(defaults.table_path, PathBuf::from),
            criteria_path: lookup("MICROZONE_CRITERIA")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            default_limit,
            max_limit,
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

/// Loads the criteria and the table described by `config`.
///
/// # Errors
///
/// Returns [`ServerError::Query`] if the criteria file or the table cannot
/// be read.
pub fn load_state(config: &ServerConfig) -> Result<AppState, ServerError> {
    let criteria = match &config.criteria_path {
        Some(path) => {
            log::info!("Loading criticality criteria from {}", path.display());
            load_criteria(path)?
        }
        None => CriticalityCriteria::default(),
    };

    log::info!("Loading micro-zone table from {}", config.table_path.display());
    let table = MicrozoneTable::load(&config.table_path, criteria)?.with_max_limit(config.max_limit);
    log::info!(
        "Scored {} micro-zone(s) against a reference of {} connection(s)",
        table.len(),
        table.reference_connections()
    );

    Ok(AppState {
        table,
        default_limit: config.default_limit,
    })
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/microzonas", web::get().to(handlers::microzones))
            .route("/microzonas/criticas", web::get().to(handlers::critical))
            .route("/microzonas/resumen", web::get().to(handlers::summary))
            .route("/microzonas/{key}", web::get().to(handlers::detail)),
    );
}

/// Starts the micro-zone API server.
///
/// Reads [`ServerConfig`] from the environment, loads the table and starts
/// the Actix-Web HTTP server. The caller provides the async runtime (e.g.
/// via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if the table cannot be loaded or the server
/// fails to bind.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), ServerError> {
    let config = ServerConfig::from_env();
    let state = web::Data::new(load_state(&config)?);

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
