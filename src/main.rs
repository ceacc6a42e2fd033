pub(crate) mod api;
pub(crate) mod backend;
pub(crate) mod config;
pub(crate) mod consent;
pub(crate) mod documents;
pub(crate) mod types;
pub(crate) mod utils;
pub(crate) mod viewer;

use crate::backend::http::HttpConsentBackend;
use crate::backend::ConsentBackend;
use crate::config::{AppConfig, HttpServerConfig, ViewerConfig};
use crate::consent::workflow::ConsentWorkflow;
use crate::documents::{BlobRegistry, DocumentOpener};
use crate::viewer::events::ViewSignals;
use crate::viewer::sessions::ViewerSessions;
use axum::extract::{DefaultBodyLimit, Request};
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace;
use tracing::{error, info, level_filters::LevelFilter, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Signals a slow listener may fall behind before it starts missing some.
const VIEW_SIGNAL_CAPACITY: usize = 64;

fn init_logger(level: tracing::Level) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(LevelFilter::from_level(level).into())
				.from_env_lossy(),
		)
		.with(sentry::integrations::tracing::layer())
		.init();
}

#[derive(Clone)]
pub struct AppState {
	pub backend: Arc<dyn ConsentBackend>,
	pub workflow: ConsentWorkflow,
	pub sessions: ViewerSessions,
	pub signals: ViewSignals,
}

impl AppState {
	pub fn new(backend: Arc<dyn ConsentBackend>, viewer: &ViewerConfig) -> Self {
		let opener = DocumentOpener::new(Arc::clone(&backend), BlobRegistry::new());
		Self {
			workflow: ConsentWorkflow::new(Arc::clone(&backend)),
			sessions: ViewerSessions::new(opener, viewer.clone()),
			signals: ViewSignals::new(VIEW_SIGNAL_CAPACITY),
			backend,
		}
	}
}

fn init_sentry(config: &AppConfig) -> sentry::ClientInitGuard {
	let guard = sentry::init((
		// An empty string will disable Sentry
		config.telemetry.sentry.as_deref().unwrap_or_default(),
		sentry::ClientOptions {
			release: sentry::release_name!(),
			traces_sample_rate: 1.0,
			..Default::default()
		},
	));

	if let Some(dsn) = &config.telemetry.sentry {
		info!(dsn, "Enabled Sentry for tracing and error tracking");
	}

	guard
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let config = AppConfig::new()?;
	init_logger(config.telemetry.level);

	// Sentry has to be initialized before the Tokio runtime is started, so #[tokio::main] is
	// not an option.
	let _sentry = init_sentry(&config);

	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(async move {
			if let Err(error) = run(config).await {
				error!("Failed to start application due to error: {error}");
			}
		});
	Ok(())
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
	let backend = HttpConsentBackend::new(&config.backend)?;
	let app_state = AppState::new(Arc::new(backend), &config.viewer);
	let _signal_listener = app_state.sessions.listen(&app_state.signals);

	let app = api::routes(&config.server.http.base_path)
		.layer(CorsLayer::permissive())
		.layer(axum::middleware::from_fn(add_common_headers))
		.layer(
			tower_http::trace::TraceLayer::new_for_http()
				.make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
				.on_request(trace::DefaultOnRequest::new().level(Level::INFO))
				.on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
		)
		.layer(DefaultBodyLimit::max(config.server.http.max_upload_size))
		.layer(TimeoutLayer::new(Duration::from_secs(
			config.server.http.request_timeout,
		)))
		.with_state(app_state);

	let HttpServerConfig {
		interface: host,
		port,
		graceful_shutdown,
		..
	} = config.server.http;
	let addr = SocketAddr::from((host, port));
	let listener = TcpListener::bind(addr).await?;

	info!("Started consent server on http://{addr}");
	if graceful_shutdown {
		axum::serve(listener, app)
			.with_graceful_shutdown(shutdown_signal())
			.await?;
	} else {
		axum::serve(listener, app).await?;
	}

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = signal::ctrl_c().await {
			error!("Failed to listen for Ctrl+C: {err}");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut terminate) => {
				terminate.recv().await;
			}
			Err(err) => {
				error!("Failed to listen for SIGTERM: {err}");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
	info!("Shutting down");
}

async fn add_common_headers(req: Request, next: axum::middleware::Next) -> Response {
	let mut response = next.run(req).await;
	let server_name = concat!("consent-rst/", env!("CARGO_PKG_VERSION"));
	let headers = response.headers_mut();
	headers.insert("Server", axum::http::HeaderValue::from_static(server_name));
	response
}
