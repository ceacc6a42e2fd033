use serde::{Deserialize, Deserializer};
use std::net::IpAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	pub server: ServerConfig,
	pub backend: BackendConfig,
	#[serde(default)]
	pub viewer: ViewerConfig,
}

impl AppConfig {
	pub fn new() -> Result<Self, config::ConfigError> {
		Self::builder()
			.add_source(config::File::with_name("config.toml").required(false))
			.add_source(
				config::Environment::with_prefix("CONSENT_RST")
					.prefix_separator("_")
					.separator("__"),
			)
			.build()?
			.try_deserialize()
	}

	fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
		config::Config::builder().add_source(config::File::from_str(
			include_str!("defaults.toml"),
			config::FileFormat::Toml,
		))
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	/// Also configurable via RUST_LOG.
	#[serde(deserialize_with = "deserialize_level")]
	pub level: tracing::Level,
	/// Sentry DSN. Sentry stays disabled if absent.
	pub sentry: Option<String>,
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<tracing::Level, D::Error>
where
	D: Deserializer<'de>,
{
	let s = String::deserialize(deserializer)?;
	s.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
	pub http: HttpServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
	// The interface the HTTP server will be listening on
	pub interface: IpAddr,
	pub port: u16,
	/// Prefix all routes are nested under, e.g. `/consent`.
	#[serde(default)]
	pub base_path: String,
	/// Maximum request body size in bytes. Bounds consent-form uploads.
	pub max_upload_size: usize,
	/// Request timeout in seconds.
	pub request_timeout: u64,
	pub graceful_shutdown: bool,
}

/// The REST backend of the clinical application.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
	/// Base URL all API paths are appended to, e.g. `http://localhost:8080/api/`.
	pub base_url: String,
	/// Request timeout in milliseconds.
	pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
	/// Delay between a successful load and the automatic print, in milliseconds.
	pub auto_print_delay: u64,
	/// How long a notice stays visible, in milliseconds.
	pub notice_timeout: u64,
	pub min_scale: f64,
	pub max_scale: f64,
	pub scale_step: f64,
}

impl Default for ViewerConfig {
	fn default() -> Self {
		Self {
			auto_print_delay: 500,
			notice_timeout: 3000,
			min_scale: 0.25,
			max_scale: 4.0,
			scale_step: 0.25,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn embedded_defaults_are_complete() {
		let config: AppConfig = AppConfig::builder()
			.build()
			.unwrap()
			.try_deserialize()
			.unwrap();

		assert_eq!(config.telemetry.level, tracing::Level::INFO);
		assert!(config.telemetry.sentry.is_none());
		assert_eq!(config.server.http.port, 8080);
		assert!(config.server.http.base_path.is_empty());
		assert_eq!(config.viewer.auto_print_delay, 500);
		assert_eq!(config.viewer.notice_timeout, 3000);
	}

	#[test]
	fn overrides_replace_defaults() {
		let config: AppConfig = AppConfig::builder()
			.set_override("telemetry.level", "debug")
			.unwrap()
			.set_override("backend.base_url", "https://clinic.example/api/")
			.unwrap()
			.set_override("viewer.auto_print_delay", 50)
			.unwrap()
			.build()
			.unwrap()
			.try_deserialize()
			.unwrap();

		assert_eq!(config.telemetry.level, tracing::Level::DEBUG);
		assert_eq!(config.backend.base_url, "https://clinic.example/api/");
		assert_eq!(config.viewer.auto_print_delay, 50);
		assert_eq!(config.viewer.notice_timeout, 3000);
	}

	#[test]
	fn invalid_level_is_rejected() {
		let result = AppConfig::builder()
			.set_override("telemetry.level", "loud")
			.unwrap()
			.build()
			.unwrap()
			.try_deserialize::<AppConfig>();
		assert!(result.is_err());
	}
}
