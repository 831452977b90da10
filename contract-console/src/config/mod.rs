use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub analysis_service: AnalysisServiceSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct AnalysisServiceSettings {
    /// Base URL of the contract analysis API (e.g., http://analysis:8000).
    pub url: String,
}

#[derive(Deserialize, Clone)]
pub struct SessionSettings {
    /// Mark the session cookie `Secure`. Must be on behind HTTPS.
    #[serde(default)]
    pub secure_cookie: bool,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Sessions idle for longer than this are dropped by the session layer.
    #[serde(default = "default_inactivity_hours")]
    pub inactivity_hours: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secure_cookie: false,
            cookie_name: default_cookie_name(),
            inactivity_hours: default_inactivity_hours(),
        }
    }
}

fn default_cookie_name() -> String {
    "console_session".to_string()
}

fn default_inactivity_hours() -> i64 {
    24
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector; spans are only exported when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Message(e.to_string()))?;

    // Run either from the workspace root or from the crate directory
    let configuration_directory = if base_path.ends_with("contract-console") {
        base_path.join("config")
    } else {
        base_path.join("contract-console").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
