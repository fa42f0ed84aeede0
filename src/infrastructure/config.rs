use crate::application::reconnect::ReconnectPolicy;
use serde::Deserialize;
use std::time::Duration;

pub const CONFIG_PATH: &str = "config/motor";
pub const API_URL_ENV: &str = "MOTOR_API_URL";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub mqtt: MqttSettings,
    pub api: ApiSettings,
    pub polling: PollingSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Left empty, a `motor_core_<epoch ms>` id is generated at connect time.
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub reconnect_period_ms: u64,
    pub max_reconnect_attempts: u32,
    pub cooldown_secs: u64,
    pub channel_capacity: usize,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            tls: false,
            username: None,
            password: None,
            client_id: String::new(),
            keep_alive_secs: 60,
            reconnect_period_ms: 5000,
            max_reconnect_attempts: 10,
            cooldown_secs: 30,
            channel_capacity: 1024,
        }
    }
}

impl MqttSettings {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            period: Duration::from_millis(self.reconnect_period_ms),
            max_attempts: self.max_reconnect_attempts,
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }

    pub fn resolved_client_id(&self) -> String {
        if self.client_id.trim().is_empty() {
            format!("motor_core_{}", chrono::Utc::now().timestamp_millis())
        } else {
            self.client_id.clone()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingSettings {
    pub alerts_ms: u64,
    pub ml_alerts_ms: u64,
    pub toasts_ms: u64,
    pub toast_ttl_ms: u64,
    pub max_toasts: usize,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            alerts_ms: 3000,
            ml_alerts_ms: 3000,
            toasts_ms: 2000,
            toast_ttl_ms: 8000,
            max_toasts: 5,
        }
    }
}

impl PollingSettings {
    pub fn alerts_period(&self) -> Duration {
        Duration::from_millis(self.alerts_ms.max(1))
    }

    pub fn ml_alerts_period(&self) -> Duration {
        Duration::from_millis(self.ml_alerts_ms.max(1))
    }

    pub fn toasts_period(&self) -> Duration {
        Duration::from_millis(self.toasts_ms.max(1))
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    load_app_config_from(
        config::File::with_name(CONFIG_PATH).required(false),
        std::env::var(API_URL_ENV).ok(),
    )
}

/// Layers `source` over the built-in defaults, then applies the API URL override.
pub fn load_app_config_from<S>(source: S, api_url: Option<String>) -> anyhow::Result<AppConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let api_url = api_url.filter(|url| !url.trim().is_empty());
    let settings = config::Config::builder()
        .add_source(source)
        .set_override_option("api.base_url", api_url)?
        .build()?;

    Ok(settings.try_deserialize()?)
}
