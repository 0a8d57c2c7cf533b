use crate::application::feed_service::FeedSettings;
use crate::application::normalizer::WindowSettings;
use crate::domain::time_basis::{TimeBasis, WindowMode};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "POWER_FEED";
const MAX_WINDOW_DAYS: u32 = 3650;
const MAX_SAMPLE_INTERVAL_MINUTES: u32 = 1440;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub path: String,
    pub poll_interval_ms: u64,
    pub window_days: u32,
    /// Only used when the payload carries no timestamps.
    pub sample_interval_minutes: u32,
    pub request_timeout_ms: u64,
    pub window_mode: WindowMode,
    /// Zone for calendar steps and labels; unset means the host's local zone.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl AppConfig {
    fn validate(&self) -> anyhow::Result<()> {
        let feed = &self.feed;
        if feed.base_url.trim().is_empty() {
            anyhow::bail!("feed.base_url cannot be empty");
        }
        if feed.poll_interval_ms == 0 {
            anyhow::bail!("feed.poll_interval_ms must be greater than 0");
        }
        if feed.request_timeout_ms == 0 {
            anyhow::bail!("feed.request_timeout_ms must be greater than 0");
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&feed.window_days) {
            anyhow::bail!("feed.window_days must be between 1 and {}", MAX_WINDOW_DAYS);
        }
        if !(1..=MAX_SAMPLE_INTERVAL_MINUTES).contains(&feed.sample_interval_minutes) {
            anyhow::bail!(
                "feed.sample_interval_minutes must be between 1 and {}",
                MAX_SAMPLE_INTERVAL_MINUTES
            );
        }
        if TimeBasis::from_offset_minutes(feed.utc_offset_minutes).is_none() {
            anyhow::bail!(
                "feed.utc_offset_minutes {:?} is outside +/-24h",
                feed.utc_offset_minutes
            );
        }
        Ok(())
    }
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn time_basis(&self) -> anyhow::Result<TimeBasis> {
        TimeBasis::from_offset_minutes(self.utc_offset_minutes).ok_or_else(|| {
            anyhow::anyhow!("invalid utc_offset_minutes: {:?}", self.utc_offset_minutes)
        })
    }

    pub fn feed_settings(&self) -> anyhow::Result<FeedSettings> {
        Ok(FeedSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            window: WindowSettings {
                window_days: self.window_days,
                sample_interval: chrono::Duration::minutes(i64::from(self.sample_interval_minutes)),
                window_mode: self.window_mode,
                basis: self.time_basis()?,
            },
        })
    }
}

fn with_defaults() -> anyhow::Result<ConfigBuilder<DefaultState>> {
    Ok(config::Config::builder()
        .set_default("feed.base_url", "http://127.0.0.1:8000")?
        .set_default("feed.path", "/api/graph_data")?
        .set_default("feed.poll_interval_ms", 300_000)?
        .set_default("feed.window_days", 1)?
        .set_default("feed.sample_interval_minutes", 5)?
        .set_default("feed.request_timeout_ms", 10_000)?
        .set_default("feed.window_mode", "calendar")?
        .set_default("server.bind", "0.0.0.0:8080")?)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<AppConfig> {
    let app: AppConfig = builder.build()?.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Defaults, then optional `config/feed.*`, then `POWER_FEED__SECTION__KEY` variables.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let builder = with_defaults()?
        .add_source(File::with_name("config/feed").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
    finish(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{FileFormat, Map};

    fn from_toml(toml: &str) -> anyhow::Result<AppConfig> {
        finish(with_defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn test_defaults() {
        let app = from_toml("").unwrap();
        assert_eq!(app.feed.path, "/api/graph_data");
        assert_eq!(app.feed.poll_interval_ms, 300_000);
        assert_eq!(app.feed.window_days, 1);
        assert_eq!(app.feed.sample_interval_minutes, 5);
        assert_eq!(app.feed.window_mode, WindowMode::Calendar);
        assert_eq!(app.feed.utc_offset_minutes, None);
        assert_eq!(app.server.bind, "0.0.0.0:8080");

        let settings = app.feed.feed_settings().unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(300));
        assert_eq!(settings.window.sample_interval, chrono::Duration::minutes(5));
        assert_eq!(settings.window.basis, TimeBasis::Local);
    }

    #[test]
    fn test_file_overrides() {
        let app = from_toml(
            r#"
[feed]
base_url = "http://meter.local"
poll_interval_ms = 60000
window_mode = "duration"
utc_offset_minutes = 420
"#,
        )
        .unwrap();

        assert_eq!(app.feed.base_url, "http://meter.local");
        assert_eq!(app.feed.window_mode, WindowMode::Duration);
        let settings = app.feed.feed_settings().unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(60));
        assert_eq!(
            settings.window.basis,
            TimeBasis::from_offset_minutes(Some(420)).unwrap()
        );
    }

    #[test]
    fn test_environment_overrides() {
        let mut vars = Map::new();
        vars.insert("POWER_FEED__FEED__WINDOW_DAYS".to_string(), "2".to_string());
        vars.insert("POWER_FEED__SERVER__BIND".to_string(), "127.0.0.1:9090".to_string());

        let builder = with_defaults().unwrap().add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(Some(vars)),
        );
        let app = finish(builder).unwrap();

        assert_eq!(app.feed.window_days, 2);
        assert_eq!(app.server.bind, "127.0.0.1:9090");
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = from_toml("[feed]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_rejects_zero_window() {
        assert!(from_toml("[feed]\nwindow_days = 0\n").is_err());
        assert!(from_toml("[feed]\nsample_interval_minutes = 0\n").is_err());
    }

    #[test]
    fn test_rejects_zero_request_timeout() {
        let err = from_toml("[feed]\nrequest_timeout_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("request_timeout_ms"));
    }

    #[test]
    fn test_caps_window_and_sample_interval() {
        assert!(from_toml("[feed]\nwindow_days = 3650\n").is_ok());
        assert!(from_toml("[feed]\nsample_interval_minutes = 1440\n").is_ok());

        let err = from_toml("[feed]\nwindow_days = 200000000\n").unwrap_err();
        assert!(err.to_string().contains("window_days"));
        let err = from_toml("[feed]\nsample_interval_minutes = 4294967295\n").unwrap_err();
        assert!(err.to_string().contains("sample_interval_minutes"));
    }

    #[test]
    fn test_rejects_offset_out_of_range() {
        let err = from_toml("[feed]\nutc_offset_minutes = 2000\n").unwrap_err();
        assert!(err.to_string().contains("utc_offset_minutes"));
    }

    #[test]
    fn test_rejects_unknown_window_mode() {
        assert!(from_toml("[feed]\nwindow_mode = \"weekly\"\n").is_err());
    }
}
