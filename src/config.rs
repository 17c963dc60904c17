use config::{Config, ConfigError, Environment, File};
use directories_next::ProjectDirs;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

// Where the reminder text lives
#[derive(Debug, Deserialize, Clone)]
pub struct TemplateConfig {
    pub path: PathBuf,
}

// Where per-run activity logs are written
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

// Timings and target for the browser automation
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    pub web_url: String,
    pub load_wait_secs: u64,
    pub confirm_delay_secs: u64,
    pub close_delay_secs: u64,
    pub close_tab: bool,
}

impl DispatchConfig {
    pub fn load_wait(&self) -> Duration {
        Duration::from_secs(self.load_wait_secs)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_secs(self.confirm_delay_secs)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_secs(self.close_delay_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    pub dark_mode: bool,
}

// Top-level application configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub template: TemplateConfig,
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Loads configuration from defaults, files and environment variables.
    ///
    /// Reads configuration from (later sources win):
    /// 1. Built-in defaults
    /// 2. `config.toml` in the working directory (optional)
    /// 3. `config.toml` in the per-user config directory (optional)
    /// 4. Environment variables prefixed with `APP__` (e.g. `APP__DISPATCH__LOAD_WAIT_SECS`)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?.add_source(File::with_name("config").required(false));

        if let Some(dirs) = ProjectDirs::from("", "", "wa-reminder") {
            let user_config = dirs.config_dir().join("config.toml");
            builder = builder.add_source(File::from(user_config).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("template.path", "reminder_text.txt")?
            .set_default("logging.dir", "logs")?
            .set_default("dispatch.web_url", "https://web.whatsapp.com")?
            .set_default("dispatch.load_wait_secs", 15_i64)?
            .set_default("dispatch.confirm_delay_secs", 2_i64)?
            .set_default("dispatch.close_delay_secs", 2_i64)?
            .set_default("dispatch.close_tab", true)?
            .set_default("ui.dark_mode", true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn defaults_deserialize() {
        let config: AppConfig = AppConfig::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.template.path, PathBuf::from("reminder_text.txt"));
        assert_eq!(config.logging.dir, PathBuf::from("logs"));
        assert_eq!(config.dispatch.web_url, "https://web.whatsapp.com");
        assert_eq!(config.dispatch.load_wait(), Duration::from_secs(15));
        assert_eq!(config.dispatch.confirm_delay(), Duration::from_secs(2));
        assert_eq!(config.dispatch.close_delay(), Duration::from_secs(2));
        assert!(config.dispatch.close_tab);
        assert!(config.ui.dark_mode);
    }

    #[test]
    fn file_overrides_defaults() {
        let toml = r#"
            [dispatch]
            load_wait_secs = 30
            close_tab = false

            [template]
            path = "templates/monthly.txt"
        "#;

        let config: AppConfig = AppConfig::defaults()
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.dispatch.load_wait_secs, 30);
        assert!(!config.dispatch.close_tab);
        assert_eq!(config.dispatch.confirm_delay_secs, 2);
        assert_eq!(config.template.path, PathBuf::from("templates/monthly.txt"));
        assert_eq!(config.logging.dir, PathBuf::from("logs"));
    }
}
