use anyhow::anyhow;
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env,
    fs::{self, File},
    io::{Read, Write},
    path::PathBuf,
    time::Duration,
};
use time::{format_description::well_known::Iso8601, Duration as TimeDuration, OffsetDateTime};

use crate::{controller::HandshakeOptions, infra::auth::AuthPaths};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to Settings.toml file holding configuration options
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level to run with the service (default: info)
    #[arg(short, long)]
    pub level: Option<String>,

    /// File holding the wallet's nsec, created when missing
    #[arg(short, long)]
    pub key_file: Option<String>,

    /// Stop once the form is valid instead of signing in
    #[arg(long)]
    pub no_submit: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub config: Option<String>,
    pub level: Option<String>,
    pub app_settings: AppSettings,
    pub validation_settings: ValidationSettings,
    pub identity_settings: IdentitySettings,
}

impl ConfigurableSettings for Settings {
    fn apply_cli_overrides(&mut self, cli_settings: &CliSettings) {
        if let Some(level) = &cli_settings.level {
            self.level = Some(level.clone());
        }
        if let Some(key_file) = &cli_settings.key_file {
            self.identity_settings.key_file = key_file.clone();
        }
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("./config/local.toml")
    }
}

impl Settings {
    pub fn handshake_options(&self) -> HandshakeOptions {
        HandshakeOptions {
            session_debounce: Duration::from_millis(self.validation_settings.session_debounce_ms),
            api_key_debounce: Duration::from_millis(self.validation_settings.api_key_debounce_ms),
            callback_url: self.app_settings.callback_url.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Origin of the web application serving the auth endpoints
    pub base_url: String,
    /// Exchanges a DID session for its api key
    pub api_key_path: String,
    pub session_path: String,
    pub csrf_path: String,
    pub sign_in_path: String,
    /// Where the provider redirects after a successful sign in
    pub callback_url: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        let paths = AuthPaths::default();
        AppSettings {
            base_url: String::from("http://127.0.0.1:3000"),
            api_key_path: String::from("/api/apikey"),
            session_path: paths.session,
            csrf_path: paths.csrf,
            sign_in_path: paths.sign_in,
            callback_url: String::from("/"),
        }
    }
}

impl AppSettings {
    pub fn auth_paths(&self) -> AuthPaths {
        AuthPaths {
            session: self.session_path.clone(),
            csrf: self.csrf_path.clone(),
            sign_in: self.sign_in_path.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Quiet period before the session is checked
    pub session_debounce_ms: u64,
    /// Quiet period before the api key is checked
    pub api_key_debounce_ms: u64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        ValidationSettings {
            session_debounce_ms: 500,
            api_key_debounce_ms: 200,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Domain named in the challenge the wallet signs
    pub domain: String,
    /// How long a derived session stays valid
    pub session_ttl_secs: u64,
    pub key_file: String,
}

impl IdentitySettings {
    /// Lifetime given to derived sessions
    pub fn session_ttl(&self) -> Result<TimeDuration, anyhow::Error> {
        let secs = i64::try_from(self.session_ttl_secs)
            .map_err(|_| anyhow!("session_ttl_secs {} is too large", self.session_ttl_secs))?;
        Ok(TimeDuration::seconds(secs))
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        IdentitySettings {
            domain: String::from("127.0.0.1:3000"),
            session_ttl_secs: 7 * 24 * 60 * 60,
            key_file: String::from("./creds/wallet.nsec"),
        }
    }
}

pub struct CliSettings {
    pub config: Option<String>,
    pub level: Option<String>,
    pub key_file: Option<String>,
}

impl From<&Cli> for CliSettings {
    fn from(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            level: cli.level.clone(),
            key_file: cli.key_file.clone(),
        }
    }
}

pub trait ConfigurableSettings: Serialize + for<'de> Deserialize<'de> + Default {
    /// Apply CLI settings after loading from file
    fn apply_cli_overrides(&mut self, cli_settings: &CliSettings);

    /// Get the default config file path
    fn default_config_path() -> PathBuf {
        PathBuf::from("./config/settings.toml")
    }

    /// Get the config directory path
    fn config_directory() -> PathBuf {
        PathBuf::from("./config")
    }
}

pub fn get_settings_with_cli<T: ConfigurableSettings>(
    cli_settings: CliSettings,
) -> Result<T, anyhow::Error> {
    let mut settings = if let Some(config_path) = cli_settings.config.clone() {
        let path = PathBuf::from(config_path);

        let absolute_path = if path.is_absolute() {
            path
        } else {
            env::current_dir()?.join(path)
        };

        match File::open(absolute_path) {
            Ok(mut file) => {
                let mut content = String::new();
                file.read_to_string(&mut content)
                    .map_err(|e| anyhow!("Failed to read config: {}", e))?;
                toml::from_str(&content)
                    .map_err(|e| anyhow!("Failed to map config to settings: {}", e))?
            }
            Err(err) => return Err(anyhow!("Failed to find file: {}", err)),
        }
    } else {
        let default_path = T::default_config_path();
        match File::open(&default_path) {
            Ok(mut file) => {
                let mut content = String::new();
                file.read_to_string(&mut content)
                    .map_err(|e| anyhow!("Failed to read default config: {}", e))?;
                toml::from_str(&content)
                    .map_err(|e| anyhow!("Failed to parse default config: {}", e))?
            }
            Err(_) => {
                let default_settings = T::default();

                fs::create_dir_all(T::config_directory())
                    .map_err(|e| anyhow!("Failed to create config directory: {}", e))?;

                let toml_content = toml::to_string(&default_settings)
                    .map_err(|e| anyhow!("Failed to serialize default settings: {}", e))?;

                let mut file = fs::File::create(&default_path)
                    .map_err(|e| anyhow!("Failed to create config file: {}", e))?;
                file.write_all(toml_content.as_bytes())
                    .map_err(|e| anyhow!("Failed to write default config: {}", e))?;

                default_settings
            }
        }
    };

    settings.apply_cli_overrides(&cli_settings);

    Ok(settings)
}

pub fn setup_logger(
    level: Option<String>,
    filter_targets: Vec<String>,
) -> Result<(), fern::InitError> {
    let rust_log = get_log_level(level);
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            let timestamp = OffsetDateTime::now_utc()
                .format(&Iso8601::DEFAULT)
                .unwrap_or_default();
            out.finish(format_args!(
                "[{} {}] {}: {}",
                timestamp,
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .level(rust_log)
        .filter(move |metadata| {
            !filter_targets
                .iter()
                .any(|filter| metadata.target().starts_with(filter))
        })
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

pub fn get_log_level(level: Option<String>) -> LevelFilter {
    let level = level.unwrap_or_else(|| env::var("RUST_LOG").unwrap_or_default());
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}
