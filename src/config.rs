use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::menu::DiningHall;

#[derive(Parser, Debug)]
#[command(name = "wfresh", about = "Campus dining menus and DishDash threads")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub menu: MenuConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MenuConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    pub fetch_concurrency: usize,
    /// The provider has served broken certificate chains before.
    pub accept_invalid_certs: bool,
    pub cache_path: Option<PathBuf>,
    pub halls: Vec<DiningHall>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "wfresh_session".to_string(),
            session_hours: 720,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            api_url: "https://dish.avifoodsystems.com/api/menu-items/week".to_string(),
            timeout_secs: 5,
            fetch_concurrency: 8,
            accept_invalid_certs: false,
            cache_path: None,
            halls: DiningHall::wellesley(),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("wfresh.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("uploads"));
        }
        if config.menu.cache_path.is_none() {
            config.menu.cache_path = Some(data_dir.join("menu_cache.json"));
        }

        if config.menu.halls.is_empty() {
            anyhow::bail!("menu.halls must list at least one dining hall");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".wfresh")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("wfresh.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("uploads"))
    }

    pub fn menu_cache_path(&self) -> PathBuf {
        self.menu
            .cache_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("menu_cache.json"))
    }
}
