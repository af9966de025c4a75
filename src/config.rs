use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

const DATA_DIR_NAME: &str = ".expensedb";

#[derive(Parser, Debug)]
#[command(name = "expensedb", about = "ExpenseDB - personal expense ledger service")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "expensedb.toml")]
    pub config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Storage backend (overrides config file)
    #[arg(long, env = "EXPENSEDB_BACKEND", value_enum)]
    pub backend: Option<BackendKind>,

    /// SQLite database file (overrides config file)
    #[arg(long, env = "EXPENSEDB_SQLITE_PATH")]
    pub sqlite_path: Option<PathBuf>,

    /// PostgreSQL connection string (overrides config file)
    #[arg(long, env = "EXPENSEDB_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Category override file (overrides config file)
    #[arg(long, env = "EXPENSEDB_CATEGORIES_PATH")]
    pub categories: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Create the schema and exit
    Init,
    /// Record an expense
    Add {
        date: String,
        /// Numeric amount; strings like "12.50" are accepted
        amount: String,
        category: String,
        #[arg(long, default_value = "")]
        subcategory: String,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// List expenses between two dates (inclusive)
    List { start_date: String, end_date: String },
    /// Totals per category between two dates (inclusive)
    Summarize {
        start_date: String,
        end_date: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Print the category catalog
    Categories,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Defaults to `~/.expensedb/expenses.db`.
    pub sqlite_path: Option<PathBuf>,

    pub postgres_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// Defaults to `~/.expensedb/categories.json`.
    pub path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `~/.expensedb`, or `./.expensedb` when no home directory can be found.
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}

impl StorageConfig {
    pub fn sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("expenses.db"))
    }
}

impl CatalogConfig {
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("categories.json"))
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = Self::from_file(Path::new(&cli.config));

        // CLI overrides
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(backend) = cli.backend {
            config.storage.backend = backend;
        }
        if let Some(ref path) = cli.sqlite_path {
            config.storage.sqlite_path = Some(path.clone());
        }
        if let Some(ref url) = cli.database_url {
            config.storage.postgres_url = Some(url.clone());
        }
        if let Some(ref path) = cli.categories {
            config.catalog.path = Some(path.clone());
        }

        config
    }

    /// Missing file means defaults; a file that does not parse is reported and ignored.
    fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file {}: {}", path.display(), e);
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        let mut argv = vec!["expensedb", "--config", "/nonexistent/expensedb.toml"];
        argv.extend_from_slice(args);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load(&cli(&[]));
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.backend, BackendKind::Sqlite);
        assert!(config.storage.sqlite_path().ends_with(".expensedb/expenses.db"));
        assert!(config.catalog.path().ends_with(".expensedb/categories.json"));
    }

    #[test]
    fn test_parse_toml_sections() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9100

            [logging]
            json = true

            [storage]
            backend = "postgres"
            postgres_url = "postgres://localhost/expenses"

            [catalog]
            path = "/etc/expensedb/categories.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.backend, BackendKind::Postgres);
        assert_eq!(
            config.storage.postgres_url.as_deref(),
            Some("postgres://localhost/expenses")
        );
        assert_eq!(
            config.catalog.path(),
            PathBuf::from("/etc/expensedb/categories.json")
        );
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::load(&cli(&[
            "--port",
            "9000",
            "--backend",
            "memory",
            "--sqlite-path",
            "/tmp/x.db",
            "list",
            "2024-01-01",
            "2024-01-31",
        ]));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.storage.sqlite_path(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_subcommand_parsing() {
        let args = cli(&["add", "2024-01-01", "12.50", "Travel", "--note", "taxi"]);
        assert_eq!(
            args.command,
            Some(Command::Add {
                date: "2024-01-01".to_string(),
                amount: "12.50".to_string(),
                category: "Travel".to_string(),
                subcategory: "".to_string(),
                note: "taxi".to_string(),
            })
        );
    }
}
