// src/settings.rs

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};

use crate::semantic_parsing::{Alias, AliasTable};

const DEFAULT_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_DATABASE: &str = "netquery-db";
const DEFAULT_ORACLE_HOST: &str = "http://127.0.0.1";
const DEFAULT_ORACLE_PORT: u16 = 11434;
const DEFAULT_MODEL: &str = "llama3.1:8b";
const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Serves the equipment and PoP data query surface.
#[derive(Parser, Debug)]
#[command(version)]
pub struct ServerArgs {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// JSON array of equipment records to load before serving.
    #[arg(long, value_name = "JSON_PATH")]
    pub equipment: Option<PathBuf>,

    /// JSON array of PoP records to load before serving.
    #[arg(long, value_name = "JSON_PATH")]
    pub pop: Option<PathBuf>,
}

/// Answers questions about equipment and PoPs in plain language.
#[derive(Parser, Debug)]
#[command(version)]
pub struct ChatArgs {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Query the local database directly instead of the HTTP surface.
    #[arg(long)]
    pub local: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientSettings {
    pub api_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    pub database: DatabaseSettings,
    pub oracle: OracleSettings,
    pub client: ClientSettings,
    /// Replaces the built-in spellings when present.
    #[serde(default)]
    pub aliases: Option<Vec<Alias>>,
}

impl Settings {
    /// Load settings from the given TOML file, with sane defaults.
    pub fn from_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::<DefaultState>::default()
            .set_default("web.address", DEFAULT_ADDR)?
            .set_default("database.path", DEFAULT_DATABASE)?
            .set_default("oracle.host", DEFAULT_ORACLE_HOST)?
            .set_default("oracle.port", i64::from(DEFAULT_ORACLE_PORT))?
            .set_default("oracle.model", DEFAULT_MODEL)?
            .set_default("oracle.timeout_secs", 60_i64)?
            .set_default("client.api_base", DEFAULT_API_BASE)?
            .set_default("client.timeout_secs", 30_i64)?;

        let builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder,
        };
        builder.build()?.try_deserialize()
    }

    pub fn alias_table(&self) -> AliasTable {
        self.aliases
            .clone()
            .map_or_else(AliasTable::default, AliasTable::new)
    }
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}
