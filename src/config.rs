//! TOML-backed configuration, loaded once via `once_cell`, matching the
//! teacher's `Config::load()` pattern.

use std::io::Read;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::chunker::Normalization;

#[derive(Deserialize, Debug, Clone)]
pub struct ChunkerConfig {
    #[serde(default = "default_min_size")]
    pub min_size: u32,
    #[serde(default = "default_avg_size")]
    pub avg_size: u32,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(default = "default_normalization")]
    pub normalization: u8,
}

fn default_min_size() -> u32 {
    2048
}
fn default_avg_size() -> u32 {
    8192
}
fn default_max_size() -> u32 {
    65536
}
fn default_normalization() -> u8 {
    2
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        ChunkerConfig {
            min_size: default_min_size(),
            avg_size: default_avg_size(),
            max_size: default_max_size(),
            normalization: default_normalization(),
        }
    }
}

impl ChunkerConfig {
    pub fn normalization_level(&self) -> Normalization {
        match self.normalization {
            0 => Normalization::Level0,
            1 => Normalization::Level1,
            3 => Normalization::Level3,
            _ => Normalization::Level2,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct StoreConfig {
    /// Root of the live directory tree being synced.
    pub source_root: String,
    /// Root under which `hierarchy.json`, `chunklists/`, `chunks/` and
    /// `chunks.sqlite3` live.
    pub store_root: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn load() -> &'static Self {
        CONFIG.get_or_init(|| {
            let path = if cfg!(test) {
                "test/fixtures/config.toml"
            } else {
                "config.toml"
            };
            let mut file = std::fs::File::open(path)
                .unwrap_or_else(|_| panic!("unable to find {path}"));
            let mut config_str = String::new();
            file.read_to_string(&mut config_str)
                .expect("could not read config file");
            toml::from_str(&config_str).expect("unable to parse config file")
        })
    }
}
