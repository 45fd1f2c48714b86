//! Configuration for limits, timeouts, the embedding endpoint, and paths.

use std::{
   fs,
   path::{Path, PathBuf},
   sync::OnceLock,
};

use directories::BaseDirs;
use figment::{
   Figment,
   providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::types::{Role, UserId};

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Bearer token mapped to a principal. Stands in for the hosted auth
/// collaborator; the service itself never issues credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
   pub token:   String,
   pub user_id: UserId,
   pub role:    Role,
}

/// Application configuration loaded from config file and environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
   /// JSON snapshot the in-memory store is seeded from.
   pub data_file: Option<PathBuf>,

   pub embed_endpoint:   String,
   pub embed_timeout_ms: u64,
   pub match_timeout_ms: u64,

   /// Minimum cosine similarity a nearest-neighbor candidate must reach.
   pub similarity_threshold: f32,

   pub idle_timeout_secs:        u64,
   pub idle_check_interval_secs: u64,

   pub tokens: Vec<TokenEntry>,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         data_file:                None,
         embed_endpoint:           "http://127.0.0.1:8080".to_string(),
         embed_timeout_ms:         15_000,
         match_timeout_ms:         10_000,
         similarity_threshold:     0.70,
         idle_timeout_secs:        30 * 60,
         idle_check_interval_secs: 60,
         tokens:                   Vec::new(),
      }
   }
}

impl Config {
   pub fn load() -> Self {
      let config_path = config_file_path();
      if !config_path.exists() {
         Self::create_default_config(config_path);
      }

      Figment::from(Serialized::defaults(Self::default()))
         .merge(Toml::file(config_path))
         .merge(Env::prefixed("GALLERYD_").lowercase(false))
         .extract()
         .inspect_err(|e| tracing::warn!("failed to parse config: {e}"))
         .unwrap_or_default()
   }

   fn create_default_config(path: &Path) {
      if let Some(parent) = path.parent() {
         let _ = fs::create_dir_all(parent);
      }
      let default_config = Self::default();
      if let Ok(toml) = toml::to_string_pretty(&default_config) {
         let _ = fs::write(path, toml);
      }
   }

   pub fn embed_timeout(&self) -> std::time::Duration {
      std::time::Duration::from_millis(self.embed_timeout_ms)
   }

   pub fn match_timeout(&self) -> std::time::Duration {
      std::time::Duration::from_millis(self.match_timeout_ms)
   }
}

/// Returns the global configuration instance
pub fn get() -> &'static Config {
   CONFIG.get_or_init(Config::load)
}

/// Returns the base directory for galleryd data and configuration
pub fn base_dir() -> &'static PathBuf {
   static ONCE: OnceLock<PathBuf> = OnceLock::new();
   ONCE.get_or_init(|| {
      BaseDirs::new()
         .map(|d| d.home_dir().join(".galleryd"))
         .or_else(|| {
            std::env::var("HOME")
               .ok()
               .map(|h| PathBuf::from(h).join(".galleryd"))
         })
         .unwrap_or_else(|| {
            std::env::current_dir()
               .unwrap_or_else(|_| PathBuf::from("."))
               .join(".galleryd")
         })
   })
}

macro_rules! define_paths {
   ($($fn_name:ident: $path:literal),* $(,)?) => {
      $(
         pub fn $fn_name() -> &'static PathBuf {
            static ONCE: OnceLock<PathBuf> = OnceLock::new();
            ONCE.get_or_init(|| base_dir().join($path))
         }
      )*
   };
}

define_paths! {
   config_file_path: "config.toml",
   data_dir: "data",
   socket_path: "galleryd.sock",
}
