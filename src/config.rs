use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::protocol::message::DEFAULT_LANGUAGE;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
    pub language: String,
    pub max_reply_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6000,
            timeout_ms: 5000,
            language: DEFAULT_LANGUAGE.to_string(),
            max_reply_mb: 64,
        }
    }
}

/// Values given on the command line. Unset fields keep the configured value.
#[derive(Debug, Default, serde::Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Config {
    pub fn load() -> figment::error::Result<Config> {
        Self::load_with(Overrides::default())
    }

    pub fn load_with(overrides: Overrides) -> figment::error::Result<Config> {
        Self::figment()
            .merge(Serialized::defaults(overrides))
            .extract()
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        for path in vec![global_config_path(), local_config_path()]
            .into_iter()
            .flatten()
        {
            figment = figment.merge(Yaml::file(path));
        }

        figment.merge(Env::prefixed("OCTOCOMPILE_"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reply_limit(&self) -> u64 {
        self.max_reply_mb.saturating_mul(1024 * 1024)
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn help() {
        println!("Octocompile configuration:");
        println!(
            "  system config path: {}",
            global_config_path()
                .and_then(|v| Some(v.to_str()?.to_string()))
                .unwrap_or_else(|| "none".to_string())
        );
        println!(
            "  user config path:   {}",
            local_config_path()
                .and_then(|v| Some(v.to_str()?.to_string()))
                .unwrap_or_else(|| "none".to_string())
        );
        println!();
        println!("Current configuration:");
        match Config::load() {
            Ok(c) => {
                c.show();
            }
            Err(e) => {
                println!("  ERROR: {e}");
            }
        }
        println!();
    }

    fn show(&self) {
        match serde_yaml::to_string(self) {
            Ok(v) => println!("{v}"),
            Err(e) => println!("  ERROR: {e}"),
        }
    }
}

fn local_config_path() -> Option<PathBuf> {
    Some(
        BaseDirs::new()?
            .config_dir()
            .join("octocompile")
            .join("octocompile.conf"),
    )
}

#[cfg(windows)]
fn global_config_path() -> Option<PathBuf> {
    use std::env;

    Some(
        PathBuf::from(env::var("ProgramData").ok()?)
            .join("octocompile")
            .join("octocompile.conf"),
    )
}

#[cfg(unix)]
fn global_config_path() -> Option<PathBuf> {
    Some(
        PathBuf::from("/etc")
            .join("octocompile")
            .join("octocompile.conf"),
    )
}
