use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::context::DEFAULT_MAX_FEE;
use crate::error::{HarnessError, HarnessResult};

pub const DEV_TARGET_DIR: &str = "../catapult-rest/rest/target";
pub const TEST_TARGET_DIR: &str = "target/bootstrap-test";
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

pub const DEV_MODE_ENV: &str = "REST_DEV";
pub const API_URL_ENV: &str = "LEDGER_HARNESS_API_URL";

/// Which bootstrap output the address book is read from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapMode {
    /// Node built from a sibling REST checkout.
    Dev,
    #[default]
    Test,
}

impl BootstrapMode {
    pub fn target_dir(self) -> PathBuf {
        match self {
            Self::Dev => PathBuf::from(DEV_TARGET_DIR),
            Self::Test => PathBuf::from(TEST_TARGET_DIR),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub bootstrap_mode: BootstrapMode,
    /// Overrides the directory implied by `bootstrap_mode`.
    pub target_dir: Option<PathBuf>,
    /// Overrides the url recorded in the address book.
    pub api_url: Option<Url>,
    /// Attach to an already running node when false.
    pub start_service: bool,
    /// False when one node is shared by several test files.
    pub stop_on_close: bool,
    pub open_listener: bool,
    pub settle_delay_ms: u64,
    pub confirmation_timeout_ms: Option<u64>,
    pub max_fee: u64,
    pub connection_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            bootstrap_mode: BootstrapMode::Test,
            target_dir: None,
            api_url: None,
            start_service: false,
            stop_on_close: true,
            open_listener: true,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            confirmation_timeout_ms: None,
            max_fee: DEFAULT_MAX_FEE,
            connection_timeout_ms: 30_000,
            request_timeout_ms: 60_000,
        }
    }
}

impl HarnessConfig {
    pub fn with_target_dir(path: impl AsRef<Path>) -> Self {
        Self {
            target_dir: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults adjusted by `REST_DEV` and `LEDGER_HARNESS_API_URL`.
    ///
    /// Only called when a caller opts in; `Default` never reads the environment.
    pub fn from_env() -> HarnessResult<Self> {
        let mut config = Self::default();
        if std::env::var_os(DEV_MODE_ENV).is_some_and(|value| !value.is_empty()) {
            config.bootstrap_mode = BootstrapMode::Dev;
        }
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api_url = Some(
                Url::parse(&url)
                    .map_err(|err| HarnessError::Config(format!("{API_URL_ENV}: {err}")))?,
            );
        }
        Ok(config)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if let Some(url) = &self.api_url {
            if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
                return Err(HarnessError::Config(format!(
                    "unsupported api url scheme '{}'",
                    url.scheme()
                )));
            }
        }
        if self.confirmation_timeout_ms == Some(0) {
            return Err(HarnessError::Config(
                "confirmation timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn target_dir(&self) -> PathBuf {
        self.target_dir
            .clone()
            .unwrap_or_else(|| self.bootstrap_mode.target_dir())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_ms.map(Duration::from_millis)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_test_bootstrap() {
        let config = HarnessConfig::default();
        assert_eq!(config.target_dir(), PathBuf::from("target/bootstrap-test"));
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.confirmation_timeout(), None);
        assert_eq!(config.max_fee, 1_000_000);
        assert!(config.stop_on_close);
        assert!(!config.start_service);
    }

    #[test]
    fn dev_mode_and_override() {
        let mut config = HarnessConfig {
            bootstrap_mode: BootstrapMode::Dev,
            ..Default::default()
        };
        assert_eq!(config.target_dir(), PathBuf::from("../catapult-rest/rest/target"));
        config.target_dir = Some(PathBuf::from("/tmp/net"));
        assert_eq!(config.target_dir(), PathBuf::from("/tmp/net"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.json");
        std::fs::write(
            &path,
            r#"{ "bootstrap_mode": "dev", "confirmation_timeout_ms": 45000, "api_url": "http://127.0.0.1:3001" }"#,
        )
        .unwrap();
        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.bootstrap_mode, BootstrapMode::Dev);
        assert_eq!(config.confirmation_timeout(), Some(Duration::from_secs(45)));
        assert_eq!(config.api_url.unwrap().port(), Some(3001));
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
    }

    #[test]
    fn rejects_unusable_values() {
        let config = HarnessConfig {
            api_url: Some(Url::parse("ftp://example.org").unwrap()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));

        let config = HarnessConfig {
            confirmation_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
