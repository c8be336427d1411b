use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarnessError, HarnessResult};
use crate::identity::NetworkType;

pub const ADDRESS_BOOK_FILE: &str = "addresses.json";
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Address book written by the bootstrap toolchain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAddresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<NetworkType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nemesis_generation_hash_seed: Option<String>,
    #[serde(default)]
    pub mosaics: Vec<MosaicAccounts>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MosaicAccounts {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub accounts: Vec<AccountDescriptor>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl GeneratedAddresses {
    pub fn save(&self, path: impl AsRef<Path>) -> HarnessResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Private keys of the first (native currency) mosaic, empty entries dropped.
    pub fn private_keys(&self) -> Vec<String> {
        self.mosaics
            .first()
            .map(|mosaic| {
                mosaic
                    .accounts
                    .iter()
                    .filter_map(|account| account.private_key.as_deref())
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Keys and endpoint a session is built from.
#[derive(Clone, Debug)]
pub struct AddressBook {
    pub private_keys: Vec<String>,
    pub api_url: Url,
    pub addresses: GeneratedAddresses,
}

impl AddressBook {
    pub fn path_in(target_dir: &Path) -> PathBuf {
        target_dir.join(ADDRESS_BOOK_FILE)
    }

    /// Reads `<target_dir>/addresses.json`. Any failure is terminal for the session.
    pub fn load(target_dir: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = Self::path_in(target_dir.as_ref());
        let no_identities = |reason: String| HarnessError::NoIdentities {
            path: path.clone(),
            reason,
        };

        let file = File::open(&path).map_err(|err| no_identities(err.to_string()))?;
        let addresses: GeneratedAddresses = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| no_identities(format!("malformed address book: {err}")))?;
        Self::from_addresses(addresses).map_err(|reason| no_identities(reason.to_owned()))
    }

    fn from_addresses(addresses: GeneratedAddresses) -> Result<Self, &'static str> {
        let private_keys = addresses.private_keys();
        if private_keys.is_empty() {
            return Err("nemesis accounts could not be loaded");
        }
        let api_url = Url::parse(DEFAULT_API_URL).map_err(|_| "invalid default api url")?;
        Ok(Self {
            private_keys,
            api_url,
            addresses,
        })
    }
}
