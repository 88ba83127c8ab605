//! Account records and their on-disk store
//!
//! Accounts live in `accounts.json` under the data directory. Only public
//! material is stored: the signing key, when there is one, is supplied
//! already unlocked by the caller for each operation.

use crate::contract::{Network, WalletVersion};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tonsign_cell::{Address, AddressError};

const ACCOUNTS_FILE: &str = "accounts.json";

/// Account store errors
#[derive(Error, Debug)]
pub enum AccountError {
    /// Reading or writing the store failed
    #[error("Account store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store contents are not valid JSON
    #[error("Account store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No account with this id
    #[error("Account '{0}' not found")]
    NotFound(String),

    /// Stored public key is not 32 hex-encoded bytes
    #[error("Invalid public key for account: {0}")]
    InvalidPublicKey(String),

    /// Stored address does not parse
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// Result type for account operations
pub type Result<T> = std::result::Result<T, AccountError>;

/// How the account signs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Software key, possibly password-gated upstream
    Normal,
    /// Watch-only, no key at all
    View,
    /// Key held by a hardware device
    Hardware,
}

/// Wallet belonging to an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TonWallet {
    /// Wallet address, raw or user-friendly
    pub address: String,
    /// Hex public key, unknown for some view accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Contract dialect
    pub version: WalletVersion,
    /// Hardware derivation index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl TonWallet {
    /// Parsed wallet address
    pub fn parsed_address(&self) -> Result<Address> {
        Ok(Address::parse(&self.address)?)
    }

    /// Decoded public key, if one is recorded
    pub fn public_key_bytes(&self) -> Result<Option<[u8; 32]>> {
        let Some(hex_key) = &self.public_key else {
            return Ok(None);
        };
        let mut key = [0u8; 32];
        hex::decode_to_slice(hex_key, &mut key)
            .map_err(|e| AccountError::InvalidPublicKey(e.to_string()))?;
        Ok(Some(key))
    }
}

/// One stored account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Account id
    pub id: String,
    /// Signing capability
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// Network the wallet lives on
    #[serde(default)]
    pub network: Network,
    /// The wallet
    pub ton: TonWallet,
}

/// JSON account store
pub struct AccountStore {
    base_dir: PathBuf,
}

impl AccountStore {
    /// Open the store under `base_dir`, or the platform data directory
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        let base_dir = base_dir.unwrap_or_else(|| {
            ProjectDirs::from("org", "tonsign", "tonsign").map_or_else(
                || {
                    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                    PathBuf::from(home).join(".tonsign")
                },
                |dirs| dirs.data_dir().to_path_buf(),
            )
        });
        Self { base_dir }
    }

    /// Directory holding the store
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn accounts_file(&self) -> PathBuf {
        self.base_dir.join(ACCOUNTS_FILE)
    }

    /// All accounts; a missing store is empty
    pub fn load_accounts(&self) -> Result<Vec<AccountRecord>> {
        let path = self.accounts_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let accounts: Vec<AccountRecord> = serde_json::from_str(&content)?;
        log::debug!("Loaded {} account(s) from {}", accounts.len(), path.display());
        Ok(accounts)
    }

    /// Account by id
    pub fn find(&self, id: &str) -> Result<AccountRecord> {
        self.load_accounts()?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| AccountError::NotFound(id.to_string()))
    }

    /// Replace the store contents
    pub fn save_accounts(&self, accounts: &[AccountRecord]) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let content = serde_json::to_string_pretty(accounts)?;
        fs::write(self.accounts_file(), content)?;
        log::info!("Saved {} account(s)", accounts.len());
        Ok(())
    }
}
