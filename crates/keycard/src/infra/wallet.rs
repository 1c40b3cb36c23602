use async_trait::async_trait;
use log::{debug, info};
use nostr_sdk::{EventBuilder, JsonUtil, Keys, Kind, ToBech32};
use std::{
    fmt,
    fs::{self, File},
    io::{Read, Write},
    path::Path,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("no wallet account connected")]
    NotConnected,
    #[error("signature request rejected: {0}")]
    Rejected(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("failed to load wallet key: {0}")]
    Key(String),
}

/// Capability exposed by whatever wallet the user has connected
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Account identifier, `None` until a wallet is connected
    fn account(&self) -> Option<String>;

    /// Sign an arbitrary message, returning an opaque signature
    async fn sign_message(&self, message: &str) -> Result<String, WalletError>;
}

/// Local key wallet. The signature it returns is a signed NIP-98 (kind 27235)
/// event whose content is the message, serialized as JSON.
#[derive(Clone)]
pub enum KeysWallet {
    Connected(Keys),
    Disconnected,
}

impl fmt::Debug for KeysWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeysWallet::Connected(keys) => f
                .debug_tuple("Connected")
                .field(&keys.public_key().to_hex())
                .finish(),
            KeysWallet::Disconnected => f.debug_tuple("Disconnected").finish(),
        }
    }
}

impl KeysWallet {
    pub fn new(keys: Keys) -> Self {
        KeysWallet::Connected(keys)
    }

    /// Load the key stored at `file_path`, generating and saving one when the
    /// file does not exist yet. The file holds a single bech32 `nsec`.
    pub fn from_key_file(file_path: &str) -> Result<Self, WalletError> {
        let keys = if Path::new(file_path).exists() {
            read_keys(file_path)?
        } else {
            info!("no wallet key at {}, generating a new one", file_path);
            let keys = Keys::generate();
            save_keys(file_path, &keys)?;
            keys
        };
        Ok(KeysWallet::Connected(keys))
    }
}

#[async_trait]
impl Wallet for KeysWallet {
    fn account(&self) -> Option<String> {
        match self {
            KeysWallet::Connected(keys) => keys.public_key().to_bech32().ok(),
            KeysWallet::Disconnected => None,
        }
    }

    async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
        let KeysWallet::Connected(keys) = self else {
            return Err(WalletError::NotConnected);
        };
        debug!("signing {} byte message", message.len());

        let event = EventBuilder::new(Kind::HttpAuth, message)
            .sign_with_keys(keys)
            .map_err(|e| WalletError::Signing(e.to_string()))?;

        Ok(event.as_json())
    }
}

fn read_keys(file_path: &str) -> Result<Keys, WalletError> {
    let mut file = File::open(file_path).map_err(|e| WalletError::Key(e.to_string()))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| WalletError::Key(e.to_string()))?;

    Keys::parse(content.trim()).map_err(|e| WalletError::Key(e.to_string()))
}

fn save_keys(file_path: &str, keys: &Keys) -> Result<(), WalletError> {
    if let Some(parent) = Path::new(file_path).parent() {
        fs::create_dir_all(parent).map_err(|e| WalletError::Key(e.to_string()))?;
    }
    let nsec = keys
        .secret_key()
        .to_bech32()
        .map_err(|e| WalletError::Key(e.to_string()))?;

    let mut file = File::create(file_path).map_err(|e| WalletError::Key(e.to_string()))?;
    file.write_all(nsec.as_bytes())
        .map_err(|e| WalletError::Key(e.to_string()))?;
    Ok(())
}
