//! Wallet provider seam and wallet state derivation
//!
//! The embedder implements [`WalletProvider`]; the tracker re-derives the
//! session's wallet fields from it on every tick and event, degrading to
//! the placeholder strings the collector already understands when the
//! provider is absent or failing.

use crate::error::Result;
use crate::session::types::WalletInfo;
use async_trait::async_trait;

/// Placeholder used when no account is exposed
pub const NO_WALLET_CONNECTED: &str = "No Wallet Connected";
/// Placeholder used when no provider is installed
pub const NO_WALLET_DETECTED: &str = "No Wallet Detected";
/// Chain placeholder for an installed but unconnected provider
pub const NOT_CONNECTED: &str = "Not Connected";

/// Wallet types that mark a user as a web3 user even when not connected
const KNOWN_WALLET_TYPES: &[&str] = &[
    "MetaMask",
    "Trust Wallet",
    "Coinbase Wallet",
    "Brave Wallet",
    "Frame",
    "Phantom",
    "TronLink",
    "Web3 Wallet",
];

/// External wallet provider injected by the embedder
///
/// Implementations are expected to answer without prompting the user,
/// the equivalent of a silent `eth_accounts` query.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Human-readable provider brand, e.g. "MetaMask"
    fn wallet_type(&self) -> String;

    /// Currently exposed account addresses, empty when not connected
    async fn accounts(&self) -> Result<Vec<String>>;

    /// Numeric chain identifier, `None` when the provider does not know it
    async fn chain_id(&self) -> Result<Option<u64>>;
}

/// Wallet state derived from one provider observation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletSnapshot {
    pub info: WalletInfo,
    pub connected: bool,
    pub is_web3_user: bool,
}

/// Map a numeric chain id to the collector's chain names
pub fn chain_name_from_id(network_id: u64) -> String {
    match network_id {
        1 => "Ethereum Mainnet".to_string(),
        56 => "Binance Smart Chain".to_string(),
        137 => "Polygon".to_string(),
        10 => "Optimism".to_string(),
        42161 => "Arbitrum One".to_string(),
        250 => "Fantom Opera".to_string(),
        43114 => "Avalanche".to_string(),
        100 => "xDai".to_string(),
        1313161554 => "Aurora".to_string(),
        other => format!("Unknown (ID: {})", other),
    }
}

/// Observe the provider and derive the session's wallet fields
///
/// Never fails: provider errors are logged and collapse into the
/// placeholder strings.
pub async fn observe(provider: Option<&dyn WalletProvider>) -> WalletSnapshot {
    let Some(provider) = provider else {
        return WalletSnapshot {
            info: WalletInfo {
                wallet_address: NO_WALLET_CONNECTED.to_string(),
                wallet_type: NO_WALLET_DETECTED.to_string(),
                chain_name: NOT_CONNECTED.to_string(),
            },
            connected: false,
            is_web3_user: false,
        };
    };

    let wallet_type = provider.wallet_type();

    let (address, connected, chain_name) = match provider.accounts().await {
        Ok(accounts) if !accounts.is_empty() => {
            let address = accounts[0].clone();
            let chain_name = match provider.chain_id().await {
                Ok(Some(id)) => chain_name_from_id(id),
                Ok(None) => NOT_CONNECTED.to_string(),
                Err(err) => {
                    tracing::warn!("Error getting chain id: {}", err);
                    "Unknown Chain".to_string()
                }
            };
            (address, true, chain_name)
        }
        Ok(_) => (String::new(), false, NOT_CONNECTED.to_string()),
        Err(err) => {
            tracing::warn!("Error getting accounts: {}", err);
            (String::new(), false, "Error".to_string())
        }
    };

    let has_address = !address.is_empty() && address != NO_WALLET_CONNECTED;
    let has_chain =
        !matches!(chain_name.as_str(), NOT_CONNECTED | "No Chain Detected" | "Error");
    let known_type = KNOWN_WALLET_TYPES.contains(&wallet_type.as_str());

    WalletSnapshot {
        is_web3_user: connected || has_address || has_chain || known_type,
        connected,
        info: WalletInfo {
            wallet_address: if address.is_empty() {
                NO_WALLET_CONNECTED.to_string()
            } else {
                address
            },
            wallet_type: if wallet_type.is_empty() {
                NO_WALLET_DETECTED.to_string()
            } else {
                wallet_type
            },
            chain_name: if chain_name.is_empty() {
                "No Chain Detected".to_string()
            } else {
                chain_name
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FakeWallet {
        wallet_type: &'static str,
        accounts: Result<Vec<String>>,
        chain_id: Result<Option<u64>>,
    }

    impl FakeWallet {
        fn connected(chain_id: u64) -> Self {
            Self {
                wallet_type: "MetaMask",
                accounts: Ok(vec!["0xabc123".to_string()]),
                chain_id: Ok(Some(chain_id)),
            }
        }
    }

    #[async_trait]
    impl WalletProvider for FakeWallet {
        fn wallet_type(&self) -> String {
            self.wallet_type.to_string()
        }

        async fn accounts(&self) -> Result<Vec<String>> {
            match &self.accounts {
                Ok(accounts) => Ok(accounts.clone()),
                Err(_) => Err(anyhow!("accounts unavailable")),
            }
        }

        async fn chain_id(&self) -> Result<Option<u64>> {
            match &self.chain_id {
                Ok(id) => Ok(*id),
                Err(_) => Err(anyhow!("chain unavailable")),
            }
        }
    }

    #[test]
    fn test_known_chain_names() {
        assert_eq!(chain_name_from_id(1), "Ethereum Mainnet");
        assert_eq!(chain_name_from_id(56), "Binance Smart Chain");
        assert_eq!(chain_name_from_id(137), "Polygon");
        assert_eq!(chain_name_from_id(42161), "Arbitrum One");
        assert_eq!(chain_name_from_id(1313161554), "Aurora");
    }

    #[test]
    fn test_unknown_chain_carries_id() {
        assert_eq!(chain_name_from_id(31337), "Unknown (ID: 31337)");
    }

    #[tokio::test]
    async fn test_observe_without_provider() {
        let snapshot = observe(None).await;
        assert!(!snapshot.connected);
        assert!(!snapshot.is_web3_user);
        assert_eq!(snapshot.info.wallet_address, NO_WALLET_CONNECTED);
        assert_eq!(snapshot.info.wallet_type, NO_WALLET_DETECTED);
        assert_eq!(snapshot.info.chain_name, NOT_CONNECTED);
    }

    #[tokio::test]
    async fn test_observe_connected_wallet() {
        let wallet = FakeWallet::connected(137);
        let snapshot = observe(Some(&wallet)).await;
        assert!(snapshot.connected);
        assert!(snapshot.is_web3_user);
        assert_eq!(snapshot.info.wallet_address, "0xabc123");
        assert_eq!(snapshot.info.wallet_type, "MetaMask");
        assert_eq!(snapshot.info.chain_name, "Polygon");
    }

    #[tokio::test]
    async fn test_installed_but_unconnected_wallet_is_web3_user() {
        let wallet = FakeWallet {
            wallet_type: "MetaMask",
            accounts: Ok(Vec::new()),
            chain_id: Ok(None),
        };
        let snapshot = observe(Some(&wallet)).await;
        assert!(!snapshot.connected);
        // A recognized wallet brand marks a web3 user even when idle.
        assert!(snapshot.is_web3_user);
        assert_eq!(snapshot.info.wallet_address, NO_WALLET_CONNECTED);
        assert_eq!(snapshot.info.chain_name, NOT_CONNECTED);
    }

    #[tokio::test]
    async fn test_account_error_degrades_to_error_chain() {
        let wallet = FakeWallet {
            wallet_type: "Unknown Wallet",
            accounts: Err(anyhow!("rpc down")),
            chain_id: Ok(None),
        };
        let snapshot = observe(Some(&wallet)).await;
        assert!(!snapshot.connected);
        assert!(!snapshot.is_web3_user);
        assert_eq!(snapshot.info.chain_name, "Error");
    }

    #[tokio::test]
    async fn test_chain_error_uses_unknown_chain() {
        let wallet = FakeWallet {
            wallet_type: "Frame",
            accounts: Ok(vec!["0xdef".to_string()]),
            chain_id: Err(anyhow!("rpc down")),
        };
        let snapshot = observe(Some(&wallet)).await;
        assert!(snapshot.connected);
        assert_eq!(snapshot.info.chain_name, "Unknown Chain");
    }
}
