//! Closed sets of methods the bridge answers locally.
//!
//! Anything not listed here falls through the pipeline to the backend.

use std::fmt;

/// Methods answered by the wallet itself rather than the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletMethod {
    RequestAccounts,
    Accounts,
    Sign,
    PersonalSign,
    SignTypedData,
    SignTypedDataV3,
    SignTypedDataV4,
    ClientVersion,
    ScanQrCode,
    WatchAsset,
    RemoveFavorite,
    ShowTutorial,
    ShowAutocomplete,
}

impl WalletMethod {
    /// Every wallet method
    pub const ALL: [WalletMethod; 13] = [
        WalletMethod::RequestAccounts,
        WalletMethod::Accounts,
        WalletMethod::Sign,
        WalletMethod::PersonalSign,
        WalletMethod::SignTypedData,
        WalletMethod::SignTypedDataV3,
        WalletMethod::SignTypedDataV4,
        WalletMethod::ClientVersion,
        WalletMethod::ScanQrCode,
        WalletMethod::WatchAsset,
        WalletMethod::RemoveFavorite,
        WalletMethod::ShowTutorial,
        WalletMethod::ShowAutocomplete,
    ];

    /// Resolve a JSON-RPC method name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    /// JSON-RPC method name
    pub const fn as_str(&self) -> &'static str {
        match self {
            WalletMethod::RequestAccounts => "eth_requestAccounts",
            WalletMethod::Accounts => "eth_accounts",
            WalletMethod::Sign => "eth_sign",
            WalletMethod::PersonalSign => "personal_sign",
            WalletMethod::SignTypedData => "eth_signTypedData",
            WalletMethod::SignTypedDataV3 => "eth_signTypedData_v3",
            WalletMethod::SignTypedDataV4 => "eth_signTypedData_v4",
            WalletMethod::ClientVersion => "web3_clientVersion",
            WalletMethod::ScanQrCode => "wallet_scanQRCode",
            WalletMethod::WatchAsset => "wallet_watchAsset",
            WalletMethod::RemoveFavorite => "metamask_removeFavorite",
            WalletMethod::ShowTutorial => "metamask_showTutorial",
            WalletMethod::ShowAutocomplete => "metamask_showAutocomplete",
        }
    }

    /// Whether the method asks the user to sign something
    pub const fn is_signing(&self) -> bool {
        matches!(
            self,
            WalletMethod::Sign
                | WalletMethod::PersonalSign
                | WalletMethod::SignTypedData
                | WalletMethod::SignTypedDataV3
                | WalletMethod::SignTypedDataV4
        )
    }
}

impl fmt::Display for WalletMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter methods emulated on top of polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMethod {
    NewFilter,
    NewBlockFilter,
    NewPendingTransactionFilter,
    GetFilterChanges,
    GetFilterLogs,
    UninstallFilter,
}

impl FilterMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eth_newFilter" => Some(FilterMethod::NewFilter),
            "eth_newBlockFilter" => Some(FilterMethod::NewBlockFilter),
            "eth_newPendingTransactionFilter" => Some(FilterMethod::NewPendingTransactionFilter),
            "eth_getFilterChanges" => Some(FilterMethod::GetFilterChanges),
            "eth_getFilterLogs" => Some(FilterMethod::GetFilterLogs),
            "eth_uninstallFilter" => Some(FilterMethod::UninstallFilter),
            _ => None,
        }
    }
}

/// Subscription methods emulated on top of the block signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionMethod {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eth_subscribe" => Some(SubscriptionMethod::Subscribe),
            "eth_unsubscribe" => Some(SubscriptionMethod::Unsubscribe),
            _ => None,
        }
    }
}
