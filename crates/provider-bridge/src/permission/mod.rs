//! Origin permission gate.
//!
//! Accounts are disclosed to a hostname only when privacy mode is off or the
//! user approved that hostname. New approvals go through the tab's single
//! [`ApprovalSlot`].

pub mod approval;

pub use approval::{ApprovalSlot, ApprovalStats, USER_DENIED_MESSAGE};

use wallet_bus::WalletState;

/// Accounts visible to `hostname`: the lowercased selected address, or none.
pub fn visible_accounts(state: &WalletState, hostname: &str) -> Vec<String> {
    if !state.may_disclose_to(hostname) {
        return Vec::new();
    }
    selected_account(state).into_iter().collect()
}

/// Lowercased selected address, ignoring permissions.
pub fn selected_account(state: &WalletState) -> Option<String> {
    state.selected_address.as_ref().map(|a| a.to_lowercase())
}
