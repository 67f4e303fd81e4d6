//! # Account Permission Flows
//!
//! Account disclosure across a whole tab: the origin gate, the one-slot
//! approval prompt and the `accountsChanged` pushes driven by wallet events.
//!
//! ## Properties Tested:
//!
//! - Accounts are empty before approval and lowercase after
//! - Concurrent `eth_requestAccounts` from one hostname share one prompt
//! - A second hostname cannot queue behind a pending prompt
//! - Navigation away cancels the pending approval and dismisses the prompt
//! - Clearing approvals notifies every bridge with an empty account list

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use futures::future::join_all;
    use provider_bridge::{BridgeError, RpcNotification};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;
    use wallet_bus::WalletState;

    fn lower() -> String {
        ADDRESS.to_lowercase()
    }

    // =============================================================================
    // DISCLOSURE
    // =============================================================================

    #[tokio::test]
    async fn test_accounts_hidden_until_approved() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let before = h.call(DAPP_ORIGIN, 1, "eth_accounts", json!([])).await;
        assert_eq!(before["result"], json!([]));

        h.request(DAPP_ORIGIN, 2, "eth_requestAccounts", json!([]));
        h.wait_for_prompts(1).await;

        let prompt = &h.ui.prompts()[0];
        assert_eq!(prompt.hostname, DAPP_HOST);
        assert_eq!(prompt.meta.url, DAPP_URL);

        assert_eq!(h.tab.approve_accounts().await.unwrap(), DAPP_HOST);
        assert_eq!(h.response(2).await["result"], json!([lower()]));
        assert!(h.wallet.snapshot().is_host_approved(DAPP_HOST));

        let after = h.call(DAPP_ORIGIN, 3, "eth_accounts", json!([])).await;
        assert_eq!(after["result"], json!([lower()]));
    }

    #[tokio::test]
    async fn test_privacy_mode_off_discloses_immediately() {
        let h = Harness::with_state(WalletState {
            selected_address: Some(ADDRESS.to_string()),
            privacy_mode: false,
            ..WalletState::default()
        });
        h.open(DAPP_URL);

        let accounts = h.call(DAPP_ORIGIN, 1, "eth_accounts", json!([])).await;
        assert_eq!(accounts["result"], json!([lower()]));
        let requested = h.call(DAPP_ORIGIN, 2, "eth_requestAccounts", json!([])).await;
        assert_eq!(requested["result"], json!([lower()]));
        assert!(h.ui.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_approved_host_skips_prompt_unless_forced() {
        let h = Harness::new();
        h.wallet.approve_host(DAPP_HOST).await;
        h.open(DAPP_URL);

        let requested = h.call(DAPP_ORIGIN, 1, "eth_requestAccounts", json!([])).await;
        assert_eq!(requested["result"], json!([lower()]));
        assert!(h.ui.prompts().is_empty());

        h.request(DAPP_ORIGIN, 2, "eth_requestAccounts", json!([{"force": true}]));
        h.wait_for_prompts(1).await;
        h.tab.approve_accounts().await.unwrap();
        assert_eq!(h.response(2).await["result"], json!([lower()]));
    }

    // =============================================================================
    // APPROVAL PROMPT
    // =============================================================================

    #[tokio::test]
    async fn test_rapid_requests_share_one_prompt() {
        let h = Harness::new();
        h.open(DAPP_URL);

        h.request(DAPP_ORIGIN, 1, "eth_requestAccounts", json!([]));
        h.request(DAPP_ORIGIN, 2, "eth_requestAccounts", json!([]));
        h.wait_for_prompts(1).await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(h.ui.prompts().len(), 1);
        assert_eq!(h.tab.approvals().waiter_count(), 2);

        h.tab.approve_accounts().await.unwrap();
        let responses = join_all([h.response(1), h.response(2)]).await;
        for response in responses {
            assert_eq!(response["result"], json!([lower()]));
        }
        assert!(!h.tab.approvals().is_pending());
    }

    #[tokio::test]
    async fn test_rejection_answers_every_waiter() {
        let h = Harness::new();
        h.open(DAPP_URL);

        h.request(DAPP_ORIGIN, 1, "eth_requestAccounts", json!([]));
        h.request(DAPP_ORIGIN, 2, "eth_requestAccounts", json!([]));
        h.wait_for_prompts(1).await;

        assert_eq!(h.tab.reject_accounts().unwrap(), DAPP_HOST);
        for id in [1, 2] {
            let response = h.response(id).await;
            assert_eq!(response["error"]["code"], 4001);
        }
        assert!(!h.wallet.snapshot().is_host_approved(DAPP_HOST));

        let accounts = h.call(DAPP_ORIGIN, 3, "eth_accounts", json!([])).await;
        assert_eq!(accounts["result"], json!([]));
    }

    #[tokio::test]
    async fn test_second_host_cannot_queue() {
        let h = Harness::new();
        h.open(DAPP_URL);
        h.tab_event("FRAME_READY", json!({"url": WIDGET_URL})).unwrap();

        h.request(DAPP_ORIGIN, 1, "eth_requestAccounts", json!([]));
        let other = h.call(WIDGET_URL, 2, "eth_requestAccounts", json!([])).await;
        assert_eq!(other["error"]["code"], 4001);

        h.wait_for_prompts(1).await;
        assert_eq!(h.ui.prompts()[0].hostname, DAPP_HOST);
        assert_eq!(h.tab.approvals().pending_hostname().as_deref(), Some(DAPP_HOST));
    }

    #[tokio::test]
    async fn test_decisions_without_pending_request() {
        let h = Harness::new();
        h.open(DAPP_URL);

        assert!(matches!(
            h.tab.approve_accounts().await,
            Err(BridgeError::NoPendingApproval)
        ));
        assert!(matches!(
            h.tab.reject_accounts(),
            Err(BridgeError::NoPendingApproval)
        ));
        assert!(h.wallet.snapshot().approved_hosts.is_empty());
    }

    // =============================================================================
    // TEARDOWN
    // =============================================================================

    #[tokio::test]
    async fn test_navigation_cancels_pending_approval() {
        let h = Harness::new();
        h.open(DAPP_URL);

        h.request(DAPP_ORIGIN, 1, "eth_requestAccounts", json!([]));
        h.wait_for_prompts(1).await;

        h.open("https://other.example/");

        assert!(!h.tab.approvals().is_pending());
        assert_eq!(h.ui.dismissed(), 1);
        assert!(matches!(
            h.tab.approve_accounts().await,
            Err(BridgeError::NoPendingApproval)
        ));

        // The old page is gone; nothing is written back to it.
        sleep(Duration::from_millis(50)).await;
        assert!(h.responses().iter().all(|p| p.payload["id"] != 1));
        assert!(!h.wallet.snapshot().is_host_approved(DAPP_HOST));
    }

    #[tokio::test]
    async fn test_teardown_before_prompt_never_shows_it() {
        let h = Harness::new();
        h.open(DAPP_URL);

        h.request(DAPP_ORIGIN, 1, "eth_requestAccounts", json!([]));
        assert!(h.eventually(|| h.tab.approvals().is_pending()).await);
        h.tab.close();

        sleep(Duration::from_millis(100)).await;
        assert!(h.ui.prompts().is_empty());
        assert_eq!(h.ui.dismissed(), 0);
    }

    // =============================================================================
    // ACCOUNT NOTIFICATIONS
    // =============================================================================

    #[tokio::test]
    async fn test_clearing_hosts_notifies_every_bridge() {
        let h = Harness::new();
        h.wallet.approve_host(DAPP_HOST).await;
        h.open(DAPP_URL);
        h.tab_event("FRAME_READY", json!({"url": WIDGET_URL})).unwrap();

        h.wallet.clear_approved_hosts().await;

        assert!(
            h.eventually(|| h.notifications("accountsChanged").len() >= 2)
                .await
        );
        let notes = h.notifications("accountsChanged");
        assert!(notes.iter().any(|n| n.main_frame));
        assert!(notes.iter().any(|n| !n.main_frame));
        assert!(notes.iter().all(|n| n.payload["params"] == json!([])));
    }

    #[tokio::test]
    async fn test_selected_address_change_is_restricted() {
        let h = Harness::new();
        h.wallet.approve_host(DAPP_HOST).await;
        h.open(DAPP_URL);
        h.tab_event("FRAME_READY", json!({"url": WIDGET_URL})).unwrap();

        h.wallet.set_selected_address(OTHER_ADDRESS).await;

        assert!(
            h.eventually(|| !h.notifications("accountsChanged").is_empty())
                .await
        );
        sleep(Duration::from_millis(50)).await;

        let notes = h.notifications("accountsChanged");
        assert_eq!(notes.len(), 1);
        assert!(notes[0].main_frame);
        assert_eq!(
            notes[0].payload["params"],
            json!([OTHER_ADDRESS.to_lowercase()])
        );
    }

    #[tokio::test]
    async fn test_no_push_without_any_approval() {
        let h = Harness::new();
        h.open(DAPP_URL);

        h.wallet.set_selected_address(OTHER_ADDRESS).await;
        h.wallet.clear_approved_hosts().await;
        sleep(Duration::from_millis(50)).await;

        assert!(h.notifications("accountsChanged").is_empty());
    }

    #[tokio::test]
    async fn test_notify_connection_targets_hostname() {
        let h = Harness::new();
        h.open(DAPP_URL);
        h.tab_event("FRAME_READY", json!({"url": WIDGET_URL})).unwrap();

        h.tab.notify_connection(
            RpcNotification::new("chainChanged", json!("0x2a")),
            WIDGET_HOST,
            false,
        );
        assert!(
            h.eventually(|| !h.notifications("chainChanged").is_empty())
                .await
        );
        let notes = h.notifications("chainChanged");
        assert_eq!(notes.len(), 1);
        assert!(!notes[0].main_frame);

        // Restricted pushes skip hosts that may not see accounts.
        h.tab.notify_all_connections(
            RpcNotification::new("accountsChanged", json!([lower()])),
            true,
        );
        sleep(Duration::from_millis(50)).await;
        assert!(h.notifications("accountsChanged").is_empty());
    }
}
