//! # Integration Test Flows
//!
//! Page traffic through a whole tab: raw messages in, injected scripts out.
//!
//! ## Flows Tested:
//!
//! 1. **Request/response**: every request id is answered exactly once
//! 2. **Public config**: initial snapshot and re-emission on wallet changes
//! 3. **Emulation**: `newHeads` subscriptions and block filters fed by block arrivals
//! 4. **Frames**: nested frames get their own bridge; navigation replaces bridges
//! 5. **Signing**: page metadata, `personal_sign` ordering, typed data chain checks,
//!    ironman FIBOS signing replies
//! 6. **Teardown**: a closed tab stops every stream

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use provider_bridge::{BridgeError, BridgeState};
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    // =============================================================================
    // REQUEST / RESPONSE
    // =============================================================================

    #[tokio::test]
    async fn test_every_request_answered_exactly_once() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let methods = [
            "eth_blockNumber",
            "eth_chainId",
            "web3_clientVersion",
            "eth_accounts",
            "eth_doesNotExist",
            "eth_getBalance",
        ];
        for (i, method) in methods.iter().enumerate() {
            h.request(DAPP_ORIGIN, i as u64 + 1, method, json!([]));
        }

        assert!(h.eventually(|| h.responses().len() >= methods.len()).await);
        sleep(Duration::from_millis(50)).await;

        let responses = h.responses();
        assert_eq!(responses.len(), methods.len());
        let ids: HashSet<u64> = responses
            .iter()
            .filter_map(|p| p.payload["id"].as_u64())
            .collect();
        assert_eq!(ids, (1..=methods.len() as u64).collect::<HashSet<u64>>());

        assert_eq!(h.response(1).await["result"], "0x10");
        assert!(h.response(3).await["result"]
            .as_str()
            .unwrap()
            .ends_with("/Beta/Mobile"));
        assert_eq!(h.response(4).await["result"], json!([]));
        assert_eq!(h.response(5).await["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_malformed_payload_with_id_is_rejected() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let raw = Harness::port_message(DAPP_ORIGIN, json!({"id": 9, "params": []}));
        h.tab.on_message(&raw).unwrap();

        let response = h.response(9).await;
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_bad_page_messages_are_refused() {
        let h = Harness::new();
        h.open(DAPP_URL);

        assert!(matches!(
            h.tab.on_message("{not json"),
            Err(BridgeError::MalformedMessage(_))
        ));
        assert!(matches!(
            h.tab.on_message(r#"{"unexpected": true}"#),
            Err(BridgeError::MalformedMessage(_))
        ));

        let huge = "x".repeat(Harness::config().limits.max_message_size + 1);
        let raw = Harness::port_message(DAPP_ORIGIN, json!({"id": 1, "method": huge}));
        assert!(matches!(
            h.tab.on_message(&raw),
            Err(BridgeError::MalformedMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_slow_and_fast_requests() {
        let h = Harness::new();
        h.open(DAPP_URL);

        // The approval wait must not hold up anything queued behind it.
        h.request(DAPP_ORIGIN, 1, "eth_requestAccounts", json!([]));
        let fast = timeout(WAIT, h.call(DAPP_ORIGIN, 2, "eth_chainId", json!([])))
            .await
            .expect("fast request answered while approval pending");
        assert_eq!(fast["result"], "0x1");
        assert!(h.tab.approvals().is_pending());
    }

    // =============================================================================
    // PUBLIC CONFIG
    // =============================================================================

    #[tokio::test]
    async fn test_public_config_follows_wallet() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let configs = h.public_configs();
        assert_eq!(configs.len(), 1);
        assert_eq!(
            configs[0],
            json!({"isUnlocked": true, "networkVersion": "1", "chainId": "0x1"})
        );

        h.wallet.set_network("42", "kovan").await;
        assert!(
            h.eventually(|| h.public_configs().iter().any(|c| c["chainId"] == "0x2a"))
                .await
        );

        h.wallet.set_unlocked(false).await;
        assert!(
            h.eventually(|| h
                .public_configs()
                .last()
                .is_some_and(|c| c["isUnlocked"] == false))
                .await
        );

        let bridges = h.tab.bridges();
        assert!(
            h.eventually(|| !bridges[0].updates().borrow().is_unlocked)
                .await
        );
    }

    // =============================================================================
    // EMULATION
    // =============================================================================

    #[tokio::test]
    async fn test_new_heads_subscription() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let response = h.call(DAPP_ORIGIN, 1, "eth_subscribe", json!(["newHeads"])).await;
        let subscription = response["result"].as_str().unwrap().to_string();

        h.backend.set_head(0x11);
        h.wallet.notify_block(0x11).await;

        assert!(
            h.eventually(|| !h.notifications("eth_subscription").is_empty())
                .await
        );
        let note = &h.notifications("eth_subscription")[0].payload;
        assert_eq!(note["params"]["subscription"], subscription.as_str());
        assert_eq!(
            note["params"]["result"]["hash"],
            ChainBackend::block_hash(0x11).as_str()
        );

        let response = h
            .call(DAPP_ORIGIN, 2, "eth_unsubscribe", json!([subscription]))
            .await;
        assert_eq!(response["result"], true);
    }

    #[tokio::test]
    async fn test_block_filter_catches_up() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let response = h.call(DAPP_ORIGIN, 1, "eth_newBlockFilter", json!([])).await;
        let filter = response["result"].as_str().unwrap().to_string();

        h.backend.set_head(0x12);
        h.wallet.notify_block(0x12).await;

        let mut hashes = Vec::new();
        for id in 100..140u64 {
            let changes = h
                .call(DAPP_ORIGIN, id, "eth_getFilterChanges", json!([&filter]))
                .await;
            hashes.extend(changes["result"].as_array().cloned().unwrap_or_default());
            if hashes.len() >= 2 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            hashes,
            vec![
                Value::from(ChainBackend::block_hash(0x11)),
                Value::from(ChainBackend::block_hash(0x12)),
            ]
        );

        let response = h.call(DAPP_ORIGIN, 200, "eth_getFilterChanges", json!(["0xdead"])).await;
        assert_eq!(response["error"]["code"], -32602);
    }

    // =============================================================================
    // FRAMES
    // =============================================================================

    #[tokio::test]
    async fn test_nested_frame_routing() {
        let h = Harness::new();
        h.open(DAPP_URL);
        h.tab_event("FRAME_READY", json!({"url": WIDGET_URL})).unwrap();

        let bridges = h.tab.bridges();
        assert_eq!(bridges.len(), 2);
        assert!(bridges[0].is_main_frame());
        assert_eq!(bridges[1].hostname(), WIDGET_HOST);
        assert_eq!(h.tab.main_hostname().as_deref(), Some(DAPP_HOST));

        h.request(WIDGET_URL, 1, "eth_chainId", json!([]));
        h.request(DAPP_ORIGIN, 2, "eth_chainId", json!([]));
        h.response(1).await;
        h.response(2).await;

        let responses = h.responses();
        let nested = responses.iter().find(|p| p.payload["id"] == 1).unwrap();
        let main = responses.iter().find(|p| p.payload["id"] == 2).unwrap();
        assert!(!nested.main_frame);
        assert!(main.main_frame);

        // Nested bridge published its own config into the iframes.
        assert!(h
            .posted()
            .iter()
            .any(|p| !p.main_frame && p.channel == "publicConfig"));
    }

    #[tokio::test]
    async fn test_unknown_origin_is_ignored() {
        let h = Harness::new();
        h.open(DAPP_URL);

        h.request("https://stranger.example", 1, "eth_chainId", json!([]));
        sleep(Duration::from_millis(50)).await;
        assert!(h.responses().is_empty());
    }

    #[tokio::test]
    async fn test_phishing_origin_gets_no_bridge() {
        let h = Harness::new();

        assert!(matches!(
            h.tab.on_load_start(PHISHING_URL),
            Err(BridgeError::PhishingOrigin(_))
        ));
        assert!(h.tab.bridges().is_empty());

        h.open(DAPP_URL);
        assert!(matches!(
            h.tab_event("FRAME_READY", json!({"url": PHISHING_URL})),
            Err(BridgeError::PhishingOrigin(_))
        ));
        assert_eq!(h.tab.bridges().len(), 1);
    }

    #[tokio::test]
    async fn test_navigation_replaces_bridges() {
        let h = Harness::new();
        h.open(DAPP_URL);
        h.tab_event("FRAME_READY", json!({"url": WIDGET_URL})).unwrap();
        let old = h.tab.bridges();

        h.open("https://other.example/start");

        assert!(old.iter().all(|b| b.state() == BridgeState::Disconnected));
        let bridges = h.tab.bridges();
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].url(), "https://other.example");

        h.request(DAPP_ORIGIN, 7, "eth_chainId", json!([]));
        sleep(Duration::from_millis(50)).await;
        assert!(h.responses().iter().all(|p| p.payload["id"] != 7));
    }

    // =============================================================================
    // SIGNING
    // =============================================================================

    #[tokio::test]
    async fn test_personal_sign_either_order() {
        let h = Harness::new();
        h.open(DAPP_URL);
        h.tab_event(
            "GET_TITLE_FOR_BOOKMARK",
            json!({"title": "Dapp Title", "url": DAPP_URL}),
        )
        .unwrap();

        let data = "0xdeadbeef";
        let a = h.call(DAPP_ORIGIN, 1, "personal_sign", json!([data, ADDRESS])).await;
        let b = h.call(DAPP_ORIGIN, 2, "personal_sign", json!([ADDRESS, data])).await;
        assert_eq!(a["result"], "0x5167");
        assert_eq!(b["result"], "0x5167");

        let requests = h.signer.requests();
        assert_eq!(requests.len(), 2);
        for (kind, request) in requests {
            assert_eq!(kind, "personal_sign");
            assert_eq!(request.data, data);
            assert!(request.from.eq_ignore_ascii_case(ADDRESS));
            assert_eq!(request.meta.title, "Dapp Title");
        }
    }

    #[tokio::test]
    async fn test_typed_data_v4_chain_mismatch() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let typed = |chain_id: Value| {
            json!({
                "types": {"EIP712Domain": [{"name": "chainId", "type": "uint256"}]},
                "domain": {"chainId": chain_id},
                "primaryType": "EIP712Domain",
                "message": {}
            })
        };

        let rejected = h
            .call(DAPP_ORIGIN, 1, "eth_signTypedData_v4", json!([ADDRESS, typed(json!(5))]))
            .await;
        assert!(rejected["error"].is_object());
        assert!(h.signer.requests().is_empty());

        let as_text = typed(json!("0x1")).to_string();
        let accepted = h
            .call(DAPP_ORIGIN, 2, "eth_signTypedData_v4", json!([ADDRESS, as_text]))
            .await;
        assert_eq!(accepted["result"], "0x5167");
        assert_eq!(h.signer.requests()[0].0, "typed_V4");
    }

    #[tokio::test]
    async fn test_ironman_sign_confirmed() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let request = json!({
            "ironman": "signProvider",
            "id": "req-1",
            "params": {"transaction": {"actions": [{"name": "transfer"}]}}
        });
        h.tab.on_message(&request.to_string()).unwrap();

        assert!(h.eventually(|| !h.frame.window_messages().is_empty()).await);
        let reply = &h.frame.window_messages()[0];
        assert_eq!(reply["id"], "req-1");
        assert_eq!(reply["ironman"], "signProvider");
        assert_eq!(reply["params"], request["params"]);
        assert_eq!(reply["data"], json!([FibosKeys::SIGNATURE]));
        assert_eq!(h.fibos.signed(), vec![request["params"]["transaction"].clone()]);

        // Side-channel replies never go through a bridge
        assert!(h.responses().is_empty());
    }

    #[tokio::test]
    async fn test_ironman_sign_cancelled() {
        let h = Harness::new();
        h.open(DAPP_URL);
        h.fibos.set_confirm(false);

        let request = json!({"ironman": "signProvider", "params": {"transaction": {}}});
        h.tab.on_message(&request.to_string()).unwrap();

        assert!(h.eventually(|| !h.frame.window_messages().is_empty()).await);
        let reply = &h.frame.window_messages()[0];
        assert_eq!(reply["data"], "fail");
        assert!(h.fibos.signed().is_empty());
    }

    #[tokio::test]
    async fn test_ironman_without_transaction_is_ignored() {
        let h = Harness::new();
        h.open(DAPP_URL);

        h.tab
            .on_message(r#"{"ironman":"signProvider","params":{}}"#)
            .unwrap();
        h.tab
            .on_message(r#"{"ironman":"requireIdentity","params":{"transaction":{}}}"#)
            .unwrap();

        sleep(Duration::from_millis(50)).await;
        assert!(h.frame.window_messages().is_empty());
        assert!(h.fibos.signed().is_empty());
    }

    // =============================================================================
    // WALLET METHODS
    // =============================================================================

    #[tokio::test]
    async fn test_remove_favorite_only_from_home() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let denied = h
            .call(DAPP_ORIGIN, 1, "metamask_removeFavorite", json!(["https://dapp.example/"]))
            .await;
        assert_eq!(denied["error"]["code"], 4100);
        assert_eq!(h.ui.favorites().len(), 2);

        h.open(HOME_URL);
        let removed = h
            .call(
                "https://home.metamask.io",
                2,
                "metamask_removeFavorite",
                json!(["https://dapp.example/"]),
            )
            .await;
        assert_eq!(removed["result"]["favorites"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_favorite_needs_home_root() {
        let h = Harness::new();
        h.open("https://home.metamask.io/some/other/page");

        let denied = h
            .call(
                "https://home.metamask.io",
                1,
                "metamask_removeFavorite",
                json!(["https://dapp.example/"]),
            )
            .await;
        assert_eq!(denied["error"]["code"], 4100);
        assert_eq!(h.ui.favorites().len(), 2);

        // In-page navigation back to the root re-enables it
        h.tab_event("NAV_CHANGE", json!({"url": HOME_URL, "title": "Home"}))
            .unwrap();
        let removed = h
            .call(
                "https://home.metamask.io",
                2,
                "metamask_removeFavorite",
                json!(["https://dapp.example/"]),
            )
            .await;
        assert_eq!(removed["result"]["favorites"].as_array().unwrap().len(), 1);

        h.tab_event(
            "NAV_CHANGE",
            json!({"url": "https://home.metamask.io/settings", "title": "Settings"}),
        )
        .unwrap();
        let denied = h
            .call(
                "https://home.metamask.io",
                3,
                "metamask_removeFavorite",
                json!(["https://other.example/"]),
            )
            .await;
        assert_eq!(denied["error"]["code"], 4100);
        assert_eq!(h.ui.favorites().len(), 1);
    }

    #[tokio::test]
    async fn test_watch_asset_and_tutorial() {
        let h = Harness::new();
        h.open(DAPP_URL);

        let params = json!({
            "type": "ERC20",
            "options": {
                "address": "0x00000000000000000000000000000000000000aa",
                "symbol": "TKN",
                "decimals": 18
            }
        });
        let watched = h.call(DAPP_ORIGIN, 1, "wallet_watchAsset", params).await;
        assert_eq!(watched["result"], true);
        assert_eq!(h.assets.watched()[0].symbol, "TKN");

        let tutorial = h.call(DAPP_ORIGIN, 2, "metamask_showTutorial", json!([])).await;
        assert_eq!(tutorial["result"], true);
        assert_eq!(h.ui.tutorials(), 1);
    }

    // =============================================================================
    // TEARDOWN
    // =============================================================================

    #[tokio::test]
    async fn test_close_stops_every_stream() {
        let h = Harness::new();
        h.open(DAPP_URL);
        h.tab_event("FRAME_READY", json!({"url": WIDGET_URL})).unwrap();
        h.call(DAPP_ORIGIN, 1, "eth_subscribe", json!(["newHeads"])).await;
        let bridges = h.tab.bridges();

        h.tab.close();
        h.tab.close();

        assert!(bridges.iter().all(|b| b.state() == BridgeState::Disconnected));
        assert!(h.tab.bridges().is_empty());
        assert!(h.eventually(|| h.wallet.bus().subscriber_count() == 0).await);

        let posted = h.posted().len();
        h.wallet.set_network("42", "kovan").await;
        h.wallet.notify_block(0x11).await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(h.posted().len(), posted);

        assert!(matches!(
            bridges[0].on_message(json!({"name": "provider", "data": {}})),
            Err(BridgeError::Disconnected)
        ));
    }
}
