//! # Hub Routing
//!
//! Broadcast vs. directed delivery, rejection of malformed frames, acks and
//! hub statistics, observed from real peers.

#[cfg(test)]
mod tests {
    use crate::support::{TestHub, WAIT};
    use bridge_client::{ClientConfig, ConnectionManager, MessageFilter, SendOutcome, Subscription};
    use bridge_hub::HubConfig;
    use bridge_protocol::{
        builders, codes, FileOpenPayload, Message, MessageType, NotificationLevel,
        NotificationPayload, Payload, SourceRole,
    };
    use serde_json::json;
    use std::time::Duration;

    async fn next(subscription: &mut Subscription) -> Message {
        tokio::time::timeout(WAIT, subscription.recv())
            .await
            .expect("no message in time")
            .expect("subscription closed")
    }

    fn open(path: &str) -> Message {
        builders::file_open(
            SourceRole::Nova,
            FileOpenPayload {
                file_path: path.into(),
                line: Some(12),
                ..Default::default()
            },
        )
    }

    fn note(source: SourceRole, title: &str) -> Message {
        builders::notification(
            source,
            NotificationPayload {
                level: NotificationLevel::Info,
                title: title.into(),
                message: "hello".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_other_peer() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let vibe = hub.peer(SourceRole::Vibe).await;
        let dash = hub.peer(SourceRole::Dashboard).await;
        let mut vibe_in = vibe.subscribe(MessageFilter::kinds([MessageType::FileOpen]));
        let mut dash_in = dash.subscribe(MessageFilter::kinds([MessageType::FileOpen]));
        let mut nova_in = nova.subscribe(MessageFilter::kinds([MessageType::FileOpen]));

        let message = open("/src/lib.rs");
        assert_eq!(nova.send(message.clone()).await.unwrap(), SendOutcome::Sent);

        assert_eq!(next(&mut vibe_in).await.message_id, message.message_id);
        assert_eq!(next(&mut dash_in).await.message_id, message.message_id);
        assert!(nova_in.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_directed_message_skips_other_roles() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let vibe = hub.peer(SourceRole::Vibe).await;
        let dash = hub.peer(SourceRole::Dashboard).await;
        let mut vibe_in = vibe.subscribe(MessageFilter::kinds([MessageType::GetGitStatus]));
        let mut dash_in = dash.subscribe(MessageFilter::kinds([
            MessageType::GetGitStatus,
            MessageType::Notification,
        ]));

        let query = builders::get_git_status(SourceRole::Nova).with_target(SourceRole::Vibe);
        nova.send(query.clone()).await.unwrap();
        // Per-connection delivery is FIFO: if the query had reached the
        // dashboard it would arrive before this marker.
        nova.send(note(SourceRole::Nova, "marker")).await.unwrap();

        assert_eq!(next(&mut vibe_in).await.message_id, query.message_id);
        assert_eq!(next(&mut dash_in).await.kind(), MessageType::Notification);
    }

    #[tokio::test]
    async fn test_absent_target_role_is_reported() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let mut errors = nova.subscribe(MessageFilter::kinds([MessageType::Error]));

        let query = builders::get_git_status(SourceRole::Nova).with_target(SourceRole::Cli);
        nova.send(query.clone()).await.unwrap();

        let reply = next(&mut errors).await;
        assert_eq!(reply.correlation_id.as_deref(), Some(query.message_id.as_str()));
        match reply.payload {
            Payload::Error(e) => assert_eq!(e.code, codes::TARGET_NOT_CONNECTED),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_frames_are_answered_and_not_forwarded() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let mut nova_in = nova.subscribe(MessageFilter::all());
        let mut raw = hub.raw_socket().await;

        raw.send_text("{definitely not json").await;
        let reply = raw.next_json().await;
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["source"], "hub");
        assert_eq!(reply["payload"]["code"], codes::INVALID_JSON);

        raw.send_text(
            json!({
                "messageId": "bad-1",
                "type": "learning_event",
                "timestamp": 1,
                "source": "vibe",
                "payload": { "eventType": "gossip" }
            })
            .to_string(),
        )
        .await;
        let reply = raw.next_json().await;
        assert_eq!(reply["payload"]["code"], codes::VALIDATION_FAILED);
        assert_eq!(reply["correlationId"], "bad-1");
        let paths: Vec<&str> = reply["payload"]["details"]
            .as_array()
            .expect("details list every violation")
            .iter()
            .filter_map(|v| v["path"].as_str())
            .collect();
        assert!(paths.contains(&"payload.eventType"));
        assert!(paths.contains(&"payload.data"));

        raw.send_text("x".repeat(2 * 1024 * 1024)).await;
        let reply = raw.next_json().await;
        assert_eq!(reply["payload"]["code"], codes::MESSAGE_TOO_LARGE);

        let stats = hub.hub.stats();
        assert_eq!(stats.messages.rejected, 3);
        assert!(nova_in.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ack_when_requested() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let _vibe = hub.peer(SourceRole::Vibe).await;
        let mut acks = nova.subscribe(MessageFilter::kinds([MessageType::Ack]));

        let message = open("/src/main.rs").with_metadata("requiresAck", json!(true));
        nova.send(message.clone()).await.unwrap();

        let ack = next(&mut acks).await;
        match ack.payload {
            Payload::Ack(a) => assert_eq!(a.message_id, message.message_id),
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_records_pong() {
        let hub = TestHub::start().await;
        let mut config = hub.client_config(SourceRole::Cli);
        config.heartbeat_interval = Duration::from_millis(50);
        let cli = hub.peer_with(config).await;

        let mut status = cli.watch_status();
        tokio::time::timeout(WAIT, status.wait_for(|s| s.last_pong.is_some()))
            .await
            .expect("no pong in time")
            .expect("status channel closed");
        assert!(cli.snapshot().since_last_pong().is_some());
    }

    #[tokio::test]
    async fn test_periodic_stats_broadcast() {
        let config = HubConfig {
            stats_interval: Duration::from_millis(50),
            ..HubConfig::default()
        };
        let hub = TestHub::start_with(config).await;
        let dash = hub.peer(SourceRole::Dashboard).await;
        let _vibe = hub.peer(SourceRole::Vibe).await;
        let mut stats_in = dash.subscribe(MessageFilter::kinds([MessageType::BridgeStats]));

        let stats = loop {
            let message = next(&mut stats_in).await;
            let Payload::BridgeStats(stats) = message.payload else {
                unreachable!("filtered by kind")
            };
            if stats.clients.len() == 2 {
                break stats;
            }
        };
        assert_eq!(stats.server.port, hub.addr.port());
        assert_eq!(stats.connections.active, 2);
        assert!(stats.messages.by_type.get("connect").copied().unwrap_or(0) >= 2);
        assert_eq!(stats.clients[0].source, SourceRole::Dashboard);
    }

    #[tokio::test]
    async fn test_queued_messages_flush_on_connect() {
        let hub = TestHub::start().await;
        let vibe = hub.peer(SourceRole::Vibe).await;
        let mut vibe_in = vibe.subscribe(MessageFilter::kinds([MessageType::Notification]));

        let late = ConnectionManager::websocket(ClientConfig {
            url: hub.url(),
            role: SourceRole::Nova,
            ..ClientConfig::default()
        })
        .unwrap();
        let first = note(SourceRole::Nova, "first");
        let second = note(SourceRole::Nova, "second");
        assert_eq!(late.send(first.clone()).await.unwrap(), SendOutcome::Queued);
        assert_eq!(late.send(second.clone()).await.unwrap(), SendOutcome::Queued);
        assert_eq!(late.snapshot().queued, 2);

        late.connect().await.unwrap();
        assert_eq!(late.snapshot().queued, 0);

        assert_eq!(next(&mut vibe_in).await.message_id, first.message_id);
        assert_eq!(next(&mut vibe_in).await.message_id, second.message_id);
    }
}
