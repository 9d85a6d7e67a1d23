//! # Four-Stage Command Flow
//!
//! request → execute → result → response, across two real peers and the hub.

#[cfg(test)]
mod tests {
    use crate::support::{TestHub, WAIT};
    use bridge_client::{CommandError, ConnectionManager, MessageFilter};
    use bridge_hub::EXECUTOR_DISCONNECTED;
    use bridge_protocol::{codes, CommandExecutePayload, MessageType, Payload, SourceRole};
    use serde_json::json;
    use std::time::Duration;

    /// Wait for the next `command_execute` delivered to `peer`.
    async fn next_execute(
        subscription: &mut bridge_client::Subscription,
    ) -> (CommandExecutePayload, Option<u64>) {
        let message = tokio::time::timeout(WAIT, subscription.recv())
            .await
            .expect("no command_execute in time")
            .expect("subscription closed");
        match message.payload {
            Payload::CommandExecute(execute) => (execute, message.timeout_ms),
            other => panic!("expected command_execute, got {other:?}"),
        }
    }

    fn executes(peer: &ConnectionManager) -> bridge_client::Subscription {
        peer.subscribe(MessageFilter::kinds([MessageType::CommandExecute]))
    }

    #[tokio::test]
    async fn test_request_is_executed_and_answered() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let vibe = hub.peer(SourceRole::Vibe).await;
        let mut inbox = executes(&vibe);

        let request = tokio::spawn(async move {
            let result = nova
                .request_command("/analyze src/main.rs", None, Some(Duration::from_secs(5)))
                .await;
            (nova, result)
        });

        let (execute, timeout_ms) = next_execute(&mut inbox).await;
        assert_eq!(execute.command, "analyze");
        assert_eq!(execute.args, Some(vec!["src/main.rs".to_string()]));
        assert_eq!(execute.text, "/analyze src/main.rs");
        assert_eq!(execute.original_sender, SourceRole::Nova);
        assert_eq!(timeout_ms, Some(5000));

        vibe.respond_to(&execute, Ok(json!({"issues": 2})))
            .await
            .unwrap();

        let (nova, result) = request.await.unwrap();
        let result = result.expect("command should succeed");
        assert_eq!(result.command_id, execute.command_id);
        assert!(result.success);
        assert_eq!(result.result, Some(json!({"issues": 2})));
        assert_eq!(nova.commands().pending_count(), 0);
        assert_eq!(hub.hub.commands_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_executor_failure_is_delivered_as_result() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let vibe = hub.peer(SourceRole::Vibe).await;
        let mut inbox = executes(&vibe);

        let request = tokio::spawn(async move {
            nova.request_command("format", Some(SourceRole::Vibe), None)
                .await
        });

        let (execute, _) = next_execute(&mut inbox).await;
        vibe.respond_to(&execute, Err("no formatter configured".into()))
            .await
            .unwrap();

        let result = request.await.unwrap().expect("a failed result is still a result");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no formatter configured"));
    }

    #[tokio::test]
    async fn test_no_executor_rejects_request() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;

        let err = nova
            .request_command("analyze", None, Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        match err {
            CommandError::Remote { code, .. } => assert_eq!(code, codes::NO_EXECUTOR),
            other => panic!("expected NO_EXECUTOR, got {other:?}"),
        }
        assert_eq!(nova.commands().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let _vibe = hub.peer(SourceRole::Vibe).await;

        let err = nova
            .request_command("analyze", None, Some(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::Timeout { timeout_ms: 200 });
        assert!(err.to_string().contains("timed out after 200ms"));
        assert_eq!(nova.commands().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_executor_disconnect_fails_request() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let vibe = hub.peer(SourceRole::Vibe).await;
        let mut inbox = executes(&vibe);

        let request = tokio::spawn(async move {
            nova.request_command("analyze", None, Some(Duration::from_secs(5)))
                .await
        });

        let _ = next_execute(&mut inbox).await;
        vibe.disconnect().await;

        let result = request.await.unwrap().expect("hub answers for the executor");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(EXECUTOR_DISCONNECTED));
    }

    #[tokio::test]
    async fn test_late_result_is_reported_unknown() {
        let hub = TestHub::start().await;
        let nova = hub.peer(SourceRole::Nova).await;
        let vibe = hub.peer(SourceRole::Vibe).await;
        let mut inbox = executes(&vibe);
        let mut vibe_errors = vibe.subscribe(MessageFilter::kinds([MessageType::Error]));

        let request = tokio::spawn(async move {
            nova.request_command("analyze", None, Some(Duration::from_secs(5)))
                .await
        });
        let (execute, _) = next_execute(&mut inbox).await;

        vibe.respond_to(&execute, Ok(json!(1))).await.unwrap();
        assert!(request.await.unwrap().is_ok());

        // Second answer for the same command: the route is already closed.
        vibe.respond_to(&execute, Ok(json!(2))).await.unwrap();
        let error = tokio::time::timeout(WAIT, vibe_errors.recv())
            .await
            .expect("no error in time")
            .expect("subscription closed");
        match error.payload {
            Payload::Error(e) => assert_eq!(e.code, codes::UNKNOWN_COMMAND),
            other => panic!("expected error, got {other:?}"),
        }
    }
}
