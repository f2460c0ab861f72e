//! Integration tests for the parley library.
//! These tests run the client against a local mock of the conversation API.

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    use parley::{
        ChatClient, ChatRequest, ClientConfig, CompositeStyle, DisplayMessage, Error, MessageId,
        Phase, ServerEvent, Update,
    };

    const REPLY: &str = concat!(
        "data: {\"type\":\"user_message\",\"data\":{\"id\":41,\"content\":\"Plan a trip\",\"role\":\"user\",\"message_type\":\"text\"}}\n\n",
        "data: {\"type\":\"run_start\",\"data\":{\"run_id\":\"r-1\"}}\n\n",
        "data: {\"type\":\"thinking_start\",\"data\":{\"message\":\"AI is thinking...\"}}\n\n",
        "data: {\"type\":\"thinking_process\",\"data\":{\"message\":\"a\\n\"}}\n\n",
        "data: {\"type\":\"thinking_process\",\"data\":{\"message\":\"b\\n\"}}\n\n",
        "data: {\"type\":\"thinking_end\",\"data\":{\"message\":\"done\"}}\n\n",
        "data: {\"type\":\"text_message_start\",\"data\":{\"message_id\":42,\"role\":\"assistant\"}}\n\n",
        "data: {\"type\":\"text_message_delta\",\"data\":{\"content\":\"X\"}}\n\n",
        "data: {\"type\":\"text_message_delta\",\"data\":{\"content\":\"Y\"}}\n\n",
        "data: {\"type\":\"text_message_end\",\"data\":{\"message_id\":42}}\n\n",
        "data: {\"type\":\"run_end\",\"data\":{\"run_id\":\"r-1\",\"message_id\":42}}\n\n",
    );

    fn client_for(server: &ServerGuard) -> ChatClient {
        let config = ClientConfig::new()
            .with_base_url(&server.url())
            .expect("mock server url");
        ChatClient::new(config).expect("client")
    }

    async fn mock_chat(server: &mut ServerGuard, content_type: &str, body: &str) -> mockito::Mock {
        server
            .mock("POST", "/conversations/chat")
            .match_header("accept", "text/event-stream")
            .with_header("content-type", content_type)
            .with_body(body)
            .create_async()
            .await
    }

    async fn drain(client: &ChatClient) -> (Vec<Update>, parley::Reassembler) {
        let request = ChatRequest::new(5, "doubao-seed-1-6-thinking-250715", "Plan a trip");
        let (stream, rx) = client.reply(&request).await.expect("reply");
        let updates: Vec<Update> = stream.map(|update| update.expect("update")).collect().await;
        (updates, rx.await.expect("reassembler"))
    }

    #[tokio::test]
    async fn streamed_reply_is_reassembled() {
        let mut server = Server::new_async().await;
        let mock = mock_chat(&mut server, "text/event-stream", REPLY).await;
        let client = client_for(&server);

        let (updates, reassembler) = drain(&client).await;
        mock.assert_async().await;

        let composites: Vec<&str> = updates.iter().map(|u| u.composite.as_str()).collect();
        assert_eq!(
            composites,
            vec![
                "[thinking] a",
                "[thinking] a\nb",
                "[thinking] a\nb [answer] X",
                "[thinking] a\nb [answer] XY",
                "[thinking] a\nb [answer] XY",
            ]
        );
        assert_eq!(updates[0].phase, Phase::Thinking);
        assert_eq!(updates[2].phase, Phase::Answering);
        assert_eq!(updates[4].phase, Phase::Done);

        assert!(reassembler.is_complete());
        assert_eq!(reassembler.message_id(), &MessageId::Number(42));
        assert_eq!(reassembler.answer_text(), "XY");
        assert_eq!(
            reassembler.display().render(&CompositeStyle::LEGACY),
            "[思考过程]\na\nb\n[模型回复]\nXY"
        );
    }

    #[tokio::test]
    async fn malformed_event_is_skipped() {
        let mut server = Server::new_async().await;
        let body = concat!(
            "data: {\"type\":\"text_message_delta\",\"data\":{\"content\":\"X\"}}\n\n",
            "data: {\"type\":\"text_message_delta\",\"data\":{\"cont\n\n",
            "data: {\"type\":\"tool_call\",\"data\":{}}\n\n",
            ": keep-alive\n\n",
            "data: {\"type\":\"text_message_delta\",\"data\":{\"content\":\"Y\"}}\n\n",
            "data: {\"type\":\"text_message_end\",\"data\":{\"message_id\":42}}\n\n",
        );
        mock_chat(&mut server, "text/event-stream", body).await;
        let client = client_for(&server);

        let (updates, reassembler) = drain(&client).await;
        assert_eq!(updates.len(), 3);
        assert!(reassembler.is_complete());
        assert_eq!(reassembler.answer_text(), "XY");
        assert_eq!(updates[2].display, DisplayMessage::answer_only("XY"));
    }

    #[tokio::test]
    async fn json_reply_matches_streamed_reply() {
        let mut server = Server::new_async().await;
        let body = json!({
            "user_message": {
                "id": 41, "conversation_id": 5, "content": "Plan a trip", "role": "user",
                "message_type": "text", "file_url": null, "created_at": "2025-03-01T08:15:30"
            },
            "ai_message": {
                "id": 42, "conversation_id": 5, "content": "[思考过程]\na\nb\n[模型回复]\nXY",
                "role": "assistant", "message_type": "text", "file_url": null,
                "created_at": "2025-03-01T08:15:31"
            }
        });
        mock_chat(&mut server, "application/json", &body.to_string()).await;
        let client = client_for(&server);

        let (_, reassembler) = drain(&client).await;
        assert!(reassembler.is_complete());
        assert_eq!(reassembler.message_id(), &MessageId::Number(42));
        assert_eq!(reassembler.thinking_text(), "a\nb");
        assert_eq!(reassembler.answer_text(), "XY");
    }

    #[tokio::test]
    async fn server_error_event_surfaces() {
        let mut server = Server::new_async().await;
        mock_chat(
            &mut server,
            "text/event-stream",
            "data: {\"type\":\"error\",\"data\":\"Conversation not found\"}\n\n",
        )
        .await;
        let client = client_for(&server);

        let request = ChatRequest::new(99, "doubao-seed-1-6-thinking-250715", "hi");
        let events: Vec<_> = client.chat_stream(&request).await.unwrap().collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &ServerEvent::Error("Conversation not found".to_string())
        );

        let (stream, rx) = client.reply(&request).await.unwrap();
        let updates: Vec<_> = stream.collect().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].as_ref().unwrap_err().to_string(),
            "stream_error: Conversation not found"
        );
        assert!(!rx.await.unwrap().is_complete());
    }

    #[tokio::test]
    async fn conversation_lifecycle() {
        let mut server = Server::new_async().await;
        let conversation = |title: &str| {
            json!({
                "id": 5, "user_id": 1, "title": title,
                "created_at": "2025-03-01T08:15:30", "updated_at": "2025-03-01T08:20:00"
            })
        };
        let create = server
            .mock("POST", "/conversations/")
            .match_body(Matcher::Json(json!({"title": "Trip"})))
            .with_header("content-type", "application/json")
            .with_body(conversation("Trip").to_string())
            .create_async()
            .await;
        let rename = server
            .mock("PUT", "/conversations/5")
            .match_body(Matcher::Json(json!({"title": "Weekend trip"})))
            .with_header("content-type", "application/json")
            .with_body(conversation("Weekend trip").to_string())
            .create_async()
            .await;
        let list = server
            .mock("GET", "/conversations/")
            .with_header("content-type", "application/json")
            .with_body(json!([conversation("Weekend trip")]).to_string())
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/conversations/5")
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "Conversation deleted"}"#)
            .create_async()
            .await;
        let client = client_for(&server);

        let created = client.create_conversation("Trip").await.unwrap();
        assert_eq!(created.id, 5);
        let renamed = client.rename_conversation(5, "Weekend trip").await.unwrap();
        assert_eq!(renamed.title, "Weekend trip");
        let listed = client.list_conversations().await.unwrap();
        assert_eq!(listed, vec![renamed]);
        client.delete_conversation(5).await.unwrap();

        create.assert_async().await;
        rename.assert_async().await;
        list.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/conversations/404")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "Conversation not found"}"#)
            .create_async()
            .await;
        let client = client_for(&server);

        let err = client.messages(404).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
