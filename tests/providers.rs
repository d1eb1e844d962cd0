// HTTP-level tests for the OpenAI and Ollama backends.
use mailassist_lib::ai::ollama::OllamaProvider;
use mailassist_lib::ai::openai::OpenAIProvider;
use mailassist_lib::ai::{chat, AIMessage, AIProvider};
use mailassist_lib::error::AppError;
use mockito::{Matcher, Server};
use serde_json::json;

#[tokio::test]
async fn test_openai_completion() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"[]"}}]}"#)
        .create_async()
        .await;

    let provider = OpenAIProvider::with_base_url(
        "sk-test".to_string(),
        "gpt-4o-mini".to_string(),
        format!("{}/", server.url()),
    );
    let reply = chat(&provider, "sys", &[], "hello").await.unwrap();

    assert_eq!(reply, "[]");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_openai_error_message_is_surfaced() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
        .create_async()
        .await;

    let provider =
        OpenAIProvider::with_base_url("bad".to_string(), "gpt-4o-mini".to_string(), server.url());
    let err = provider
        .complete(vec![AIMessage::user("hi")])
        .await
        .unwrap_err();

    match err {
        AppError::Backend {
            status, message, ..
        } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_missing_content_is_empty_response() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
        .create_async()
        .await;

    let provider =
        OpenAIProvider::with_base_url("k".to_string(), "m".to_string(), server.url());
    let err = provider
        .complete(vec![AIMessage::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmptyResponse(_)));
}

#[tokio::test]
async fn test_openai_models() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/models")
        .with_status(200)
        .with_body(r#"{"data":[{"id":"gpt-4o-mini"},{"id":"gpt-4o"}]}"#)
        .create_async()
        .await;

    let provider = OpenAIProvider::with_base_url("k".to_string(), "m".to_string(), server.url());
    assert_eq!(
        provider.list_models().await.unwrap(),
        vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()]
    );
    assert!(provider.is_available().await);
}

#[tokio::test]
async fn test_ollama_completion() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({"model": "llama3.2:latest", "stream": false})))
        .with_status(200)
        .with_body(r#"{"message":{"role":"assistant","content":"Sure"},"done":true}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "llama3.2:latest".to_string());
    let reply = provider
        .complete(vec![AIMessage::user("hi")])
        .await
        .unwrap();

    assert_eq!(reply, "Sure");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ollama_tags() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(r#"{"models":[{"name":"llama3.2:latest"},{"name":"mistral:7b"}]}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "llama3.2:latest".to_string());
    assert_eq!(provider.list_models().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ollama_unreachable() {
    let provider = OllamaProvider::new("http://127.0.0.1:1".to_string(), "m".to_string());

    assert!(!provider.is_available().await);

    let err = provider
        .complete(vec![AIMessage::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BackendUnavailable { .. }));
    assert!(err.to_string().contains("Please start or configure the Ollama backend"));
}

#[tokio::test]
async fn test_ollama_server_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(404)
        .with_body(r#"{"error":"model 'x' not found"}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "x".to_string());
    let err = provider
        .complete(vec![AIMessage::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Backend { status: 404, .. }));
}
