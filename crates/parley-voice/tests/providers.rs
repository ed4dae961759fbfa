//! HTTP contract tests for the provider adapters.

use futures_util::StreamExt;
use parley_voice::{
    ChatCompletionClient, ElevenLabsClient, LlmConfig, ReplyGenerator, SpeechSynthesizer,
    StreamingSynthesizer, SttConfig, Transcriber, TtsConfig, VoiceError, WhisperTranscriber,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn llm_config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: "sk-test".to_string(),
        model: "tiny-model".to_string(),
        temperature: 0.5,
        max_tokens: 42,
        timeout_secs: 1,
    }
}

fn tts_config(server: &MockServer) -> TtsConfig {
    TtsConfig {
        base_url: server.uri(),
        api_key: "xi-test".to_string(),
        voice_id: "voice-1".to_string(),
        timeout_secs: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn completion_sends_system_and_user_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "tiny-model",
            "max_tokens": 42,
            "messages": [
                {"role": "system", "content": "You are Emily."},
                {"role": "user", "content": "hello there"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Hey you!  "}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatCompletionClient::new(llm_config(&server), "You are Emily.");
    assert_eq!(client.generate("hello there").await, "Hey you!");
}

#[tokio::test]
async fn completion_failure_becomes_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = ChatCompletionClient::new(llm_config(&server), "sys");
    let err = client.complete("hi").await.unwrap_err();
    assert!(matches!(err, VoiceError::Provider { status: 503, .. }));

    let reply = client.generate("hi").await;
    assert!(reply.starts_with("(reply service error:"));
    assert!(reply.contains("overloaded"));
}

#[tokio::test]
async fn completion_timeout_becomes_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({"choices": []})),
        )
        .mount(&server)
        .await;

    let client = ChatCompletionClient::new(llm_config(&server), "sys");
    let reply = client.generate("hi").await;
    assert!(reply.contains("timed out"));
}

#[tokio::test]
async fn transcription_uploads_wav_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/audio/transcriptions"))
        .and(header("authorization", "Bearer gsk-test"))
        .and(body_string_contains("whisper-large-v3"))
        .and(body_string_contains("RIFF"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": " my name is Alex "})))
        .expect(1)
        .mount(&server)
        .await;

    let stt = WhisperTranscriber::new(SttConfig {
        base_url: format!("{}/openai/v1", server.uri()),
        api_key: "gsk-test".to_string(),
        ..Default::default()
    });
    assert_eq!(stt.transcribe(&[0xFF; 160]).await, "my name is Alex");
}

#[tokio::test]
async fn transcription_failure_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let stt = WhisperTranscriber::new(SttConfig {
        base_url: server.uri(),
        ..Default::default()
    });
    assert_eq!(stt.transcribe(&[0xFF; 160]).await, "");
}

#[tokio::test]
async fn batch_synthesis_returns_audio_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-1"))
        .and(header("xi-api-key", "xi-test"))
        .and(query_param("output_format", "mp3_44100_128"))
        .and(body_partial_json(json!({"model_id": "eleven_multilingual_v2"})))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let client = ElevenLabsClient::new(tts_config(&server)).unwrap();
    let audio = client.synthesize("Hello").await.unwrap();
    assert_eq!(&audio[..], b"ID3audio");
}

#[tokio::test]
async fn batch_synthesis_error_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = ElevenLabsClient::new(tts_config(&server)).unwrap();
    assert!(matches!(
        client.synthesize("Hello").await,
        Err(VoiceError::Provider { status: 401, .. })
    ));
}

#[tokio::test]
async fn batch_synthesis_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = ElevenLabsClient::new(tts_config(&server)).unwrap();
    assert!(matches!(
        client.synthesize("Hello").await,
        Err(VoiceError::Timeout(..))
    ));
}

#[tokio::test]
async fn streaming_synthesis_yields_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/voice-1/stream"))
        .and(query_param("output_format", "ulaw_8000"))
        .and(query_param("optimize_streaming_latency", "4"))
        .and(body_partial_json(json!({"model_id": "eleven_turbo_v2_5"})))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x7Fu8; 4096]))
        .expect(1)
        .mount(&server)
        .await;

    let client = ElevenLabsClient::new(tts_config(&server)).unwrap();
    let mut stream = client.synthesize_stream("Hey, it's Emily.").await.unwrap();
    let mut total = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        assert!(!chunk.is_empty());
        total += chunk.len();
    }
    assert_eq!(total, 4096);
}

#[tokio::test]
async fn streaming_synthesis_rejects_provider_error_up_front() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&server)
        .await;

    let client = ElevenLabsClient::new(tts_config(&server)).unwrap();
    assert!(matches!(
        client.synthesize_stream("Hi").await,
        Err(VoiceError::Provider { status: 429, .. })
    ));
}
