use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Future, Stream};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use linkslide_core::errors::GatewayError;
use linkslide_core::provider::{LlmContext, LlmProvider, ProviderStream};
use linkslide_core::stream::StreamEvent;

use crate::converter;
use crate::sse::{self, ChatSseParser};

const SSE_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Endpoint and credentials for an OpenAI-compatible chat completion API.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
}

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(client: Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, context), fields(model = %self.config.model))]
    async fn stream(&self, context: &LlmContext) -> Result<ProviderStream, GatewayError> {
        let body = converter::build_request_body(context, &self.config.model);

        let resp = self
            .client
            .post(self.endpoint())
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .header("accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, body));
        }

        Ok(Box::pin(SseStream::new(resp.bytes_stream())))
    }
}

/// Wraps a byte stream from reqwest and yields StreamEvents.
/// Emits an error if no data arrives within the idle timeout.
struct SseStream {
    inner: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    parser: ChatSseParser,
    buffer: String,
    pending: Vec<StreamEvent>,
    idle_deadline: Pin<Box<tokio::time::Sleep>>,
    idle_duration: Duration,
    closed: bool,
}

impl SseStream {
    fn new(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self::with_idle_timeout(byte_stream, SSE_IDLE_TIMEOUT)
    }

    fn with_idle_timeout(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            parser: ChatSseParser::new(),
            buffer: String::new(),
            pending: Vec::new(),
            idle_deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            idle_duration: idle_timeout,
            closed: false,
        }
    }

    fn drain_complete_events(&mut self) {
        // Normalize CRLF framing so event boundaries are always "\n\n".
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
        while let Some(pos) = self.buffer.find("\n\n") {
            let chunk: String = self.buffer.drain(..pos + 2).collect();
            for data in sse::parse_data_lines(&chunk) {
                let events = self.parser.parse_data(&data);
                self.pending.extend(events);
            }
        }
    }

    fn next_pending(&mut self) -> Option<StreamEvent> {
        if self.pending.is_empty() {
            return None;
        }
        let event = self.pending.remove(0);
        if event.is_terminal() {
            self.closed = true;
            self.pending.clear();
        }
        Some(event)
    }
}

impl Stream for SseStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(event) = self.next_pending() {
            return Poll::Ready(Some(event));
        }
        if self.closed {
            return Poll::Ready(None);
        }

        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let new_deadline = tokio::time::Instant::now() + self.idle_duration;
                    self.idle_deadline.as_mut().reset(new_deadline);

                    let text = String::from_utf8_lossy(&bytes);
                    self.buffer.push_str(&text);
                    self.drain_complete_events();

                    if let Some(event) = self.next_pending() {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.closed = true;
                    return Poll::Ready(Some(StreamEvent::Error {
                        error: GatewayError::StreamInterrupted(e.to_string()),
                    }));
                }
                Poll::Ready(None) => {
                    if !self.buffer.is_empty() {
                        let remaining = std::mem::take(&mut self.buffer);
                        for data in sse::parse_data_lines(&remaining) {
                            let events = self.parser.parse_data(&data);
                            self.pending.extend(events);
                        }
                    }
                    if !self.parser.is_finished() {
                        if self.parser.saw_finish_reason() {
                            let events = self.parser.finish();
                            self.pending.extend(events);
                        } else {
                            self.pending.push(StreamEvent::Error {
                                error: GatewayError::StreamInterrupted(
                                    "stream ended before completion".into(),
                                ),
                            });
                        }
                    }
                    if let Some(event) = self.next_pending() {
                        return Poll::Ready(Some(event));
                    }
                    self.closed = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => {
                    if self.idle_deadline.as_mut().poll(cx).is_ready() {
                        self.closed = true;
                        return Poll::Ready(Some(StreamEvent::Error {
                            error: GatewayError::StreamInterrupted(format!(
                                "idle timeout after {}s",
                                self.idle_duration.as_secs()
                            )),
                        }));
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}
