use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use linkslide_core::errors::GatewayError;
use linkslide_core::events::PipelineEvent;
use linkslide_core::messages::{AssistantMessage, Message, ToolCallBlock};
use linkslide_core::provider::{LlmContext, LlmProvider, ProviderStream};
use linkslide_core::session::Session;
use linkslide_core::stream::StreamEvent;
use linkslide_core::tools::ToolContext;

use crate::error::EngineError;
use crate::prompt;
use crate::registry::ToolRegistry;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(600);
const RESULT_PREVIEW_CHARS: usize = 200;

/// Configuration for the agent runner.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_turns: u32,
    pub tool_timeout: Duration,
    /// Extra attempts for a provider call that fails with a retryable error.
    pub provider_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 40,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            provider_retries: 2,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

/// Drives the model through turns until it stops calling tools.
pub struct AgentRunner {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl AgentRunner {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the agent for one session. Tool calls execute one at a time, in
    /// the order the model issued them.
    #[instrument(skip_all, fields(session_id = %session.id, model = self.provider.model()))]
    pub async fn run(
        &self,
        session: &Session,
        prompt: &str,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<(), EngineError> {
        let system_prompt = prompt::system_prompt(session, Local::now());
        let mut messages = vec![Message::user_text(prompt)];
        let tool_ctx = ToolContext {
            session: session.clone(),
        };

        for turn in 1..=self.config.max_turns {
            debug!(turn, "starting turn");
            let context = LlmContext {
                system_prompt: system_prompt.clone(),
                messages: messages.clone(),
                tools: self.registry.definitions(),
            };

            let stream = self.open_stream(&context).await?;
            let assistant = self.consume_stream(stream, tx).await?;
            let tool_calls: Vec<ToolCallBlock> =
                assistant.tool_calls().into_iter().cloned().collect();
            messages.push(Message::Assistant(assistant));

            if tool_calls.is_empty() {
                info!(turns = turn, "agent run finished");
                return Ok(());
            }

            for call in &tool_calls {
                let result = self.execute_tool(call, &tool_ctx, tx).await;
                messages.push(result);
            }
        }

        warn!(max_turns = self.config.max_turns, "agent exceeded turn limit");
        Err(EngineError::MaxTurnsExceeded(self.config.max_turns))
    }

    async fn open_stream(&self, context: &LlmContext) -> Result<ProviderStream, GatewayError> {
        let mut retries = 0;
        loop {
            match self.provider.stream(context).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_retryable() && retries < self.config.provider_retries => {
                    retries += 1;
                    warn!(
                        error_kind = e.error_kind(),
                        error = %e,
                        retry = retries,
                        "provider call failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn consume_stream(
        &self,
        mut stream: ProviderStream,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Result<AssistantMessage, EngineError> {
        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::TextDelta { delta } => {
                    send_event(tx, PipelineEvent::TextDelta { delta }).await;
                }
                StreamEvent::Done { message, .. } => return Ok(message),
                StreamEvent::Error { error } => return Err(error.into()),
                StreamEvent::Start
                | StreamEvent::ToolCallStart { .. }
                | StreamEvent::ToolCallDelta { .. }
                | StreamEvent::ToolCallEnd { .. } => {}
            }
        }
        Err(GatewayError::StreamInterrupted("stream ended without a final message".into()).into())
    }

    #[instrument(skip_all, fields(tool = %call.name, tool_call_id = %call.id))]
    async fn execute_tool(
        &self,
        call: &ToolCallBlock,
        ctx: &ToolContext,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> Message {
        send_event(
            tx,
            PipelineEvent::ToolCallStarted {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        )
        .await;

        let start = Instant::now();
        let (content, is_error) = match self.registry.get(&call.name) {
            None => {
                error!("tool not found");
                (format!("Tool not found: {}", call.name), true)
            }
            Some(tool) => {
                let timeout = tool.timeout().unwrap_or(self.config.tool_timeout);
                let result = tokio::time::timeout(
                    timeout,
                    std::panic::AssertUnwindSafe(tool.execute(call.arguments.clone(), ctx))
                        .catch_unwind(),
                )
                .await;
                match result {
                    Ok(Ok(Ok(r))) => (r.content, r.is_error),
                    Ok(Ok(Err(e))) => (e.to_string(), true),
                    Ok(Err(panic)) => {
                        let msg = panic_message(&panic);
                        error!(panic = %msg, "tool panicked during execution");
                        ("Internal error: tool crashed".into(), true)
                    }
                    Err(_) => {
                        warn!(timeout_secs = timeout.as_secs(), "tool timed out");
                        (format!("Tool timed out after {}s", timeout.as_secs()), true)
                    }
                }
            }
        };
        let duration_ms = duration_ceil_ms(start.elapsed());

        send_event(
            tx,
            PipelineEvent::ToolCallFinished {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                result_preview: content.chars().take(RESULT_PREVIEW_CHARS).collect(),
                is_error,
                duration_ms,
            },
        )
        .await;

        Message::tool_result(call.id.clone(), content, is_error)
    }
}

/// A dropped receiver means the client went away; the run continues.
async fn send_event(tx: &mpsc::Sender<PipelineEvent>, event: PipelineEvent) {
    let event_type = event.event_type();
    if tx.send(event).await.is_err() {
        debug!(event_type, "no event receiver, event dropped");
    }
}

/// Milliseconds rounded up, so fast tools never report 0.
fn duration_ceil_ms(d: Duration) -> u64 {
    let micros = d.as_micros();
    if micros == 0 {
        return 0;
    }
    ((micros + 999) / 1000) as u64
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use linkslide_core::session::QualityMode;
    use linkslide_core::tools::{Tool, ToolError, ToolResult};
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use linkslide_core::layout::OutputLayout;
    use linkslide_imaging::{
        ImageBackend, ImageBackends, JobError, JobPolicy, JobRunner, JobStatus, Submission,
    };
    use linkslide_store::SlideStore;

    use crate::mock::{MockProvider, MockResponse};
    use crate::tools::{testutil, GenerateSlideTool};

    /// Records the arguments it was called with.
    struct RecordingTool {
        name: &'static str,
        calls: Mutex<Vec<Value>>,
    }

    impl RecordingTool {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "records calls"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
            self.calls.lock().push(args);
            Ok(ToolResult::ok(format!("{} done", self.name)))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolResult::ok("late"))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "boom"
        }
        fn description(&self) -> &str {
            "panics"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
            panic!("kaboom");
        }
    }

    /// Accepts every job, then never answers a poll.
    struct StalledBackend;

    #[async_trait]
    impl ImageBackend for StalledBackend {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn submit(&self, _prompt: &str) -> Result<Submission, JobError> {
            Ok(Submission::Pending("t-stalled".into()))
        }

        async fn poll(&self, _job_id: &str) -> Result<JobStatus, JobError> {
            std::future::pending().await
        }
    }

    fn runner(
        responses: Vec<MockResponse>,
        tools: Vec<Arc<dyn Tool>>,
        config: AgentConfig,
    ) -> (Arc<MockProvider>, AgentRunner) {
        let provider = Arc::new(MockProvider::new(responses));
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        let runner = AgentRunner::new(provider.clone(), Arc::new(registry), config);
        (provider, runner)
    }

    async fn run_collect(runner: &AgentRunner) -> (Result<(), EngineError>, Vec<PipelineEvent>) {
        let (tx, mut rx) = mpsc::channel(256);
        let session = Session::new(QualityMode::Standard);
        let result = runner.run(&session, "quarterly review", &tx).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        (result, events)
    }

    fn types(events: &[PipelineEvent]) -> Vec<&'static str> {
        events.iter().map(PipelineEvent::event_type).collect()
    }

    #[tokio::test]
    async fn text_only_run_finishes_in_one_turn() {
        let (provider, runner) = runner(
            vec![MockResponse::stream_text("Planning the deck")],
            vec![],
            AgentConfig::default(),
        );
        let (result, events) = run_collect(&runner).await;

        assert!(result.is_ok());
        assert_eq!(provider.call_count(), 1);
        assert!(matches!(&events[0], PipelineEvent::TextDelta { delta } if delta == "Planning the deck"));
    }

    #[tokio::test]
    async fn tool_calls_execute_in_order() {
        let slide = RecordingTool::new("generate_slide");
        let finish = RecordingTool::new("finish_ppt");
        let (provider, runner) = runner(
            vec![
                MockResponse::tool_calls(
                    "Generating",
                    vec![
                        ("generate_slide", json!({"page_index": 1})),
                        ("generate_slide", json!({"page_index": 2})),
                    ],
                ),
                MockResponse::tool_calls("", vec![("finish_ppt", json!({}))]),
                MockResponse::stream_text("Done"),
            ],
            vec![slide.clone() as Arc<dyn Tool>, finish.clone() as Arc<dyn Tool>],
            AgentConfig::default(),
        );
        let (result, events) = run_collect(&runner).await;

        assert!(result.is_ok());
        assert_eq!(provider.call_count(), 3);
        assert_eq!(
            types(&events),
            vec![
                "text_delta",
                "tool_call_started",
                "tool_call_finished",
                "tool_call_started",
                "tool_call_finished",
                "tool_call_started",
                "tool_call_finished",
                "text_delta",
            ]
        );
        let pages: Vec<Value> = slide.calls.lock().iter().map(|a| a["page_index"].clone()).collect();
        assert_eq!(pages, vec![json!(1), json!(2)]);
        assert_eq!(finish.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_reports_error_and_continues() {
        let (_provider, runner) = runner(
            vec![
                MockResponse::tool_calls("", vec![("draw_chart", json!({}))]),
                MockResponse::stream_text("ok"),
            ],
            vec![],
            AgentConfig::default(),
        );
        let (result, events) = run_collect(&runner).await;

        assert!(result.is_ok());
        let finished = events
            .iter()
            .find_map(|e| match e {
                PipelineEvent::ToolCallFinished {
                    is_error,
                    result_preview,
                    ..
                } => Some((*is_error, result_preview.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(finished, (true, "Tool not found: draw_chart".to_string()));
    }

    #[tokio::test]
    async fn turn_limit_is_enforced() {
        let tool = RecordingTool::new("search");
        let responses = (0..3)
            .map(|_| MockResponse::tool_calls("", vec![("search", json!({"query": "x"}))]))
            .collect();
        let (_provider, runner) = runner(
            responses,
            vec![tool as Arc<dyn Tool>],
            AgentConfig {
                max_turns: 2,
                ..AgentConfig::default()
            },
        );
        let (result, _events) = run_collect(&runner).await;
        assert!(matches!(result, Err(EngineError::MaxTurnsExceeded(2))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let (_provider, runner) = runner(
            vec![
                MockResponse::tool_calls("", vec![("slow", json!({}))]),
                MockResponse::stream_text("moving on"),
            ],
            vec![Arc::new(SlowTool) as Arc<dyn Tool>],
            AgentConfig {
                tool_timeout: Duration::from_secs(5),
                ..AgentConfig::default()
            },
        );
        let (result, events) = run_collect(&runner).await;

        assert!(result.is_ok());
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::ToolCallFinished { is_error: true, result_preview, .. }
                if result_preview == "Tool timed out after 5s"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_slide_job_is_recorded_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), "/static/output");
        let store = SlideStore::new(layout.clone());
        let jobs = Arc::new(JobRunner::new(
            JobPolicy::default(),
            Arc::new(testutil::LayoutFetcher { layout }),
        ));
        let backends = ImageBackends::new(Arc::new(StalledBackend), Arc::new(StalledBackend));
        let slide = GenerateSlideTool::new(jobs, backends, store.clone());
        let (_provider, runner) = runner(
            vec![
                MockResponse::tool_calls(
                    "",
                    vec![(
                        "generate_slide",
                        json!({"prompt": "Title slide", "script": "Welcome", "page_index": 1}),
                    )],
                ),
                MockResponse::stream_text("done"),
            ],
            vec![Arc::new(slide) as Arc<dyn Tool>],
            AgentConfig::default(),
        );

        let session = Session::new(QualityMode::Standard);
        let (tx, mut rx) = mpsc::channel(256);
        runner.run(&session, "quarterly review", &tx).await.unwrap();
        drop(tx);

        let mut previews = Vec::new();
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::ToolCallFinished {
                result_preview,
                is_error,
                ..
            } = event
            {
                assert!(is_error);
                previews.push(result_preview);
            }
        }
        assert_eq!(previews.len(), 1);
        assert!(previews[0].starts_with("Slide 1 failed: Error: All 3 attempts failed"));

        let records = store.read_all(&session.id).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_failed());
        assert!(records[0].image_path.ends_with("polling timed out after 45 polls"));
    }

    #[tokio::test]
    async fn panicking_tool_is_contained() {
        let (_provider, runner) = runner(
            vec![
                MockResponse::tool_calls("", vec![("boom", json!({}))]),
                MockResponse::stream_text("recovered"),
            ],
            vec![Arc::new(PanickingTool) as Arc<dyn Tool>],
            AgentConfig::default(),
        );
        let (result, events) = run_collect(&runner).await;

        assert!(result.is_ok());
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::ToolCallFinished { is_error: true, result_preview, .. }
                if result_preview == "Internal error: tool crashed"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_provider_error_is_retried() {
        let (provider, runner) = runner(
            vec![
                MockResponse::Error(GatewayError::RateLimited),
                MockResponse::stream_text("after retry"),
            ],
            vec![],
            AgentConfig::default(),
        );
        let start = tokio::time::Instant::now();
        let (result, _events) = run_collect(&runner).await;

        assert!(result.is_ok());
        assert_eq!(provider.call_count(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn fatal_provider_error_fails_run() {
        let (provider, runner) = runner(
            vec![MockResponse::Error(GatewayError::AuthenticationFailed(
                "bad key".into(),
            ))],
            vec![],
            AgentConfig::default(),
        );
        let (result, _events) = run_collect(&runner).await;

        assert!(matches!(
            result,
            Err(EngineError::Gateway(GatewayError::AuthenticationFailed(_)))
        ));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn mid_stream_error_fails_run() {
        let (_provider, runner) = runner(
            vec![MockResponse::stream_error(GatewayError::StreamInterrupted(
                "reset".into(),
            ))],
            vec![],
            AgentConfig::default(),
        );
        let (result, _events) = run_collect(&runner).await;
        assert!(matches!(
            result,
            Err(EngineError::Gateway(GatewayError::StreamInterrupted(_)))
        ));
    }

    #[test]
    fn ceil_ms() {
        assert_eq!(duration_ceil_ms(Duration::ZERO), 0);
        assert_eq!(duration_ceil_ms(Duration::from_micros(1)), 1);
        assert_eq!(duration_ceil_ms(Duration::from_micros(1500)), 2);
    }
}
