use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;

use linkslide_agent::tools::{create_registry, FinishTool, GenerateSlideTool, SearchTool};
use linkslide_agent::{AgentConfig, AgentPipeline, AgentRunner, OpenAiConfig, OpenAiProvider};
use linkslide_core::layout::OutputLayout;
use linkslide_imaging::{
    BackendConfig, DirectBackend, HttpArtifactFetcher, ImageBackends, JobPolicy, JobRunner,
    PollingBackend,
};
use linkslide_packaging::FsPackager;
use linkslide_server::{ProgressBridge, ServerConfig, SessionOrchestrator};
use linkslide_settings::{ImageSettings, JobSettings, LinkSlideSettings};
use linkslide_store::SlideStore;
use linkslide_telemetry::{init_telemetry, TelemetryConfig};

/// Turn a topic into a slide deck with an LLM agent and an image backend.
#[derive(Debug, Parser)]
#[command(name = "linkslide", version)]
struct Cli {
    /// Settings file (JSON). Missing file means defaults.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Log one JSON object per line.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry = init_telemetry(TelemetryConfig {
        json: cli.log_json,
        ..TelemetryConfig::default()
    });
    tracing::debug!(filter = telemetry.filter(), "telemetry initialized");

    let mut settings = linkslide_settings::load_settings_from_path(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    let layout = OutputLayout::new(&settings.output.root_dir, &settings.output.public_prefix);
    std::fs::create_dir_all(layout.root())
        .with_context(|| format!("creating output root {}", layout.root().display()))?;

    let orchestrator = build_orchestrator(&settings, &layout)?;
    let config = ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        layout,
        styles: settings.styles.clone(),
    };
    let handle = linkslide_server::start(config, Arc::new(orchestrator))
        .await
        .context("starting server")?;

    tracing::info!(port = handle.port, model = %settings.llm.model_id, "LinkSlide ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

fn build_orchestrator(
    settings: &LinkSlideSettings,
    layout: &OutputLayout,
) -> anyhow::Result<SessionOrchestrator> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("linkslide/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let store = SlideStore::new(layout.clone());
    let packager = Arc::new(FsPackager::new(layout.clone()));

    let backends = ImageBackends::new(
        Arc::new(PollingBackend::new(
            client.clone(),
            backend_config(&settings.image_standard),
        )),
        Arc::new(DirectBackend::new(
            client.clone(),
            backend_config(&settings.image_pro),
        )),
    );
    let runner = Arc::new(JobRunner::new(
        job_policy(&settings.job),
        Arc::new(HttpArtifactFetcher::new(client.clone(), layout.clone())),
    ));

    let search = settings.search.is_enabled().then(|| {
        SearchTool::new(
            client.clone(),
            settings.search.url.clone().unwrap_or_default(),
            settings.search.api_key.clone().map(SecretString::from),
        )
    });
    let registry = create_registry(
        GenerateSlideTool::new(runner, backends, store.clone()),
        FinishTool::new(store.clone(), packager.clone()),
        search,
    );
    tracing::info!(tools = ?registry.names(), "tools registered");

    let provider = OpenAiProvider::new(
        client,
        OpenAiConfig {
            base_url: settings.llm.base_url.clone(),
            api_key: SecretString::from(settings.llm.api_key.clone()),
            model: settings.llm.model_id.clone(),
        },
    );
    let agent = AgentRunner::new(
        Arc::new(provider),
        Arc::new(registry),
        AgentConfig {
            max_turns: settings.llm.max_turns,
            ..AgentConfig::default()
        },
    );

    Ok(SessionOrchestrator::new(
        Arc::new(AgentPipeline::new(Arc::new(agent))),
        ProgressBridge::new(store, packager),
    ))
}

fn backend_config(image: &ImageSettings) -> BackendConfig {
    BackendConfig {
        base_url: image.base_url.clone(),
        api_key: SecretString::from(image.api_key.clone()),
        model_id: image.model_id.clone(),
        size: image.size.clone(),
    }
}

fn job_policy(job: &JobSettings) -> JobPolicy {
    JobPolicy {
        max_attempts: job.max_attempts,
        cooldown: Duration::from_secs(job.cooldown_secs),
        poll_interval: Duration::from_secs(job.poll_interval_secs),
        max_polls: job.max_polls,
        submit_timeout: Duration::from_secs(job.submit_timeout_secs),
        poll_timeout: Duration::from_secs(job.poll_timeout_secs),
        fetch_timeout: Duration::from_secs(job.fetch_timeout_secs),
    }
}
