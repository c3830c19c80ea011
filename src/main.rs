//! Application entry point: live voice agent.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Resolve the API key (`GEMINI_API_KEY` wins over the settings file).
//! 4. Create the [`tokio`] runtime.
//! 5. Load the tool workflow and build the [`ToolExecutionEngine`].
//! 6. Start the console reader thread.
//! 7. Run the [`SessionOrchestrator`] until the user quits or a task fails.
//! 8. Shut the runtime down with a bounded timeout; a stdin read or device
//!    call still in flight must not keep the process alive.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use live_voice_agent::{
    audio::CpalDevices,
    config::{AppConfig, AppPaths, LlmProvider},
    console::ConsoleReader,
    llm::{ApiAuxModel, AuxiliaryModel, IntentClassifier},
    pipeline::SessionOrchestrator,
    session::WebSocketConnector,
    tools::{retriever_for, ReqwestToolHttp, ToolExecutionEngine, ToolRegistry},
};

const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Lines buffered between the console thread and the console task.
const CONSOLE_CAPACITY: usize = 16;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Load the workflow, or an empty registry when no workflow file exists.
/// A workflow that exists but is invalid is fatal.
fn load_registry(config: &AppConfig, paths: &AppPaths) -> anyhow::Result<ToolRegistry> {
    let path = config.tools.workflow_path(paths);
    if !path.exists() {
        log::warn!(
            "No workflow file at {}; starting without tools",
            path.display()
        );
        return Ok(ToolRegistry::empty());
    }

    let registry = ToolRegistry::load(&path)
        .with_context(|| format!("invalid workflow {}", path.display()))?;
    log::info!("Loaded {} tools from {}", registry.len(), path.display());
    Ok(registry)
}

async fn run(config: AppConfig, api_key: String) -> anyhow::Result<()> {
    let paths = AppPaths::new();
    let registry = Arc::new(load_registry(&config, &paths)?);

    let http_timeout = Duration::from_secs(config.tools.http_timeout_secs);
    let model: Arc<dyn AuxiliaryModel> = Arc::new(ApiAuxModel::from_config(&config.llm));
    let engine = Arc::new(ToolExecutionEngine::new(
        registry,
        Arc::new(ReqwestToolHttp::new(http_timeout)),
        Arc::clone(&model),
        Arc::from(retriever_for(config.tools.retrieval_url.as_deref(), http_timeout)),
    ));

    // The reader thread outlives the session; see ConsoleReader docs.
    let (_console, lines) =
        ConsoleReader::stdin(CONSOLE_CAPACITY).context("cannot start console reader")?;

    let mut orchestrator = SessionOrchestrator::new(
        &config.session,
        &config.audio,
        Arc::new(WebSocketConnector::new(&config.session.endpoint, api_key)),
        Arc::new(CpalDevices::new(config.audio.clone())),
        engine,
        lines,
    )
    .with_history_user_blocks(config.tools.history_user_blocks);

    if config.routing.classify_intents {
        orchestrator =
            orchestrator.with_classifier(Arc::new(IntentClassifier::new(model, &config.routing)));
    }

    println!("Speak, or type a message and press Enter. Type q to quit.");
    orchestrator.run().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Live voice agent starting up");

    // 2. Configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Credentials
    let api_key = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| config.session.api_key.clone())
        .filter(|k| !k.trim().is_empty());
    let Some(api_key) = api_key else {
        bail!("no API key: set {API_KEY_ENV} or session.api_key in the settings file");
    };
    if config.llm.provider == LlmProvider::Gemini && config.llm.api_key.is_none() {
        config.llm.api_key = Some(api_key.clone());
    }

    // 4. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let result = rt.block_on(run(config, api_key));

    // 8. Bounded shutdown
    rt.shutdown_timeout(SHUTDOWN_TIMEOUT);

    match &result {
        Ok(()) => log::info!("Live voice agent exited cleanly"),
        Err(e) => log::error!("Live voice agent stopped: {e:#}"),
    }
    result
}
