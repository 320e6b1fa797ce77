use anyhow::{Context, Result};
use arbiter::{AgentResponse, ArbitrationEngine, EngineConfig, EngineContext};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

/// One recorded turn: the model's draft response plus the context it was
/// produced under.
#[derive(Deserialize)]
struct Turn {
    response: AgentResponse,
    context: Value,
}

// Usage: arbiter [TURN.json] [--config engine.toml]
// Reads the turn from stdin when no path is given.
#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let mut turn_path = None;
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = Some(args.next().context("--config needs a path")?),
            _ => turn_path = Some(arg),
        }
    }

    let config = match config_path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading config {}", path))?;
            EngineConfig::from_toml_str(&raw)?
        }
        None => EngineConfig::default(),
    };

    let raw = match turn_path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading turn {}", path))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await.context("reading turn from stdin")?;
            buf
        }
    };

    let turn: Turn = serde_json::from_str(&raw).context("turn is not valid JSON")?;
    let mut context = turn.context;
    if let Some(obj) = context.as_object_mut() {
        obj.entry("runId")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    }
    let ctx = EngineContext::from_value(context)?;

    tracing::info!(run_id = %ctx.run_id, "Replaying turn");
    let mut engine = ArbitrationEngine::with_builtin_catalogs(config);
    let output = engine.process(turn.response, &ctx)?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
