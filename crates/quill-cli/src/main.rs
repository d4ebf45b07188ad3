use std::io::Write;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use quill_client::ChatClient;
use quill_core::{Framing, QuillConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// quill — ask the chat backend and print the answer as it streams in
#[derive(Parser)]
#[command(name = "quill", version, about)]
struct Cli {
    /// Config file (falls back to $QUILL_CONFIG, then ~/.quill/quill.toml)
    #[arg(long)]
    config: Option<String>,

    /// SSE framing for event-stream replies, overriding the config
    #[arg(long, value_enum)]
    framing: Option<FramingArg>,

    /// Answer without consulting the knowledge base
    #[arg(long)]
    no_knowledge: bool,

    /// Use the non-streaming endpoint and print its JSON reply
    #[arg(long)]
    simple: bool,

    /// Message to send; multiple words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    message: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FramingArg {
    Block,
    Line,
}

impl From<FramingArg> for Framing {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Block => Framing::Block,
            FramingArg::Line => Framing::Line,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries only answer text
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > QUILL_CONFIG env > ~/.quill/quill.toml
    let config_path = cli.config.clone().or_else(|| std::env::var("QUILL_CONFIG").ok());
    let mut config = QuillConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        QuillConfig::default()
    });
    if let Some(framing) = cli.framing {
        config.stream.framing = framing.into();
    }
    if cli.no_knowledge {
        config.chat.use_knowledge_base = false;
    }

    let client = ChatClient::from_config(config).context("building HTTP client")?;
    let request = client.request(&cli.message.join(" "))?;

    if cli.simple {
        let reply = client.chat_simple(&request).await?;
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let stdout = std::io::stdout();
    let mut sink = quill_stream::from_fn(|delta: &str| -> std::io::Result<()> {
        let mut out = stdout.lock();
        out.write_all(delta.as_bytes())?;
        out.flush()
    });

    let outcome = client
        .stream_chat_cancellable(&request, &mut sink, cancel)
        .await?;
    println!();

    if outcome.cancelled {
        warn!(session = %outcome.session_id, "interrupted, answer is incomplete");
    }
    info!(
        session = %outcome.session_id,
        deltas = outcome.deltas,
        sink_failures = outcome.sink_failures,
        "done"
    );
    Ok(())
}
