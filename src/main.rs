use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use aria_client::{
    Config, ConversationState, DeviceDispatcher, DeviceDuplex, DuplexAudio, Error, FileDuplex,
    Overrides, Query, RetryingDriver, Session, SessionOptions, TriggerSource, TurnExecutor,
    WsTransport,
};

/// Aria - Streaming voice-assistant client
#[derive(Parser)]
#[command(name = "aria", version, about)]
struct Cli {
    /// Assistant service endpoint (ws:// or wss:// URL)
    #[arg(long, env = "ARIA_ENDPOINT")]
    endpoint: Option<String>,

    /// Conversation language code (e.g. "en-US")
    #[arg(long, env = "ARIA_LANG")]
    lang: Option<String>,

    /// Device instance identifier (overrides the persisted identity)
    #[arg(long)]
    device_id: Option<String>,

    /// Device model identifier
    #[arg(long)]
    device_model_id: Option<String>,

    /// Read the request audio from a WAV file instead of the microphone
    #[arg(short = 'i', long)]
    input_audio_file: Option<PathBuf>,

    /// Write the response audio to a WAV file instead of the speakers
    #[arg(short = 'o', long)]
    output_audio_file: Option<PathBuf>,

    /// Capture/playback sample rate in hertz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Per-turn deadline in seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Exit after one conversation instead of re-arming for the next trigger
    #[arg(long)]
    once: bool,

    /// Send a text query instead of recording audio, then exit
    #[arg(short = 't', long)]
    text_query: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,aria_client=info",
        1 => "info,aria_client=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        endpoint: cli.endpoint.clone(),
        language_code: cli.lang.clone(),
        device_id: cli.device_id.clone(),
        device_model_id: cli.device_model_id.clone(),
        sample_rate: cli.sample_rate,
        deadline_secs: cli.deadline_secs,
    };
    let config = Config::load(&overrides)?;
    tracing::debug!(?config, "loaded configuration");

    tracing::info!(
        endpoint = %config.endpoint,
        device = %config.device.id,
        model = %config.device.model_id,
        "starting aria client"
    );

    let file_driven = cli.input_audio_file.is_some() || cli.output_audio_file.is_some();
    let duplex: Arc<dyn DuplexAudio> = if file_driven {
        Arc::new(FileDuplex::new(
            cli.input_audio_file.as_deref(),
            cli.output_audio_file.clone(),
            &config.audio,
            config.volume_percentage,
        )?)
    } else {
        Arc::new(DeviceDuplex::new(&config.audio, config.volume_percentage))
    };

    let dispatcher = Arc::new(build_dispatcher());
    let transport = WsTransport::new(config.endpoint.clone());
    let executor = TurnExecutor::new(transport, duplex, dispatcher, config);

    // A text query is a single turn with no audio capture and no session loop
    if let Some(text) = cli.text_query {
        let outcome = executor
            .run_turn(ConversationState::default(), Query::Text(text))
            .await?;
        tracing::info!(
            follow_on = outcome.continue_conversation,
            "text query finished"
        );
        return Ok(());
    }

    let options = SessionOptions {
        once: cli.once,
        single_turn: file_driven,
    };
    let mut session = Session::new(RetryingDriver::new(executor), options);
    let mut trigger = EnterKeyTrigger::new();
    session.run(&mut trigger).await?;

    tracing::info!(turns = session.turns_completed(), "exiting");
    Ok(())
}

/// The command-to-handler map, built once at startup
fn build_dispatcher() -> DeviceDispatcher {
    DeviceDispatcher::new().register("action.devices.commands.OnOff", |params| async move {
        let on = params
            .get("on")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if on {
            tracing::info!("device turned on");
        } else {
            tracing::info!("device turned off");
        }
        Ok(())
    })
}

/// User activation via the terminal: each Enter keypress starts a turn
struct EnterKeyTrigger {
    lines: Lines<BufReader<Stdin>>,
}

impl EnterKeyTrigger {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl TriggerSource for EnterKeyTrigger {
    async fn wait_for_trigger(&mut self) -> aria_client::Result<()> {
        println!("Press Enter to send a new request...");
        match self.lines.next_line().await? {
            Some(_) => Ok(()),
            None => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stdin closed",
            ))),
        }
    }
}
