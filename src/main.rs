use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use sentauri_voice::api::ApiServer;
use sentauri_voice::playback::{CommandPlayback, Detached, Playback};
use sentauri_voice::providers::{AudioClip, VoiceOptions};
use sentauri_voice::{Config, Error, Interpreter, Orchestrator, PageEditor, ProviderGateway};

/// Sentauri - edit a website with your voice
#[derive(Parser)]
#[command(name = "sentauri", version, about)]
struct Cli {
    /// Port to listen on (overrides configuration)
    #[arg(long, env = "SENTAURI_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Run one typed command and print the response
    Say {
        /// Command text, e.g. "change the title to Hello World"
        text: String,
        /// Play the spoken response through a local player
        #[arg(long)]
        play: bool,
    },
    /// Read commands from stdin until EOF
    Repl {
        /// Play spoken responses through a local player
        #[arg(long)]
        play: bool,
    },
    /// Show the effective provider order
    Providers,
    /// Synthesize text through the provider chain
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
        /// Write the audio to a file instead of playing it
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Transcribe an audio file through the provider chain
    Transcribe {
        /// Audio file (wav, mp3, m4a, ogg, flac or webm)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,sentauri_voice=info",
        1 => "info,sentauri_voice=debug",
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
    let mut config = Config::load();
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Say { text, play } => say(&config, &text, play).await,
        Command::Repl { play } => repl(&config, play).await,
        Command::Providers => {
            providers(&config);
            Ok(())
        }
        Command::TestTts { text, out } => test_tts(&config, &text, out.as_deref()).await,
        Command::Transcribe { file } => transcribe(&config, &file).await,
    }
}

/// Wire gateway, interpreter and page editor into an orchestrator
fn assemble(config: &Config, playback: Arc<dyn Playback>) -> (Arc<Orchestrator>, Arc<PageEditor>) {
    let editor = Arc::new(PageEditor::default());
    let orchestrator = Orchestrator::new(
        ProviderGateway::from_config(config),
        Interpreter::from_config(config),
        editor.clone(),
        config.session.history_limit,
    )
    .with_playback(playback);
    (Arc::new(orchestrator), editor)
}

/// Local player from configuration, or the first one found on `PATH`
fn local_player(config: &Config) -> anyhow::Result<Arc<dyn Playback>> {
    if let Some(command) = &config.session.player {
        return Ok(Arc::new(CommandPlayback::new(command)?));
    }
    if let Some(player) = CommandPlayback::detect() {
        tracing::debug!(player = player.program(), "using detected audio player");
        return Ok(Arc::new(player));
    }
    tracing::warn!("no audio player found, responses will be text only");
    Ok(Arc::new(Detached))
}

fn playback_for(config: &Config, play: bool) -> anyhow::Result<Arc<dyn Playback>> {
    if play {
        local_player(config)
    } else {
        Ok(Arc::new(Detached))
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(port = config.server.port, "starting sentauri voice");

    let (orchestrator, editor) = assemble(&config, Arc::new(Detached));
    let server = ApiServer::new(orchestrator, editor, config.server);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

async fn say(config: &Config, text: &str, play: bool) -> anyhow::Result<()> {
    let (orchestrator, _) = assemble(config, playback_for(config, play)?);
    let outcome = orchestrator.process_text(text).await?;
    println!("{}", outcome.response);
    Ok(())
}

async fn repl(config: &Config, play: bool) -> anyhow::Result<()> {
    let (orchestrator, _) = assemble(config, playback_for(config, play)?);
    if let Some(welcome) = orchestrator.conversation().first() {
        println!("{}", welcome.text);
    }
    println!("(type a command, Ctrl-D to exit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let outcome = orchestrator.process_text(&line).await?;
        let marker = if outcome.success { ">" } else { "?" };
        println!("{marker} {}", outcome.response);
    }
    Ok(())
}

fn providers(config: &Config) {
    let gateway = ProviderGateway::from_config(config);
    let list = |names: Vec<&'static str>| {
        if names.is_empty() {
            "(none available)".to_string()
        } else {
            names.join(" → ")
        }
    };

    println!("Speech-to-text: {}", list(gateway.stt_names()));
    println!("Text-to-speech: {}", list(gateway.tts_names()));
    println!(
        "Remote intents: {}",
        if config.remote_intent_enabled() { "enabled" } else { "disabled" }
    );
}

async fn test_tts(config: &Config, text: &str, out: Option<&Path>) -> anyhow::Result<()> {
    let gateway = ProviderGateway::from_config(config);
    let audio = gateway
        .synthesize(text, &VoiceOptions::default())
        .await
        .map_err(|f| Error::Tts(f.to_string()))?;
    println!("Synthesized {} bytes with {}", audio.bytes.len(), audio.provider);

    match out {
        Some(path) => {
            tokio::fs::write(path, &audio.bytes).await?;
            println!("Wrote {}", path.display());
        }
        None => local_player(config)?.play(&audio).await?,
    }
    Ok(())
}

async fn transcribe(config: &Config, file: &Path) -> anyhow::Result<()> {
    let mime = match file.extension().and_then(|e| e.to_str()).unwrap_or_default() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "audio/webm",
    };
    let clip = AudioClip::new(tokio::fs::read(file).await?, mime);

    let gateway = ProviderGateway::from_config(config);
    let transcript = gateway
        .transcribe(&clip)
        .await
        .map_err(|f| Error::Stt(f.to_string()))?;
    println!("{} (confidence {:.2}, {})", transcript.text, transcript.confidence, transcript.provider);
    Ok(())
}
