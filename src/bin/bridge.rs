//! `bridge` — runs a command inside a PTY and narrates its output.
//!
//! Usage: `bridge [OPTIONS] <command> [args...]`

use std::sync::Arc;

use clap::Parser;
use narrator_bridge::config::SessionConfig;
use narrator_bridge::service::NarratorService;
use narrator_bridge::{CharacterRegistry, narrator_dirs, pty};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bridge", about = "Voice-narration sidecar for interactive terminal agents")]
struct Cli {
    /// Character voice to narrate with.
    #[arg(long, env = "NARRATOR_CHARACTER")]
    character: Option<String>,

    /// LLM model identifier for narration generation.
    #[arg(long, env = "NARRATOR_LLM_MODEL")]
    llm_model: Option<String>,

    /// TTS voice identifier.
    #[arg(long, env = "NARRATOR_VOICE")]
    voice: Option<String>,

    /// The command to run inside the PTY.
    command: String,

    /// Arguments passed through to `command`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let _ = dotenvy::dotenv();

    let logs_dir = narrator_dirs::logs_dir();
    let _ = std::fs::create_dir_all(&logs_dir);
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "bridge.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(file_writer)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    let mut config = SessionConfig::from_env();
    if let Some(character) = cli.character {
        config.character = character;
    }
    if let Some(model) = cli.llm_model {
        config.llm_model = model;
    }
    if let Some(voice) = cli.voice {
        config.voice = voice;
    }

    let min_window = config.min_window;
    let pause_threshold = config.pause_threshold;
    let narration_timeout = config.narration_timeout;

    let characters = match std::fs::read_to_string(narrator_dirs::characters_file()) {
        Ok(overlay) => CharacterRegistry::with_overlay(&overlay),
        Err(_) => CharacterRegistry::default(),
    };
    let character = match characters.get(&config.character) {
        Some(c) => c.clone(),
        None => {
            eprintln!(
                "unknown character '{}'; falling back to 'reluctant_developer'",
                config.character
            );
            config.character = "reluctant_developer".to_string();
            characters
                .get(&config.character)
                .cloned()
                .expect("builtin character registry always contains reluctant_developer")
        }
    };

    let service = Arc::new(NarratorService::with_config_and_characters(config, characters));

    match pty::run(
        &cli.command,
        &cli.args,
        service,
        character,
        min_window,
        pause_threshold,
        narration_timeout,
    )
    .await
    {
        Ok(code) => std::process::ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("bridge error: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
