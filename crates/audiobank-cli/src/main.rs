//! Audiobank CLI: play clips and watch the lip-sync signal

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crossbeam_channel::{select, tick, Receiver};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use audiobank::audio::{BankEngine, BankEvent, ClipId, ClipSource, PlaybackOutcome, RodioBackend};
use audiobank::config::BankConfig;
use audiobank_chat::config::ChatConfig;
use audiobank_chat::danmaku::DanmakuPlugin;

/// Width of the volume bar in characters
const METER_WIDTH: usize = 40;

/// Meter refresh interval
const METER_REFRESH_MS: u64 = 50;

#[derive(Parser, Debug)]
#[command(name = "audiobank", version, about = "Clip player with live volume and pitch meter")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play files or URLs one after another and print the signal meter
    Play {
        /// Audio files or http(s) URLs
        #[arg(required = true)]
        sources: Vec<String>,

        /// Keep clips registered after they finish
        #[arg(long)]
        keep: bool,
    },

    /// Poll a danmaku relay and print prompts for new messages
    Danmaku {
        /// Relay base URL
        #[arg(long)]
        url: Option<String>,

        /// Prompt language (zh or ja)
        #[arg(long, default_value = "zh")]
        language: String,

        /// Print each new message as it arrives
        #[arg(long)]
        display: bool,

        /// Seconds between prompt builds
        #[arg(long, default_value_t = 5)]
        prompt_every: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // Logs go to stderr so the meter owns stdout
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Command::Play { sources, keep } => {
            let config = BankConfig::load(cli.config.as_deref())?;
            play(config, &sources, !keep)
        }
        Command::Danmaku {
            url,
            language,
            display,
            prompt_every,
        } => {
            let mut config = ChatConfig {
                language,
                display,
                ..ChatConfig::default()
            };
            if let Some(url) = url {
                config.url = url;
            }
            danmaku(config, prompt_every)
        }
    }
}

fn play(config: BankConfig, sources: &[String], auto_remove: bool) -> anyhow::Result<()> {
    let backend_config = config.clone();
    let engine = BankEngine::new(config, move || RodioBackend::open(&backend_config))
        .context("failed to start audio bank")?;
    let events = engine.subscribe();
    // Nothing to click in a terminal; running the command is the gesture
    engine.notify_user_gesture();

    let ids: Vec<(ClipId, &String)> = sources
        .iter()
        .map(|s| (engine.add(ClipSource::parse(s)), s))
        .collect();

    let mut played = 0;
    for (id, source) in ids {
        if !wait_ready(&events, id)? {
            warn!(%id, "skipping {}", source);
            continue;
        }

        info!(%id, "playing {}", source);
        let completion = engine.play(id, auto_remove)?;
        let refresh = tick(Duration::from_millis(METER_REFRESH_MS));
        let outcome = loop {
            select! {
                recv(completion.receiver()) -> outcome => {
                    break outcome.context("audio bank stopped during playback")?;
                }
                recv(refresh) -> _ => print_meter(id, engine.volume(), engine.frequency())?,
            }
        };
        println!();
        info!(%id, %outcome, "finished");
        if outcome == PlaybackOutcome::Ended {
            played += 1;
        }
    }

    engine.shutdown();
    if played == 0 {
        bail!("no clip could be played");
    }
    Ok(())
}

/// Block until `id` is materialized; `false` if it failed
fn wait_ready(events: &Receiver<BankEvent>, id: ClipId) -> anyhow::Result<bool> {
    loop {
        match events.recv_timeout(Duration::from_secs(60)) {
            Ok(BankEvent::ClipReady(ready)) if ready == id => return Ok(true),
            Ok(BankEvent::ClipFailed { id: failed, reason }) if failed == id => {
                warn!(%id, "{}", reason);
                return Ok(false);
            }
            Ok(_) => continue,
            Err(_) => bail!("timed out waiting for {}", id),
        }
    }
}

fn print_meter(id: ClipId, volume: f32, frequency: f32) -> io::Result<()> {
    let filled = ((volume.clamp(0.0, 1.0) * METER_WIDTH as f32).round() as usize).min(METER_WIDTH);
    let mut out = io::stdout().lock();
    write!(
        out,
        "\r{:<8} vol {:>+6.2} [{}{}] {:>8.1} Hz",
        id.to_string(),
        volume,
        "#".repeat(filled),
        " ".repeat(METER_WIDTH - filled),
        frequency
    )?;
    out.flush()
}

fn danmaku(config: ChatConfig, prompt_every: u64) -> anyhow::Result<()> {
    let plugin = DanmakuPlugin::start(&config).context("failed to start danmaku plugin")?;
    info!("polling {}", config.messages_url());

    let prompt_tick = tick(Duration::from_secs(prompt_every.max(1)));
    let never = crossbeam_channel::never();
    let shown = plugin.display_receiver().unwrap_or(&never);

    loop {
        select! {
            recv(shown) -> msg => {
                if let Ok(msg) = msg {
                    println!("[{}] {}", msg.username, msg.content);
                }
            }
            recv(prompt_tick) -> _ => {
                let prompt = plugin.prompt();
                if !prompt.is_empty() {
                    println!("--- prompt ---\n{}", prompt);
                }
            }
        }
    }
}
