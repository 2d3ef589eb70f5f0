//! Waveforge CLI Application

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use waveforge_core::domain::chain::{ChainParams, EffectChain};
use waveforge_core::domain::config::PresetManager;
use waveforge_core::domain::dsp::{GainParams, PitchParams};
use waveforge_infra::codec;

#[derive(Parser)]
#[command(name = "waveforge")]
#[command(about = "A destructive audio effects editor", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Preset directory (defaults to the user config directory)
    #[arg(long)]
    preset_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render an audio file through the effect chain
    Render {
        /// Input file (WAV, MP3 or FLAC)
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Preset to apply before rendering
        #[arg(short, long)]
        preset: Option<String>,

        /// Output bit depth (16, 24 or 32)
        #[arg(long, default_value_t = 24)]
        bit_depth: u16,

        /// Override the output gain stage in dB
        #[arg(long)]
        gain_db: Option<f32>,

        /// Override the pitch stage resampling ratio
        #[arg(long)]
        pitch: Option<f32>,
    },

    /// Show metadata for an audio file
    Probe {
        /// File to inspect
        input: PathBuf,
    },

    /// Manage saved presets
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// List available presets
    List,

    /// Print a preset as TOML
    Show { name: String },

    /// Delete a preset
    Delete { name: String },
}

fn preset_manager(dir: Option<PathBuf>) -> anyhow::Result<PresetManager> {
    let dir = match dir {
        Some(dir) => dir,
        None => PresetManager::default_preset_dir()?,
    };
    Ok(PresetManager::new(dir))
}

struct RenderArgs {
    input: PathBuf,
    output: PathBuf,
    preset: Option<String>,
    bit_depth: u16,
    gain_db: Option<f32>,
    pitch: Option<f32>,
}

async fn render(manager: &PresetManager, args: RenderArgs) -> anyhow::Result<()> {
    let RenderArgs {
        input,
        output,
        preset,
        bit_depth,
        gain_db,
        pitch,
    } = args;
    let source = codec::load_audio_file(&input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    tracing::info!(
        seconds = source.duration_seconds(),
        channels = source.num_channels(),
        "Source loaded"
    );

    let mut chain = EffectChain::new();
    chain.load_source(source)?;

    if let Some(name) = preset {
        // Accept either a saved preset name or a path to a TOML file.
        let params = if name.ends_with(".toml") {
            ChainParams::load_from_file(&name).await?
        } else {
            manager.load_preset(&name).await?
        };
        chain.apply_params(params)?;
        tracing::info!(preset = %name, "Preset applied");
    }

    if let Some(gain_db) = gain_db {
        chain.set_gain(GainParams {
            enabled: true,
            gain_db,
        })?;
    }
    if let Some(ratio) = pitch {
        chain.set_pitch(PitchParams {
            enabled: true,
            ratio,
        })?;
    }

    if chain.clipped() {
        tracing::warn!("Rendered signal exceeds unity; integer exports will clip");
    }

    codec::export_wav(&output, chain.output(), bit_depth)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let manager = preset_manager(cli.preset_dir)?;

    match cli.command {
        Command::Render {
            input,
            output,
            preset,
            bit_depth,
            gain_db,
            pitch,
        } => {
            render(
                &manager,
                RenderArgs {
                    input,
                    output,
                    preset,
                    bit_depth,
                    gain_db,
                    pitch,
                },
            )
            .await
        }

        Command::Probe { input } => {
            let info = codec::probe(&input)?;
            println!("channels:    {}", info.channels);
            println!("sample rate: {} Hz", info.sample_rate);
            println!("duration:    {:.2} s", info.duration_seconds);
            println!("peak:        {:.3}", info.peak);
            Ok(())
        }

        Command::Presets { action } => match action {
            PresetAction::List => {
                for name in manager.list_presets().await? {
                    println!("{}", name);
                }
                Ok(())
            }
            PresetAction::Show { name } => {
                let params = manager.load_preset(&name).await?;
                print!("{}", toml::to_string_pretty(&params)?);
                Ok(())
            }
            PresetAction::Delete { name } => {
                manager.delete_preset(&name).await?;
                println!("Deleted {}", name);
                Ok(())
            }
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    run(cli).await
}
