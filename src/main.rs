use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use serde::Serialize;
use stream_transcode::config::TranscodeConfig;
use stream_transcode::context::{DryRunContext, PacketCollector, PacketSink};
use stream_transcode::lockfile::generate_lock;
use stream_transcode::media::{MediaKind, StreamType};
use stream_transcode::observability::{MetricsCollector, log_snapshot};
use stream_transcode::packet::{ConfigBlob, Packet, PacketParts};
use stream_transcode::presets::generate_preset;
use stream_transcode::stream::{SourceStream, Stream, StreamMode};
use stream_transcode::validation::{ValidationReport, validate_config};
use stream_transcode::{CodecRegistry, ProfileDirectory};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_tracing()?;

    match cli.command {
        Commands::ListCodecs { kind } => {
            list_codecs(kind);
            Ok(())
        }
        Commands::ListProfiles { config, kind } => list_profiles(&config, kind),
        Commands::Validate { config } => validate_config_cmd(&config),
        Commands::Lock { config, output } => lock_config(&config, output),
        Commands::Preset { action } => preset_command(action),
        Commands::Plan(args) => plan_stream(args),
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(())
}

fn list_codecs(kind: Option<MediaKind>) {
    let registry = CodecRegistry::with_defaults();
    println!("Available codecs:");
    for codec in registry.codecs() {
        if kind.is_some_and(|kind| codec.kind() != kind) {
            continue;
        }
        let role = match (codec.decoder, codec.encoder) {
            (true, true) => "decode/encode",
            (true, false) => "decode",
            (false, true) => "encode",
            (false, false) => "-",
        };
        let hardware = if codec.capabilities.hardware {
            " [hw]"
        } else {
            ""
        };
        println!(
            "- {} ({}, {}){} {}",
            codec.name,
            codec.kind(),
            role,
            hardware,
            codec.title
        );
    }
}

fn load_setup(config_path: &Path) -> Result<(TranscodeConfig, CodecRegistry, ProfileDirectory)> {
    let config = TranscodeConfig::load(config_path)?;
    let registry = config.build_registry();
    let directory = config
        .build_directory(&registry)
        .with_context(|| format!("Invalid profiles in {}", config_path.display()))?;
    Ok((config, registry, directory))
}

fn list_profiles(config_path: &Path, kind: Option<MediaKind>) -> Result<()> {
    let (_, registry, directory) = load_setup(config_path)?;
    println!("Codec profiles:");
    for profile in directory.iter() {
        if let Some(kind) = kind
            && !profile.is_copy_profile()
            && profile.kind() != Some(kind)
        {
            continue;
        }
        println!(
            "- {} [{}] {} ({}, {})",
            profile.name(),
            profile.kind().map(|k| k.as_str()).unwrap_or("any"),
            profile.title(),
            profile.codec_name().unwrap_or("-"),
            profile.status(&registry)
        );
    }
    Ok(())
}

fn report_findings(config_path: &Path, report: &ValidationReport) {
    for warning in &report.warnings {
        warn!(file = %config_path.display(), "{warning}");
    }
    for error_msg in &report.errors {
        error!(file = %config_path.display(), "{error_msg}");
    }
}

fn validate_config_cmd(config_path: &Path) -> Result<()> {
    let config = TranscodeConfig::load(config_path)?;
    let registry = config.build_registry();
    let report = validate_config(&config, &registry);
    report_findings(config_path, &report);

    if report.is_ok() {
        info!(file = %config_path.display(), "Config validation passed");
        Ok(())
    } else {
        Err(anyhow!(
            "Config validation failed with {} error(s)",
            report.errors.len()
        ))
    }
}

fn lock_config(config_path: &Path, output_path: PathBuf) -> Result<()> {
    let config = TranscodeConfig::load(config_path)?;
    let registry = config.build_registry();
    let report = validate_config(&config, &registry);
    report_findings(config_path, &report);

    if !report.is_ok() {
        return Err(anyhow!(
            "Cannot generate lockfile due to {} validation error(s)",
            report.errors.len()
        ));
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create lockfile directory: {}", parent.display())
        })?;
    }

    generate_lock(&config, &output_path)?;
    info!(
        lockfile = %output_path.display(),
        "Lockfile generated successfully"
    );
    Ok(())
}

fn preset_command(command: PresetCommands) -> Result<()> {
    match command {
        PresetCommands::New { preset, output } => {
            let destination =
                output.unwrap_or_else(|| PathBuf::from(format!("profiles/{preset}.yaml")));
            let generated = generate_preset(&preset, &destination)?;
            info!(
                preset = %preset,
                path = %generated.display(),
                "Preset config generated"
            );
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct PlanReport {
    profile: String,
    input_type: StreamType,
    output_type: StreamType,
    mode: StreamMode,
    /// Bytes of source configuration the session keeps for a passthrough stream.
    config_bytes: Option<usize>,
    packets_in: usize,
    packets_out: usize,
    output_index: Option<usize>,
}

fn plan_stream(args: PlanArgs) -> Result<()> {
    let (_, registry, directory) = load_setup(&args.config)?;
    let profile = directory
        .find_profile(&args.profile)
        .ok_or_else(|| anyhow!("Unknown profile '{}'", args.profile))?;
    let input_type: StreamType = args.stream_type.parse().map_err(|err: String| anyhow!(err))?;

    let mut source = SourceStream::new(args.index, input_type)
        .with_config(ConfigBlob::new(Bytes::from_static(b"\x00\x00\x01")));
    source.channels = args.channels;
    source.sample_rate = args.sample_rate;

    let collector = Arc::new(PacketCollector::new());
    let sink: Arc<dyn PacketSink> = collector.clone();
    let contexts = DryRunContext::factory(args.delay);
    let metrics = MetricsCollector::new();
    let mut stream = Stream::create(
        sink,
        &registry,
        &contexts,
        &metrics,
        &profile,
        &mut source,
        args.src_codecs.as_deref(),
    )
    .with_context(|| {
        format!(
            "Cannot set up {} stream with profile '{}'",
            input_type,
            profile.name()
        )
    })?;

    for n in 0..args.packets {
        let packet = Packet::from(PacketParts {
            stream_type: Some(input_type),
            payload: Some(Bytes::from(vec![0u8; 188])),
            pts: Some(n as i64 * 3600),
            dts: Some(n as i64 * 3600),
            keyframe: n == 0,
            config: None,
        });
        stream.handle(&packet)?;
    }
    stream.stop(true);

    let delivered = collector.packets();
    let report = PlanReport {
        profile: profile.name().to_string(),
        input_type,
        output_type: stream.stream_type(),
        mode: stream.mode(),
        config_bytes: stream.config().map(ConfigBlob::len),
        packets_in: args.packets,
        packets_out: delivered.len(),
        output_index: delivered.first().and_then(Packet::output_index),
    };
    stream.destroy();

    if args.json {
        serde_json::to_writer_pretty(io::stdout(), &report)?;
        println!();
    } else {
        println!("Stream {} ({})", args.index, report.profile);
        println!("  mode:    {}", report.mode);
        println!("  input:   {}", report.input_type);
        println!("  output:  {}", report.output_type);
        println!("  packets: {} in, {} out", report.packets_in, report.packets_out);
        if let Some(bytes) = report.config_bytes {
            println!("  config:  {bytes} bytes kept for the muxer");
        }
    }

    if args.print_metrics {
        log_snapshot(&metrics.snapshot());
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    name = "stream-transcode",
    version,
    about = "Per-stream copy/transcode planning for live media sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    ListCodecs {
        #[arg(long, value_enum)]
        kind: Option<MediaKind>,
    },
    ListProfiles {
        config: PathBuf,
        #[arg(long, value_enum)]
        kind: Option<MediaKind>,
    },
    Validate {
        config: PathBuf,
    },
    Lock {
        config: PathBuf,
        output: PathBuf,
    },
    Preset {
        #[command(subcommand)]
        action: PresetCommands,
    },
    Plan(PlanArgs),
}

#[derive(Subcommand)]
enum PresetCommands {
    New {
        #[arg(long)]
        preset: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct PlanArgs {
    config: PathBuf,
    #[arg(long)]
    profile: String,
    #[arg(long = "stream-type")]
    stream_type: String,
    #[arg(long, default_value_t = 0)]
    index: usize,
    #[arg(long = "src-codecs")]
    src_codecs: Option<String>,
    #[arg(long, default_value_t = 10)]
    packets: usize,
    #[arg(long, default_value_t = 2)]
    delay: usize,
    #[arg(long)]
    channels: Option<u16>,
    #[arg(long = "sample-rate")]
    sample_rate: Option<u32>,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    print_metrics: bool,
}
