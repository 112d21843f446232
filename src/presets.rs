use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::TranscodeConfig;
use crate::profile::{AudioSettings, ProfileConfig, ProfileSettings, VideoSettings};

pub const PRESET_NAMES: [&str; 3] = ["webtv", "hevc", "audio"];

pub fn generate_preset(name: &str, destination: &Path) -> Result<PathBuf> {
    let preset = preset_config(name)?;

    let rendered = serde_yaml::to_string(&preset)?;
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(destination, rendered)
        .with_context(|| format!("Failed to write preset config: {}", destination.display()))?;

    Ok(destination.to_path_buf())
}

pub fn preset_config(name: &str) -> Result<TranscodeConfig> {
    let profiles = match name {
        "webtv" => webtv_preset(),
        "hevc" => hevc_preset(),
        "audio" => audio_preset(),
        other => anyhow::bail!(
            "Unknown preset '{other}' (available: {})",
            PRESET_NAMES.join(", ")
        ),
    };
    Ok(TranscodeConfig {
        profiles,
        ..TranscodeConfig::default()
    })
}

fn webtv_preset() -> Vec<ProfileConfig> {
    vec![
        video(
            "webtv-h264",
            "Web TV H.264 (SD)",
            "libx264",
            1500.0,
            Some(77),
            "yuv420p",
        ),
        audio("webtv-aac", "Web TV AAC stereo", "aac", 128.0, 48000, "stereo"),
        subtitle("webtv-text", "Web TV text subtitles", "text"),
    ]
}

fn hevc_preset() -> Vec<ProfileConfig> {
    let mut hardware = video(
        "hevc-vaapi",
        "HEVC (VA-API)",
        "hevc_vaapi",
        3000.0,
        None,
        "nv12",
    );
    hardware.device = Some("/dev/dri/renderD128".into());
    if let ProfileSettings::Video(settings) = &mut hardware.settings {
        settings.hwaccel = true;
    }
    vec![
        video("hevc", "HEVC (software)", "libx265", 2500.0, None, "yuv420p"),
        hardware,
        audio("hevc-ac3", "AC-3 5.1", "ac3", 384.0, 48000, "5.1"),
    ]
}

fn audio_preset() -> Vec<ProfileConfig> {
    let mut opus = audio("opus", "Opus stereo", "libopus", 96.0, 48000, "stereo");
    opus.copy_same_codec = true;
    let mut vorbis = audio("vorbis", "Vorbis (quality)", "libvorbis", 0.0, 48000, "stereo");
    vorbis.qscale = 5.0;
    vec![
        opus,
        vorbis,
        audio("mp2", "MPEG-1 Layer II", "mp2", 192.0, 48000, "stereo"),
    ]
}

fn base(name: &str, description: &str, codec: &str, settings: ProfileSettings) -> ProfileConfig {
    ProfileConfig {
        id: None,
        name: name.into(),
        description: description.into(),
        codec: Some(codec.into()),
        bit_rate: 0.0,
        qscale: 0.0,
        profile: None,
        device: None,
        copy_same_codec: false,
        settings,
    }
}

fn video(
    name: &str,
    description: &str,
    codec: &str,
    bit_rate: f64,
    profile: Option<i32>,
    pixel_format: &str,
) -> ProfileConfig {
    let settings = ProfileSettings::Video(VideoSettings {
        pixel_format: Some(pixel_format.into()),
        hwaccel: false,
    });
    ProfileConfig {
        bit_rate,
        profile,
        ..base(name, description, codec, settings)
    }
}

fn audio(
    name: &str,
    description: &str,
    codec: &str,
    bit_rate: f64,
    sample_rate: u32,
    channel_layout: &str,
) -> ProfileConfig {
    let settings = ProfileSettings::Audio(AudioSettings {
        sample_format: None,
        sample_rate: Some(sample_rate),
        channel_layout: Some(channel_layout.into()),
    });
    ProfileConfig {
        bit_rate,
        ..base(name, description, codec, settings)
    }
}

fn subtitle(name: &str, description: &str, codec: &str) -> ProfileConfig {
    base(name, description, codec, ProfileSettings::Subtitle)
}
