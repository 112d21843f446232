use std::collections::HashSet;

use serde::Serialize;

use crate::codec::CodecRegistry;
use crate::config::{CONFIG_VERSION, TranscodeConfig};
use crate::profile::{COPY_PROFILE_NAME, ProfileConfig, ProfileSettings};

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_config(config: &TranscodeConfig, registry: &CodecRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.version != CONFIG_VERSION {
        report
            .errors
            .push(format!("Unsupported config version: {}", config.version));
    }

    let mut codec_names = HashSet::new();
    for (idx, codec) in config.codecs.iter().enumerate() {
        if codec.name.trim().is_empty() {
            report
                .errors
                .push(format!("Codec {} has an empty name", idx + 1));
        } else if !codec_names.insert(codec.name.as_str()) {
            report
                .errors
                .push(format!("Codec '{}' is declared more than once", codec.name));
        }
        if !codec.decoder && !codec.encoder {
            report.warnings.push(format!(
                "Codec '{}' neither decodes nor encodes",
                codec.name
            ));
        }
    }

    let mut ids = HashSet::new();
    for (idx, profile) in config.profiles.iter().enumerate() {
        if profile.id.as_deref() == Some(COPY_PROFILE_NAME) {
            report.errors.push(format!(
                "Profile {} ('{}') uses reserved id '{COPY_PROFILE_NAME}'",
                idx + 1,
                profile.name
            ));
        } else if let Some(id) = &profile.id
            && !ids.insert(id.as_str())
        {
            report.errors.push(format!(
                "Profile {} ('{}') reuses id '{}'",
                idx + 1,
                profile.name,
                id
            ));
        }
        let mut profile_report = validate_profile(profile, registry);
        let prefix = format!("Profile {} ('{}')", idx + 1, profile.name);
        profile_report.errors = prefixed(&prefix, profile_report.errors);
        profile_report.warnings = prefixed(&prefix, profile_report.warnings);
        report.merge(profile_report);
    }

    report
}

pub fn validate_profile(profile: &ProfileConfig, registry: &CodecRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();

    if profile.name.trim().is_empty() {
        report.errors.push("Profile name cannot be empty".into());
    }
    if profile.name == COPY_PROFILE_NAME {
        report
            .errors
            .push(format!("Profile name '{COPY_PROFILE_NAME}' is reserved"));
    }
    if profile.bit_rate < 0.0 {
        report.errors.push("Bit rate cannot be negative".into());
    }
    if profile.qscale < 0.0 {
        report.errors.push("Quality scale cannot be negative".into());
    }

    let Some(codec_name) = profile.codec.as_deref().filter(|c| !c.trim().is_empty()) else {
        report
            .warnings
            .push("No codec configured, profile is permanently disabled".into());
        return report;
    };
    let Some(codec) = registry.find_encoder(codec_name) else {
        report.warnings.push(format!(
            "Codec '{codec_name}' is not available, profile is disabled until it is"
        ));
        return report;
    };
    if codec.kind() != profile.settings.kind() {
        report.warnings.push(format!(
            "Codec '{}' encodes {} but the profile is {}",
            codec.name,
            codec.kind(),
            profile.settings.kind()
        ));
        return report;
    }

    let caps = &codec.capabilities;
    if let Some(index) = profile.profile
        && !caps.supports_profile(index)
    {
        report.errors.push(format!(
            "Codec '{}' has no profile {}",
            codec.name, index
        ));
    }
    if caps.hardware && profile.device.is_none() {
        report.warnings.push(format!(
            "Codec '{}' needs a hardware device but none is configured",
            codec.name
        ));
    }
    match &profile.settings {
        ProfileSettings::Video(video) => {
            if let Some(format) = &video.pixel_format
                && !caps.supports_pixel_format(format)
            {
                report.errors.push(format!(
                    "Codec '{}' does not support pixel format '{}'",
                    codec.name, format
                ));
            }
            if video.hwaccel && profile.device.is_none() {
                report
                    .warnings
                    .push("Hardware acceleration requested without a device".into());
            }
        }
        ProfileSettings::Audio(audio) => {
            if let Some(format) = &audio.sample_format
                && !caps.supports_sample_format(format)
            {
                report.errors.push(format!(
                    "Codec '{}' does not support sample format '{}'",
                    codec.name, format
                ));
            }
            if let Some(rate) = audio.sample_rate
                && !caps.supports_sample_rate(rate)
            {
                report.errors.push(format!(
                    "Codec '{}' does not support sample rate {}",
                    codec.name, rate
                ));
            }
            if let Some(layout) = &audio.channel_layout
                && !caps.supports_channel_layout(layout)
            {
                report.errors.push(format!(
                    "Codec '{}' does not support channel layout '{}'",
                    codec.name, layout
                ));
            }
        }
        ProfileSettings::Subtitle => {}
    }

    report
}

fn prefixed(prefix: &str, messages: Vec<String>) -> Vec<String> {
    messages
        .into_iter()
        .map(|message| format!("{prefix}: {message}"))
        .collect()
}
