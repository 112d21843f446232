use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::{CodecDescriptor, CodecRegistry};
use crate::error::{TranscodeError, TranscodeResult};
use crate::media::{MediaKind, StreamType, layout_channels};
use crate::stream::SourceStream;

/// Name of the built-in profile meaning "always stream-copy".
pub const COPY_PROFILE_NAME: &str = "copy";

/// Multiplier turning a qscale into the codec's global quality value.
const QP2LAMBDA: f64 = 118.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A profile record as persisted in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// kb/s, 0 leaves the codec default.
    #[serde(default)]
    pub bit_rate: f64,
    #[serde(default)]
    pub qscale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default)]
    pub copy_same_codec: bool,
    #[serde(flatten)]
    pub settings: ProfileSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProfileSettings {
    Video(VideoSettings),
    Audio(AudioSettings),
    Subtitle,
}

impl ProfileSettings {
    pub fn kind(&self) -> MediaKind {
        match self {
            ProfileSettings::Video(_) => MediaKind::Video,
            ProfileSettings::Audio(_) => MediaKind::Audio,
            ProfileSettings::Subtitle => MediaKind::Subtitle,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<String>,
    #[serde(default)]
    pub hwaccel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_layout: Option<String>,
}

/// Closed set of profile kinds; kind-specific data lives in the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileClass {
    Copy,
    Video(VideoSettings),
    Audio(AudioSettings),
    Subtitle,
}

impl ProfileClass {
    pub fn kind(&self) -> Option<MediaKind> {
        match self {
            ProfileClass::Copy => None,
            ProfileClass::Video(_) => Some(MediaKind::Video),
            ProfileClass::Audio(_) => Some(MediaKind::Audio),
            ProfileClass::Subtitle => Some(MediaKind::Subtitle),
        }
    }
}

impl From<ProfileSettings> for ProfileClass {
    fn from(settings: ProfileSettings) -> Self {
        match settings {
            ProfileSettings::Video(video) => ProfileClass::Video(video),
            ProfileSettings::Audio(audio) => ProfileClass::Audio(audio),
            ProfileSettings::Subtitle => ProfileClass::Subtitle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Enabled,
    Disabled,
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileStatus::Enabled => f.write_str("enabled"),
            ProfileStatus::Disabled => f.write_str("disabled"),
        }
    }
}

/// Native option dictionary handed to the encoder.
pub type EncoderOptions = BTreeMap<String, String>;

/// Result of a successful [`CodecProfile::open`].
#[derive(Debug, Clone)]
pub struct OpenedEncoder {
    pub codec: Arc<CodecDescriptor>,
    pub options: EncoderOptions,
}

#[derive(Debug, Clone)]
pub struct CodecProfile {
    id: ProfileId,
    name: String,
    description: String,
    codec_name: Option<String>,
    bit_rate: f64,
    qscale: f64,
    profile: Option<i32>,
    device: Option<String>,
    copy_same_codec: bool,
    class: ProfileClass,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CodecProfile {
    /// The generic stream-copy profile.
    pub fn copy() -> Self {
        let now = Utc::now();
        Self {
            id: ProfileId::new(COPY_PROFILE_NAME),
            name: COPY_PROFILE_NAME.to_string(),
            description: "Stream copy (no transcoding)".to_string(),
            codec_name: None,
            bit_rate: 0.0,
            qscale: 0.0,
            profile: None,
            device: None,
            copy_same_codec: false,
            class: ProfileClass::Copy,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_config(config: ProfileConfig) -> Self {
        let now = Utc::now();
        let id = config
            .id
            .map(ProfileId::new)
            .unwrap_or_else(ProfileId::generate);
        Self {
            id,
            name: config.name,
            description: config.description,
            codec_name: config.codec.filter(|c| !c.trim().is_empty()),
            bit_rate: config.bit_rate,
            qscale: config.qscale,
            profile: config.profile,
            device: config.device.filter(|d| !d.trim().is_empty()),
            copy_same_codec: config.copy_same_codec,
            class: config.settings.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Same identity and creation time, new configuration.
    pub(crate) fn updated(&self, config: ProfileConfig) -> Self {
        let mut next = Self::from_config(config);
        next.id = self.id.clone();
        next.created_at = self.created_at;
        next
    }

    pub fn id(&self) -> &ProfileId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn title(&self) -> &str {
        if self.description.is_empty() {
            &self.name
        } else {
            &self.description
        }
    }

    pub fn codec_name(&self) -> Option<&str> {
        self.codec_name.as_deref()
    }

    pub fn bit_rate(&self) -> f64 {
        self.bit_rate
    }

    pub fn qscale(&self) -> f64 {
        self.qscale
    }

    pub fn profile_index(&self) -> Option<i32> {
        self.profile
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn class(&self) -> &ProfileClass {
        &self.class
    }

    pub fn kind(&self) -> Option<MediaKind> {
        self.class.kind()
    }

    pub fn is_copy_profile(&self) -> bool {
        matches!(self.class, ProfileClass::Copy)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Configuration record equivalent to this profile.
    pub fn to_config(&self) -> Option<ProfileConfig> {
        let settings = match &self.class {
            ProfileClass::Copy => return None,
            ProfileClass::Video(video) => ProfileSettings::Video(video.clone()),
            ProfileClass::Audio(audio) => ProfileSettings::Audio(audio.clone()),
            ProfileClass::Subtitle => ProfileSettings::Subtitle,
        };
        Some(ProfileConfig {
            id: Some(self.id.to_string()),
            name: self.name.clone(),
            description: self.description.clone(),
            codec: self.codec_name.clone(),
            bit_rate: self.bit_rate,
            qscale: self.qscale,
            profile: self.profile,
            device: self.device.clone(),
            copy_same_codec: self.copy_same_codec,
            settings,
        })
    }

    pub fn fingerprint(&self) -> String {
        match self.to_config() {
            Some(config) => config_fingerprint(&config),
            None => hex_digest(COPY_PROFILE_NAME.as_bytes()),
        }
    }

    /// Resolved target codec, if the profile can be realized at all.
    pub fn resolve_codec(&self, registry: &CodecRegistry) -> Option<Arc<CodecDescriptor>> {
        let codec = registry.find_encoder(self.codec_name.as_deref()?)?;
        (Some(codec.kind()) == self.kind()).then_some(codec)
    }

    pub fn status(&self, registry: &CodecRegistry) -> ProfileStatus {
        if self.is_copy_profile() || self.resolve_codec(registry).is_some() {
            ProfileStatus::Enabled
        } else {
            ProfileStatus::Disabled
        }
    }

    /// Does this profile mean stream-copy for `source`?
    pub fn is_copy(
        &self,
        registry: &CodecRegistry,
        source: &SourceStream,
    ) -> TranscodeResult<bool> {
        if self.is_copy_profile() {
            return Ok(true);
        }
        if source.stream_type == StreamType::None {
            return Err(TranscodeError::UndeterminedDecision {
                stream_type: source.stream_type.to_string(),
                profile: self.name.clone(),
                reason: "source stream type is unknown".to_string(),
            });
        }
        if !self.copy_same_codec {
            return Ok(false);
        }
        let Some(target) = self.resolve_codec(registry) else {
            return Ok(false);
        };
        let same_codec = source.stream_type.codec_id() == Some(target.id);

        Ok(match &self.class {
            ProfileClass::Copy => true,
            ProfileClass::Video(_) | ProfileClass::Subtitle => same_codec,
            ProfileClass::Audio(audio) => same_codec && audio_fits(audio, source),
        })
    }

    /// Realize the profile against its codec, returning the encoder and its options.
    pub fn open(&self, registry: &CodecRegistry) -> TranscodeResult<OpenedEncoder> {
        if self.is_copy_profile() {
            return Err(self.disabled("the copy profile has no encoder"));
        }
        let codec_name = self
            .codec_name
            .as_deref()
            .ok_or_else(|| TranscodeError::MissingCodec {
                profile: self.name.clone(),
            })?;
        let codec = registry
            .find_encoder(codec_name)
            .ok_or_else(|| self.disabled(&format!("codec '{codec_name}' is not available")))?;
        if Some(codec.kind()) != self.kind() {
            return Err(self.disabled(&format!(
                "codec '{}' encodes {}, profile expects {}",
                codec.name,
                codec.kind(),
                self.kind().map(|k| k.as_str()).unwrap_or("nothing")
            )));
        }

        let mut options = EncoderOptions::new();
        if self.bit_rate > 0.0 {
            options.insert("b".into(), ((self.bit_rate * 1000.0) as i64).to_string());
        }
        if self.qscale > 0.0 {
            options.insert("flags".into(), "+qscale".into());
            options.insert(
                "global_quality".into(),
                ((self.qscale * QP2LAMBDA).round() as i64).to_string(),
            );
        }
        if let Some(profile) = self.profile {
            if !codec.capabilities.supports_profile(profile) {
                return Err(self.rejected(&codec, format!("unsupported codec profile {profile}")));
            }
            options.insert("profile".into(), profile.to_string());
        }

        let needs_device = codec.capabilities.hardware
            || matches!(&self.class, ProfileClass::Video(video) if video.hwaccel);
        if needs_device {
            let device = self.check_device()?;
            options.insert("hwaccel_device".into(), device.to_string());
        }

        match &self.class {
            ProfileClass::Video(video) => {
                if let Some(format) = &video.pixel_format {
                    if !codec.capabilities.supports_pixel_format(format) {
                        return Err(
                            self.rejected(&codec, format!("unsupported pixel format '{format}'"))
                        );
                    }
                    options.insert("pix_fmt".into(), format.clone());
                }
            }
            ProfileClass::Audio(audio) => {
                if let Some(format) = &audio.sample_format {
                    if !codec.capabilities.supports_sample_format(format) {
                        return Err(
                            self.rejected(&codec, format!("unsupported sample format '{format}'"))
                        );
                    }
                    options.insert("sample_fmt".into(), format.clone());
                }
                if let Some(rate) = audio.sample_rate {
                    if !codec.capabilities.supports_sample_rate(rate) {
                        return Err(
                            self.rejected(&codec, format!("unsupported sample rate {rate}"))
                        );
                    }
                    options.insert("ar".into(), rate.to_string());
                }
                if let Some(layout) = &audio.channel_layout {
                    if !codec.capabilities.supports_channel_layout(layout) {
                        return Err(
                            self.rejected(&codec, format!("unsupported channel layout '{layout}'"))
                        );
                    }
                    options.insert("channel_layout".into(), layout.clone());
                }
            }
            ProfileClass::Subtitle | ProfileClass::Copy => {}
        }

        Ok(OpenedEncoder { codec, options })
    }

    fn check_device(&self) -> TranscodeResult<&str> {
        let device = self
            .device
            .as_deref()
            .ok_or_else(|| TranscodeError::DeviceUnavailable {
                profile: self.name.clone(),
                reason: "no device configured".to_string(),
            })?;
        if !Path::new(device).exists() {
            return Err(TranscodeError::DeviceUnavailable {
                profile: self.name.clone(),
                reason: format!("device '{device}' not found"),
            });
        }
        Ok(device)
    }

    fn disabled(&self, reason: &str) -> TranscodeError {
        TranscodeError::ProfileDisabled {
            profile: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn rejected(&self, codec: &CodecDescriptor, reason: String) -> TranscodeError {
        TranscodeError::InvalidParameter {
            profile: self.name.clone(),
            codec: codec.name.clone(),
            reason,
        }
    }
}

fn audio_fits(audio: &AudioSettings, source: &SourceStream) -> bool {
    let channels_fit = match (
        audio.channel_layout.as_deref().and_then(layout_channels),
        source.channels,
    ) {
        (Some(limit), Some(channels)) => channels <= limit,
        (Some(_), None) => false,
        (None, _) => true,
    };
    let rate_fits = match audio.sample_rate {
        Some(rate) => source.sample_rate == Some(rate),
        None => true,
    };
    channels_fit && rate_fits
}

/// SHA-256 over the identity-free part of a profile record.
pub fn config_fingerprint(config: &ProfileConfig) -> String {
    let mut anonymous = config.clone();
    anonymous.id = None;
    let serialized = serde_json::to_vec(&anonymous).unwrap_or_default();
    hex_digest(&serialized)
}

fn hex_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
