use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::media::{CodecId, MediaKind};

/// A codec-specific profile (e.g. H.264 "high").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecProfileLevel {
    pub id: i32,
    pub name: String,
}

/// What a codec accepts. Empty lists mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecCapabilities {
    #[serde(default)]
    pub profiles: Vec<CodecProfileLevel>,
    #[serde(default)]
    pub pixel_formats: Vec<String>,
    #[serde(default)]
    pub sample_formats: Vec<String>,
    #[serde(default)]
    pub sample_rates: Vec<u32>,
    #[serde(default)]
    pub channel_layouts: Vec<String>,
    /// Needs a hardware device to open.
    #[serde(default)]
    pub hardware: bool,
}

impl CodecCapabilities {
    pub fn supports_profile(&self, profile: i32) -> bool {
        self.profiles.is_empty() || self.profiles.iter().any(|p| p.id == profile)
    }

    pub fn supports_pixel_format(&self, format: &str) -> bool {
        contains_or_empty(&self.pixel_formats, format)
    }

    pub fn supports_sample_format(&self, format: &str) -> bool {
        contains_or_empty(&self.sample_formats, format)
    }

    pub fn supports_sample_rate(&self, rate: u32) -> bool {
        self.sample_rates.is_empty() || self.sample_rates.contains(&rate)
    }

    pub fn supports_channel_layout(&self, layout: &str) -> bool {
        contains_or_empty(&self.channel_layouts, layout)
    }
}

fn contains_or_empty(values: &[String], wanted: &str) -> bool {
    values.is_empty() || values.iter().any(|v| v.eq_ignore_ascii_case(wanted))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecDescriptor {
    pub name: String,
    pub title: String,
    pub id: CodecId,
    #[serde(default)]
    pub decoder: bool,
    #[serde(default)]
    pub encoder: bool,
    #[serde(default)]
    pub capabilities: CodecCapabilities,
}

impl CodecDescriptor {
    pub fn kind(&self) -> MediaKind {
        self.id.media_kind()
    }
}

/// Process-wide table of codecs, built once at startup and shared read-only.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    codecs: Vec<Arc<CodecDescriptor>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Registry seeded with the built-in catalogue.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        register_defaults(&mut registry);
        registry
    }

    pub fn register(&mut self, descriptor: CodecDescriptor) {
        if let Some(existing) = self
            .codecs
            .iter_mut()
            .find(|c| c.name == descriptor.name)
        {
            warn!(codec = %descriptor.name, "Replacing already registered codec");
            *existing = Arc::new(descriptor);
            return;
        }
        self.codecs.push(Arc::new(descriptor));
    }

    pub fn get(&self, name: &str) -> Option<Arc<CodecDescriptor>> {
        self.codecs.iter().find(|c| c.name == name).cloned()
    }

    pub fn find_encoder(&self, name: &str) -> Option<Arc<CodecDescriptor>> {
        self.codecs
            .iter()
            .find(|c| c.encoder && c.name == name)
            .cloned()
    }

    pub fn find_decoder(&self, id: CodecId) -> Option<Arc<CodecDescriptor>> {
        self.codecs
            .iter()
            .find(|c| c.decoder && c.id == id)
            .cloned()
    }

    pub fn codecs(&self) -> impl Iterator<Item = &Arc<CodecDescriptor>> {
        self.codecs.iter()
    }

    pub fn encoders(&self, kind: MediaKind) -> impl Iterator<Item = &Arc<CodecDescriptor>> {
        self.codecs
            .iter()
            .filter(move |c| c.encoder && c.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

pub fn register_defaults(registry: &mut CodecRegistry) {
    for descriptor in DEFAULT_CODECS.iter() {
        registry.register(descriptor.clone());
    }
}

static DEFAULT_CODECS: Lazy<Vec<CodecDescriptor>> = Lazy::new(|| {
    let h264_profiles = vec![
        level(66, "baseline"),
        level(77, "main"),
        level(100, "high"),
    ];
    let hevc_profiles = vec![level(1, "main"), level(2, "main10")];
    let aac_rates = vec![
        96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000,
    ];

    vec![
        // decoders
        decoder("mpeg2video", "MPEG-2 video", CodecId::Mpeg2Video).encodes(),
        decoder("h264", "H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10", CodecId::H264),
        decoder("hevc", "HEVC (High Efficiency Video Coding)", CodecId::Hevc),
        decoder("vp8", "On2 VP8", CodecId::Vp8),
        decoder("vp9", "Google VP9", CodecId::Vp9),
        decoder("theora", "Theora", CodecId::Theora),
        decoder("mp2", "MP2 (MPEG audio layer 2)", CodecId::Mp2)
            .encodes()
            .with(|caps| {
                caps.sample_formats = strings(&["s16"]);
                caps.sample_rates = vec![48000, 44100, 32000, 24000, 22050, 16000];
                caps.channel_layouts = strings(&["mono", "stereo"]);
            }),
        decoder("ac3", "ATSC A/52A (AC-3)", CodecId::Ac3)
            .encodes()
            .with(|caps| {
                caps.sample_formats = strings(&["fltp"]);
                caps.sample_rates = vec![48000, 44100, 32000];
                caps.channel_layouts = strings(&["mono", "stereo", "5.1"]);
            }),
        decoder("eac3", "ATSC A/52B (AC-3, E-AC-3)", CodecId::Eac3).encodes(),
        decoder("aac", "AAC (Advanced Audio Coding)", CodecId::Aac)
            .encodes()
            .with(|caps| {
                caps.sample_formats = strings(&["fltp"]);
                caps.sample_rates = aac_rates.clone();
            }),
        decoder("vorbis", "Vorbis", CodecId::Vorbis),
        decoder("opus", "Opus", CodecId::Opus),
        decoder("flac", "FLAC (Free Lossless Audio Codec)", CodecId::Flac).encodes(),
        decoder("dvbsub", "DVB subtitles", CodecId::DvbSubtitle).encodes(),
        decoder("libzvbi_teletextdec", "Libzvbi DVB teletext decoder", CodecId::DvbTeletext),
        decoder("text", "Raw text subtitle", CodecId::Text).encodes(),
        // encoders
        encoder("libx264", "libx264 H.264 / AVC", CodecId::H264).with(|caps| {
            caps.profiles = h264_profiles.clone();
            caps.pixel_formats = strings(&["yuv420p", "yuv422p", "yuv444p", "nv12"]);
        }),
        encoder("h264_vaapi", "H.264/AVC (VAAPI)", CodecId::H264).with(|caps| {
            caps.profiles = h264_profiles.clone();
            caps.pixel_formats = strings(&["vaapi", "nv12"]);
            caps.hardware = true;
        }),
        encoder("h264_nvenc", "NVIDIA NVENC H.264 encoder", CodecId::H264).with(|caps| {
            caps.profiles = h264_profiles.clone();
            caps.pixel_formats = strings(&["yuv420p", "nv12", "cuda"]);
            caps.hardware = true;
        }),
        encoder("libx265", "libx265 H.265 / HEVC", CodecId::Hevc).with(|caps| {
            caps.profiles = hevc_profiles.clone();
            caps.pixel_formats = strings(&["yuv420p", "yuv422p", "yuv444p", "yuv420p10le"]);
        }),
        encoder("hevc_vaapi", "H.265/HEVC (VAAPI)", CodecId::Hevc).with(|caps| {
            caps.profiles = hevc_profiles.clone();
            caps.pixel_formats = strings(&["vaapi", "nv12"]);
            caps.hardware = true;
        }),
        encoder("libvpx", "libvpx VP8", CodecId::Vp8).with(|caps| {
            caps.pixel_formats = strings(&["yuv420p", "yuva420p"]);
        }),
        encoder("libvpx-vp9", "libvpx VP9", CodecId::Vp9).with(|caps| {
            caps.pixel_formats = strings(&["yuv420p", "yuv422p", "yuv444p"]);
        }),
        encoder("libtheora", "libtheora Theora", CodecId::Theora).with(|caps| {
            caps.pixel_formats = strings(&["yuv420p", "yuv422p", "yuv444p"]);
        }),
        encoder("libvorbis", "libvorbis", CodecId::Vorbis).with(|caps| {
            caps.sample_formats = strings(&["fltp"]);
        }),
        encoder("libopus", "libopus Opus", CodecId::Opus).with(|caps| {
            caps.sample_formats = strings(&["s16", "flt"]);
            caps.sample_rates = vec![48000, 24000, 16000, 12000, 8000];
            caps.channel_layouts = strings(&["mono", "stereo", "5.1", "7.1"]);
        }),
    ]
});

fn decoder(name: &str, title: &str, id: CodecId) -> CodecDescriptor {
    CodecDescriptor {
        name: name.to_string(),
        title: title.to_string(),
        id,
        decoder: true,
        encoder: false,
        capabilities: CodecCapabilities::default(),
    }
}

fn encoder(name: &str, title: &str, id: CodecId) -> CodecDescriptor {
    CodecDescriptor {
        decoder: false,
        encoder: true,
        ..decoder(name, title, id)
    }
}

impl CodecDescriptor {
    fn encodes(mut self) -> Self {
        self.encoder = true;
        self
    }

    fn with(mut self, configure: impl FnOnce(&mut CodecCapabilities)) -> Self {
        configure(&mut self.capabilities);
        self
    }
}

fn level(id: i32, name: &str) -> CodecProfileLevel {
    CodecProfileLevel {
        id,
        name: name.to_string(),
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
