//! Media kinds, codec identifiers and the source stream types they map to.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    /// Anything that cannot be decoded (conditional access, raw transport).
    Data,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Subtitle => "subtitle",
            MediaKind::Data => "data",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecId {
    Mpeg2Video,
    H264,
    Hevc,
    Vp8,
    Vp9,
    Theora,
    Mp2,
    Ac3,
    Eac3,
    Aac,
    Vorbis,
    Opus,
    Flac,
    DvbSubtitle,
    DvbTeletext,
    Text,
}

impl CodecId {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            CodecId::Mpeg2Video
            | CodecId::H264
            | CodecId::Hevc
            | CodecId::Vp8
            | CodecId::Vp9
            | CodecId::Theora => MediaKind::Video,
            CodecId::Mp2
            | CodecId::Ac3
            | CodecId::Eac3
            | CodecId::Aac
            | CodecId::Vorbis
            | CodecId::Opus
            | CodecId::Flac => MediaKind::Audio,
            CodecId::DvbSubtitle | CodecId::DvbTeletext | CodecId::Text => MediaKind::Subtitle,
        }
    }
}

/// Elementary stream types as announced by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StreamType {
    None,
    Mpeg2Video,
    Mpeg2Audio,
    H264,
    Ac3,
    Teletext,
    DvbSub,
    Ca,
    Aac,
    MpegTs,
    TextSub,
    Eac3,
    Mp4a,
    Vp8,
    Vorbis,
    Hevc,
    Vp9,
    Theora,
    Opus,
    Flac,
}

const STREAM_TYPE_NAMES: &[(StreamType, &str)] = &[
    (StreamType::None, "NONE"),
    (StreamType::Mpeg2Video, "MPEG2VIDEO"),
    (StreamType::Mpeg2Audio, "MPEG2AUDIO"),
    (StreamType::H264, "H264"),
    (StreamType::Ac3, "AC3"),
    (StreamType::Teletext, "TELETEXT"),
    (StreamType::DvbSub, "DVBSUB"),
    (StreamType::Ca, "CA"),
    (StreamType::Aac, "AAC"),
    (StreamType::MpegTs, "MPEGTS"),
    (StreamType::TextSub, "TEXTSUB"),
    (StreamType::Eac3, "EAC3"),
    (StreamType::Mp4a, "MP4A"),
    (StreamType::Vp8, "VP8"),
    (StreamType::Vorbis, "VORBIS"),
    (StreamType::Hevc, "HEVC"),
    (StreamType::Vp9, "VP9"),
    (StreamType::Theora, "THEORA"),
    (StreamType::Opus, "OPUS"),
    (StreamType::Flac, "FLAC"),
];

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        STREAM_TYPE_NAMES
            .iter()
            .find(|(ty, _)| ty == self)
            .map(|(_, name)| *name)
            .unwrap_or("NONE")
    }

    pub fn codec_id(&self) -> Option<CodecId> {
        match self {
            StreamType::Mpeg2Video => Some(CodecId::Mpeg2Video),
            StreamType::Mpeg2Audio => Some(CodecId::Mp2),
            StreamType::H264 => Some(CodecId::H264),
            StreamType::Ac3 => Some(CodecId::Ac3),
            StreamType::Teletext => Some(CodecId::DvbTeletext),
            StreamType::DvbSub => Some(CodecId::DvbSubtitle),
            StreamType::Aac | StreamType::Mp4a => Some(CodecId::Aac),
            StreamType::TextSub => Some(CodecId::Text),
            StreamType::Eac3 => Some(CodecId::Eac3),
            StreamType::Vp8 => Some(CodecId::Vp8),
            StreamType::Vorbis => Some(CodecId::Vorbis),
            StreamType::Hevc => Some(CodecId::Hevc),
            StreamType::Vp9 => Some(CodecId::Vp9),
            StreamType::Theora => Some(CodecId::Theora),
            StreamType::Opus => Some(CodecId::Opus),
            StreamType::Flac => Some(CodecId::Flac),
            StreamType::None | StreamType::Ca | StreamType::MpegTs => None,
        }
    }

    pub fn from_codec_id(id: CodecId) -> Self {
        match id {
            CodecId::Mpeg2Video => StreamType::Mpeg2Video,
            CodecId::H264 => StreamType::H264,
            CodecId::Hevc => StreamType::Hevc,
            CodecId::Vp8 => StreamType::Vp8,
            CodecId::Vp9 => StreamType::Vp9,
            CodecId::Theora => StreamType::Theora,
            CodecId::Mp2 => StreamType::Mpeg2Audio,
            CodecId::Ac3 => StreamType::Ac3,
            CodecId::Eac3 => StreamType::Eac3,
            CodecId::Aac => StreamType::Aac,
            CodecId::Vorbis => StreamType::Vorbis,
            CodecId::Opus => StreamType::Opus,
            CodecId::Flac => StreamType::Flac,
            CodecId::DvbSubtitle => StreamType::DvbSub,
            CodecId::DvbTeletext => StreamType::Teletext,
            CodecId::Text => StreamType::TextSub,
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        self.codec_id()
            .map(|id| id.media_kind())
            .unwrap_or(MediaKind::Data)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        STREAM_TYPE_NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(wanted))
            .map(|(ty, _)| *ty)
            .ok_or_else(|| format!("unknown stream type '{wanted}'"))
    }
}

impl TryFrom<String> for StreamType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StreamType> for String {
    fn from(value: StreamType) -> Self {
        value.as_str().to_string()
    }
}

/// Number of channels implied by a named channel layout.
pub fn layout_channels(layout: &str) -> Option<u16> {
    match layout.to_ascii_lowercase().as_str() {
        "mono" => Some(1),
        "stereo" => Some(2),
        "2.1" | "3.0" => Some(3),
        "quad" | "4.0" => Some(4),
        "5.0" => Some(5),
        "5.1" | "5.1(side)" => Some(6),
        "7.1" => Some(8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{CodecId, MediaKind, StreamType, layout_channels};

    #[test]
    fn stream_type_names() {
        assert_eq!("h264".parse::<StreamType>().unwrap(), StreamType::H264);
        assert_eq!(StreamType::Mpeg2Audio.as_str(), "MPEG2AUDIO");
        assert!("bogus".parse::<StreamType>().is_err());
    }

    #[test]
    fn codec_mapping() {
        assert_eq!(StreamType::Mp4a.codec_id(), Some(CodecId::Aac));
        assert_eq!(StreamType::from_codec_id(CodecId::Aac), StreamType::Aac);
        assert_eq!(StreamType::Ca.codec_id(), None);
        assert_eq!(StreamType::MpegTs.media_kind(), MediaKind::Data);
        assert_eq!(StreamType::DvbSub.media_kind(), MediaKind::Subtitle);
        assert_eq!(layout_channels("5.1"), Some(6));
    }
}
