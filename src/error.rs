use thiserror::Error;

use crate::media::MediaKind;

pub type TranscodeResult<T> = std::result::Result<T, TranscodeError>;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("profile '{profile}' has no codec configured")]
    MissingCodec { profile: String },

    #[error("profile '{profile}' is disabled: {reason}")]
    ProfileDisabled { profile: String, reason: String },

    #[error("codec '{codec}' rejected profile '{profile}': {reason}")]
    InvalidParameter {
        profile: String,
        codec: String,
        reason: String,
    },

    #[error("hardware device unavailable for profile '{profile}': {reason}")]
    DeviceUnavailable { profile: String, reason: String },

    #[error("unknown decoder id for '{stream_type}'")]
    UnknownDecoderId { stream_type: String },

    #[error("failed to find decoder for '{stream_type}'")]
    DecoderNotFound { stream_type: String },

    #[error("unknown or mismatch media type (decoder: {decoder}, encoder: {encoder})")]
    MediaKindMismatch {
        decoder: MediaKind,
        encoder: MediaKind,
    },

    #[error("copy decision undetermined for '{stream_type}' with profile '{profile}': {reason}")]
    UndeterminedDecision {
        stream_type: String,
        profile: String,
        reason: String,
    },

    #[error("failed to create processing context for stream {index}: {reason}")]
    ContextCreate { index: usize, reason: String },

    #[error("processing context failed on stream {index}: {reason}")]
    Pipeline { index: usize, reason: String },

    #[error("failed to deliver packet for stream {index}: {reason}")]
    Delivery { index: usize, reason: String },

    #[error("stream {id} is not active")]
    Inactive { id: usize },

    #[error("profile id '{0}' is already registered")]
    DuplicateProfile(String),

    #[error("no profile with id '{0}'")]
    ProfileNotFound(String),

    #[error("the built-in copy profile cannot be modified")]
    ImmutableProfile,

    #[error("profile name '{0}' is reserved")]
    ReservedName(String),
}

impl TranscodeError {
    /// Errors raised while realizing configuration, before any packet flows.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TranscodeError::MissingCodec { .. }
                | TranscodeError::ProfileDisabled { .. }
                | TranscodeError::InvalidParameter { .. }
                | TranscodeError::DeviceUnavailable { .. }
        )
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TranscodeError::UnknownDecoderId { .. }
                | TranscodeError::DecoderNotFound { .. }
                | TranscodeError::MediaKindMismatch { .. }
                | TranscodeError::UndeterminedDecision { .. }
        )
    }
}
