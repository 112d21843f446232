//! Shared, reference-counted media packets.
//!
//! Cloning a [`Packet`] or a [`ConfigBlob`] takes one more reference; dropping
//! it releases that reference. The payload is never mutated once shared, the
//! only writable field is the output stream index stamped on delivery.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use bytes::Bytes;

use crate::media::StreamType;

const UNSET_INDEX: i64 = -1;

/// Out-of-band codec configuration (global headers, decoder init data).
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigBlob(Arc<Bytes>);

impl ConfigBlob {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(Arc::new(data.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for ConfigBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBlob")
            .field("len", &self.len())
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Everything needed to build a packet.
#[derive(Debug, Clone, Default)]
pub struct PacketParts {
    pub stream_type: Option<StreamType>,
    pub payload: Option<Bytes>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub keyframe: bool,
    pub config: Option<ConfigBlob>,
}

struct PacketInner {
    stream_type: StreamType,
    payload: Option<Bytes>,
    pts: Option<i64>,
    dts: Option<i64>,
    keyframe: bool,
    config: Option<ConfigBlob>,
    output_index: AtomicI64,
}

#[derive(Clone)]
pub struct Packet {
    inner: Arc<PacketInner>,
}

impl Packet {
    pub fn data(stream_type: StreamType, payload: impl Into<Bytes>) -> Self {
        Self::from(PacketParts {
            stream_type: Some(stream_type),
            payload: Some(payload.into()),
            ..PacketParts::default()
        })
    }

    /// Metadata-only packet without payload.
    pub fn signal(stream_type: StreamType) -> Self {
        Self::from(PacketParts {
            stream_type: Some(stream_type),
            ..PacketParts::default()
        })
    }

    pub fn stream_type(&self) -> StreamType {
        self.inner.stream_type
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.inner.payload.as_ref()
    }

    pub fn has_payload(&self) -> bool {
        self.inner.payload.is_some()
    }

    pub fn pts(&self) -> Option<i64> {
        self.inner.pts
    }

    pub fn dts(&self) -> Option<i64> {
        self.inner.dts
    }

    pub fn is_key(&self) -> bool {
        self.inner.keyframe
    }

    pub fn config(&self) -> Option<&ConfigBlob> {
        self.inner.config.as_ref()
    }

    pub fn output_index(&self) -> Option<usize> {
        let index = self.inner.output_index.load(Ordering::Acquire);
        usize::try_from(index).ok()
    }

    /// Indices past `i64::MAX` saturate rather than reading back as unset.
    pub fn set_output_index(&self, index: usize) {
        let stored = i64::try_from(index).unwrap_or(i64::MAX);
        self.inner.output_index.store(stored, Ordering::Release);
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &Packet) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// New packet sharing this one's payload and timing, tagged with another type.
    pub fn retag(&self, stream_type: StreamType) -> Packet {
        Packet::from(PacketParts {
            stream_type: Some(stream_type),
            payload: self.inner.payload.clone(),
            pts: self.inner.pts,
            dts: self.inner.dts,
            keyframe: self.inner.keyframe,
            config: None,
        })
    }
}

impl From<PacketParts> for Packet {
    fn from(parts: PacketParts) -> Self {
        Self {
            inner: Arc::new(PacketInner {
                stream_type: parts.stream_type.unwrap_or(StreamType::None),
                payload: parts.payload,
                pts: parts.pts,
                dts: parts.dts,
                keyframe: parts.keyframe,
                config: parts.config,
                output_index: AtomicI64::new(UNSET_INDEX),
            }),
        }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("stream_type", &self.stream_type())
            .field("size", &self.payload().map(|p| p.len()))
            .field("pts", &self.pts())
            .field("output_index", &self.output_index())
            .field("refs", &self.ref_count())
            .finish()
    }
}
