//! Per-elementary-stream copy/transcode decision and lifecycle.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::allow_list::SourceCodecList;
use crate::codec::CodecRegistry;
use crate::context::{ContextFactory, ContextRequest, PacketSink, ProcessingContext, StreamOutput};
use crate::error::{TranscodeError, TranscodeResult};
use crate::media::{MediaKind, StreamType};
use crate::observability::MetricsCollector;
use crate::packet::{ConfigBlob, Packet};
use crate::profile::CodecProfile;

/// Description of a source elementary stream.
#[derive(Debug, Clone)]
pub struct SourceStream {
    pub index: usize,
    pub stream_type: StreamType,
    pub config: Option<ConfigBlob>,
    pub channels: Option<u16>,
    pub sample_rate: Option<u32>,
}

impl SourceStream {
    pub fn new(index: usize, stream_type: StreamType) -> Self {
        Self {
            index,
            stream_type,
            config: None,
            channels: None,
            sample_rate: None,
        }
    }

    pub fn with_config(mut self, config: ConfigBlob) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_audio(mut self, channels: u16, sample_rate: u32) -> Self {
        self.channels = Some(channels);
        self.sample_rate = Some(sample_rate);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    Passthrough,
    Transcoding,
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamMode::Passthrough => f.write_str("passthrough"),
            StreamMode::Transcoding => f.write_str("transcoding"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Uninitialized,
    Passthrough,
    Transcoding,
    Stopped,
    Destroyed,
}

/// Decide copy vs. transcode. Allow-list membership wins over everything else.
pub fn decide_copy(
    registry: &CodecRegistry,
    profile: &CodecProfile,
    source: &SourceStream,
    src_codecs: Option<&str>,
) -> TranscodeResult<bool> {
    if let Some(list) = src_codecs.and_then(SourceCodecList::parse)
        && source.stream_type != StreamType::None
        && list.contains(source.stream_type.as_str())
    {
        return Ok(true);
    }
    if profile.is_copy_profile() {
        return Ok(true);
    }
    profile.is_copy(registry, source)
}

pub struct Stream {
    id: usize,
    index: Option<usize>,
    stream_type: StreamType,
    mode: StreamMode,
    state: StreamState,
    profile: Arc<CodecProfile>,
    config: Option<ConfigBlob>,
    context: Option<Box<dyn ProcessingContext>>,
    output: StreamOutput,
    metrics: MetricsCollector,
    packets: u64,
}

impl Stream {
    /// Build the stream for `source`. On failure nothing is left behind: the
    /// half-built stream is torn down before the error is returned.
    #[instrument(
        skip_all,
        fields(stream = source.index, stream_type = %source.stream_type, profile = profile.name())
    )]
    pub fn create(
        sink: Arc<dyn PacketSink>,
        registry: &CodecRegistry,
        contexts: &dyn ContextFactory,
        metrics: &MetricsCollector,
        profile: &Arc<CodecProfile>,
        source: &mut SourceStream,
        src_codecs: Option<&str>,
    ) -> TranscodeResult<Self> {
        let _timer = metrics.start_setup(source.stream_type.as_str());

        let mut stream = Self {
            id: source.index,
            index: Some(source.index),
            stream_type: source.stream_type,
            mode: StreamMode::Passthrough,
            state: StreamState::Uninitialized,
            profile: Arc::clone(profile),
            config: None,
            context: None,
            output: StreamOutput::new(source.index, sink),
            metrics: metrics.clone(),
            packets: 0,
        };

        let result = match decide_copy(registry, profile, source, src_codecs) {
            Ok(true) => {
                stream.config = source.config.clone();
                stream.state = StreamState::Passthrough;
                info!("==> Passthrough");
                Ok(())
            }
            Ok(false) => stream.setup(registry, contexts, source),
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                metrics.record_stream_created(stream.stream_type.as_str(), stream.mode);
                Ok(stream)
            }
            Err(err) => {
                error!("Stream setup failed: {err}");
                metrics.record_stream_failed(source.stream_type.as_str());
                stream.destroy();
                Err(err)
            }
        }
    }

    fn setup(
        &mut self,
        registry: &CodecRegistry,
        contexts: &dyn ContextFactory,
        source: &mut SourceStream,
    ) -> TranscodeResult<()> {
        let type_name = source.stream_type.as_str();
        let decoder_id = source
            .stream_type
            .codec_id()
            .ok_or_else(|| TranscodeError::UnknownDecoderId {
                stream_type: type_name.to_string(),
            })?;
        let decoder = registry
            .find_decoder(decoder_id)
            .ok_or_else(|| TranscodeError::DecoderNotFound {
                stream_type: type_name.to_string(),
            })?;
        let encoder = self.profile.open(registry)?;

        // Profiles are validated long before codecs are resolved here, keep the check.
        let (decoder_kind, encoder_kind) = (decoder.kind(), encoder.codec.kind());
        if decoder_kind == MediaKind::Data || decoder_kind != encoder_kind {
            return Err(TranscodeError::MediaKindMismatch {
                decoder: decoder_kind,
                encoder: encoder_kind,
            });
        }

        let output_type = StreamType::from_codec_id(encoder.codec.id);
        let (decoder_name, encoder_name) = (decoder.name.clone(), encoder.codec.name.clone());
        let request = ContextRequest {
            output: self.output.clone(),
            profile: Arc::clone(&self.profile),
            decoder,
            encoder,
            config: source.config.clone(),
        };
        let context = contexts
            .create(request)
            .map_err(|err| TranscodeError::ContextCreate {
                index: self.id,
                reason: format!("{err:#}"),
            })?;

        self.context = Some(context);
        self.mode = StreamMode::Transcoding;
        self.state = StreamState::Transcoding;
        self.stream_type = output_type;
        source.stream_type = output_type;
        source.config = None;
        info!(
            decoder = %decoder_name,
            encoder = %encoder_name,
            output_type = %output_type,
            "==> Transcode"
        );
        Ok(())
    }

    /// Route one packet: straight to the session in passthrough (and for
    /// payload-less packets), into the processing context otherwise.
    pub fn handle(&mut self, packet: &Packet) -> TranscodeResult<()> {
        if self.index.is_none() {
            return Err(TranscodeError::Inactive { id: self.id });
        }
        let (id, metrics) = (self.id, &self.metrics);
        self.packets += 1;

        if packet.has_payload()
            && let Some(context) = self.context.as_mut()
        {
            metrics.record_packet_transcoded();
            return context.handle(packet).map_err(|err| {
                metrics.record_packet_failure();
                warn!(stream = id, "Processing context failed: {err:#}");
                TranscodeError::Pipeline {
                    index: id,
                    reason: format!("{err:#}"),
                }
            });
        }

        metrics.record_packet_forwarded();
        self.deliver(packet.clone())
    }

    /// Hand a packet (one reference) to the session, stamped with this stream's index.
    pub fn deliver(&self, packet: Packet) -> TranscodeResult<()> {
        self.output
            .deliver(packet)
            .map_err(|err| TranscodeError::Delivery {
                index: self.id,
                reason: format!("{err:#}"),
            })
    }

    /// Close the context (draining it if `flush`) and mark the stream inactive.
    /// Further calls do nothing.
    pub fn stop(&mut self, flush: bool) {
        if self.index.take().is_some() {
            if let Some(context) = self.context.as_mut() {
                context.close(flush);
            }
            self.state = StreamState::Stopped;
        }
    }

    /// Stop without flushing, release the context and every held reference.
    pub fn destroy(&mut self) {
        if self.state == StreamState::Destroyed {
            return;
        }
        self.stop(false);
        if let Some(context) = self.context.take() {
            context.destroy();
        }
        self.config = None;
        self.metrics
            .record_stream_packets(self.stream_type.as_str(), self.packets);
        self.state = StreamState::Destroyed;
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_copy(&self) -> bool {
        self.mode == StreamMode::Passthrough
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn profile(&self) -> &Arc<CodecProfile> {
        &self.profile
    }

    /// Source configuration held in passthrough. Packets are forwarded
    /// untouched, so the session reads the blob from here when it (re)starts
    /// its muxer for this stream. Always `None` while transcoding.
    pub fn config(&self) -> Option<&ConfigBlob> {
        self.config.as_ref()
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("stream_type", &self.stream_type)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("profile", &self.profile.name())
            .finish()
    }
}

/// Destroy an optional stream; `None` is a no-op.
pub fn destroy_stream(stream: Option<&mut Stream>) {
    if let Some(stream) = stream {
        stream.destroy();
    }
}
