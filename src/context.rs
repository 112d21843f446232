//! Seams towards the decode/encode engine and the session output.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use tracing::debug;

use crate::codec::CodecDescriptor;
use crate::media::StreamType;
use crate::packet::{ConfigBlob, Packet};
use crate::profile::{CodecProfile, OpenedEncoder};

/// Session-side consumer of delivered packets. Each call hands over one reference.
pub trait PacketSink: Send + Sync {
    fn deliver(&self, packet: Packet) -> Result<()>;
}

/// Delivery path of one stream: stamps the output index, then forwards to the session.
#[derive(Clone)]
pub struct StreamOutput {
    index: usize,
    sink: Arc<dyn PacketSink>,
}

impl StreamOutput {
    pub fn new(index: usize, sink: Arc<dyn PacketSink>) -> Self {
        Self { index, sink }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn deliver(&self, packet: Packet) -> Result<()> {
        packet.set_output_index(self.index);
        self.sink.deliver(packet)
    }
}

/// Decode/encode pipeline owned by a transcoding stream.
pub trait ProcessingContext: Send {
    /// Feed one packet. Output reaches the session through the context's own [`StreamOutput`].
    fn handle(&mut self, packet: &Packet) -> Result<()>;

    /// Stop accepting input, draining buffered output when `flush` is set.
    fn close(&mut self, flush: bool);

    /// Release everything. Called at most once.
    fn destroy(self: Box<Self>);
}

/// Inputs for building a [`ProcessingContext`].
pub struct ContextRequest {
    pub output: StreamOutput,
    pub profile: Arc<CodecProfile>,
    pub decoder: Arc<CodecDescriptor>,
    pub encoder: OpenedEncoder,
    pub config: Option<ConfigBlob>,
}

pub trait ContextFactory {
    fn create(&self, request: ContextRequest) -> Result<Box<dyn ProcessingContext>>;
}

impl<F> ContextFactory for F
where
    F: Fn(ContextRequest) -> Result<Box<dyn ProcessingContext>>,
{
    fn create(&self, request: ContextRequest) -> Result<Box<dyn ProcessingContext>> {
        self(request)
    }
}

/// In-memory sink keeping every delivered packet.
#[derive(Default)]
pub struct PacketCollector {
    packets: Mutex<Vec<Packet>>,
}

impl PacketCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> Vec<Packet> {
        self.packets.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.packets.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PacketSink for PacketCollector {
    fn deliver(&self, packet: Packet) -> Result<()> {
        self.packets
            .lock()
            .map_err(|_| anyhow!("packet collector poisoned"))?
            .push(packet);
        Ok(())
    }
}

/// Stand-in engine for planning: holds back `delay` packets like a codec
/// would, then emits them tagged with the encoder's stream type.
pub struct DryRunContext {
    output: StreamOutput,
    output_type: StreamType,
    encoder: String,
    delay: usize,
    pending: VecDeque<Packet>,
    closed: bool,
    received: u64,
    emitted: u64,
}

impl DryRunContext {
    pub fn new(request: ContextRequest, delay: usize) -> Self {
        Self {
            output_type: StreamType::from_codec_id(request.encoder.codec.id),
            encoder: request.encoder.codec.name.clone(),
            output: request.output,
            delay,
            pending: VecDeque::new(),
            closed: false,
            received: 0,
            emitted: 0,
        }
    }

    /// Factory producing dry-run contexts with the given delay.
    pub fn factory(delay: usize) -> impl ContextFactory {
        move |request: ContextRequest| -> Result<Box<dyn ProcessingContext>> {
            Ok(Box::new(DryRunContext::new(request, delay)))
        }
    }

    fn emit(&mut self, packet: Packet) -> Result<()> {
        self.emitted += 1;
        self.output.deliver(packet.retag(self.output_type))
    }
}

impl ProcessingContext for DryRunContext {
    fn handle(&mut self, packet: &Packet) -> Result<()> {
        if self.closed {
            return Err(anyhow!("context for '{}' is closed", self.encoder));
        }
        self.received += 1;
        self.pending.push_back(packet.clone());
        while self.pending.len() > self.delay {
            if let Some(ready) = self.pending.pop_front() {
                self.emit(ready)?;
            }
        }
        Ok(())
    }

    fn close(&mut self, flush: bool) {
        if flush {
            while let Some(ready) = self.pending.pop_front() {
                if let Err(err) = self.emit(ready) {
                    debug!(encoder = %self.encoder, "Dropping flushed packet: {err:#}");
                }
            }
        }
        self.pending.clear();
        self.closed = true;
    }

    fn destroy(self: Box<Self>) {
        debug!(
            encoder = %self.encoder,
            received = self.received,
            emitted = self.emitted,
            "Dry-run context destroyed"
        );
    }
}
