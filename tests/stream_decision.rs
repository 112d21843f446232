use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use stream_transcode::codec::CodecRegistry;
use stream_transcode::context::{
    ContextRequest, DryRunContext, PacketCollector, PacketSink, ProcessingContext,
};
use stream_transcode::directory::ProfileDirectory;
use stream_transcode::error::TranscodeError;
use stream_transcode::media::StreamType;
use stream_transcode::observability::MetricsCollector;
use stream_transcode::packet::{ConfigBlob, Packet};
use stream_transcode::profile::{
    AudioSettings, CodecProfile, ProfileConfig, ProfileSettings, VideoSettings,
};
use stream_transcode::stream::{
    SourceStream, Stream, StreamMode, StreamState, decide_copy, destroy_stream,
};

#[derive(Default)]
struct Calls {
    created: AtomicUsize,
    handled: AtomicUsize,
    closed: AtomicUsize,
    flushed: AtomicUsize,
    destroyed: AtomicUsize,
}

struct RecordingContext {
    calls: Arc<Calls>,
    fail_handle: bool,
}

impl ProcessingContext for RecordingContext {
    fn handle(&mut self, _packet: &Packet) -> Result<()> {
        self.calls.handled.fetch_add(1, Ordering::SeqCst);
        if self.fail_handle {
            return Err(anyhow!("encoder rejected frame"));
        }
        Ok(())
    }

    fn close(&mut self, flush: bool) {
        self.calls.closed.fetch_add(1, Ordering::SeqCst);
        if flush {
            self.calls.flushed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn destroy(self: Box<Self>) {
        self.calls.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

fn recording_factory(
    calls: Arc<Calls>,
    fail_handle: bool,
) -> impl Fn(ContextRequest) -> Result<Box<dyn ProcessingContext>> {
    move |_request: ContextRequest| -> Result<Box<dyn ProcessingContext>> {
        calls.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingContext {
            calls: Arc::clone(&calls),
            fail_handle,
        }))
    }
}

fn failing_factory(_request: ContextRequest) -> Result<Box<dyn ProcessingContext>> {
    Err(anyhow!("out of encoder sessions"))
}

fn profile(name: &str, codec: &str, settings: ProfileSettings) -> ProfileConfig {
    ProfileConfig {
        id: None,
        name: name.to_string(),
        description: String::new(),
        codec: Some(codec.to_string()),
        bit_rate: 0.0,
        qscale: 0.0,
        profile: None,
        device: None,
        copy_same_codec: false,
        settings,
    }
}

fn video(name: &str, codec: &str) -> Arc<CodecProfile> {
    Arc::new(CodecProfile::from_config(profile(
        name,
        codec,
        ProfileSettings::Video(VideoSettings::default()),
    )))
}

fn audio(name: &str, codec: &str, layout: &str, rate: u32) -> ProfileConfig {
    profile(
        name,
        codec,
        ProfileSettings::Audio(AudioSettings {
            sample_format: None,
            sample_rate: Some(rate),
            channel_layout: Some(layout.to_string()),
        }),
    )
}

fn collector() -> (Arc<PacketCollector>, Arc<dyn PacketSink>) {
    let collector = Arc::new(PacketCollector::new());
    let sink: Arc<dyn PacketSink> = collector.clone();
    (collector, sink)
}

#[test]
fn copy_profile_passes_packets_through() {
    let registry = CodecRegistry::with_defaults();
    let directory = ProfileDirectory::new();
    let (collector, sink) = collector();
    let calls = Arc::new(Calls::default());
    let mut source = SourceStream::new(3, StreamType::H264);

    let mut stream = Stream::create(
        sink,
        &registry,
        &recording_factory(calls.clone(), false),
        &MetricsCollector::new(),
        &directory.copy_profile(),
        &mut source,
        None,
    )
    .unwrap();

    assert_eq!(stream.mode(), StreamMode::Passthrough);
    assert_eq!(stream.state(), StreamState::Passthrough);
    assert!(!stream.has_context());
    assert_eq!(calls.created.load(Ordering::SeqCst), 0);

    let packet = Packet::data(StreamType::H264, vec![0u8; 32]);
    stream.handle(&packet).unwrap();

    assert_eq!(packet.ref_count(), 2);
    let delivered = collector.packets();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].ptr_eq(&packet));
    assert_eq!(delivered[0].output_index(), Some(3));
    assert_eq!(delivered[0].payload(), packet.payload());
}

#[test]
fn allow_list_without_source_type_falls_through_to_transcode() {
    let registry = CodecRegistry::with_defaults();
    let (collector, sink) = collector();
    let mut source = SourceStream::new(0, StreamType::Mpeg2Video);

    let mut stream = Stream::create(
        sink,
        &registry,
        &DryRunContext::factory(0),
        &MetricsCollector::new(),
        &video("h264-sd", "libx264"),
        &mut source,
        Some("h264,hevc"),
    )
    .unwrap();

    assert_eq!(stream.mode(), StreamMode::Transcoding);
    assert!(stream.has_context());
    assert_eq!(stream.stream_type(), StreamType::H264);
    assert_eq!(source.stream_type, StreamType::H264);

    stream
        .handle(&Packet::data(StreamType::Mpeg2Video, vec![1u8; 8]))
        .unwrap();
    let delivered = collector.packets();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].stream_type(), StreamType::H264);
    assert_eq!(delivered[0].output_index(), Some(0));
}

#[test]
fn unknown_codec_aborts_before_context_creation() {
    let registry = CodecRegistry::with_defaults();
    let (collector, sink) = collector();
    let calls = Arc::new(Calls::default());
    let mut source = SourceStream::new(0, StreamType::Mpeg2Video);

    let err = Stream::create(
        sink,
        &registry,
        &recording_factory(calls.clone(), false),
        &MetricsCollector::new(),
        &video("broken", "nonexistent_codec"),
        &mut source,
        None,
    )
    .unwrap_err();

    assert!(matches!(err, TranscodeError::ProfileDisabled { .. }));
    assert!(err.is_configuration());
    assert_eq!(calls.created.load(Ordering::SeqCst), 0);
    assert!(collector.is_empty());
    assert_eq!(source.stream_type, StreamType::Mpeg2Video);
}

#[test]
fn media_kind_mismatch_aborts_creation() {
    let registry = CodecRegistry::with_defaults();
    let (_collector, sink) = collector();
    let calls = Arc::new(Calls::default());
    let mut source = SourceStream::new(1, StreamType::Aac).with_audio(2, 48000);

    let err = Stream::create(
        sink,
        &registry,
        &recording_factory(calls.clone(), false),
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        None,
    )
    .unwrap_err();

    assert!(matches!(err, TranscodeError::MediaKindMismatch { .. }));
    assert!(err.is_structural());
    assert_eq!(calls.created.load(Ordering::SeqCst), 0);
}

#[test]
fn allow_list_always_wins() {
    let registry = CodecRegistry::with_defaults();
    let profile = video("h264", "libx264");
    let source = SourceStream::new(0, StreamType::Mpeg2Video);

    for list in ["MPEG2VIDEO", "h264 mpeg2video", "aac|Mpeg2Video", "hevc;mpeg2video"] {
        assert!(decide_copy(&registry, &profile, &source, Some(list)).unwrap());
    }
    assert!(!decide_copy(&registry, &profile, &source, Some("-mpeg2video")).unwrap());
    assert!(!decide_copy(&registry, &profile, &source, Some("")).unwrap());
    assert!(!decide_copy(&registry, &profile, &source, None).unwrap());
}

#[test]
fn copy_same_codec_profiles_copy_matching_sources() {
    let registry = CodecRegistry::with_defaults();
    let mut config = profile(
        "h264-keep",
        "libx264",
        ProfileSettings::Video(VideoSettings::default()),
    );
    config.copy_same_codec = true;
    let h264 = CodecProfile::from_config(config);

    let matching = SourceStream::new(0, StreamType::H264);
    let other = SourceStream::new(0, StreamType::Hevc);
    assert!(decide_copy(&registry, &h264, &matching, None).unwrap());
    assert!(!decide_copy(&registry, &h264, &other, None).unwrap());

    let mut config = audio("opus-keep", "libopus", "stereo", 48000);
    config.copy_same_codec = true;
    let opus = CodecProfile::from_config(config);

    let stereo = SourceStream::new(1, StreamType::Opus).with_audio(2, 48000);
    let surround = SourceStream::new(1, StreamType::Opus).with_audio(6, 48000);
    let resampled = SourceStream::new(1, StreamType::Opus).with_audio(2, 44100);
    assert!(decide_copy(&registry, &opus, &stereo, None).unwrap());
    assert!(!decide_copy(&registry, &opus, &surround, None).unwrap());
    assert!(!decide_copy(&registry, &opus, &resampled, None).unwrap());
}

#[test]
fn undetermined_decision_aborts_creation() {
    let registry = CodecRegistry::with_defaults();
    let (_collector, sink) = collector();
    let mut source = SourceStream::new(0, StreamType::None);

    let err = Stream::create(
        sink,
        &registry,
        &DryRunContext::factory(0),
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        Some("h264"),
    )
    .unwrap_err();

    assert!(matches!(err, TranscodeError::UndeterminedDecision { .. }));
}

#[test]
fn unknown_decoder_aborts_creation() {
    let registry = CodecRegistry::with_defaults();
    let (_collector, sink) = collector();
    let mut source = SourceStream::new(0, StreamType::Ca);

    let err = Stream::create(
        sink,
        &registry,
        &DryRunContext::factory(0),
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, TranscodeError::UnknownDecoderId { .. }));

    let empty = CodecRegistry::new();
    let (_collector, sink) = collector();
    let mut source = SourceStream::new(0, StreamType::Mpeg2Video);
    let err = Stream::create(
        sink,
        &empty,
        &DryRunContext::factory(0),
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, TranscodeError::DecoderNotFound { .. }));
}

#[test]
fn mode_never_changes_while_handling() {
    let registry = CodecRegistry::with_defaults();
    let (collector, sink) = collector();
    let mut source = SourceStream::new(2, StreamType::Mpeg2Video);

    let mut stream = Stream::create(
        sink,
        &registry,
        &DryRunContext::factory(2),
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        None,
    )
    .unwrap();

    for n in 0..5u8 {
        stream
            .handle(&Packet::data(StreamType::Mpeg2Video, vec![n; 4]))
            .unwrap();
        assert_eq!(stream.mode(), StreamMode::Transcoding);
        assert!(!stream.is_copy());
    }
    assert_eq!(collector.len(), 3);

    stream.stop(true);
    assert_eq!(collector.len(), 5);
    assert_eq!(stream.mode(), StreamMode::Transcoding);
}

#[test]
fn stop_closes_context_once() {
    let registry = CodecRegistry::with_defaults();
    let (_collector, sink) = collector();
    let calls = Arc::new(Calls::default());
    let mut source = SourceStream::new(0, StreamType::Mpeg2Video);

    let mut stream = Stream::create(
        sink,
        &registry,
        &recording_factory(calls.clone(), false),
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        None,
    )
    .unwrap();

    stream.stop(true);
    stream.stop(true);
    stream.stop(false);

    assert_eq!(calls.closed.load(Ordering::SeqCst), 1);
    assert_eq!(calls.flushed.load(Ordering::SeqCst), 1);
    assert_eq!(stream.index(), None);
    assert_eq!(stream.state(), StreamState::Stopped);

    let err = stream
        .handle(&Packet::data(StreamType::Mpeg2Video, vec![0u8; 4]))
        .unwrap_err();
    assert!(matches!(err, TranscodeError::Inactive { id: 0 }));
    assert_eq!(calls.handled.load(Ordering::SeqCst), 0);
}

#[test]
fn destroy_is_idempotent() {
    let registry = CodecRegistry::with_defaults();
    let (_collector, sink) = collector();
    let calls = Arc::new(Calls::default());
    let mut source = SourceStream::new(0, StreamType::Mpeg2Video);

    let mut stream = Stream::create(
        sink,
        &registry,
        &recording_factory(calls.clone(), false),
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        None,
    )
    .unwrap();

    stream.destroy();
    stream.destroy();
    destroy_stream(Some(&mut stream));
    destroy_stream(None);
    drop(stream);

    assert_eq!(calls.closed.load(Ordering::SeqCst), 1);
    assert_eq!(calls.flushed.load(Ordering::SeqCst), 0);
    assert_eq!(calls.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn passthrough_takes_one_config_reference() {
    let registry = CodecRegistry::with_defaults();
    let directory = ProfileDirectory::new();
    let (_collector, sink) = collector();
    let blob = ConfigBlob::new(vec![0u8, 0, 0, 1, 0x67]);
    let mut source = SourceStream::new(0, StreamType::H264).with_config(blob.clone());
    assert_eq!(blob.ref_count(), 2);

    let mut stream = Stream::create(
        sink,
        &registry,
        &DryRunContext::factory(0),
        &MetricsCollector::new(),
        &directory.copy_profile(),
        &mut source,
        None,
    )
    .unwrap();

    assert_eq!(blob.ref_count(), 3);
    assert_eq!(stream.config().map(ConfigBlob::as_bytes), Some(blob.as_bytes()));

    stream.destroy();
    assert_eq!(blob.ref_count(), 2);
}

#[test]
fn transcode_moves_config_out_of_source() {
    let registry = CodecRegistry::with_defaults();
    let (_collector, sink) = collector();
    let blob = ConfigBlob::new(vec![0u8, 0, 1, 0xb3]);
    let mut source = SourceStream::new(0, StreamType::Mpeg2Video).with_config(blob.clone());

    let stream = Stream::create(
        sink,
        &registry,
        &DryRunContext::factory(0),
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        None,
    )
    .unwrap();

    assert!(source.config.is_none());
    assert!(stream.config().is_none());
}

#[test]
fn failed_context_creation_releases_everything() {
    let registry = CodecRegistry::with_defaults();
    let (collector, sink) = collector();
    let blob = ConfigBlob::new(vec![0u8, 0, 1, 0xb3]);
    let mut source = SourceStream::new(0, StreamType::Mpeg2Video).with_config(blob.clone());

    let err = Stream::create(
        sink.clone(),
        &registry,
        &failing_factory,
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        None,
    )
    .unwrap_err();

    assert!(matches!(err, TranscodeError::ContextCreate { index: 0, .. }));
    assert!(err.to_string().contains("out of encoder sessions"));
    assert_eq!(blob.ref_count(), 2);
    assert_eq!(source.stream_type, StreamType::Mpeg2Video);
    assert!(source.config.is_some());
    assert!(collector.is_empty());
    assert_eq!(Arc::strong_count(&sink), 2);
}

#[test]
fn context_failures_propagate() {
    let registry = CodecRegistry::with_defaults();
    let (_collector, sink) = collector();
    let calls = Arc::new(Calls::default());
    let mut source = SourceStream::new(4, StreamType::Mpeg2Video);

    let mut stream = Stream::create(
        sink,
        &registry,
        &recording_factory(calls.clone(), true),
        &MetricsCollector::new(),
        &video("h264", "libx264"),
        &mut source,
        None,
    )
    .unwrap();

    let err = stream
        .handle(&Packet::data(StreamType::Mpeg2Video, vec![0u8; 4]))
        .unwrap_err();
    assert!(matches!(err, TranscodeError::Pipeline { index: 4, .. }));
    assert_eq!(calls.handled.load(Ordering::SeqCst), 1);
}

#[test]
fn metadata_packets_reach_the_session() {
    let registry = CodecRegistry::with_defaults();
    let directory = ProfileDirectory::new();
    let (collector, sink) = collector();
    let mut source = SourceStream::new(7, StreamType::Ac3);

    let mut stream = Stream::create(
        sink,
        &registry,
        &DryRunContext::factory(0),
        &MetricsCollector::new(),
        &directory.copy_profile(),
        &mut source,
        None,
    )
    .unwrap();

    let signal = Packet::signal(StreamType::Ac3);
    stream.handle(&signal).unwrap();

    let delivered = collector.packets();
    assert_eq!(delivered.len(), 1);
    assert!(!delivered[0].has_payload());
    assert_eq!(delivered[0].output_index(), Some(7));
}

#[test]
fn stream_reports_to_its_own_collector() {
    let registry = CodecRegistry::with_defaults();
    let directory = ProfileDirectory::new();
    let metrics = MetricsCollector::new();
    let (_collector, sink) = collector();
    let mut source = SourceStream::new(0, StreamType::H264);

    let mut stream = Stream::create(
        sink.clone(),
        &registry,
        &DryRunContext::factory(0),
        &metrics,
        &directory.copy_profile(),
        &mut source,
        None,
    )
    .unwrap();
    for _ in 0..3 {
        stream
            .handle(&Packet::data(StreamType::H264, vec![0u8; 4]))
            .unwrap();
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.passthrough_streams, 1);
    assert_eq!(snapshot.packets_forwarded, 3);
    assert_eq!(snapshot.stream_types["H264"].setup_calls, 1);

    stream.destroy();
    assert_eq!(metrics.snapshot().stream_types["H264"].packets, 3);

    let mut bad = SourceStream::new(1, StreamType::Ca);
    let err = Stream::create(
        sink,
        &registry,
        &DryRunContext::factory(0),
        &metrics,
        &video("h264", "libx264"),
        &mut bad,
        None,
    );
    assert!(err.is_err());
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.failed_streams, 1);
    assert_eq!(snapshot.packets_forwarded, 3);
}
