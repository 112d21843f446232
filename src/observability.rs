use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::stream::StreamMode;

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub stream_types: BTreeMap<String, StreamTypeMetrics>,
    pub passthrough_streams: u64,
    pub transcoding_streams: u64,
    pub failed_streams: u64,
    pub packets_forwarded: u64,
    pub packets_transcoded: u64,
    pub packet_failures: u64,
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct StreamTypeMetrics {
    pub streams: u64,
    pub failures: u64,
    pub packets: u64,
    pub setup_calls: u64,
    pub total_setup_ms: f64,
    pub max_setup_ms: f64,
}

/// Stream setup outcomes sit behind a mutex that is only taken during setup and
/// teardown. Packet counters are atomics so the packet path never locks.
#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsSnapshot>>,
    packets: Arc<PacketCounters>,
}

#[derive(Debug, Default)]
struct PacketCounters {
    forwarded: AtomicU64,
    transcoded: AtomicU64,
    failures: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_setup(&self, stream_type: &str) -> SetupTimer {
        SetupTimer {
            stream_type: stream_type.to_string(),
            started_at: Instant::now(),
            collector: self.inner.clone(),
            recorded: false,
        }
    }

    pub fn record_stream_created(&self, stream_type: &str, mode: StreamMode) {
        self.update(|guard| {
            match mode {
                StreamMode::Passthrough => guard.passthrough_streams += 1,
                StreamMode::Transcoding => guard.transcoding_streams += 1,
            }
            guard
                .stream_types
                .entry(stream_type.to_string())
                .or_default()
                .streams += 1;
        });
    }

    pub fn record_stream_failed(&self, stream_type: &str) {
        self.update(|guard| {
            guard.failed_streams += 1;
            guard
                .stream_types
                .entry(stream_type.to_string())
                .or_default()
                .failures += 1;
        });
    }

    /// Per-type packet total of a finished stream, folded in once at teardown.
    pub fn record_stream_packets(&self, stream_type: &str, packets: u64) {
        if packets == 0 {
            return;
        }
        self.update(|guard| {
            guard
                .stream_types
                .entry(stream_type.to_string())
                .or_default()
                .packets += packets;
        });
    }

    pub fn record_packet_forwarded(&self) {
        self.packets.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_transcoded(&self) {
        self.packets.transcoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_failure(&self) {
        self.packets.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = self.inner.lock().map(|g| g.clone()).unwrap_or_default();
        snapshot.packets_forwarded = self.packets.forwarded.load(Ordering::Relaxed);
        snapshot.packets_transcoded = self.packets.transcoded.load(Ordering::Relaxed);
        snapshot.packet_failures = self.packets.failures.load(Ordering::Relaxed);
        snapshot
    }

    pub fn reset(&self) {
        self.update(|guard| *guard = MetricsSnapshot::default());
        self.packets.forwarded.store(0, Ordering::Relaxed);
        self.packets.transcoded.store(0, Ordering::Relaxed);
        self.packets.failures.store(0, Ordering::Relaxed);
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut guard) = self.inner.lock() {
            apply(&mut guard);
        }
    }
}

pub struct SetupTimer {
    stream_type: String,
    started_at: Instant,
    collector: Arc<Mutex<MetricsSnapshot>>,
    recorded: bool,
}

impl SetupTimer {
    fn record(&mut self) {
        if self.recorded {
            return;
        }
        let duration = self.started_at.elapsed();
        let duration_ms = as_millis(duration);
        if let Ok(mut guard) = self.collector.lock() {
            let metrics = guard
                .stream_types
                .entry(self.stream_type.clone())
                .or_default();
            metrics.setup_calls += 1;
            metrics.total_setup_ms += duration_ms;
            if duration_ms > metrics.max_setup_ms {
                metrics.max_setup_ms = duration_ms;
            }
        }
        debug!(
            stream_type = self.stream_type.as_str(),
            duration_ms, "Stream setup duration recorded"
        );
        self.recorded = true;
    }
}

impl Drop for SetupTimer {
    fn drop(&mut self) {
        self.record();
    }
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        passthrough = snapshot.passthrough_streams,
        transcoding = snapshot.transcoding_streams,
        failed = snapshot.failed_streams,
        packets_forwarded = snapshot.packets_forwarded,
        packets_transcoded = snapshot.packets_transcoded,
        packet_failures = snapshot.packet_failures,
        "Transcoding metrics summary"
    );
    for (stream_type, metrics) in &snapshot.stream_types {
        info!(
            stream_type = stream_type.as_str(),
            streams = metrics.streams,
            failures = metrics.failures,
            packets = metrics.packets,
            max_setup_ms = metrics.max_setup_ms,
            "Stream type metrics"
        );
    }
}

impl MetricsSnapshot {
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        output.push_str("# HELP transcode_streams_total Streams created, by mode\n");
        output.push_str("# TYPE transcode_streams_total counter\n");
        output.push_str(&format!(
            "transcode_streams_total{{mode=\"passthrough\"}} {}\n",
            self.passthrough_streams
        ));
        output.push_str(&format!(
            "transcode_streams_total{{mode=\"transcoding\"}} {}\n",
            self.transcoding_streams
        ));
        output.push_str("# HELP transcode_stream_failures_total Aborted stream creations\n");
        output.push_str("# TYPE transcode_stream_failures_total counter\n");
        output.push_str(&format!(
            "transcode_stream_failures_total {}\n",
            self.failed_streams
        ));
        output.push_str("# HELP transcode_packets_total Packets handled, by route\n");
        output.push_str("# TYPE transcode_packets_total counter\n");
        output.push_str(&format!(
            "transcode_packets_total{{route=\"forwarded\"}} {}\n",
            self.packets_forwarded
        ));
        output.push_str(&format!(
            "transcode_packets_total{{route=\"transcoded\"}} {}\n",
            self.packets_transcoded
        ));
        output.push_str("# HELP transcode_packet_failures_total Failed packet hand-offs\n");
        output.push_str("# TYPE transcode_packet_failures_total counter\n");
        output.push_str(&format!(
            "transcode_packet_failures_total {}\n",
            self.packet_failures
        ));
        output.push_str(
            "# HELP transcode_setup_seconds_max Longest stream setup, by stream type\n",
        );
        output.push_str("# TYPE transcode_setup_seconds_max gauge\n");
        for (stream_type, metrics) in &self.stream_types {
            output.push_str(&format!(
                "transcode_setup_seconds_max{{stream_type=\"{}\"}} {:.6}\n",
                stream_type,
                metrics.max_setup_ms / 1_000.0
            ));
        }
        output
    }
}
