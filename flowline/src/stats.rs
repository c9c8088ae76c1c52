//! Statistics collected during a run.
//!
//! All recording goes through [`Statistics`], which is shared by the
//! processes of a session and read by the host through
//! [`Statistics::report`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::util::lock;

/// What a buffer probe measures.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProbeMode {
    /// The current population of the buffer.
    #[default]
    Buffer,
    /// The number of items that went through the buffer so far.
    Cumulative,
}

/// What a time probe measures.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeProbeKind {
    /// Duration of processing steps.
    Processing,
    /// Time between two consecutive events of the node (generation,
    /// departure or reception).
    InterEvents,
}

/// A list of duration samples.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeProbe {
    /// The measured quantity.
    pub kind: TimeProbeKind,
    /// Samples, in recording order.
    pub samples: Vec<f64>,
}

impl TimeProbe {
    /// Creates an empty probe.
    pub fn new(kind: TimeProbeKind) -> Self {
        Self {
            kind,
            samples: Vec::new(),
        }
    }

    /// Records a sample; negative and non-finite samples are ignored.
    pub fn record(&mut self, value: f64) {
        if value.is_finite() && value >= 0.0 {
            self.samples.push(value);
        }
    }

    /// Computes summary statistics, or `None` if there is no sample.
    pub fn summary(&self) -> Option<ProbeSummary> {
        let count = self.samples.len();
        if count == 0 {
            return None;
        }
        let mean = self.samples.iter().sum::<f64>() / count as f64;
        let variance = self.samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count as f64;

        Some(ProbeSummary {
            count,
            mean,
            min: self.samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev: variance.sqrt(),
        })
    }
}

/// Summary of a [`TimeProbe`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ProbeSummary {
    /// Number of samples.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

/// Why a buffer sample was taken.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleCause {
    /// An item was put in the buffer.
    Put,
    /// An item was consumed from the buffer.
    Consumed,
    /// Periodic sampling.
    Tick,
}

/// A buffer level observation.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferSample {
    /// Simulation time of the observation.
    pub time: f64,
    /// Buffer population.
    pub population: usize,
    /// Population by item type.
    pub type_counts: BTreeMap<String, usize>,
    /// Why the sample was taken.
    pub cause: SampleCause,
}

/// Recorded history of one buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferProbe {
    /// What the probe reports through [`BufferProbe::value`].
    pub mode: ProbeMode,
    /// Observations, in recording order.
    pub samples: Vec<BufferSample>,
    /// Items that went through the buffer towards a non-sink node.
    pub items_passing: u64,
    /// Items consumed from the buffer by a sink.
    pub items_consumed: u64,
}

impl BufferProbe {
    fn new(mode: ProbeMode) -> Self {
        Self {
            mode,
            samples: Vec::new(),
            items_passing: 0,
            items_consumed: 0,
        }
    }

    /// Returns the latest measured value.
    pub fn value(&self) -> f64 {
        match self.mode {
            ProbeMode::Buffer => self
                .samples
                .last()
                .map_or(0.0, |sample| sample.population as f64),
            ProbeMode::Cumulative => (self.items_passing + self.items_consumed) as f64,
        }
    }
}

/// Per-type counters and timelines.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemTypeStats {
    /// Generated items by type.
    pub generated: BTreeMap<String, u64>,
    /// Generation events, as `(time, type)`.
    pub generation_timeline: Vec<(f64, String)>,
    /// Arrivals by node, then by type.
    pub arrivals: BTreeMap<String, BTreeMap<String, u64>>,
    /// Arrival events by node, as `(time, type)`.
    pub arrival_timeline: BTreeMap<String, Vec<(f64, String)>>,
    /// Departure events by node, as `(time, type)`.
    pub departure_timeline: BTreeMap<String, Vec<(f64, String)>>,
}

/// Aggregated statistics of an operator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperatorReport {
    /// Total time spent controlling machines.
    pub busy_time: f64,
    /// Total time spent travelling between machines.
    pub travel_time: f64,
    /// Busy time over elapsed simulation time.
    pub utilization: f64,
    /// Travel samples of probed routes, keyed by `(from, to)`.
    pub travel_samples: BTreeMap<(String, String), Vec<f64>>,
}

/// A snapshot of all statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatsReport {
    /// Simulation time of the snapshot.
    pub time: f64,
    /// Items generated, by source.
    pub generated: BTreeMap<String, u64>,
    /// Items received, by sink.
    pub received: BTreeMap<String, u64>,
    /// Items processed, by generic node.
    pub processed: BTreeMap<String, u64>,
    /// Time spent waiting for inputs at each cycle, by generic node.
    pub waiting_times: BTreeMap<String, Vec<f64>>,
    /// Time probes, by node.
    pub time_probes: BTreeMap<String, BTreeMap<TimeProbeKind, TimeProbe>>,
    /// Buffer probes, by connection.
    pub buffer_probes: BTreeMap<String, BufferProbe>,
    /// Per-type counters.
    pub item_types: ItemTypeStats,
    /// Work-in-progress samples, as `(time, items in buffers)`.
    pub wip: Vec<(f64, usize)>,
    /// Operator statistics, by operator.
    pub operators: BTreeMap<String, OperatorReport>,
}

impl StatsReport {
    /// Total number of items generated by all sources.
    pub fn total_generated(&self) -> u64 {
        self.generated.values().sum()
    }

    /// Total number of items received by all sinks.
    pub fn total_received(&self) -> u64 {
        self.received.values().sum()
    }
}

/// Thread-safe statistics recorder.
#[derive(Debug)]
pub struct Statistics {
    probe_modes: BTreeMap<String, ProbeMode>,
    inner: Mutex<StatsReport>,
}

impl Statistics {
    /// Creates a recorder with buffer probes on the specified connections.
    pub(crate) fn new(probe_modes: BTreeMap<String, ProbeMode>) -> Self {
        let stats = Self {
            probe_modes,
            inner: Mutex::new(StatsReport::default()),
        };
        stats.clear();

        stats
    }

    /// Discards everything recorded so far.
    pub(crate) fn clear(&self) {
        let mut inner = lock(&self.inner);
        *inner = StatsReport::default();
        inner.buffer_probes = self
            .probe_modes
            .iter()
            .map(|(conn, mode)| (conn.clone(), BufferProbe::new(*mode)))
            .collect();
    }

    /// Returns a copy of everything recorded so far.
    ///
    /// The `time` and `operators` fields are left for the caller to fill.
    pub fn report(&self) -> StatsReport {
        lock(&self.inner).clone()
    }

    pub(crate) fn record_generated(&self, node: &str, time: f64, type_key: &str) {
        let mut inner = lock(&self.inner);
        *inner.generated.entry(node.to_string()).or_default() += 1;
        let types = &mut inner.item_types;
        *types.generated.entry(type_key.to_string()).or_default() += 1;
        types.generation_timeline.push((time, type_key.to_string()));
    }

    pub(crate) fn record_received(&self, node: &str) {
        *lock(&self.inner).received.entry(node.to_string()).or_default() += 1;
    }

    pub(crate) fn record_processed(&self, node: &str, count: usize) {
        *lock(&self.inner).processed.entry(node.to_string()).or_default() += count as u64;
    }

    pub(crate) fn record_waiting(&self, node: &str, duration: f64) {
        lock(&self.inner)
            .waiting_times
            .entry(node.to_string())
            .or_default()
            .push(duration);
    }

    pub(crate) fn record_time_sample(&self, node: &str, kind: TimeProbeKind, value: f64) {
        lock(&self.inner)
            .time_probes
            .entry(node.to_string())
            .or_default()
            .entry(kind)
            .or_insert_with(|| TimeProbe::new(kind))
            .record(value);
    }

    pub(crate) fn record_arrival(&self, node: &str, time: f64, type_key: &str) {
        let mut inner = lock(&self.inner);
        let types = &mut inner.item_types;
        *types
            .arrivals
            .entry(node.to_string())
            .or_default()
            .entry(type_key.to_string())
            .or_default() += 1;
        types
            .arrival_timeline
            .entry(node.to_string())
            .or_default()
            .push((time, type_key.to_string()));
    }

    pub(crate) fn record_departure(&self, node: &str, time: f64, type_key: &str) {
        lock(&self.inner)
            .item_types
            .departure_timeline
            .entry(node.to_string())
            .or_default()
            .push((time, type_key.to_string()));
    }

    /// Records a buffer sample if the connection is probed.
    ///
    /// `feeds_sink` tells whether the downstream node is a sink, which decides
    /// whether the event counts as an item passing or an item consumed.
    pub(crate) fn record_buffer(&self, conn: &str, sample: BufferSample, feeds_sink: bool) {
        let mut inner = lock(&self.inner);
        let Some(probe) = inner.buffer_probes.get_mut(conn) else {
            return;
        };
        match sample.cause {
            SampleCause::Put if !feeds_sink => probe.items_passing += 1,
            SampleCause::Consumed if feeds_sink => probe.items_consumed += 1,
            _ => {}
        }
        probe.samples.push(sample);
    }

    pub(crate) fn record_wip(&self, time: f64, wip: usize) {
        lock(&self.inner).wip.push((time, wip));
    }
}
