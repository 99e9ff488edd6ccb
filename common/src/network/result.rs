//! # Probe Results
//!
//! One [`ProbeResult`] per candidate address and the ordered [`ResultSet`] that is
//! ranked, printed and written to the result file.
//!
//! The result file is CSV with a header row and the columns
//! `address, sent, received, loss rate, delay (ms), throughput (MB/s), colo`.
//! Floats are written with two decimals and a missing colo as `N/A`.

use std::cell::Cell;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::net::IpAddr;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Delay recorded for a candidate that never answered.
pub const MAX_DELAY: Duration = Duration::from_millis(9_999);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const NO_COLO: &str = "N/A";
const HEADER: [&str; 7] = [
    "address",
    "sent",
    "received",
    "loss_rate",
    "delay_ms",
    "throughput_mb_s",
    "colo",
];

#[derive(Debug, Error)]
pub enum ResultFileError {
    #[error("result file I/O: {0}")]
    Io(#[from] io::Error),
    #[error("result file CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: expected {} columns, found {found}", HEADER.len())]
    ColumnCount { row: usize, found: usize },
    #[error("row {row}: invalid {column} '{value}'")]
    Field {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Measurements for a single candidate address.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub addr: IpAddr,
    pub sent: u32,
    pub received: u32,
    /// Average round-trip delay over successful attempts, [`MAX_DELAY`] if none succeeded.
    pub delay: Duration,
    pub colo: Option<String>,
    /// Download throughput in bytes per second.
    pub throughput: f64,
    loss_rate: Cell<f32>,
}

impl ProbeResult {
    pub fn new(addr: IpAddr) -> Self {
        Self {
            addr,
            sent: 0,
            received: 0,
            delay: MAX_DELAY,
            colo: None,
            throughput: 0.0,
            loss_rate: Cell::new(0.0),
        }
    }

    /// Seeds the loss-rate cache, as when reading a persisted row.
    pub fn with_loss_rate(self, loss_rate: f32) -> Self {
        self.loss_rate.set(loss_rate);
        self
    }

    /// Fraction of attempts that got no answer.
    ///
    /// The value is cached on first use. A cached `0.0` cannot be told apart from
    /// "not computed yet", so a perfect result is recomputed on every call while any
    /// other value sticks even if `sent`/`received` change afterwards.
    pub fn loss_rate(&self) -> f32 {
        if self.sent == 0 {
            return 1.0;
        }
        if self.loss_rate.get() == 0.0 {
            let lost = self.sent.saturating_sub(self.received);
            self.loss_rate.set(lost as f32 / self.sent as f32);
        }
        self.loss_rate.get()
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay.as_secs_f64() * 1000.0
    }

    pub fn throughput_mb(&self) -> f64 {
        self.throughput / BYTES_PER_MB
    }

    /// Whether the candidate answered at all.
    pub fn is_reachable(&self) -> bool {
        self.loss_rate() < 1.0 && self.delay != MAX_DELAY
    }

    /// The row as written to the result file and printed in the summary table.
    pub fn to_record(&self) -> [String; 7] {
        [
            self.addr.to_string(),
            self.sent.to_string(),
            self.received.to_string(),
            format!("{:.2}", self.loss_rate()),
            format!("{:.2}", self.delay_ms()),
            format!("{:.2}", self.throughput_mb()),
            self.colo.clone().unwrap_or_else(|| NO_COLO.to_string()),
        ]
    }

    fn from_record(row: usize, record: &csv::StringRecord) -> Result<Self, ResultFileError> {
        if record.len() != HEADER.len() {
            return Err(ResultFileError::ColumnCount {
                row,
                found: record.len(),
            });
        }

        let field = |idx: usize| record.get(idx).unwrap_or_default().trim();
        let invalid = |idx: usize| ResultFileError::Field {
            row,
            column: HEADER[idx],
            value: field(idx).to_string(),
        };

        let addr: IpAddr = field(0).parse().map_err(|_| invalid(0))?;
        let sent: u32 = field(1).parse().map_err(|_| invalid(1))?;
        let received: u32 = field(2).parse().map_err(|_| invalid(2))?;
        let loss_rate: f32 = field(3).parse().map_err(|_| invalid(3))?;
        let delay_ms: f64 = field(4).parse().map_err(|_| invalid(4))?;
        let delay = Duration::try_from_secs_f64(delay_ms / 1000.0).map_err(|_| invalid(4))?;
        let throughput_mb: f64 = field(5)
            .parse()
            .ok()
            .filter(|mb: &f64| mb.is_finite() && *mb >= 0.0)
            .ok_or_else(|| invalid(5))?;
        let colo = match field(6) {
            "" | NO_COLO => None,
            code => Some(code.to_string()),
        };

        let mut result = ProbeResult::new(addr).with_loss_rate(loss_rate);
        result.sent = sent;
        result.received = received;
        result.delay = delay;
        result.throughput = throughput_mb * BYTES_PER_MB;
        result.colo = colo;
        Ok(result)
    }
}

/// Ordered results of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    results: Vec<ProbeResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// One fresh, unprobed result per address, in order.
    pub fn from_addrs<I>(addrs: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        addrs.into_iter().map(ProbeResult::new).collect()
    }

    pub fn push(&mut self, result: ProbeResult) {
        self.results.push(result);
    }

    /// Latency ranking: ascending delay, then ascending loss rate.
    pub fn sort_by_delay_loss(&mut self) {
        self.results.sort_by(compare_delay_loss);
    }

    /// Final ranking: descending throughput, then ascending delay, then ascending loss rate.
    pub fn sort_by_throughput_delay_loss(&mut self) {
        self.results.sort_by(|a, b| {
            b.throughput
                .total_cmp(&a.throughput)
                .then_with(|| compare_delay_loss(a, b))
        });
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ResultFileError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(HEADER)?;
        for result in &self.results {
            wtr.write_record(result.to_record())?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Self, ResultFileError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut set = ResultSet::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record?;
            set.push(ProbeResult::from_record(idx + 1, &record)?);
        }
        Ok(set)
    }

    /// Writes every row to `path` through a temporary sibling file.
    pub fn save(&self, path: &Path) -> Result<(), ResultFileError> {
        let tmp = path.with_extension("tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            self.write_csv(&mut out)?;
            out.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ResultFileError> {
        Self::read_csv(File::open(path)?)
    }

    /// Loads the previous run's results. A missing file is a first run, not an error.
    pub fn load_prior(path: &Path) -> Result<Self, ResultFileError> {
        match File::open(path) {
            Ok(file) => Self::read_csv(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn compare_delay_loss(a: &ProbeResult, b: &ProbeResult) -> Ordering {
    a.delay
        .cmp(&b.delay)
        .then_with(|| a.loss_rate().total_cmp(&b.loss_rate()))
}

impl Deref for ResultSet {
    type Target = [ProbeResult];

    fn deref(&self) -> &Self::Target {
        &self.results
    }
}

impl DerefMut for ResultSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.results
    }
}

impl FromIterator<ProbeResult> for ResultSet {
    fn from_iter<T: IntoIterator<Item = ProbeResult>>(iter: T) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = ProbeResult;
    type IntoIter = std::vec::IntoIter<ProbeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ProbeResult;
    type IntoIter = std::slice::Iter<'a, ProbeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
