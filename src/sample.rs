//! The Sample data model.
//! One timestamped row of host metrics, addressable by column index.

use chrono::NaiveDateTime;

/// Number of numeric metric columns following the timestamp.
pub const METRIC_FIELDS: usize = 7;

/// One measurement of the host at a point in time.
///
/// Field order is the persisted-file column order and must never change:
/// the codec and the chart pipeline both address columns positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub cpu_pct: f64,
    pub ram_pct: f64,
    pub disk_pct: f64,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub temperature_c: f64,
    pub connections: u64,
}

impl Sample {
    /// Returns the numeric value at column `index` (1..=7).
    /// Index 0 is the timestamp and has no numeric form.
    pub fn field(&self, index: usize) -> Option<f64> {
        match index {
            1 => Some(self.cpu_pct),
            2 => Some(self.ram_pct),
            3 => Some(self.disk_pct),
            4 => Some(self.download_mbps),
            5 => Some(self.upload_mbps),
            6 => Some(self.temperature_c),
            7 => Some(self.connections as f64),
            _ => None,
        }
    }
}
