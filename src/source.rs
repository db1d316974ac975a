//! Host metric readings.
//! `MetricsSource` is the capability boundary the sampler consumes;
//! `SysinfoSource` is the production implementation, built on sysinfo plus
//! direct /proc and hwmon reads.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use sysinfo::{CpuExt, DiskExt, System, SystemExt};

/// Cumulative network byte counters since boot, summed over interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetIoCounters {
    pub bytes_recv: u64,
    pub bytes_sent: u64,
}

/// Everything the sampler needs from the host. Implementations may block:
/// `cpu_percent` holds for `interval` to measure a rate instead of a
/// since-boot aggregate.
pub trait MetricsSource {
    fn cpu_percent(&mut self, interval: Duration) -> Result<f64>;
    fn memory_percent(&mut self) -> Result<f64>;
    fn disk_percent(&mut self, mount: &Path) -> Result<f64>;
    fn network_io_counters(&mut self) -> Result<NetIoCounters>;
    fn connection_count(&mut self) -> Result<u64>;
    /// One reading per discovered sensor, in degrees Celsius. May be empty.
    fn temperatures(&mut self) -> Result<Vec<f64>>;
}

/// Live host readings.
pub struct SysinfoSource {
    system: System,
    proc_net_dev: PathBuf,
    proc_net_tables: Vec<PathBuf>,
    hwmon_base: PathBuf,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system,
            proc_net_dev: PathBuf::from("/proc/net/dev"),
            proc_net_tables: ["tcp", "tcp6", "udp", "udp6"]
                .iter()
                .map(|t| PathBuf::from("/proc/net").join(t))
                .collect(),
            hwmon_base: PathBuf::from("/sys/class/hwmon"),
        }
    }

    /// Test constructor: point the /proc and hwmon reads at fixture trees.
    pub fn new_with_paths(proc_net_dev: PathBuf, proc_net_tables: Vec<PathBuf>, hwmon_base: PathBuf) -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system,
            proc_net_dev,
            proc_net_tables,
            hwmon_base,
        }
    }

    /// Parses /proc/net/dev, summing rx/tx bytes over non-loopback
    /// interfaces.
    fn read_proc_net_dev(&self) -> Result<NetIoCounters> {
        let content = fs::read_to_string(&self.proc_net_dev)
            .with_context(|| format!("failed to read {}", self.proc_net_dev.display()))?;

        let mut totals = NetIoCounters {
            bytes_recv: 0,
            bytes_sent: 0,
        };
        for line in content.lines().skip(2) {
            let line = line.trim();
            if let Some(colon_idx) = line.find(':') {
                let iface = &line[..colon_idx];
                if iface == "lo" {
                    continue;
                }
                let stats: Vec<&str> = line[colon_idx + 1..].split_whitespace().collect();
                if stats.len() >= 9 {
                    if let (Ok(rx), Ok(tx)) = (stats[0].parse::<u64>(), stats[8].parse::<u64>()) {
                        totals.bytes_recv += rx;
                        totals.bytes_sent += tx;
                    }
                }
            }
        }
        Ok(totals)
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SysinfoSource {
    fn cpu_percent(&mut self, interval: Duration) -> Result<f64> {
        // cpu_usage() is the delta between the last two refreshes, so prime
        // once, hold for the interval, then read.
        self.system.refresh_cpu();
        thread::sleep(interval);
        self.system.refresh_cpu();
        Ok(self.system.global_cpu_info().cpu_usage() as f64)
    }

    fn memory_percent(&mut self) -> Result<f64> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            bail!("sysinfo reported zero total memory");
        }
        Ok(self.system.used_memory() as f64 / total as f64 * 100.0)
    }

    fn disk_percent(&mut self, mount: &Path) -> Result<f64> {
        self.system.refresh_disks_list();
        self.system.refresh_disks();
        for disk in self.system.disks() {
            if disk.mount_point() == mount {
                let total = disk.total_space();
                if total == 0 {
                    bail!("disk at {} reports zero capacity", mount.display());
                }
                let used = total - disk.available_space();
                return Ok(used as f64 / total as f64 * 100.0);
            }
        }
        bail!("no disk mounted at {}", mount.display())
    }

    fn network_io_counters(&mut self) -> Result<NetIoCounters> {
        self.read_proc_net_dev()
    }

    fn connection_count(&mut self) -> Result<u64> {
        let mut count = 0u64;
        let mut any_table = false;
        for table in &self.proc_net_tables {
            let content = match fs::read_to_string(table) {
                Ok(c) => c,
                // Not every kernel exposes every table (e.g. no IPv6).
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to read {}", table.display()))
                }
            };
            any_table = true;
            // First line is the header.
            count += content.lines().skip(1).filter(|l| !l.trim().is_empty()).count() as u64;
        }
        if !any_table {
            bail!("no /proc/net socket tables found");
        }
        Ok(count)
    }

    fn temperatures(&mut self) -> Result<Vec<f64>> {
        let mut readings = Vec::new();
        let entries = match fs::read_dir(&self.hwmon_base) {
            Ok(e) => e,
            // Hosts without hwmon simply have no sensors.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(readings),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to scan {}", self.hwmon_base.display()))
            }
        };

        for entry in entries.flatten() {
            let dir = entry.path();
            let files = match fs::read_dir(&dir) {
                Ok(f) => f,
                Err(_) => continue,
            };
            for file in files.flatten() {
                let name = file.file_name();
                let name = name.to_string_lossy();
                // tempN_input holds millidegrees Celsius.
                if name.starts_with("temp") && name.ends_with("_input") {
                    if let Ok(content) = fs::read_to_string(file.path()) {
                        if let Ok(milli) = content.trim().parse::<i64>() {
                            readings.push(milli as f64 / 1000.0);
                        }
                    }
                }
            }
        }
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &str) {
        let mut f = File::create(path).unwrap();
        write!(f, "{}", content).unwrap();
    }

    #[test]
    fn proc_net_dev_sums_non_loopback_interfaces() {
        let dir = tempdir().unwrap();
        let dev = dir.path().join("dev");
        write_file(
            &dev,
            "Inter-|   Receive                                                |  Transmit\n \
             face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n\
                lo:  999999     100    0    0    0     0          0         0   999999     100    0    0    0     0       0          0\n\
              eth0: 1000000     500    0    0    0     0          0         0   200000     300    0    0    0     0       0          0\n\
             wlan0:  500000     250    0    0    0     0          0         0   100000     150    0    0    0     0       0          0\n",
        );
        let src = SysinfoSource::new_with_paths(dev, vec![], dir.path().join("hwmon"));
        let counters = src.read_proc_net_dev().unwrap();
        assert_eq!(counters.bytes_recv, 1_500_000);
        assert_eq!(counters.bytes_sent, 300_000);
    }

    #[test]
    fn connection_count_skips_table_headers() {
        let dir = tempdir().unwrap();
        let tcp = dir.path().join("tcp");
        write_file(
            &tcp,
            "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid\n \
               0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000\n \
               1: 0100007F:1F91 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000\n",
        );
        let udp = dir.path().join("udp");
        write_file(
            &udp,
            "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid\n \
               0: 00000000:0044 00000000:0000 07 00000000:00000000 00:00000000 00000000   102\n",
        );
        let mut src = SysinfoSource::new_with_paths(
            dir.path().join("dev"),
            vec![tcp, udp, dir.path().join("tcp6")],
            dir.path().join("hwmon"),
        );
        assert_eq!(src.connection_count().unwrap(), 3);
    }

    #[test]
    fn hwmon_scan_reads_millidegrees() {
        let dir = tempdir().unwrap();
        let hwmon = dir.path().join("hwmon");
        let hwmon0 = hwmon.join("hwmon0");
        fs::create_dir_all(&hwmon0).unwrap();
        write_file(&hwmon0.join("name"), "k10temp\n");
        write_file(&hwmon0.join("temp1_input"), "45123\n");
        write_file(&hwmon0.join("temp2_input"), "51000\n");

        let mut src =
            SysinfoSource::new_with_paths(dir.path().join("dev"), vec![], hwmon);
        let mut temps = src.temperatures().unwrap();
        temps.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(temps, vec![45.123, 51.0]);
    }

    #[test]
    fn absent_hwmon_directory_means_no_sensors() {
        let dir = tempdir().unwrap();
        let mut src = SysinfoSource::new_with_paths(
            dir.path().join("dev"),
            vec![],
            dir.path().join("missing-hwmon"),
        );
        assert!(src.temperatures().unwrap().is_empty());
    }
}
