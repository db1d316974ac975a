//! Time-series persistence.
//! Reads and rewrites the windowed sample file as headerless CSV, one row per
//! sample, first column an ISO-8601 timezone-naive timestamp.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::sample::{Sample, METRIC_FIELDS};

#[derive(Debug, Error)]
pub enum CodecError {
    /// The file exists but a line failed to parse. The whole load fails so
    /// corruption is never silently dropped; the caller decides the policy.
    #[error("corrupt sample file {} at line {line}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("i/o error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Loads every sample from `path`. A missing file is an empty series, not an
/// error. Blank lines are tolerated; any malformed line fails the whole load.
pub fn load(path: &Path) -> Result<Vec<Sample>, CodecError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CodecError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let mut samples = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample = parse_line(line).map_err(|reason| CodecError::Corrupt {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

/// Rewrites `path` with the full series, atomically: the rows go to a sibling
/// temp file which is renamed over the target, so a crash or a failed write
/// never truncates the previous file.
pub fn save(path: &Path, samples: &[Sample]) -> Result<(), CodecError> {
    let io_err = |source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    {
        let file = File::create(&tmp).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        for sample in samples {
            writeln!(writer, "{}", format_line(sample)).map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;
    }

    fs::rename(&tmp, path).map_err(io_err)
}

fn parse_line(line: &str) -> Result<Sample, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != METRIC_FIELDS + 1 {
        return Err(format!(
            "expected {} fields, found {}",
            METRIC_FIELDS + 1,
            fields.len()
        ));
    }

    let timestamp: NaiveDateTime = fields[0]
        .parse()
        .map_err(|e| format!("bad timestamp {:?}: {}", fields[0], e))?;
    let num = |i: usize| -> Result<f64, String> {
        fields[i]
            .parse::<f64>()
            .map_err(|e| format!("bad number {:?} in field {}: {}", fields[i], i, e))
    };

    Ok(Sample {
        timestamp,
        cpu_pct: num(1)?,
        ram_pct: num(2)?,
        disk_pct: num(3)?,
        download_mbps: num(4)?,
        upload_mbps: num(5)?,
        temperature_c: num(6)?,
        connections: fields[7]
            .parse::<u64>()
            .map_err(|e| format!("bad connection count {:?}: {}", fields[7], e))?,
    })
}

fn format_line(sample: &Sample) -> String {
    // f64 Display prints the shortest string that parses back to the same
    // value, so save -> load is lossless.
    format!(
        "{},{},{},{},{},{},{},{}",
        sample.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f"),
        sample.cpu_pct,
        sample.ram_pct,
        sample.disk_pct,
        sample.download_mbps,
        sample.upload_mbps,
        sample.temperature_c,
        sample.connections,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn ts(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    fn sample_at(t: &str) -> Sample {
        Sample {
            timestamp: ts(t),
            cpu_pct: 33.333333333333336,
            ram_pct: 61.7,
            disk_pct: 80.0,
            download_mbps: 0.0517578125,
            upload_mbps: 0.001953125,
            temperature_c: 0.0,
            connections: 42,
        }
    }

    #[test]
    fn missing_file_is_empty_series() {
        let dir = tempdir().unwrap();
        let samples = load(&dir.path().join("nope.csv")).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn round_trip_is_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hourly.csv");
        let series = vec![
            sample_at("2024-03-01T10:00:00"),
            sample_at("2024-03-01T10:00:02.500000"),
        ];
        save(&path, &series).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded, series);
    }

    #[test]
    fn blank_lines_are_tolerated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hourly.csv");
        fs::write(
            &path,
            "2024-03-01T10:00:00,1,2,3,4,5,6,7\n\n2024-03-01T10:00:01,1,2,3,4,5,6,7\n\n\n",
        )
        .unwrap();
        let samples = load(&path).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn malformed_line_fails_whole_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hourly.csv");
        fs::write(
            &path,
            "2024-03-01T10:00:00,1,2,3,4,5,6,7\nnot-a-timestamp,1,2,3,4,5,6,7\n",
        )
        .unwrap();
        match load(&path) {
            Err(CodecError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected Corrupt error, got {:?}", other),
        }
    }

    #[test]
    fn wrong_field_count_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hourly.csv");
        fs::write(&path, "2024-03-01T10:00:00,1,2,3\n").unwrap();
        assert!(matches!(load(&path), Err(CodecError::Corrupt { line: 1, .. })));
    }

    #[test]
    fn failed_save_leaves_previous_file_intact() {
        let dir = tempdir().unwrap();
        // A directory at the target path makes the rename fail.
        let path = dir.path().join("hourly.csv");
        fs::create_dir(&path).unwrap();
        let marker = path.join("keep");
        fs::write(&marker, "x").unwrap();

        let result = save(&path, &[sample_at("2024-03-01T10:00:00")]);
        assert!(result.is_err());
        assert!(marker.exists());
    }

    #[test]
    fn save_overwrites_not_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hourly.csv");
        save(&path, &[sample_at("2024-03-01T10:00:00")]).unwrap();
        save(&path, &[sample_at("2024-03-01T11:00:00")]).unwrap();
        let samples = load(&path).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(
            samples[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(11, 0, 0)
                .unwrap()
        );
    }
}
