//! Chart output.
//! One PNG line chart per configured metric column, drawn offscreen with
//! cairo and labelled with pango, written into the window's plot directory.

use std::fs::File;
use std::path::Path;

use anyhow::{Context as AnyhowContext, Result};
use cairo::{Context as CairoContext, Format, ImageSurface};
use chrono::NaiveDateTime;
use pango::FontDescription;

use crate::buffer::WindowBuffer;

/// Which metric columns get charted, and how the axes are labelled.
/// Field indices address `Sample::field`; percentage charts pin the y-axis
/// to 0..100 so a quiet host does not autoscale into noise.
pub struct ChartSpec {
    pub field: usize,
    pub title: &'static str,
    pub y_label: &'static str,
    pub y_limits: Option<(f64, f64)>,
}

pub const CHART_SPECS: [ChartSpec; 7] = [
    ChartSpec { field: 1, title: "CPU Usage", y_label: "Percent Used", y_limits: Some((0.0, 100.0)) },
    ChartSpec { field: 2, title: "RAM Usage", y_label: "Percent Used", y_limits: Some((0.0, 100.0)) },
    ChartSpec { field: 3, title: "Disk Usage", y_label: "Percent Used", y_limits: Some((0.0, 100.0)) },
    ChartSpec { field: 4, title: "Download", y_label: "MiB per interval", y_limits: None },
    ChartSpec { field: 5, title: "Upload", y_label: "MiB per interval", y_limits: None },
    ChartSpec { field: 6, title: "Temperature", y_label: "Temperature (C)", y_limits: None },
    ChartSpec { field: 7, title: "Active Connections", y_label: "Connections", y_limits: None },
];

/// Renders one finished series to `dest`.
pub trait ChartRenderer {
    fn render(
        &self,
        timestamps: &[NaiveDateTime],
        values: &[f64],
        title: &str,
        y_label: &str,
        y_limits: Option<(f64, f64)>,
        dest: &Path,
    ) -> Result<()>;
}

/// Deterministic output name: lower-cased title, spaces to underscores,
/// suffixed with the window name.
pub fn chart_file_name(title: &str, window_name: &str) -> String {
    format!("{}_{}.png", title.to_lowercase().replace(' ', "_"), window_name)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChartOutcome {
    pub rendered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Drives the renderer over every configured chart. An empty buffer skips
/// everything with a diagnostic; a failed chart is logged and does not block
/// the rest.
pub fn render_all(
    buffer: &WindowBuffer,
    renderer: &dyn ChartRenderer,
    plot_dir: &Path,
    window_name: &str,
) -> ChartOutcome {
    let mut outcome = ChartOutcome::default();

    if buffer.is_empty() {
        log::info!(
            "no data in window '{}', skipping all {} charts",
            window_name,
            CHART_SPECS.len()
        );
        outcome.skipped = CHART_SPECS.len();
        return outcome;
    }

    let timestamps: Vec<NaiveDateTime> = buffer.samples().iter().map(|s| s.timestamp).collect();
    for spec in &CHART_SPECS {
        let values: Vec<f64> = buffer
            .samples()
            .iter()
            .filter_map(|s| s.field(spec.field))
            .collect();
        let dest = plot_dir.join(chart_file_name(spec.title, window_name));
        match renderer.render(&timestamps, &values, spec.title, spec.y_label, spec.y_limits, &dest) {
            Ok(()) => {
                log::debug!("rendered {}", dest.display());
                outcome.rendered += 1;
            }
            Err(e) => {
                log::warn!("failed to render '{}' to {}: {:#}", spec.title, dest.display(), e);
                outcome.failed += 1;
            }
        }
    }
    outcome
}

/// Offscreen cairo renderer producing fixed-size PNG line charts.
pub struct CairoChartRenderer {
    width: i32,
    height: i32,
}

const MARGIN_LEFT: f64 = 78.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 46.0;
const MARGIN_BOTTOM: f64 = 44.0;
const Y_TICKS: usize = 5;

impl CairoChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
        }
    }

    fn draw_text(
        cr: &CairoContext,
        text: &str,
        x: f64,
        y: f64,
        size_pt: f64,
        centered: bool,
    ) -> Result<()> {
        let layout = pangocairo::functions::create_layout(cr);
        let mut desc = FontDescription::from_string("Sans");
        desc.set_size((size_pt * pango::SCALE as f64) as i32);
        layout.set_font_description(Some(&desc));
        layout.set_text(text);
        let (w, h) = layout.pixel_size();
        if centered {
            cr.move_to(x - w as f64 / 2.0, y - h as f64 / 2.0);
        } else {
            cr.move_to(x, y - h as f64 / 2.0);
        }
        pangocairo::functions::show_layout(cr, &layout);
        Ok(())
    }

    fn draw_text_right(cr: &CairoContext, text: &str, x: f64, y: f64, size_pt: f64) -> Result<()> {
        let layout = pangocairo::functions::create_layout(cr);
        let mut desc = FontDescription::from_string("Sans");
        desc.set_size((size_pt * pango::SCALE as f64) as i32);
        layout.set_font_description(Some(&desc));
        layout.set_text(text);
        let (w, h) = layout.pixel_size();
        cr.move_to(x - w as f64, y - h as f64 / 2.0);
        pangocairo::functions::show_layout(cr, &layout);
        Ok(())
    }
}

impl ChartRenderer for CairoChartRenderer {
    fn render(
        &self,
        timestamps: &[NaiveDateTime],
        values: &[f64],
        title: &str,
        y_label: &str,
        y_limits: Option<(f64, f64)>,
        dest: &Path,
    ) -> Result<()> {
        anyhow::ensure!(
            !timestamps.is_empty() && timestamps.len() == values.len(),
            "series must be non-empty and aligned ({} timestamps, {} values)",
            timestamps.len(),
            values.len()
        );

        let surface = ImageSurface::create(Format::ARgb32, self.width, self.height)
            .map_err(|e| anyhow::anyhow!("cairo surface creation failed: {}", e))?;
        let cr = CairoContext::new(&surface).context("cairo context creation failed")?;

        // White canvas.
        cr.set_source_rgb(1.0, 1.0, 1.0);
        cr.paint()?;

        let plot_x0 = MARGIN_LEFT;
        let plot_y0 = MARGIN_TOP;
        let plot_w = self.width as f64 - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = self.height as f64 - MARGIN_TOP - MARGIN_BOTTOM;

        // Value range: explicit limits win, otherwise pad the observed range
        // so a flat series still draws away from the frame.
        let (mut y_min, mut y_max) = y_limits.unwrap_or_else(|| {
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            (min, max)
        });
        if !(y_max - y_min).is_normal() {
            y_min -= 1.0;
            y_max += 1.0;
        } else if y_limits.is_none() {
            let pad = (y_max - y_min) * 0.05;
            y_min -= pad;
            y_max += pad;
        }

        let t0 = timestamps[0];
        let span = timestamps
            .last()
            .map(|t| t.signed_duration_since(t0).num_milliseconds() as f64)
            .unwrap_or(0.0);
        let x_of = |t: NaiveDateTime| -> f64 {
            if span <= 0.0 {
                plot_x0 + plot_w / 2.0
            } else {
                let dt = t.signed_duration_since(t0).num_milliseconds() as f64;
                plot_x0 + dt / span * plot_w
            }
        };
        let y_of = |v: f64| -> f64 {
            let frac = ((v - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
            plot_y0 + (1.0 - frac) * plot_h
        };

        // Gridlines and y tick labels.
        cr.set_line_width(1.0);
        for i in 0..=Y_TICKS {
            let v = y_min + (y_max - y_min) * i as f64 / Y_TICKS as f64;
            let y = y_of(v);
            cr.set_source_rgb(0.85, 0.85, 0.85);
            cr.move_to(plot_x0, y);
            cr.line_to(plot_x0 + plot_w, y);
            cr.stroke()?;
            cr.set_source_rgb(0.2, 0.2, 0.2);
            Self::draw_text_right(&cr, &format!("{:.1}", v), plot_x0 - 6.0, y, 9.0)?;
        }

        // Frame.
        cr.set_source_rgb(0.3, 0.3, 0.3);
        cr.rectangle(plot_x0, plot_y0, plot_w, plot_h);
        cr.stroke()?;

        // Series polyline plus point markers.
        cr.set_source_rgb(0.12, 0.47, 0.71);
        cr.set_line_width(1.6);
        cr.move_to(x_of(timestamps[0]), y_of(values[0]));
        for (t, v) in timestamps.iter().zip(values).skip(1) {
            cr.line_to(x_of(*t), y_of(*v));
        }
        cr.stroke()?;
        for (t, v) in timestamps.iter().zip(values) {
            cr.arc(x_of(*t), y_of(*v), 2.2, 0.0, std::f64::consts::TAU);
            cr.fill()?;
        }

        // Title, axis labels, first/last time ticks.
        cr.set_source_rgb(0.1, 0.1, 0.1);
        Self::draw_text(&cr, title, plot_x0 + plot_w / 2.0, MARGIN_TOP / 2.0, 13.0, true)?;
        Self::draw_text(
            &cr,
            "Time",
            plot_x0 + plot_w / 2.0,
            self.height as f64 - MARGIN_BOTTOM / 3.0,
            10.0,
            true,
        )?;
        cr.save()?;
        cr.translate(16.0, plot_y0 + plot_h / 2.0);
        cr.rotate(-std::f64::consts::FRAC_PI_2);
        Self::draw_text(&cr, y_label, 0.0, 0.0, 10.0, true)?;
        cr.restore()?;

        cr.set_source_rgb(0.2, 0.2, 0.2);
        let fmt = "%H:%M:%S";
        Self::draw_text(
            &cr,
            &timestamps[0].format(fmt).to_string(),
            plot_x0,
            plot_y0 + plot_h + 12.0,
            9.0,
            true,
        )?;
        if timestamps.len() > 1 {
            Self::draw_text(
                &cr,
                &timestamps[timestamps.len() - 1].format(fmt).to_string(),
                plot_x0 + plot_w,
                plot_y0 + plot_h + 12.0,
                9.0,
                true,
            )?;
        }

        drop(cr);
        let mut file = File::create(dest)
            .with_context(|| format!("failed to create {}", dest.display()))?;
        surface
            .write_to_png(&mut file)
            .with_context(|| format!("failed to write {}", dest.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use std::sync::Mutex;

    #[test]
    fn chart_file_names_are_slugged_and_suffixed() {
        assert_eq!(chart_file_name("CPU Usage", "hourly"), "cpu_usage_hourly.png");
        assert_eq!(
            chart_file_name("Active Connections", "hourly"),
            "active_connections_hourly.png"
        );
        assert_eq!(chart_file_name("Download", "daily"), "download_daily.png");
    }

    #[derive(Default)]
    struct RecordingRenderer {
        calls: Mutex<Vec<String>>,
        fail_titles: Vec<&'static str>,
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(
            &self,
            timestamps: &[NaiveDateTime],
            values: &[f64],
            title: &str,
            _y_label: &str,
            _y_limits: Option<(f64, f64)>,
            _dest: &Path,
        ) -> Result<()> {
            assert_eq!(timestamps.len(), values.len());
            self.calls.lock().unwrap().push(title.to_string());
            if self.fail_titles.contains(&title) {
                anyhow::bail!("simulated render failure");
            }
            Ok(())
        }
    }

    fn one_sample_buffer() -> WindowBuffer {
        let mut buf = WindowBuffer::default();
        buf.append(Sample {
            timestamp: "2024-03-01T10:00:00".parse().unwrap(),
            cpu_pct: 10.0,
            ram_pct: 20.0,
            disk_pct: 30.0,
            download_mbps: 0.1,
            upload_mbps: 0.2,
            temperature_c: 40.0,
            connections: 5,
        });
        buf
    }

    #[test]
    fn empty_buffer_skips_every_chart() {
        let renderer = RecordingRenderer::default();
        let outcome = render_all(
            &WindowBuffer::default(),
            &renderer,
            Path::new("/tmp"),
            "hourly",
        );
        assert_eq!(outcome.skipped, CHART_SPECS.len());
        assert_eq!(outcome.rendered, 0);
        assert!(renderer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn every_configured_chart_is_rendered() {
        let renderer = RecordingRenderer::default();
        let outcome = render_all(&one_sample_buffer(), &renderer, Path::new("/tmp"), "hourly");
        assert_eq!(outcome.rendered, CHART_SPECS.len());
        assert_eq!(outcome.failed, 0);
        let calls = renderer.calls.lock().unwrap();
        assert_eq!(calls.len(), CHART_SPECS.len());
        assert!(calls.iter().any(|t| t == "Temperature"));
    }

    #[test]
    fn one_failing_chart_does_not_block_the_rest() {
        let renderer = RecordingRenderer {
            fail_titles: vec!["RAM Usage"],
            ..Default::default()
        };
        let outcome = render_all(&one_sample_buffer(), &renderer, Path::new("/tmp"), "hourly");
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.rendered, CHART_SPECS.len() - 1);
        assert_eq!(renderer.calls.lock().unwrap().len(), CHART_SPECS.len());
    }
}
