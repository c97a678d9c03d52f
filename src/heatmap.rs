// =============================================================================
// Heatmap Renderer — dates × tickers returns as a diverging-color SVG
// =============================================================================
//
// Rows are dates (ascending), columns are tickers.  Colors run red → yellow →
// green and are centered on zero.  The color range comes from the 2nd and
// 98th percentiles so a handful of extreme days cannot wash out the rest.
// Cells carry no numeric annotation.
// =============================================================================

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use crate::types::ReturnMatrix;

pub const TITLE: &str = "S&P 500 Stocks Daily Returns Heatmap (Last 30 Days)";

/// Percentiles bounding the color range.
const ROBUST_LOW: f64 = 0.02;
const ROBUST_HIGH: f64 = 0.98;

// Layout, in SVG user units.  Plot area targets a 20:12 figure.
const PLOT_WIDTH: f64 = 1600.0;
const PLOT_HEIGHT: f64 = 760.0;
const LEFT_PAD: f64 = 110.0;
const TOP_PAD: f64 = 60.0;
const BOTTOM_PAD: f64 = 110.0;
const COLORBAR_GAP: f64 = 30.0;
const COLORBAR_WIDTH: f64 = 20.0;
const RIGHT_PAD: f64 = 90.0;

/// RdYlGn anchor colors, from most negative to most positive.
const PALETTE: [(f64, f64, f64); 5] = [
    (165.0, 0.0, 38.0),
    (244.0, 109.0, 67.0),
    (255.0, 255.0, 191.0),
    (102.0, 189.0, 99.0),
    (0.0, 104.0, 55.0),
];

// ---------------------------------------------------------------------------
// Color scaling
// ---------------------------------------------------------------------------

/// Symmetric color range around zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    /// Values at or beyond `±half_range` get the extreme colors.
    pub half_range: f64,
}

impl ColorScale {
    /// Robust scale over the finite values of `values`.
    pub fn robust(values: impl Iterator<Item = f64>) -> Self {
        let mut clean: Vec<f64> = values.filter(|v| v.is_finite()).collect();
        clean.sort_by(|a, b| a.total_cmp(b));

        let lo = percentile(&clean, ROBUST_LOW);
        let hi = percentile(&clean, ROBUST_HIGH);
        let half_range = hi.abs().max(lo.abs());

        Self {
            half_range: if half_range > 0.0 { half_range } else { 1e-9 },
        }
    }

    /// Position of `v` on the colormap: 0.0 is the most negative color, 0.5
    /// is neutral, 1.0 the most positive.
    pub fn position(&self, v: f64) -> f64 {
        (0.5 + v / (2.0 * self.half_range)).clamp(0.0, 1.0)
    }

    pub fn color(&self, v: f64) -> (u8, u8, u8) {
        colormap(self.position(v))
    }
}

/// Linear-interpolated quantile of an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() as f64 - 1.0);
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    if idx + 1 >= sorted.len() {
        sorted[idx]
    } else {
        sorted[idx] + (sorted[idx + 1] - sorted[idx]) * frac
    }
}

fn colormap(t: f64) -> (u8, u8, u8) {
    let segments = (PALETTE.len() - 1) as f64;
    let pos = t.clamp(0.0, 1.0) * segments;
    let idx = (pos.floor() as usize).min(PALETTE.len() - 2);
    let frac = pos - idx as f64;
    let (a, b) = (PALETTE[idx], PALETTE[idx + 1]);
    let mix = |x: f64, y: f64| (x + (y - x) * frac).round() as u8;
    (mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

// ---------------------------------------------------------------------------
// SVG rendering
// ---------------------------------------------------------------------------

/// Render `matrix` as a standalone SVG document.
pub fn render_svg(matrix: &ReturnMatrix, title: &str) -> Result<String> {
    let rows = matrix.n_rows();
    let cols = matrix.n_cols();
    if rows == 0 || cols == 0 {
        bail!("cannot render an empty {rows}x{cols} matrix");
    }
    if matrix.rows.iter().any(|r| r.len() != cols) {
        bail!("ragged return matrix: expected {cols} columns per row");
    }

    let scale = ColorScale::robust(matrix.values());
    let cell_w = PLOT_WIDTH / cols as f64;
    let cell_h = PLOT_HEIGHT / rows as f64;
    let width = LEFT_PAD + PLOT_WIDTH + COLORBAR_GAP + COLORBAR_WIDTH + RIGHT_PAD;
    let height = TOP_PAD + PLOT_HEIGHT + BOTTOM_PAD;
    let tick_font = cell_w.min(11.0).max(4.0);
    let date_font = cell_h.min(11.0).max(4.0);

    let mut svg = String::new();
    write!(
        svg,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}"><style>text{{font-family:Arial,sans-serif;fill:#333}}</style><rect width="100%" height="100%" fill="#ffffff" />"##,
        w = width,
        h = height
    )?;

    write!(
        svg,
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" font-size="18">{t}</text>"#,
        x = LEFT_PAD + PLOT_WIDTH / 2.0,
        y = TOP_PAD / 2.0 + 6.0,
        t = escape_xml(title)
    )?;

    // Cells.
    for (r, row) in matrix.rows.iter().enumerate() {
        let y = TOP_PAD + r as f64 * cell_h;
        for (c, v) in row.iter().enumerate() {
            let (red, green, blue) = scale.color(*v);
            write!(
                svg,
                r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="rgb({red},{green},{blue})" />"#,
                x = LEFT_PAD + c as f64 * cell_w,
                y = y,
                w = cell_w,
                h = cell_h
            )?;
        }
    }

    // Date labels on the left.
    for (r, date) in matrix.dates.iter().enumerate() {
        write!(
            svg,
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end" dominant-baseline="middle" font-size="{f:.1}">{d}</text>"#,
            x = LEFT_PAD - 6.0,
            y = TOP_PAD + (r as f64 + 0.5) * cell_h,
            f = date_font,
            d = date.format("%Y-%m-%d")
        )?;
    }

    // Ticker labels below, rotated to read bottom-up.
    let label_y = TOP_PAD + PLOT_HEIGHT + 6.0;
    for (c, ticker) in matrix.tickers.iter().enumerate() {
        let x = LEFT_PAD + (c as f64 + 0.5) * cell_w;
        write!(
            svg,
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end" dominant-baseline="middle" font-size="{f:.1}" transform="rotate(-90 {x:.2} {y:.2})">{t}</text>"#,
            x = x,
            y = label_y,
            f = tick_font,
            t = escape_xml(ticker)
        )?;
    }

    // Axis titles.
    write!(
        svg,
        r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" font-size="14">Stocks</text>"#,
        x = LEFT_PAD + PLOT_WIDTH / 2.0,
        y = height - 14.0
    )?;
    let date_axis_y = TOP_PAD + PLOT_HEIGHT / 2.0;
    write!(
        svg,
        r#"<text x="18" y="{y:.2}" text-anchor="middle" font-size="14" transform="rotate(-90 18 {y:.2})">Date</text>"#,
        y = date_axis_y
    )?;

    write_colorbar(&mut svg, &scale)?;

    svg.push_str("</svg>");
    Ok(svg)
}

fn write_colorbar(svg: &mut String, scale: &ColorScale) -> Result<()> {
    const STEPS: usize = 64;
    let x = LEFT_PAD + PLOT_WIDTH + COLORBAR_GAP;
    let step_h = PLOT_HEIGHT / STEPS as f64;

    // Top of the bar is the most positive value.
    for i in 0..STEPS {
        let t = 1.0 - (i as f64 + 0.5) / STEPS as f64;
        let (r, g, b) = colormap(t);
        write!(
            svg,
            r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="rgb({r},{g},{b})" />"#,
            x = x,
            y = TOP_PAD + i as f64 * step_h,
            w = COLORBAR_WIDTH,
            h = step_h + 0.5
        )?;
    }

    let ticks = [
        (TOP_PAD, scale.half_range),
        (TOP_PAD + PLOT_HEIGHT / 2.0, 0.0),
        (TOP_PAD + PLOT_HEIGHT, -scale.half_range),
    ];
    for (y, v) in ticks {
        write!(
            svg,
            r#"<text x="{x:.2}" y="{y:.2}" dominant-baseline="middle" font-size="11">{v}</text>"#,
            x = x + COLORBAR_WIDTH + 5.0,
            y = y,
            v = format_percentage(v)
        )?;
    }
    Ok(())
}

fn format_percentage(value: f64) -> String {
    format!("{:+.1}%", value * 100.0)
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Render, write to `path` and optionally open the platform viewer.
///
/// Errors are logged, never returned.
pub fn show(matrix: &ReturnMatrix, path: &Path, open_viewer: bool) -> Option<PathBuf> {
    match write_heatmap(matrix, path) {
        Ok(()) => info!(path = %path.display(), "heatmap written"),
        Err(e) => {
            let reason = format!("{e:#}");
            error!(error = %reason, "error creating heatmap");
            return None;
        }
    }

    if open_viewer {
        if let Err(e) = open_in_viewer(path) {
            let reason = format!("{e:#}");
            error!(error = %reason, path = %path.display(), "could not open heatmap viewer");
        }
    }
    Some(path.to_path_buf())
}

fn write_heatmap(matrix: &ReturnMatrix, path: &Path) -> Result<()> {
    let svg = render_svg(matrix, TITLE)?;
    std::fs::write(path, svg)
        .with_context(|| format!("failed to write heatmap to {}", path.display()))
}

fn open_in_viewer(path: &Path) -> Result<()> {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };

    cmd.arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to launch viewer")?;
    Ok(())
}
