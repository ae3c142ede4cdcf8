//! ASCII light curves for terminal output.
//!
//! Fixed-size character grid, deterministic (golden-testable):
//! - time on x, magnitude on y with the brightest (smallest) value on top
//! - one marker per filter, consecutive points of a filter joined with `.`

use std::collections::BTreeMap;

use crate::io::CurvePoint;

const FALLBACK_MARKERS: [char; 6] = ['*', '+', 'x', '#', '@', '%'];

/// Render a light curve of calibrated points.
pub fn render_light_curve(points: &[CurvePoint], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (t_min, t_max) = match range(points.iter().map(|p| p.time)) {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((lo, hi)) => (lo - 0.5, hi + 0.5),
        None => (0.0, 1.0),
    };
    let (m_min, m_max) = range(points.iter().map(|p| p.magnitude)).unwrap_or((0.0, 1.0));
    let (m_min, m_max) = pad_range(m_min, m_max, 0.05);

    let mut by_filter: BTreeMap<&str, Vec<&CurvePoint>> = BTreeMap::new();
    for p in points.iter().filter(|p| p.time.is_finite() && p.magnitude.is_finite()) {
        by_filter.entry(p.filter.as_str()).or_default().push(p);
    }
    let markers = assign_markers(by_filter.keys().copied());

    let mut grid = vec![vec![' '; width]; height];
    let cell = |p: &CurvePoint| {
        (
            map_x(p.time, t_min, t_max, width),
            map_y(p.magnitude, m_min, m_max, height),
        )
    };

    // Lines first so markers overlay them.
    for series in by_filter.values_mut() {
        series.sort_by(|a, b| a.time.total_cmp(&b.time));
        for pair in series.windows(2) {
            let (x0, y0) = cell(pair[0]);
            let (x1, y1) = cell(pair[1]);
            draw_line(&mut grid, x0, y0, x1, y1, '.');
        }
    }
    for (filter, series) in &by_filter {
        let marker = markers.get(filter).copied().unwrap_or('o');
        for p in series {
            let (x, y) = cell(*p);
            grid[y][x] = marker;
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Light curve: time=[{t_min:.3}, {t_max:.3}] | mag=[{m_min:.2}, {m_max:.2}] (bright at top)\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    let legend: Vec<String> = markers.iter().map(|(f, m)| format!("{m}={f}")).collect();
    out.push_str(&format!("Markers: {}\n", legend.join(" ")));
    out
}

/// First character of the filter name when free, else a fallback symbol.
fn assign_markers<'a>(filters: impl Iterator<Item = &'a str>) -> BTreeMap<&'a str, char> {
    let mut used = Vec::new();
    let mut fallback = FALLBACK_MARKERS.iter().copied();
    let mut out = BTreeMap::new();

    for filter in filters {
        let preferred = filter.chars().find(|c| c.is_ascii_alphanumeric());
        let marker = match preferred {
            Some(c) if !used.contains(&c) => c,
            _ => fallback.find(|c| !used.contains(c)).unwrap_or('o'),
        };
        used.push(marker);
        out.insert(filter, marker);
    }
    out
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    (min.is_finite() && max.is_finite()).then_some((min, max))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

/// Brightest magnitude maps to row 0.
fn map_y(mag: f64, m_min: f64, m_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((mag - m_min) / (m_max - m_min)).clamp(0.0, 1.0);
    (u * (height as f64 - 1.0)).round() as usize
}

/// Integer line drawing (Bresenham-ish). Only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
