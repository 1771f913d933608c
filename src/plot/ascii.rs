//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - one line per detector, drawn with the detector's site letter (`H`, `L`, `V`, ...)
//! - the trigger time as a dotted `:` column
//!
//! Where traces cross, the detector drawn first keeps the cell.

use crate::app::pipeline::PreparedEvent;

/// One line of the overlay.
#[derive(Debug, Clone)]
pub struct PlotTrace {
    pub marker: char,
    pub label: String,
    /// `(seconds from trigger, amplitude)`
    pub points: Vec<(f64, f64)>,
}

/// Render every detector of `prepared` over the plotted window.
pub fn render_overlay_plot(prepared: &PreparedEvent, width: usize, height: usize) -> String {
    let gps = prepared.event.gps;
    let traces: Vec<PlotTrace> = prepared
        .traces
        .iter()
        .map(|t| PlotTrace {
            marker: t.series.detector.site().chars().next().unwrap_or('*'),
            label: t.series.detector.to_string(),
            points: t.series.times().zip(&t.series.values).map(|(x, &y)| (x - gps, y)).collect(),
        })
        .collect();
    let (start, end) = prepared.window;
    render_plot(&traces, start - gps, end - gps, width, height)
}

/// Render `traces` over `[x_min, x_max]` seconds.
pub fn render_plot(traces: &[PlotTrace], x_min: f64, x_max: f64, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(3);

    let (y_min, y_max) = y_range(traces).unwrap_or((-1.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    if x_max > x_min {
        for trace in traces {
            draw_trace(&mut grid, trace, x_min, x_max, y_min, y_max);
        }
        if x_min < 0.0 && x_max > 0.0 {
            let col = map_x(0.0, x_min, x_max, width);
            for row in grid.iter_mut() {
                if row[col] == ' ' {
                    row[col] = ':';
                }
            }
        }
    }

    let legend: Vec<String> = traces.iter().map(|t| format!("{}={}", t.marker, t.label)).collect();

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: t=[{x_min:.3}, {x_max:.3}] s from trigger | y=[{y_min:.3}, {y_max:.3}] | {}\n",
        legend.join(" ")
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn y_range(traces: &[PlotTrace]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in traces.iter().flat_map(|t| t.points.iter()) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
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

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_trace(grid: &mut [Vec<char>], trace: &PlotTrace, t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in &trace.points {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, x, yy, trace.marker),
            None if grid[yy][x] == ' ' => grid[yy][x] = trace.marker,
            None => {}
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let traces = vec![PlotTrace {
            marker: 'H',
            label: "H1".to_string(),
            points: vec![(-1.0, 0.0), (1.0, 1.0)],
        }];

        let txt = render_plot(&traces, -1.0, 1.0, 10, 3);
        let expected = concat!(
            "Plot: t=[-1.000, 1.000] s from trigger | y=[-0.050, 1.050] | H=H1\n",
            "     : HHH\n",
            "   HHHH   \n",
            "HHH  :    \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn first_trace_wins_on_overlap() {
        let flat = |marker: char, label: &str| PlotTrace {
            marker,
            label: label.to_string(),
            points: vec![(0.0, 0.0), (1.0, 0.0)],
        };
        let spread = PlotTrace {
            marker: 'V',
            label: "V1".to_string(),
            points: vec![(0.0, 1.0), (1.0, -1.0)],
        };
        let txt = render_plot(&[flat('H', "H1"), flat('L', "L1"), spread], 0.0, 1.0, 11, 5);
        assert!(txt.contains("H=H1 L=L1 V=V1"));
        let body: String = txt.lines().skip(1).collect();
        assert!(body.contains('H'));
        assert!(!body.contains('L'));
        assert!(body.contains('V'));
        // Trigger column only when 0 lies strictly inside the range.
        assert!(!body.contains(':'));
    }
}
