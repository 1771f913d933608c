//! Plotters-powered strain chart widget for Ratatui.
//!
//! Why Plotters instead of Ratatui's built-in `Chart` widget?
//! - nicer axis + mesh rendering
//! - less manual work for ticks/labels
//! - line series of thousands of points stay cheap to draw
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::domain::Detector;

/// One detector's line.
pub struct ChartTrace<'a> {
    /// `(seconds from trigger, amplitude)`
    pub points: &'a [(f64, f64)],
    pub color: RGBColor,
}

/// A lightweight, render-only chart description.
///
/// All series and bounds are computed outside the render call, which keeps
/// `render()` focused on drawing.
pub struct StrainChart<'a> {
    pub traces: &'a [ChartTrace<'a>],
    /// X bounds (seconds relative to the trigger).
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: String,
    /// Formatting of tick labels.
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

impl<'a> Widget for StrainChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // When the available area is too small, Plotters may fail to build a chart.
        // In that case, we render a small hint rather than panicking.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;

        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            // Mesh lines add clutter at terminal resolution; axes and labels are enough.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(&self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            // Trigger time marker, drawn first so traces stay on top.
            if x0 < 0.0 && x1 > 0.0 {
                let marker = RGBColor(110, 110, 110);
                chart.draw_series(LineSeries::new([(0.0, y0), (0.0, y1)], &marker))?;
            }

            for trace in self.traces {
                chart.draw_series(LineSeries::new(trace.points.iter().copied(), &trace.color))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}

/// Plot color for a detector, shared by the chart and the legend.
pub fn detector_color(detector: &Detector) -> RGBColor {
    match detector.as_str() {
        "H1" => RGBColor(255, 90, 90),
        "L1" => RGBColor(80, 170, 255),
        "V1" => RGBColor(190, 120, 255),
        "G1" => RGBColor(120, 220, 120),
        "K1" => RGBColor(255, 200, 60),
        _ => RGBColor(220, 220, 220),
    }
}

pub fn legend_color(detector: &Detector) -> Color {
    let RGBColor(r, g, b) = detector_color(detector);
    Color::Rgb(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legend_matches_chart_color() {
        let l1 = Detector::new("L1");
        assert_eq!(legend_color(&l1), Color::Rgb(80, 170, 255));
        assert_ne!(detector_color(&Detector::new("H1")), detector_color(&l1));
    }

    #[test]
    fn small_area_renders_hint_instead_of_chart() {
        let area = Rect::new(0, 0, 10, 4);
        let mut buf = Buffer::empty(area);
        let traces: [ChartTrace; 0] = [];
        StrainChart {
            traces: &traces,
            x_bounds: [-0.1, 0.1],
            y_bounds: [-1.0, 1.0],
            x_label: "t (s)",
            y_label: "strain".to_string(),
            fmt_x: |v| format!("{v:.2}"),
            fmt_y: |v| format!("{v:.1}"),
        }
        .render(area, &mut buf);
        assert_eq!(buf[(0, 0)].symbol(), "C");
    }
}
