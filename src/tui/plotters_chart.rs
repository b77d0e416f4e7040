//! Plotters-powered score-vs-temperature chart widget for Ratatui.
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

/// A lightweight, render-only chart description.
///
/// All series and bounds are computed outside the render call.
pub struct ScoreChart<'a> {
    /// Every ranked planet with a known equilibrium temperature: (eq_temp K, total).
    pub points: &'a [(f64, f64)],
    /// Planets predicted High or Prime (a subset of `points`).
    pub priority: &'a [(f64, f64)],
    /// The planet under the cursor, if it has a temperature.
    pub selected: Option<(f64, f64)>,
    /// Temperate band edges (K), drawn as vertical guides.
    pub band: [f64; 2],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

impl<'a> Widget for ScoreChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
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
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite())
            || x1 <= x0
            || y1 <= y0
        {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 5)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc("eq. temperature (K)")
                .y_desc("total")
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| format!("{v:.0}"))
                .y_label_formatter(&|v| format!("{v:.0}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let band_color = RGBColor(90, 90, 90);
            let priority_color = RGBColor(0, 255, 0);
            let selected_color = RGBColor(255, 255, 0);

            for edge in self.band {
                if edge > x0 && edge < x1 {
                    chart.draw_series(LineSeries::new(
                        [(edge, y0), (edge, y1)],
                        &band_color,
                    ))?;
                }
            }

            chart.draw_series(
                self.points
                    .iter()
                    .map(|&(x, y)| Pixel::new((x, y), WHITE)),
            )?;
            // Pixels rather than circles: the backend scales circle radii badly.
            chart.draw_series(
                self.priority
                    .iter()
                    .map(|&(x, y)| Pixel::new((x, y), priority_color)),
            )?;
            if let Some((x, y)) = self.selected {
                chart.draw_series(std::iter::once(Pixel::new((x, y), selected_color)))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
