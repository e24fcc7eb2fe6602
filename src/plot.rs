use std::path::Path;

use anyhow::{Context, Result};
use plotters::prelude::*;

use crate::color::{generate_palette, ColorMap, GRAY};
use crate::data::model::Value;

const SIZE: (u32, u32) = (900, 600);
const FONT: &str = "sans-serif";
const CAPTION_SIZE: u32 = 26;
const POINT_RADIUS: u32 = 3;

/// Value range with some headroom; never empty.
fn padded_range(values: impl IntoIterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo <= f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (if include_zero && lo == 0.0 { 0.0 } else { lo - pad }, hi + pad)
}

/// Category name under slot `v` of a segmented axis.
fn slot_label(names: &[String], v: &SegmentValue<usize>) -> String {
    match v {
        SegmentValue::CenterOf(i) => names.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

fn legend_swatch(color: RGBColor) -> impl Fn((i32, i32)) -> Rectangle<(i32, i32)> {
    move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled())
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

/// One labelled bar per category, coloured through `colors`, with a legend
/// naming each category.
pub fn bar_chart(
    path: &Path,
    title: &str,
    bars: &[(Value, f64)],
    colors: &ColorMap,
) -> Result<()> {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let names: Vec<String> = bars.iter().map(|(v, _)| v.to_string()).collect();
    let (_, top) = padded_range(bars.iter().map(|(_, h)| *h), true);
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, CAPTION_SIZE))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d((0..bars.len()).into_segmented(), 0.0..top)?;

    let label = |v: &SegmentValue<usize>| slot_label(&names, v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len() + 1)
        .x_label_formatter(&label)
        .x_desc("Cell type")
        .y_desc("Frequency")
        .draw()?;

    for (i, ((category, height), name)) in bars.iter().zip(&names).enumerate() {
        let color = colors.color_for(category);
        let mut bar = Rectangle::new(
            [
                (SegmentValue::Exact(i), 0.0),
                (SegmentValue::Exact(i + 1), *height),
            ],
            color.filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        chart
            .draw_series(std::iter::once(bar))?
            .label(name.as_str())
            .legend(legend_swatch(color));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()?;

    root.present()
        .with_context(|| format!("writing {}", path.display()))
}

/// Box and whiskers per named series: box from the first to the third
/// quartile, median line, whiskers at the 1.5 IQR fences. Empty series keep
/// their slot but draw nothing.
pub fn box_plot(path: &Path, title: &str, series: &[(String, Vec<f64>)]) -> Result<()> {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let quartiles: Vec<Option<Quartiles>> = series
        .iter()
        .map(|(_, values)| {
            let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
            (!finite.is_empty()).then(|| Quartiles::new(&finite))
        })
        .collect();
    let (lo, hi) = padded_range(
        quartiles
            .iter()
            .flatten()
            .flat_map(|q| q.values())
            .map(f64::from),
        false,
    );

    let names: Vec<String> = series.iter().map(|(name, _)| name.clone()).collect();
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, CAPTION_SIZE))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d((0..series.len()).into_segmented(), lo as f32..hi as f32)?;

    let label = |v: &SegmentValue<usize>| slot_label(&names, v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(series.len() + 1)
        .x_label_formatter(&label)
        .x_desc("Cell")
        .y_desc("Counts")
        .draw()?;

    let palette = generate_palette(series.len());
    chart.draw_series(quartiles.iter().enumerate().filter_map(|(i, q)| {
        let color = palette.get(i).copied().unwrap_or(GRAY);
        q.as_ref().map(|q| {
            Boxplot::new_vertical(SegmentValue::CenterOf(i), q)
                .width(40)
                .whisker_width(0.5)
                .style(color.stroke_width(2))
        })
    }))?;

    root.present()
        .with_context(|| format!("writing {}", path.display()))
}

/// Points coloured by their label, one legend entry per label.
pub fn scatter(
    path: &Path,
    title: &str,
    points: &[[f64; 2]],
    labels: &[Value],
    colors: &ColorMap,
) -> Result<()> {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (x0, x1) = padded_range(points.iter().map(|p| p[0]), false);
    let (y0, y1) = padded_range(points.iter().map(|p| p[1]), false);
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, CAPTION_SIZE))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    chart
        .configure_mesh()
        .x_desc("UMAP1")
        .y_desc("UMAP2")
        .draw()?;

    for (value, color) in colors.legend_entries() {
        let members = points
            .iter()
            .zip(labels)
            .filter(|(_, label)| *label == value)
            .map(|(p, _)| Circle::new((p[0], p[1]), POINT_RADIUS, color.filled()));
        chart
            .draw_series(members)?
            .label(value.to_string())
            .legend(legend_swatch(color));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()?;

    root.present()
        .with_context(|| format!("writing {}", path.display()))
}
