//! Trend charts - small SVG line plots of the metrics history

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::history::MetricsHistory;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 480.0;
const MARGIN: f64 = 56.0;

const PALETTE: [&str; 4] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728"];

pub const ACCURACY_CHART: &str = "accuracy_trend.svg";
pub const METRICS_CHART: &str = "metrics_trend.svg";

/// Write both charts under `dir`; fewer than two points writes nothing
pub fn render_trends(history: &MetricsHistory, dir: &Path) -> io::Result<Vec<PathBuf>> {
    if history.len() < 2 {
        return Ok(Vec::new());
    }

    fs::create_dir_all(dir)?;

    let accuracy = dir.join(ACCURACY_CHART);
    fs::write(
        &accuracy,
        line_chart("Model Accuracy Over Time", "Accuracy", &[("Accuracy", &history.accuracy)]),
    )?;

    let metrics = dir.join(METRICS_CHART);
    fs::write(
        &metrics,
        line_chart(
            "Model Performance Metrics Over Time",
            "Score",
            &[
                ("Accuracy", &history.accuracy),
                ("Precision", &history.precision),
                ("Recall", &history.recall),
                ("F1 Score", &history.f1_score),
            ],
        ),
    )?;

    Ok(vec![accuracy, metrics])
}

/// Y axis is fixed to [0, 1]; points are spaced evenly along X
fn line_chart(title: &str, y_label: &str, series: &[(&str, &Vec<f64>)]) -> String {
    let plot_w = WIDTH - 2.0 * MARGIN;
    let plot_h = HEIGHT - 2.0 * MARGIN;
    let x_of = |i: usize, n: usize| MARGIN + plot_w * i as f64 / (n.max(2) - 1) as f64;
    let y_of = |v: f64| MARGIN + plot_h * (1.0 - v.clamp(0.0, 1.0));

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="18">{}</text>"#,
        WIDTH / 2.0,
        MARGIN / 2.0,
        title
    );

    // grid
    for tick in 0..=5 {
        let v = tick as f64 / 5.0;
        let y = y_of(v);
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#dddddd"/><text x="{:.1}" y="{:.1}" text-anchor="end" font-size="11">{v:.1}</text>"##,
            WIDTH - MARGIN,
            MARGIN - 6.0,
            y + 4.0
        );
    }
    let _ = writeln!(
        svg,
        r#"<text x="14" y="{:.1}" transform="rotate(-90 14 {:.1})" text-anchor="middle" font-size="13">{}</text>"#,
        HEIGHT / 2.0,
        HEIGHT / 2.0,
        y_label
    );

    for (k, (name, values)) in series.iter().enumerate() {
        let color = PALETTE[k % PALETTE.len()];
        let points: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| format!("{:.1},{:.1}", x_of(i, values.len()), y_of(v)))
            .collect();

        let _ = writeln!(
            svg,
            r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{}"/>"#,
            points.join(" ")
        );
        for point in &points {
            if let Some((x, y)) = point.split_once(',') {
                let _ = writeln!(svg, r#"<circle cx="{x}" cy="{y}" r="3" fill="{color}"/>"#);
            }
        }

        // legend
        let ly = MARGIN + 16.0 * k as f64;
        let _ = writeln!(
            svg,
            r#"<rect x="{:.1}" y="{:.1}" width="10" height="10" fill="{color}"/><text x="{:.1}" y="{:.1}" font-size="12">{name}</text>"#,
            WIDTH - MARGIN - 110.0,
            ly,
            WIDTH - MARGIN - 95.0,
            ly + 9.0
        );
    }

    svg.push_str("</svg>\n");
    svg
}
