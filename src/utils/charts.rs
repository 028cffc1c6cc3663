//! SVG Chart Generator for Training Histories
//!
//! Two side-by-side panels per figure: loss on the left (y fixed to
//! [0, 2.2]) and accuracy on the right (y fixed to [0.25, 1.0]). Several runs
//! can share a figure; each series label carries the run's suffix.

use std::fs;
use std::path::Path;

use crate::training::History;

/// Chart styling constants
const PANEL_WIDTH: f64 = 600.0;
const CHART_HEIGHT: f64 = 400.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 50.0;
const MARGIN_LEFT: f64 = 60.0;

const LOSS_RANGE: (f64, f64) = (0.0, 2.2);
const ACCURACY_RANGE: (f64, f64) = (0.25, 1.0);

const PALETTE: [&str; 6] = ["#3498db", "#e67e22", "#2ecc71", "#e74c3c", "#9b59b6", "#7f8c8d"];
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// A named line on a panel
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub color: String,
}

/// Label with the experiment suffix: `train` + `baseline` -> `train_baseline`
pub fn series_label(base: &str, exp_name: &str) -> String {
    if exp_name.is_empty() || exp_name.starts_with('_') {
        format!("{}{}", base, exp_name)
    } else {
        format!("{}_{}", base, exp_name)
    }
}

/// Loss and accuracy series for each `(exp_name, history)` run
pub fn history_series(runs: &[(&str, &History)]) -> (Vec<DataSeries>, Vec<DataSeries>) {
    let mut loss = Vec::new();
    let mut accuracy = Vec::new();
    let mut colors = PALETTE.iter().cycle();

    for (exp_name, history) in runs {
        let mut next_color = || colors.next().copied().unwrap_or(COLOR_AXIS).to_string();
        let (train_color, val_color) = (next_color(), next_color());

        loss.push(DataSeries {
            name: series_label("train", exp_name),
            values: history.loss.clone(),
            color: train_color.clone(),
        });
        loss.push(DataSeries {
            name: series_label("val", exp_name),
            values: history.val_loss.clone(),
            color: val_color.clone(),
        });
        accuracy.push(DataSeries {
            name: series_label("train accuracy", exp_name),
            values: history.accuracy.clone(),
            color: train_color,
        });
        accuracy.push(DataSeries {
            name: series_label("val accuracy", exp_name),
            values: history.val_accuracy.clone(),
            color: val_color,
        });
    }

    (loss, accuracy)
}

/// Render the two-panel history figure
pub fn render_history_svg(title: &str, runs: &[(&str, &History)]) -> String {
    let (loss, accuracy) = history_series(runs);
    let epochs = runs.iter().map(|(_, h)| h.epochs()).max().unwrap_or(0);
    let width = 2.0 * PANEL_WIDTH;

    let mut svg = String::new();

    // SVG header
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        width, CHART_HEIGHT, width, CHART_HEIGHT
    ));

    // Background
    svg.push_str(&format!(
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        width, CHART_HEIGHT
    ));

    if !title.is_empty() {
        svg.push_str(&format!(
            r#"<text x="{}" y="20" text-anchor="middle" font-family="Arial, sans-serif" font-size="16" font-weight="bold" fill="{}">{}</text>"#,
            width / 2.0, COLOR_TEXT, escape_xml(title)
        ));
    }

    render_panel(&mut svg, 0.0, "loss", LOSS_RANGE, &loss, epochs);
    render_panel(&mut svg, PANEL_WIDTH, "Accuracy", ACCURACY_RANGE, &accuracy, epochs);

    svg.push_str("</svg>");
    svg
}

/// Write the history figure to `output_path`
pub fn plot_history(title: &str, runs: &[(&str, &History)], output_path: &Path) -> std::io::Result<()> {
    fs::write(output_path, render_history_svg(title, runs))
}

fn render_panel(
    svg: &mut String,
    x_offset: f64,
    title: &str,
    (y_min, y_max): (f64, f64),
    series: &[DataSeries],
    epochs: usize,
) {
    let left = x_offset + MARGIN_LEFT;
    let plot_width = PANEL_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let bottom = MARGIN_TOP + plot_height;

    // Epochs are plotted from 0, like array indices
    let x_span = epochs.saturating_sub(1).max(1) as f64;
    let to_x = |epoch: usize| left + (epoch as f64 / x_span) * plot_width;
    let to_y = |v: f64| {
        let v = v.clamp(y_min, y_max);
        bottom - ((v - y_min) / (y_max - y_min)) * plot_height
    };

    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        left + plot_width / 2.0, MARGIN_TOP - 10.0, COLOR_TEXT, escape_xml(title)
    ));

    // Grid lines
    for i in 0..=5 {
        let value = y_min + (i as f64 / 5.0) * (y_max - y_min);
        let y = to_y(value);
        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            left, y, left + plot_width, y, COLOR_GRID
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.2}</text>"#,
            left - 8.0, y + 4.0, COLOR_TEXT, value
        ));
    }

    // Axes
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        left, bottom, left + plot_width, bottom, COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        left, MARGIN_TOP, left, bottom, COLOR_AXIS
    ));

    // X-axis ticks, at most ~10
    let step = (epochs / 10).max(1);
    for epoch in (0..epochs).step_by(step) {
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{}">{}</text>"#,
            to_x(epoch), bottom + 18.0, COLOR_TEXT, epoch
        ));
    }

    for s in series {
        let points: Vec<String> = s
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| format!("{:.2},{:.2}", to_x(i), to_y(v)))
            .collect();
        if points.is_empty() {
            continue;
        }
        svg.push_str(&format!(
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            points.join(" "),
            s.color
        ));
    }

    // Legend
    let mut legend_y = MARGIN_TOP + 8.0;
    for s in series {
        let x = left + plot_width - 170.0;
        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="3"/>"#,
            x, legend_y, x + 20.0, legend_y, s.color
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="11" fill="{}">{}</text>"#,
            x + 26.0, legend_y + 4.0, COLOR_TEXT, escape_xml(&s.name)
        ));
        legend_y += 16.0;
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::EpochMetrics;

    fn history(epochs: usize) -> History {
        let mut h = History::new();
        for e in 0..epochs {
            let t = e as f64;
            h.push(EpochMetrics {
                loss: 2.0 - 0.1 * t,
                accuracy: 0.3 + 0.05 * t,
                val_loss: 2.1 - 0.08 * t,
                val_accuracy: 0.28 + 0.04 * t,
            });
        }
        h
    }

    #[test]
    fn test_series_label_suffix() {
        assert_eq!(series_label("train", ""), "train");
        assert_eq!(series_label("train", "baseline"), "train_baseline");
        assert_eq!(series_label("val accuracy", "_aug"), "val accuracy_aug");
    }

    #[test]
    fn test_history_series_names() {
        let base = history(3);
        let aug = history(2);
        let (loss, accuracy) = history_series(&[("data_augmentation", &aug), ("baseline", &base)]);

        let names: Vec<_> = loss.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["train_data_augmentation", "val_data_augmentation", "train_baseline", "val_baseline"]
        );
        assert_eq!(accuracy[3].name, "val accuracy_baseline");
        assert_eq!(accuracy[3].values.len(), 3);
    }

    #[test]
    fn test_render_contains_both_panels() {
        let h = history(4);
        let svg = render_history_svg("Run <1>", &[("", &h)]);

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(">loss<"));
        assert!(svg.contains(">Accuracy<"));
        assert!(svg.contains("Run &lt;1&gt;"));
        assert_eq!(svg.matches("<polyline").count(), 4);
    }

    #[test]
    fn test_render_empty_history() {
        let h = History::new();
        let svg = render_history_svg("", &[("x", &h)]);
        assert_eq!(svg.matches("<polyline").count(), 0);
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("\"q\""), "&quot;q&quot;");
    }
}
