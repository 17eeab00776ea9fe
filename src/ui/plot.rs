use eframe::egui::{Color32, Ui};
use egui_plot::{Line, Plot, PlotPoints};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Spectral plot (central panel)
// ---------------------------------------------------------------------------

/// Render the spectral plot in the central panel.
pub fn spectral_plot(ui: &mut Ui, state: &AppState) {
    let view = match &state.view {
        Some(v) => v,
        None => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("Open a cube or spectra file  (File → Open spectra…)");
            });
            return;
        }
    };

    let color_map = &state.color_map;
    let wavelengths = view.wavelengths().as_slice();

    Plot::new("spectral_plot")
        .legend(egui_plot::Legend::default())
        .x_axis_label("Wavelength")
        .y_axis_label("Intensity")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for &idx in state.plotted_indices() {
                let row = view.row(idx);

                // After matching, colour by best-matching material.
                let best = state
                    .matches
                    .as_ref()
                    .and_then(|m| m.best_material(idx))
                    .map(|(material, _)| material);
                let label = best.or_else(|| view.material(idx));

                let color = label
                    .and_then(|material| Some(color_map.as_ref()?.color_for(material)))
                    .unwrap_or(Color32::LIGHT_BLUE);
                let name = label
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("spectrum {idx}"));

                let y_values: Vec<f64> = if state.minmax_scaling {
                    let min = row.iter().cloned().fold(f64::INFINITY, f64::min);
                    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    let range = max - min;
                    if range.abs() < f64::EPSILON {
                        vec![0.0; row.len()]
                    } else {
                        row.iter().map(|&yi| (yi - min) / range).collect()
                    }
                } else {
                    row.to_vec()
                };

                let points: PlotPoints = wavelengths
                    .iter()
                    .zip(y_values.iter())
                    .map(|(&xi, &yi)| [xi, yi])
                    .collect();

                let line = Line::new(points)
                    .name(&name)
                    .color(color)
                    .width(1.5);

                plot_ui.line(line);
            }

            // Descriptor templates as unit-height triangles.
            if state.show_descriptors {
                for set in &state.library {
                    let color = color_map
                        .as_ref()
                        .map(|cm| cm.color_for(set.material()))
                        .unwrap_or(Color32::YELLOW);
                    for descriptor in set.iter() {
                        let (start, peak, stop) = descriptor.breakpoints();
                        let points: PlotPoints = vec![[start, 0.0], [peak, 1.0], [stop, 0.0]].into();
                        plot_ui.line(
                            Line::new(points)
                                .name(format!("{} descriptor", set.material()))
                                .color(color)
                                .width(3.0),
                        );
                    }
                }
            }
        });
}
