use std::path::Path;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use rusty_hsi::data::mask::RegionMask;
use rusty_hsi::descriptor::set::load_library;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – dataset info, material filter, library, match summary
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Spectra");
    ui.separator();

    let Some(view) = &state.view else {
        ui.label("No spectra loaded.");
        return;
    };

    let wavelengths = view.wavelengths();
    ui.label(format!(
        "{}: {} bands, {:.1} – {:.1}",
        state.source_name.as_deref().unwrap_or("spectra"),
        view.n_bands(),
        wavelengths.min(),
        wavelengths.max()
    ));
    if let Some(mask) = &state.mask {
        ui.label(format!("Mask '{}': {} px in region", mask.material(), mask.count()));
    }
    ui.separator();

    let materials: Vec<String> = view.unique_materials().into_iter().collect();
    let library = state.library.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Material filter ----
            egui::CollapsingHeader::new(RichText::new(format!(
                "Materials  ({}/{})",
                state.material_filter.len(),
                materials.len()
            ))
            .strong())
            .id_salt("materials")
            .default_open(true)
            .show(ui, |ui: &mut Ui| {
                if materials.is_empty() {
                    ui.label("Unlabelled spectra (apply a mask to label them).");
                    return;
                }
                ui.horizontal(|ui: &mut Ui| {
                    if ui.small_button("All").clicked() {
                        state.select_all();
                    }
                    if ui.small_button("None").clicked() {
                        state.select_none();
                    }
                });
                for material in &materials {
                    let mut text = RichText::new(material);
                    if let Some(cm) = &state.color_map {
                        text = text.color(cm.color_for(material));
                    }
                    let mut checked = state.material_filter.contains(material);
                    if ui.checkbox(&mut checked, text).changed() {
                        state.toggle_material(material);
                    }
                }
            });

            // ---- Descriptor library ----
            egui::CollapsingHeader::new(RichText::new(format!("Descriptors  ({} sets)", library.len())).strong())
                .id_salt("library")
                .default_open(false)
                .show(ui, |ui: &mut Ui| {
                    if library.is_empty() {
                        ui.label("No library loaded.");
                    }
                    for set in &library {
                        ui.strong(set.material());
                        for descriptor in set.iter() {
                            let (start, peak, stop) = descriptor.breakpoints();
                            ui.label(format!("  ▲ {start} / {peak} / {stop}"));
                        }
                    }
                });

            // ---- Match summary ----
            if let Some(matches) = &state.matches {
                ui.separator();
                ui.strong(format!("Matches over {} spectra", matches.len()));
                egui::Grid::new("match_summary")
                    .striped(true)
                    .show(ui, |ui: &mut Ui| {
                        ui.label("material");
                        ui.label("scored");
                        ui.label("mean");
                        ui.label("best");
                        ui.end_row();
                        for row in matches.summary() {
                            let mut name = RichText::new(&row.material);
                            if let Some(cm) = &state.color_map {
                                name = name.color(cm.color_for(&row.material));
                            }
                            ui.label(name);
                            ui.label(row.scored.to_string());
                            ui.label(
                                row.mean_score
                                    .map(|s| format!("{s:.3}"))
                                    .unwrap_or_else(|| "–".into()),
                            );
                            ui.label(row.wins.to_string());
                            ui.end_row();
                        }
                    });
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open spectra…").clicked() {
                open_spectra_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open mask…").clicked() {
                open_mask_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open descriptor library…").clicked() {
                open_library_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Export spectra…").clicked() {
                export_spectra_dialog(state);
                ui.close_menu();
            }
            if ui.button("Export matches…").clicked() {
                export_matches_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(source), Some(view)) = (&state.source, &state.view) {
            ui.label(format!(
                "{} spectra loaded, {} shown, {} visible",
                source.len(),
                view.len(),
                state.visible_indices.len()
            ));
        }

        ui.separator();

        let n = state.config.subsample.n;
        if ui
            .selectable_label(state.subsampled, format!("Subsample ({n})"))
            .clicked()
        {
            state.toggle_subsample();
        }

        if state.mask.is_some() && ui.button("Clear mask").clicked() {
            state.clear_mask();
        }

        if ui
            .selectable_label(state.minmax_scaling, "Min-Max Scaling")
            .clicked()
        {
            state.minmax_scaling = !state.minmax_scaling;
        }

        if ui
            .selectable_label(state.show_descriptors, "Descriptors")
            .clicked()
        {
            state.show_descriptors = !state.show_descriptors;
        }

        if ui.button("Run matching").clicked() {
            report(state, "Matching failed", |state| state.run_matching());
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

/// Run `action`, logging and surfacing any error in the status line.
fn report(state: &mut AppState, what: &str, action: impl FnOnce(&mut AppState) -> anyhow::Result<()>) {
    match action(state) {
        Ok(()) => state.status_message = None,
        Err(e) => {
            log::error!("{what}: {e:#}");
            state.status_message = Some(format!("{what}: {e:#}"));
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("region")
        .to_string()
}

pub fn open_spectra_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open spectra or cube")
        .add_filter("Supported files", &["hdr", "parquet", "pq", "json"])
        .add_filter("ENVI header", &["hdr"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        report(state, "Failed to load file", |state| {
            let spectra = rusty_hsi::data::loader::load_file(&path)?;
            state.set_source(spectra, file_stem(&path));
            Ok(())
        });
    }
}

/// The mask's file stem becomes its material label.
pub fn open_mask_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open region mask")
        .add_filter("PNG", &["png"])
        .pick_file();

    if let Some(path) = file {
        report(state, "Failed to apply mask", |state| {
            let mask = RegionMask::from_image_with_threshold(
                &path,
                &file_stem(&path),
                state.config.mask_threshold,
            )?;
            state.set_mask(mask)
        });
    }
}

pub fn open_library_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open descriptor library")
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        report(state, "Failed to load library", |state| {
            state.set_library(load_library(&path)?);
            Ok(())
        });
    }
}

pub fn export_spectra_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export spectra")
        .add_filter("Parquet", &["parquet"])
        .set_file_name("spectra.parquet")
        .save_file();

    if let Some(path) = file {
        report(state, "Export failed", |state| state.export_view(&path));
    }
}

pub fn export_matches_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export matches")
        .add_filter("CSV", &["csv"])
        .set_file_name("matches.csv")
        .save_file();

    if let Some(path) = file {
        report(state, "Export failed", |state| state.export_matches(&path));
    }
}
