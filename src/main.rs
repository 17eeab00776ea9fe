mod app;
mod color;
mod state;
mod ui;

use app::RustyHsiApp;
use eframe::egui;
use rusty_hsi::config::{AnalysisConfig, DEFAULT_CONFIG_FILE};

fn main() -> eframe::Result {
    env_logger::init();

    let config = AnalysisConfig::load_or_default(DEFAULT_CONFIG_FILE).unwrap_or_else(|e| {
        log::error!("Ignoring {DEFAULT_CONFIG_FILE}: {e}");
        AnalysisConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty HSI – Hyperspectral Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(RustyHsiApp::new(config)))),
    )
}
