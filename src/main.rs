mod api;
mod app;
mod color;
mod config;
mod data;
mod jobs;
mod state;
mod ui;

use app::AutomlFlowApp;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 780.0])
            .with_min_inner_size([700.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "AutoML Flow",
        options,
        Box::new(|cc| {
            // Install image loaders so egui can render the SHAP summary png.
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(AutomlFlowApp::new(cc)))
        }),
    )
}
