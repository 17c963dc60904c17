mod activity_log;
mod app;
mod batch;
mod config;
mod contacts;
mod message;

use app::ReminderApp;
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    // APP__* overrides may live in a local .env
    if let Ok(path) = dotenvy::dotenv() {
        log::info!("Loaded environment overrides from {}", path.display());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([500.0, 300.0])
            .with_min_inner_size([420.0, 280.0]),
        ..Default::default()
    };

    log::info!("Starting WhatsApp Reminder System");
    eframe::run_native(
        "WhatsApp Reminder System",
        options,
        Box::new(|cc| Ok(Box::new(ReminderApp::new(cc)))),
    )
}
