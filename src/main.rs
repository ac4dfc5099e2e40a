#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod controller;
mod display;
mod error;
mod model_download;
mod pipeline;
mod render_loop;
mod types;
mod ui;

use anyhow::Result;
use config::AppConfig;
use gpui::Application;

fn main() -> Result<()> {
    env_logger::init();

    let config = AppConfig::from_env();
    log::info!(
        "starting with model dir {}, canvas {}x{}",
        config.model_dir.display(),
        config.canvas_width,
        config.canvas_height
    );

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, config) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
