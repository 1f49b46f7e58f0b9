mod commands;
mod error;
mod models;
mod services;

use services::transport::{endpoint_from_env, TransportClient};
use services::workflow::PredictionWorkflow;
use tauri::{Emitter, Manager};

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(
            tauri_plugin_log::Builder::default()
                .level(log::LevelFilter::Info)
                .build(),
        )
        .setup(|app| {
            let endpoint = endpoint_from_env();
            let transport = TransportClient::new(&endpoint)?;
            log::info!("prediction endpoint: {}", transport.endpoint());

            let handle = app.handle().clone();
            let workflow = PredictionWorkflow::new(transport).with_observer(move |state| {
                // Fire and forget; the frontend can always re-query.
                let _ = handle.emit("workflow-state", state.clone());
            });
            app.manage(workflow);

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::predictor::acquire_image,
            commands::predictor::acquire_and_predict,
            commands::predictor::submit_image,
            commands::predictor::get_workflow_state,
            commands::predictor::get_selected_image,
            commands::predictor::clear_prediction,
            commands::image::get_image_preview,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
