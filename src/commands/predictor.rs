use crate::error::AppError;
use crate::models::predict_types::{ImageReference, ImageSource, WorkflowState};
use crate::services::acquisition::{Acquisition, DesktopPermissions, DialogPicker};
use crate::services::workflow::PredictionWorkflow;
use tauri::{AppHandle, State};

/// Open the native picker for `source`. Permission denial and user
/// cancellation both come back as `None`; the frontend shows nothing.
#[tauri::command]
pub async fn acquire_image(
    app: AppHandle,
    workflow: State<'_, PredictionWorkflow>,
    source: ImageSource,
) -> Result<Option<ImageReference>, AppError> {
    match acquire(app, workflow.inner().clone(), source).await? {
        Acquisition::Image(image) => Ok(Some(image)),
        Acquisition::Cancelled | Acquisition::Denied => Ok(None),
    }
}

/// The one-gesture flow: pick an image, then submit it. If the picker
/// was dismissed or denied, the current state is returned unchanged.
#[tauri::command]
pub async fn acquire_and_predict(
    app: AppHandle,
    workflow: State<'_, PredictionWorkflow>,
    source: ImageSource,
) -> Result<WorkflowState, AppError> {
    let workflow = workflow.inner().clone();
    match acquire(app, workflow.clone(), source).await? {
        Acquisition::Image(image) => workflow.submit(image).await,
        Acquisition::Cancelled | Acquisition::Denied => Ok(workflow.state()),
    }
}

/// Submit an already-acquired image by path. Name and MIME type fall
/// back to the transport defaults when not supplied.
#[tauri::command]
pub async fn submit_image(
    workflow: State<'_, PredictionWorkflow>,
    path: String,
    file_name: Option<String>,
    mime_type: Option<String>,
) -> Result<WorkflowState, AppError> {
    let mut image = ImageReference::from_path(path);
    if file_name.is_some() {
        image.file_name = file_name;
    }
    if mime_type.is_some() {
        image.mime_type = mime_type;
    }
    workflow.submit(image).await
}

#[tauri::command]
pub fn get_workflow_state(workflow: State<'_, PredictionWorkflow>) -> WorkflowState {
    workflow.state()
}

#[tauri::command]
pub fn get_selected_image(workflow: State<'_, PredictionWorkflow>) -> Option<ImageReference> {
    workflow.current_image()
}

#[tauri::command]
pub fn clear_prediction(workflow: State<'_, PredictionWorkflow>) {
    workflow.clear();
}

async fn acquire(
    app: AppHandle,
    workflow: PredictionWorkflow,
    source: ImageSource,
) -> Result<Acquisition, AppError> {
    // The dialog blocks its thread until dismissed.
    tokio::task::spawn_blocking(move || {
        let picker = DialogPicker::new(app);
        workflow.start_acquisition(source, &DesktopPermissions, &picker)
    })
    .await
    .map_err(|e| AppError {
        message: format!("Task join failed: {}", e),
    })?
}
