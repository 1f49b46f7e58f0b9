use crate::error::AppError;
use crate::models::predict_types::{ImageReference, ImageSource};
use tauri_plugin_dialog::DialogExt;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Outcome of one acquisition gesture. Denial and cancellation both
/// abort before the workflow touches its state.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Image(ImageReference),
    Cancelled,
    Denied,
}

/// Permission check performed before the native picker is invoked.
pub trait PermissionGate: Send + Sync {
    fn is_granted(&self, source: ImageSource) -> bool;
}

/// Native picker. `Ok(None)` means the user dismissed it.
pub trait ImagePicker: Send + Sync {
    fn pick(&self, source: ImageSource) -> Result<Option<ImageReference>, AppError>;
}

/// Desktop permission model: the file dialog needs no runtime grant,
/// and there is no camera capture path, so `Camera` reports denied and
/// the workflow aborts silently.
pub struct DesktopPermissions;

impl PermissionGate for DesktopPermissions {
    fn is_granted(&self, source: ImageSource) -> bool {
        match source {
            ImageSource::Library => true,
            ImageSource::Camera => false,
        }
    }
}

/// File picker backed by the dialog plugin.
pub struct DialogPicker {
    app: tauri::AppHandle,
}

impl DialogPicker {
    pub fn new(app: tauri::AppHandle) -> Self {
        Self { app }
    }
}

impl ImagePicker for DialogPicker {
    fn pick(&self, _source: ImageSource) -> Result<Option<ImageReference>, AppError> {
        let picked = self
            .app
            .dialog()
            .file()
            .set_title("Select a leaf photo")
            .add_filter("Images", IMAGE_EXTENSIONS)
            .blocking_pick_file();

        match picked {
            Some(file) => {
                let path = file.into_path().map_err(|e| AppError {
                    message: format!("Unsupported picker path: {}", e),
                })?;
                Ok(Some(ImageReference::from_path(path)))
            }
            None => Ok(None),
        }
    }
}
