use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_NAME: &str = "image.jpg";
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Where an image came from. Desktop builds only wire up `Library`;
/// `Camera` exists for mobile targets and permission gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    Camera,
    Library,
}

/// Handle to a locally stored image picked or captured by the user.
/// Read once when the prediction request is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReference {
    pub path: PathBuf,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl ImageReference {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        let mime_type = mime_from_extension(&path);
        Self {
            path,
            file_name,
            mime_type,
        }
    }

    /// Part name used when the transport layer has nothing better.
    pub fn file_name_or_default(&self) -> &str {
        self.file_name.as_deref().unwrap_or(DEFAULT_FILE_NAME)
    }

    pub fn mime_type_or_default(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE)
    }
}

fn mime_from_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: String,
    /// Percentage in 0-100 as reported by the classifier backend.
    pub confidence: f64,
}

impl PredictionResult {
    /// Display form, e.g. `87.50%`.
    pub fn confidence_label(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}

/// The single source of truth for what the frontend should display
/// about the prediction process. One instance per session, overwritten
/// on every new acquisition or clear.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "status", content = "data")]
pub enum WorkflowState {
    #[default]
    Idle,
    Predicting,
    Succeeded(PredictionResult),
    Failed {
        message: String,
    },
}

impl WorkflowState {
    pub fn is_predicting(&self) -> bool {
        matches!(self, WorkflowState::Predicting)
    }
}

/// Wire shape of a successful classifier response. Both fields are
/// optional at the serde level so a missing field reconciles to a
/// prediction failure instead of a deserialization error.
#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    pub class: Option<String>,
    pub confidence: Option<f64>,
}
