use crate::error::AppError;
use base64::Engine;
use std::path::Path;

const PREVIEW_MAX_DIM: u32 = 1024;

/// Downscaled JPEG preview of the selected image as a data URL, so the
/// frontend can render it without asset-protocol access to the file.
#[tauri::command]
pub fn get_image_preview(path: String) -> Result<String, AppError> {
    let img_path = Path::new(&path);
    if !img_path.exists() {
        return Err("File not found".into());
    }

    let mut img = image::ImageReader::open(img_path)
        .map_err(|e| AppError {
            message: format!("Failed to open image: {}", e),
        })?
        .decode()?;

    if img.width() > PREVIEW_MAX_DIM || img.height() > PREVIEW_MAX_DIM {
        img = img.thumbnail(PREVIEW_MAX_DIM, PREVIEW_MAX_DIM);
    }

    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Jpeg)?;

    let b64 = base64::engine::general_purpose::STANDARD.encode(buffer.into_inner());
    Ok(format!("data:image/jpeg;base64,{}", b64))
}
