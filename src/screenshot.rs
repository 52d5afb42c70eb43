//! PNG persistence for captured frames

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};

use crate::backend::CapturedFrame;
use crate::error::{ArError, Result};

/// `<prefix>_<unix millis>.png`
pub fn file_name(prefix: &str, timestamp_millis: i64) -> String {
    format!("{}_{}.png", prefix, timestamp_millis)
}

/// Encode `frame` as PNG into `directory`, returning the absolute path
pub fn save_png(frame: CapturedFrame, directory: &Path, prefix: &str) -> Result<PathBuf> {
    let CapturedFrame {
        width,
        height,
        pixels,
    } = frame;
    let image = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
        ArError::CaptureFailed(format!(
            "pixel buffer does not match {}x{} RGBA",
            width, height
        ))
    })?;

    std::fs::create_dir_all(directory)
        .map_err(|e| ArError::SaveFailed(format!("{}: {}", directory.display(), e)))?;

    let path = directory.join(file_name(prefix, chrono::Utc::now().timestamp_millis()));
    image
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|e| ArError::SaveFailed(e.to_string()))?;

    let path = std::fs::canonicalize(&path).unwrap_or(path);
    tracing::info!("Saved screenshot to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32) -> CapturedFrame {
        CapturedFrame {
            width,
            height,
            pixels: [10u8, 20, 30, 255].repeat((width * height) as usize),
        }
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(file_name("screenshot", 1700000000123), "screenshot_1700000000123.png");
    }

    #[test]
    fn test_save_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_png(frame(3, 2), dir.path(), "screenshot").unwrap();

        assert!(path.is_absolute());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("screenshot_"));
        assert!(name.ends_with(".png"));

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_short_buffer_is_capture_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = frame(4, 4);
        bad.pixels.truncate(10);
        assert!(matches!(
            save_png(bad, dir.path(), "screenshot"),
            Err(ArError::CaptureFailed(_))
        ));
    }

    #[test]
    fn test_unwritable_directory_is_save_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        assert!(matches!(
            save_png(frame(1, 1), &blocker.join("nested"), "screenshot"),
            Err(ArError::SaveFailed(_))
        ));
    }
}
