use std::fs;
use std::io::Cursor;
use std::path::Path;

use exif::{In, Reader, Tag, Value};
use raylib::prelude::*;
use tracing::{debug, warn};

use crate::error::ShellError;

/// Loads the title card background, turned upright according to its EXIF orientation.
pub fn load_background(rl: &mut RaylibHandle, thread: &RaylibThread, path: &Path) -> Result<Texture2D, ShellError> {
    let failed = |reason: String| ShellError::Interstitial(format!("background {}: {reason}", path.display()));

    let file_bytes = fs::read(path).map_err(|e| failed(e.to_string()))?;
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let orientation = if extension == "jpg" || extension == "jpeg" {
        exif_orientation(&file_bytes, path)
    } else {
        1
    };

    let mut image = Image::load_image_from_mem(&format!(".{extension}"), &file_bytes).map_err(|e| failed(e.to_string()))?;

    // 3 = 180 deg, 6 = 90 deg clockwise, 8 = 90 deg counter-clockwise. Flips are ignored.
    match orientation {
        3 => {
            image.rotate_cw();
            image.rotate_cw();
        }
        6 => image.rotate_cw(),
        8 => image.rotate_ccw(),
        _ => {}
    }
    debug!(path = %path.display(), orientation, "background loaded");

    rl.load_texture_from_image(thread, &image).map_err(|e| failed(e.to_string()))
}

fn exif_orientation(file_bytes: &[u8], path: &Path) -> u16 {
    match Reader::new().read_from_container(&mut Cursor::new(file_bytes)) {
        Ok(exif) => match exif.get_field(Tag::Orientation, In::PRIMARY).map(|f| &f.value) {
            Some(Value::Short(values)) => values.first().copied().unwrap_or(1),
            _ => 1,
        },
        Err(e) => {
            warn!(path = %path.display(), "no EXIF data: {e}");
            1
        }
    }
}
