//! Image encoding: staged attachment → base64 PNG wrapped in `ImageData`.
//!
//! Chat attachments arrive as JPEG, PNG, WebP or GIF of arbitrary size. The
//! vision engine gets every image re-encoded as PNG (lossless, so small
//! glyphs stay crisp) and capped at [`MAX_EDGE_PX`] on the longest edge so a
//! 12-megapixel phone photo does not blow the request size limit.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Longest edge sent to the vision engine, in pixels.
pub const MAX_EDGE_PX: u32 = 2000;

/// Decode the staged file at `path` and encode it for the vision API.
///
/// Blocking: decoding a large photo is CPU-bound, run it in `spawn_blocking`.
pub fn encode_file(path: &Path) -> Result<ImageData, image::ImageError> {
    let img = image::open(path)?;
    encode_image(&img)
}

/// Encode a decoded image as a base64 PNG ready for the vision API.
///
/// ## Why `detail: "high"`?
/// Low detail forces a single 512 px overview tile; small print on signs and
/// screenshots is lost at that resolution.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let img = cap_size(img);

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

fn cap_size(img: &DynamicImage) -> DynamicImage {
    if img.width().max(img.height()) <= MAX_EDGE_PX {
        return img.clone();
    }
    img.resize(MAX_EDGE_PX, MAX_EDGE_PX, image::imageops::FilterType::Triangle)
}
