//! Pure pixel layout conversions.
//!
//! Every function here is referentially transparent: bytes in, bytes out.

/// Drop the alpha channel of tightly packed RGBA pixels.
pub fn rgba_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 4 * 3);
    for px in data.chunks_exact(4) {
        out.extend_from_slice(&px[..3]);
    }
    out
}

/// Source image layout for [`crop_rgba_to_rgb`].
#[derive(Debug, Clone, Copy)]
pub struct ImageLayout {
    pub width: u32,
    pub height: u32,
    /// Bytes per row (may include padding)
    pub stride: usize,
}

impl ImageLayout {
    /// A tightly packed 4-byte-per-pixel image.
    pub fn packed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stride: width as usize * 4,
        }
    }
}

/// Crop an RGBA buffer to a rectangle and convert it to RGB24.
///
/// The part of the rectangle lying outside the source image is filled with
/// black, so the output length is always `width * height * 3`.
pub fn crop_rgba_to_rgb(
    data: &[u8],
    layout: ImageLayout,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let dst_row_bytes = width as usize * 3;
    let mut output = Vec::with_capacity(dst_row_bytes * height as usize);

    let visible_cols = layout.width.saturating_sub(x).min(width) as usize;

    for row in 0..height {
        let row_start = output.len();
        let src_y = y + row;

        if src_y < layout.height && visible_cols > 0 {
            let src_start = src_y as usize * layout.stride + x as usize * 4;
            let src_end = src_start + visible_cols * 4;
            if let Some(src) = data.get(src_start..src_end) {
                output.extend_from_slice(&rgba_to_rgb(src));
            }
        }

        output.resize(row_start + dst_row_bytes, 0);
    }

    output
}
