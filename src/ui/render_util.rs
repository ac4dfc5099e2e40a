use super::{Arc, ImageBuffer, ImageFrame, RenderImage, Rgba};

/// Wraps an RGBA buffer as a GPU image. GPUI expects BGRA, so red and blue are
/// swapped up front instead of going through the async asset pipeline.
pub(super) fn rgba_to_image(rgba: &[u8], width: u32, height: u32) -> Option<Arc<RenderImage>> {
    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, to_bgra(rgba))?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}

fn to_bgra(rgba: &[u8]) -> Vec<u8> {
    let mut bgra = rgba.to_vec();
    for px in bgra.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    bgra
}
