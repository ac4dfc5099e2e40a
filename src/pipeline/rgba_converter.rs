use anyhow::{Result, anyhow};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

#[derive(Debug)]
pub struct RgbaFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Byte layouts that only need channel shuffling to become RGBA.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PackedLayout {
    Rgb,
    Bgr,
    Gray,
}

impl PackedLayout {
    fn bytes_per_pixel(self) -> usize {
        match self {
            PackedLayout::Rgb | PackedLayout::Bgr => 3,
            PackedLayout::Gray => 1,
        }
    }
}

pub fn convert_camera_frame(frame: &Buffer) -> Result<RgbaFrame> {
    let resolution = frame.resolution();
    let (width, height) = (resolution.width_x, resolution.height_y);
    let data = frame.buffer();

    let (rgba, width, height) = match frame.source_frame_format() {
        FrameFormat::NV12 => (nv12_to_rgba(data, width, height)?, width, height),
        FrameFormat::YUYV => (yuyv_to_rgba(data, width, height)?, width, height),
        FrameFormat::MJPEG => mjpeg_to_rgba(data)?,
        FrameFormat::RAWRGB => (expand_packed(data, width, height, PackedLayout::Rgb)?, width, height),
        FrameFormat::RAWBGR => (expand_packed(data, width, height, PackedLayout::Bgr)?, width, height),
        FrameFormat::GRAY => (expand_packed(data, width, height, PackedLayout::Gray)?, width, height),
    };

    Ok(RgbaFrame {
        rgba,
        width,
        height,
    })
}

fn ensure_len(label: &str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(anyhow!(
            "{label} buffer too small: got {}, expected {expected}",
            data.len()
        ));
    }
    Ok(())
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_plane_len = width as usize * height as usize;
    let uv_plane_len = y_plane_len / 2;
    ensure_len("NV12", data, y_plane_len + uv_plane_len)?;

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_plane_len],
        y_stride: width,
        uv_plane: &data[y_plane_len..y_plane_len + uv_plane_len],
        uv_stride: width,
        width,
        height,
    };

    let mut rgba = vec![0u8; y_plane_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12→RGBA failed: {err:?}"))?;

    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    ensure_len("YUYV", data, width as usize * height as usize * 2)?;

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgba = vec![0u8; (width as usize * height as usize) * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422→RGBA failed: {err:?}"))?;

    Ok(rgba)
}

/// Decodes MJPEG and trusts the dimensions in the JPEG header over the ones
/// the driver reported.
fn mjpeg_to_rgba(data: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("MJPEG decoder returned no image info"))?;
    let (width, height) = (u32::from(info.width), u32::from(info.height));
    ensure_len("MJPEG", &rgba, width as usize * height as usize * 4)?;

    Ok((rgba, width, height))
}

fn expand_packed(data: &[u8], width: u32, height: u32, layout: PackedLayout) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    let bpp = layout.bytes_per_pixel();
    ensure_len(&format!("{layout:?}"), data, pixels * bpp)?;

    let mut rgba = vec![0u8; pixels * 4];
    rgba.par_chunks_mut(4)
        .zip(data[..pixels * bpp].par_chunks_exact(bpp))
        .for_each(|(dst, src)| {
            let [r, g, b] = match layout {
                PackedLayout::Rgb => [src[0], src[1], src[2]],
                PackedLayout::Bgr => [src[2], src[1], src[0]],
                PackedLayout::Gray => [src[0]; 3],
            };
            dst.copy_from_slice(&[r, g, b, 255]);
        });

    Ok(rgba)
}
