//! Image utilities: inline signature payloads, logo formats and image XObjects

use std::io::Cursor;

use base64::Engine;
use image::io::{Limits, Reader as ImageReader};
use image::{GenericImageView, ImageFormat};
use log::debug;
use pdf_writer::{Filter, Pdf, Ref};

use crate::compress::encode_stream;
use crate::error::{ConsentError, ConsentResult};
use crate::types::Size;

/// Resolution used when rasterising SVG images
const SVG_RASTER_DPI: f32 = 300.0;

/// Image payloads the renderer knows how to embed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Raster(ImageFormat),
    Svg,
}

/// Identify an image from its content
pub fn sniff(data: &[u8]) -> Option<ImageKind> {
    match image::guess_format(data) {
        Ok(format) => Some(ImageKind::Raster(format)),
        Err(_) if looks_like_svg(data) => Some(ImageKind::Svg),
        Err(_) => None,
    }
}

fn looks_like_svg(data: &[u8]) -> bool {
    let head = &data[..data.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    (trimmed.starts_with("<?xml") || trimmed.starts_with("<svg")) && text.contains("<svg")
}

fn image_format_from_mime(mime_type: &str) -> Option<ImageFormat> {
    match mime_type {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        "image/bmp" => Some(ImageFormat::Bmp),
        "image/tiff" => Some(ImageFormat::Tiff),
        _ => None,
    }
}

/// Size bounds applied while decoding an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    /// Largest width or height accepted from an encoded raster
    pub max_dimension: u32,
    /// Pixel box an SVG is scaled down into when rasterised
    pub svg_box: (u32, u32),
}

impl ImageLimits {
    /// Header logo from the hospital's static folder
    pub const LOGO: ImageLimits = ImageLimits {
        max_dimension: 8192,
        svg_box: (1024, 1024),
    };

    /// Signature pad captures, drawn into a 120x50pt box
    pub const SIGNATURE: ImageLimits = ImageLimits {
        max_dimension: 4096,
        svg_box: (480, 200),
    };

    fn check(&self, width: u32, height: u32) -> ConsentResult<()> {
        if width > self.max_dimension || height > self.max_dimension {
            return Err(ConsentError::Image(format!(
                "Image of {}x{} px exceeds the {} px limit",
                width, height, self.max_dimension
            )));
        }
        Ok(())
    }
}

/// Decode a `data:image/<format>;base64,<payload>` signature value.
///
/// Returns the declared MIME type and the raw bytes, or `None` when the value
/// is not an inline image or the payload is not valid base64.
pub fn parse_data_uri(value: &str) -> Option<(String, Vec<u8>)> {
    let value = value.trim();
    let (header, payload) = value.split_once(',')?;
    let header = header.strip_prefix("data:")?;
    let mut parts = header.split(';');
    let mime = parts.next()?.trim().to_ascii_lowercase();
    if !mime.starts_with("image/") {
        return None;
    }
    if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return None;
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let data = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .ok()?;
    if data.is_empty() {
        return None;
    }
    Some((mime, data))
}

/// Pixel data ready to become an image XObject
#[derive(Debug, Clone)]
pub enum PreparedImage {
    /// JPEG bytes embedded as-is behind a `/DCTDecode` filter
    Jpeg {
        data: Vec<u8>,
        width: u32,
        height: u32,
        gray: bool,
    },
    /// Decoded 8-bit RGB samples with an optional 8-bit alpha soft mask
    Raster {
        rgb: Vec<u8>,
        alpha: Option<Vec<u8>>,
        width: u32,
        height: u32,
    },
}

impl PreparedImage {
    pub fn pixel_size(&self) -> Size {
        match self {
            PreparedImage::Jpeg { width, height, .. }
            | PreparedImage::Raster { width, height, .. } => {
                Size::new(*width as f64, *height as f64)
            }
        }
    }
}

/// Turn encoded image bytes into XObject-ready data.
///
/// `mime` is the type declared alongside the bytes (a data-URI header); the
/// content still decides when it disagrees.
pub fn prepare_image(
    data: &[u8],
    mime: Option<&str>,
    limits: ImageLimits,
) -> ConsentResult<PreparedImage> {
    let kind = match (sniff(data), mime) {
        (Some(kind), _) => kind,
        (None, Some("image/svg+xml")) => ImageKind::Svg,
        (None, Some(mime)) => match image_format_from_mime(mime) {
            Some(format) => ImageKind::Raster(format),
            None => return Err(ConsentError::Image(format!("Unsupported image type {}", mime))),
        },
        (None, None) => return Err(ConsentError::Image("Unrecognised image format".to_string())),
    };
    match kind {
        ImageKind::Svg => rasterize_svg(data, limits),
        ImageKind::Raster(ImageFormat::Jpeg) => match jpeg_passthrough(data) {
            Some(prepared) => {
                let size = prepared.pixel_size();
                limits.check(size.width as u32, size.height as u32)?;
                Ok(prepared)
            }
            None => decode_raster(data, ImageFormat::Jpeg, limits),
        },
        ImageKind::Raster(format) => decode_raster(data, format, limits),
    }
}

/// Read JPEG dimensions without decoding so the file can be embedded directly.
/// CMYK and 16-bit JPEGs are left to the full decoder.
fn jpeg_passthrough(data: &[u8]) -> Option<PreparedImage> {
    let mut decoder = jpeg_decoder::Decoder::new(data);
    decoder.read_info().ok()?;
    let info = decoder.info()?;
    let gray = match info.pixel_format {
        jpeg_decoder::PixelFormat::L8 => true,
        jpeg_decoder::PixelFormat::RGB24 => false,
        _ => return None,
    };
    Some(PreparedImage::Jpeg {
        data: data.to_vec(),
        width: info.width as u32,
        height: info.height as u32,
        gray,
    })
}

fn decode_raster(data: &[u8], format: ImageFormat, limits: ImageLimits) -> ConsentResult<PreparedImage> {
    let mut reader = ImageReader::new(Cursor::new(data));
    reader.set_format(format);
    let mut reader = reader
        .with_guessed_format()
        .map_err(|e| ConsentError::Image(format!("Failed to detect image format: {}", e)))?;
    let mut decode_limits = Limits::default();
    decode_limits.max_image_width = Some(limits.max_dimension);
    decode_limits.max_image_height = Some(limits.max_dimension);
    reader.limits(decode_limits);
    let img = reader
        .decode()
        .map_err(|e| ConsentError::Image(format!("Failed to decode image: {}", e)))?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ConsentError::Image("Image has no pixels".to_string()));
    }
    if img.color().has_alpha() {
        Ok(split_rgba(img.to_rgba8().into_raw(), width, height))
    } else {
        Ok(PreparedImage::Raster {
            rgb: img.to_rgb8().into_raw(),
            alpha: None,
            width,
            height,
        })
    }
}

fn split_rgba(rgba: Vec<u8>, width: u32, height: u32) -> PreparedImage {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
        alpha.push(px[3]);
    }
    let alpha = if alpha.iter().all(|&a| a == 255) {
        None
    } else {
        Some(alpha)
    };
    PreparedImage::Raster {
        rgb,
        alpha,
        width,
        height,
    }
}

/// Rasterise at print resolution, scaled down to fit `limits.svg_box`
fn rasterize_svg(data: &[u8], limits: ImageLimits) -> ConsentResult<PreparedImage> {
    let opt = usvg::Options::default();
    let fontdb = usvg::fontdb::Database::new();
    let tree = usvg::Tree::from_data(data, &opt, &fontdb)
        .map_err(|e| ConsentError::Image(format!("Failed to parse SVG: {}", e)))?;

    let size = tree.size();
    let (box_width, box_height) = limits.svg_box;
    let scale = (SVG_RASTER_DPI / 72.0)
        .min(box_width as f32 / size.width())
        .min(box_height as f32 / size.height());
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ConsentError::Image("SVG has no drawable size".to_string()));
    }
    let width = ((size.width() * scale).ceil() as u32).clamp(1, box_width);
    let height = ((size.height() * scale).ceil() as u32).clamp(1, box_height);
    debug!(
        "Rasterising SVG {}x{} pt to {}x{} px",
        size.width(),
        size.height(),
        width,
        height
    );

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ConsentError::Image("Failed to create pixmap for SVG".to_string()))?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    // tiny-skia stores premultiplied RGBA
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Ok(split_rgba(rgba, width, height))
}

/// Write `image` as an image XObject at `image_id`; `smask_id` is used when
/// the image carries transparency. Returns whether the soft mask was written.
pub fn write_image_xobject(
    pdf: &mut Pdf,
    image: &PreparedImage,
    image_id: Ref,
    smask_id: Ref,
    compress: bool,
) -> ConsentResult<bool> {
    match image {
        PreparedImage::Jpeg {
            data,
            width,
            height,
            gray,
        } => {
            let mut xobject = pdf.image_xobject(image_id, data);
            xobject.filter(Filter::DctDecode);
            xobject.width(*width as i32);
            xobject.height(*height as i32);
            if *gray {
                xobject.color_space().device_gray();
            } else {
                xobject.color_space().device_rgb();
            }
            xobject.bits_per_component(8);
            Ok(false)
        }
        PreparedImage::Raster {
            rgb,
            alpha,
            width,
            height,
        } => {
            if let Some(alpha) = alpha {
                let encoded = encode_stream(alpha, compress)?;
                let mut smask = pdf.image_xobject(smask_id, &encoded.data);
                if encoded.deflated {
                    smask.filter(Filter::FlateDecode);
                }
                smask.width(*width as i32);
                smask.height(*height as i32);
                smask.color_space().device_gray();
                smask.bits_per_component(8);
            }

            let encoded = encode_stream(rgb, compress)?;
            let mut xobject = pdf.image_xobject(image_id, &encoded.data);
            if encoded.deflated {
                xobject.filter(Filter::FlateDecode);
            }
            xobject.width(*width as i32);
            xobject.height(*height as i32);
            xobject.color_space().device_rgb();
            xobject.bits_per_component(8);
            if alpha.is_some() {
                xobject.s_mask(smask_id);
            }
            Ok(alpha.is_some())
        }
    }
}
