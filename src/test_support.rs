//! Fixtures shared by the unit tests

use std::io::Cursor;
use std::path::PathBuf;

use base64::Engine;
use image::{DynamicImage, ImageFormat, ImageOutputFormat, Rgba, RgbaImage};

use crate::record::ConsentRecord;

fn ink(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let on_stroke = height == 0 || (x * height / width.max(1)) == y;
        if on_stroke {
            Rgba([20, 20, 90, 255])
        } else {
            Rgba([255, 255, 255, 0])
        }
    })
}

/// A signature-like PNG: dark ink on a transparent background
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(ink(width, height))
        .write_to(&mut out, ImageOutputFormat::Png)
        .expect("encode test PNG");
    out.into_inner()
}

/// The same ink flattened onto white and encoded as `format`
pub fn encoded_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let rgb = DynamicImage::ImageRgba8(ink(width, height)).to_rgb8();
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut out, format)
        .expect("encode test image");
    out.into_inner()
}

pub fn data_uri(mime: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

pub fn signature_data_uri(width: u32, height: u32) -> String {
    data_uri("image/png", &png_bytes(width, height))
}

pub fn sample_record() -> ConsentRecord {
    ConsentRecord {
        id: 1,
        patient_name: "Jane Doe".to_string(),
        patient_age: "34".to_string(),
        patient_mrn: "MRN100".to_string(),
        consent_type: "Surgical Consent".to_string(),
        consent_required_for: "Appendectomy under general anaesthesia".to_string(),
        procedure_details: "Appendectomy".to_string(),
        doctor_name: "Rao".to_string(),
        ..Default::default()
    }
}

/// Any installed TrueType font, for tests that need real glyph data
pub fn system_font() -> Option<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|path| path.is_file())
}
