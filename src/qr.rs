use std::io::{self, Cursor, Write};

use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use serde::Serialize;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::domain::TableMapping;

pub const ALL_QR_ZIP_FILE_NAME: &str = "all_table_qr_codes.zip";

const MODULE_PX: u32 = 10;

#[derive(Debug)]
pub enum QrError {
    Encode(qrcode::types::QrError),
    Image(image::ImageError),
    Zip(zip::result::ZipError),
    Io(io::Error),
}

impl std::fmt::Display for QrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "qr encode error: {e}"),
            Self::Image(e) => write!(f, "png encode error: {e}"),
            Self::Zip(e) => write!(f, "zip error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for QrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(e) => Some(e),
            Self::Image(e) => Some(e),
            Self::Zip(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<qrcode::types::QrError> for QrError {
    fn from(value: qrcode::types::QrError) -> Self {
        Self::Encode(value)
    }
}

impl From<image::ImageError> for QrError {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}

impl From<zip::result::ZipError> for QrError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::Zip(value)
    }
}

impl From<io::Error> for QrError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrInfo {
    pub table_number: u32,
    pub token: String,
    pub qr_url: String,
}

pub fn build_url(frontend_base_url: &str, token: &str) -> String {
    format!("{frontend_base_url}?t={token}")
}

pub fn qr_png_file_name(table_number: u32) -> String {
    format!("table_{table_number}_qr_code.png")
}

/// Encodes `url` as a black-on-white PNG QR code with the standard 4-module
/// quiet zone.
pub fn render(url: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::L)?;
    let img = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(MODULE_PX, MODULE_PX)
        .build();

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// One PNG per table, in table-number order, in a single deflated ZIP.
pub fn render_all(mappings: &[TableMapping], frontend_base_url: &str) -> Result<Vec<u8>, QrError> {
    let mut sorted: Vec<&TableMapping> = mappings.iter().collect();
    sorted.sort_by_key(|m| m.table_number);

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for mapping in sorted {
        let png = render(&build_url(frontend_base_url, &mapping.token))?;
        zip.start_file(qr_png_file_name(mapping.table_number), options)?;
        zip.write_all(&png)?;
    }
    Ok(zip.finish()?.into_inner())
}

pub fn info(mappings: &[TableMapping], frontend_base_url: &str) -> Vec<QrInfo> {
    let mut out: Vec<QrInfo> = mappings
        .iter()
        .map(|m| QrInfo {
            table_number: m.table_number,
            token: m.token.clone(),
            qr_url: build_url(frontend_base_url, &m.token),
        })
        .collect();
    out.sort_by_key(|i| i.table_number);
    out
}
