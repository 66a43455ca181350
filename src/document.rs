//! Raw document input and format normalization
//!
//! Turns caller-supplied bytes into one canonical image. Raster formats are
//! decoded with the `image` crate; scanned PDFs have their embedded page
//! images extracted and stacked top-to-bottom onto a single canvas so every
//! region shares one pixel coordinate space.

use crate::error::PreprocessError;
use image::{DynamicImage, GenericImage, ImageFormat, Rgb, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream};
use std::path::Path;

/// Input to the pipeline. Owned by the caller and only borrowed per call.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub declared_content_type: String,
}

impl RawDocument {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        filename: impl Into<String>,
        declared_content_type: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            declared_content_type: declared_content_type.into(),
        }
    }
}

/// What the bytes turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image(ImageFormat),
    Pdf,
    Unsupported,
}

impl DocumentKind {
    /// Detect from magic bytes first, then the declared content type, then
    /// the filename extension.
    pub fn detect(raw: &RawDocument) -> Self {
        if raw.bytes.starts_with(b"%PDF-") {
            return Self::Pdf;
        }
        if let Ok(format) = image::guess_format(&raw.bytes) {
            return Self::Image(format);
        }

        let mime = raw
            .declared_content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if mime == "application/pdf" {
            return Self::Pdf;
        }
        if let Some(format) = ImageFormat::from_mime_type(&mime) {
            return Self::Image(format);
        }

        match Path::new(&raw.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
        {
            Some(ext) if ext == "pdf" => Self::Pdf,
            Some(ext) => ImageFormat::from_extension(&ext)
                .map(Self::Image)
                .unwrap_or(Self::Unsupported),
            None => Self::Unsupported,
        }
    }
}

/// Decode a raw document into a single image
pub fn decode(raw: &RawDocument) -> Result<DynamicImage, PreprocessError> {
    if raw.bytes.is_empty() {
        return Err(PreprocessError::Decode("document is empty".to_string()));
    }

    match DocumentKind::detect(raw) {
        DocumentKind::Image(format) => image::load_from_memory_with_format(&raw.bytes, format)
            .or_else(|_| image::load_from_memory(&raw.bytes))
            .map_err(|e| PreprocessError::Decode(format!("{}: {}", raw.filename, e))),
        DocumentKind::Pdf => decode_pdf(&raw.bytes),
        DocumentKind::Unsupported => Err(PreprocessError::UnsupportedFormat(format!(
            "{} ({})",
            raw.filename, raw.declared_content_type
        ))),
    }
}

fn decode_pdf(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
    let images = extract_images_from_pdf(bytes)?;
    if images.is_empty() {
        return Err(PreprocessError::Decode(
            "PDF contains no page images to recognize".to_string(),
        ));
    }
    tracing::info!("Extracted {} page image(s) from PDF", images.len());
    Ok(stack_vertically(images))
}

/// Stack images top-to-bottom on a white canvas as wide as the widest one
pub fn stack_vertically(mut images: Vec<DynamicImage>) -> DynamicImage {
    if images.len() == 1 {
        return images.remove(0);
    }

    let width = images.iter().map(|img| img.width()).max().unwrap_or(0);
    let height = images.iter().map(|img| img.height()).sum();
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    let mut offset = 0;
    for img in &images {
        // Fits by construction: canvas is as wide as the widest image and as
        // tall as all of them together
        if let Err(e) = canvas.copy_from(&img.to_rgb8(), 0, offset) {
            tracing::warn!("Failed to place page image at y={}: {}", offset, e);
        }
        offset += img.height();
    }

    DynamicImage::ImageRgb8(canvas)
}

/// Extract the images each page draws, pages in document order
fn extract_images_from_pdf(bytes: &[u8]) -> Result<Vec<DynamicImage>, PreprocessError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| PreprocessError::Decode(format!("Failed to load PDF: {}", e)))?;

    let mut images = Vec::new();

    for (page_number, page_id) in doc.get_pages() {
        for (image_id, stream) in page_image_streams(&doc, page_id) {
            match image_from_stream(&doc, stream) {
                Ok(img) => images.push(img),
                Err(e) => {
                    tracing::warn!(
                        "Skipping image {:?} on page {}: {}",
                        image_id,
                        page_number,
                        e
                    );
                }
            }
        }
    }

    Ok(images)
}

/// Image XObjects in a page's resources, inherited ones included.
///
/// Images referenced by another image as its `/SMask` or `/Mask` are
/// transparency data, not page content, and are left out.
fn page_image_streams(doc: &Document, page_id: ObjectId) -> Vec<(ObjectId, &Stream)> {
    let (own, inherited) = match doc.get_page_resources(page_id) {
        Ok(resources) => resources,
        Err(e) => {
            tracing::warn!("Failed to read resources of page {:?}: {}", page_id, e);
            return Vec::new();
        }
    };
    let resource_dicts = own.into_iter().chain(
        inherited
            .into_iter()
            .filter_map(|id| doc.get_dictionary(id).ok()),
    );

    let mut images: Vec<(ObjectId, &Stream)> = Vec::new();
    for resources in resource_dicts {
        let Ok(xobjects) = doc.get_dict_in_dict(resources, b"XObject") else {
            continue;
        };
        for (_, value) in xobjects.iter() {
            let Ok(id) = value.as_reference() else {
                continue;
            };
            if images.iter().any(|(seen, _)| *seen == id) {
                continue;
            }
            if let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) {
                if is_image(stream) {
                    images.push((id, stream));
                }
            }
        }
    }

    let masks: Vec<ObjectId> = images
        .iter()
        .flat_map(|(_, stream)| {
            [b"SMask".as_slice(), b"Mask".as_slice()]
                .into_iter()
                .filter_map(move |key| stream.dict.get(key).and_then(Object::as_reference).ok())
        })
        .collect();
    images.retain(|(id, _)| !masks.contains(id));

    images
}

fn is_image(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .and_then(Object::as_name)
        .map(|name| name == b"Image")
        .unwrap_or(false)
}

fn dict_u32(stream: &Stream, key: &[u8]) -> Option<u32> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|v| v.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
}

/// Decode one image XObject
fn image_from_stream(doc: &Document, stream: &Stream) -> Result<DynamicImage, PreprocessError> {
    // JPEG streams carry a complete encoded image
    if stream_filter(stream).as_deref() == Some("DCTDecode") {
        return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|e| PreprocessError::Decode(format!("Invalid JPEG image stream: {}", e)));
    }

    let width = dict_u32(stream, b"Width")
        .ok_or_else(|| PreprocessError::Decode("Missing image width".to_string()))?;
    let height = dict_u32(stream, b"Height")
        .ok_or_else(|| PreprocessError::Decode("Missing image height".to_string()))?;
    let bits_per_component = dict_u32(stream, b"BitsPerComponent").unwrap_or(8);
    if bits_per_component != 8 {
        return Err(PreprocessError::Decode(format!(
            "Unsupported bit depth: {} bits per component",
            bits_per_component
        )));
    }

    // Unfiltered streams are returned as stored
    let data = stream
        .get_plain_content()
        .map_err(|e| PreprocessError::Decode(format!("Failed to decompress image: {}", e)))?;

    let color_space = color_space_name(doc, stream);
    let pixels = width as usize * height as usize;

    tracing::debug!(
        "PDF image: {}x{}, color_space={}, data_len={}",
        width,
        height,
        color_space,
        data.len()
    );

    match color_space.as_str() {
        "DeviceGray" if data.len() >= pixels => {
            image::GrayImage::from_raw(width, height, data[..pixels].to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| PreprocessError::Decode("Invalid grayscale image data".to_string()))
        }
        // ICCBased with 3 components is typically RGB
        "DeviceRGB" | "ICCBased" if data.len() >= pixels * 3 => {
            RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| PreprocessError::Decode("Invalid RGB image data".to_string()))
        }
        "DeviceCMYK" if data.len() >= pixels * 4 => {
            let rgb: Vec<u8> = data[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|cmyk| cmyk_to_rgb([cmyk[0], cmyk[1], cmyk[2], cmyk[3]]))
                .collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| PreprocessError::Decode("Invalid CMYK image data".to_string()))
        }
        other => Err(PreprocessError::Decode(format!(
            "Unsupported image layout: color_space={}, data_len={}, pixels={}",
            other,
            data.len(),
            pixels
        ))),
    }
}

fn cmyk_to_rgb([c, m, y, k]: [u8; 4]) -> [u8; 3] {
    let k = 1.0 - k as f32 / 255.0;
    let channel = |v: u8| ((1.0 - v as f32 / 255.0) * k * 255.0) as u8;
    [channel(c), channel(m), channel(y)]
}

fn stream_filter(stream: &Stream) -> Option<String> {
    let filter = stream.dict.get(b"Filter").ok()?;
    if let Ok(name) = filter.as_name() {
        return Some(String::from_utf8_lossy(name).to_string());
    }
    // Filter chains: the last filter determines the final encoding
    filter
        .as_array()
        .ok()?
        .last()
        .and_then(|f| f.as_name().ok())
        .map(|name| String::from_utf8_lossy(name).to_string())
}

/// Get the color space name from a PDF stream, resolving indirect references
fn color_space_name(doc: &Document, stream: &Stream) -> String {
    let Ok(cs_obj) = stream.dict.get(b"ColorSpace") else {
        return "DeviceRGB".to_string();
    };

    let resolved = match cs_obj.as_reference() {
        Ok(reference) => match doc.get_object(reference) {
            Ok(obj) => obj,
            Err(_) => return "DeviceRGB".to_string(),
        },
        Err(_) => cs_obj,
    };

    // Either a bare name or an array like [/ICCBased ref]
    let name = resolved.as_name().ok().or_else(|| {
        resolved
            .as_array()
            .ok()
            .and_then(|array| array.first())
            .and_then(|first| first.as_name().ok())
    });

    name.map(|n| String::from_utf8_lossy(n).to_string())
        .unwrap_or_else(|| "DeviceRGB".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use lopdf::{dictionary, Dictionary};

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_detect_prefers_magic_bytes() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let raw = RawDocument::new(png_bytes(&img), "scan.pdf", "application/pdf");
        assert_eq!(DocumentKind::detect(&raw), DocumentKind::Image(ImageFormat::Png));

        let raw = RawDocument::new(b"%PDF-1.7\n".to_vec(), "scan.png", "image/png");
        assert_eq!(DocumentKind::detect(&raw), DocumentKind::Pdf);
    }

    #[test]
    fn test_detect_falls_back_to_content_type_and_extension() {
        let raw = RawDocument::new(vec![1, 2, 3], "upload", "image/jpeg; charset=binary");
        assert_eq!(DocumentKind::detect(&raw), DocumentKind::Image(ImageFormat::Jpeg));

        let raw = RawDocument::new(vec![1, 2, 3], "page.TIFF", "application/octet-stream");
        assert_eq!(DocumentKind::detect(&raw), DocumentKind::Image(ImageFormat::Tiff));
    }

    #[test]
    fn test_spreadsheet_is_unsupported() {
        let raw = RawDocument::new(
            b"PK\x03\x04 not really a workbook".to_vec(),
            "budget.xlsx",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        );
        assert_eq!(DocumentKind::detect(&raw), DocumentKind::Unsupported);
        assert!(matches!(
            decode(&raw),
            Err(PreprocessError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_decode_png() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(12, 7, Luma([200])));
        let raw = RawDocument::new(png_bytes(&img), "page.png", "image/png");
        let decoded = decode(&raw).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 7));
    }

    #[test]
    fn test_decode_empty_and_corrupt() {
        let raw = RawDocument::new(Vec::new(), "empty.png", "image/png");
        assert!(matches!(decode(&raw), Err(PreprocessError::Decode(_))));

        let raw = RawDocument::new(b"\x89PNG\r\n\x1a\ngarbage".to_vec(), "bad.png", "image/png");
        assert!(matches!(decode(&raw), Err(PreprocessError::Decode(_))));
    }

    #[test]
    fn test_decode_malformed_pdf() {
        let raw = RawDocument::new(b"%PDF-1.4\nnot a pdf".to_vec(), "bad.pdf", "application/pdf");
        assert!(matches!(decode(&raw), Err(PreprocessError::Decode(_))));
    }

    fn gray_image_stream(width: i64, height: i64, value: u8) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![value; (width * height) as usize],
        )
    }

    /// Save a PDF whose pages draw the given image objects, one list per page
    fn save_pdf(mut doc: Document, pages: Vec<Vec<ObjectId>>, compress: bool) -> Vec<u8> {
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();

        for page_images in &pages {
            let mut xobjects = Dictionary::new();
            for (i, id) in page_images.iter().enumerate() {
                xobjects.set(format!("Im{}", i), *id);
            }
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
                "Resources" => dictionary! { "XObject" => xobjects },
            });
            kids.push(Object::from(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if compress {
            doc.compress();
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn pdf_document(bytes: Vec<u8>) -> RawDocument {
        RawDocument::new(bytes, "scan.pdf", "application/pdf")
    }

    #[test]
    fn test_pdf_pages_stack_in_page_order() {
        let mut doc = Document::with_version("1.5");
        // Lower object id, but drawn on the second page
        let black = doc.add_object(gray_image_stream(10, 10, 0));
        let white = doc.add_object(gray_image_stream(10, 10, 255));
        let bytes = save_pdf(doc, vec![vec![white], vec![black]], true);

        let decoded = decode(&pdf_document(bytes)).unwrap().to_luma8();

        assert_eq!((decoded.width(), decoded.height()), (10, 20));
        assert_eq!(decoded.get_pixel(5, 2).0[0], 255);
        assert_eq!(decoded.get_pixel(5, 15).0[0], 0);
    }

    #[test]
    fn test_pdf_soft_mask_is_not_a_page() {
        let mut doc = Document::with_version("1.5");
        let mask = doc.add_object(gray_image_stream(10, 10, 255));
        let page = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 10,
                "Height" => 10,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "SMask" => mask,
            },
            vec![40; 10 * 10 * 3],
        ));
        let lone = save_pdf(doc.clone(), vec![vec![page]], true);
        // Some producers also list the mask in the page resources
        let listed = save_pdf(doc, vec![vec![page, mask]], true);

        for bytes in [lone, listed] {
            let decoded = decode(&pdf_document(bytes)).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (10, 10));
            assert_eq!(decoded.to_rgb8().get_pixel(3, 3).0, [40, 40, 40]);
        }
    }

    #[test]
    fn test_pdf_unfiltered_image_stream() {
        let mut doc = Document::with_version("1.5");
        let image = doc.add_object(gray_image_stream(8, 6, 128));
        let bytes = save_pdf(doc, vec![vec![image]], false);

        let decoded = decode(&pdf_document(bytes)).unwrap().to_luma8();

        assert_eq!((decoded.width(), decoded.height()), (8, 6));
        assert_eq!(decoded.get_pixel(0, 0).0[0], 128);
    }

    #[test]
    fn test_pdf_without_images_is_decode_error() {
        let bytes = save_pdf(Document::with_version("1.5"), vec![vec![]], false);
        assert!(matches!(
            decode(&pdf_document(bytes)),
            Err(PreprocessError::Decode(_))
        ));
    }

    #[test]
    fn test_stack_vertically() {
        let a = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 5, Luma([0])));
        let b = DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 8, Luma([0])));
        let stacked = stack_vertically(vec![a, b]);
        assert_eq!((stacked.width(), stacked.height()), (10, 13));

        let rgb = stacked.to_rgb8();
        // Padding to the right of the narrower page stays white
        assert_eq!(rgb.get_pixel(8, 10).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(2, 10).0, [0, 0, 0]);
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb([0, 0, 0, 0]), [255, 255, 255]);
        assert_eq!(cmyk_to_rgb([0, 0, 0, 255]), [0, 0, 0]);
    }
}
