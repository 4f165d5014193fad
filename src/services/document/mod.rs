//! Printable coloring book assembly.
//!
//! Layout is worked out in millimetres from the top-left corner of an A4
//! portrait page and converted to PDF points (origin bottom-left) only when
//! operators are emitted.

pub mod metrics;

use crate::core::error::AssemblyFailure;
use crate::core::state::RenderedPage;
use crate::utils::data_uri::ImagePayload;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use metrics::{encode_win_ansi, Font};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const CAPTION_SPACE_MM: f32 = 20.0;
const IMAGE_TOP_MM: f32 = 25.0;
const CAPTION_MAX_CHARS: usize = 80;

const TITLE: &str = "Coloring Book";
const ATTRIBUTION: &str = "Created with DreamColor AI";

const BLACK: f32 = 0.0;
const GREY: f32 = 100.0 / 255.0;
const LIGHT_GREY: f32 = 150.0 / 255.0;

fn mm(v: f32) -> f32 {
    v * 72.0 / 25.4
}

fn num(v: f32) -> Object {
    v.into()
}

fn int(v: i64) -> Object {
    Object::Integer(v)
}

pub fn book_file_name(child_name: &str) -> String {
    let safe: String = child_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}_Coloring_Book.pdf", safe)
}

/// Largest 3:4 (width:height) box inside `max_w` x `max_h`: fit the width,
/// and fall back to fitting the height when that is too tall.
pub fn fit_portrait(max_w: f32, max_h: f32) -> (f32, f32) {
    let width = max_w;
    let height = width * 4.0 / 3.0;
    if height > max_h {
        (max_h * 3.0 / 4.0, max_h)
    } else {
        (width, height)
    }
}

pub fn caption_text(prompt: &str) -> String {
    if prompt.chars().count() > CAPTION_MAX_CHARS {
        let short: String = prompt.chars().take(CAPTION_MAX_CHARS).collect();
        format!("{}...", short)
    } else {
        prompt.to_string()
    }
}

/// Builds the finished PDF: one cover page, then one page per rendered image
/// in list order.
pub fn assemble(
    child_name: &str,
    theme: &str,
    pages: &[RenderedPage],
    cover: Option<&ImagePayload>,
) -> Result<Vec<u8>, AssemblyFailure> {
    let mut doc = layout(child_name, theme, pages, cover)?;
    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    log::info!(
        "Assembled coloring book for {:?}: {} pages, {} bytes",
        child_name,
        pages.len() + 1,
        out.len()
    );
    Ok(out)
}

/// Uncompressed document, before serialization.
pub fn layout(
    child_name: &str,
    theme: &str,
    pages: &[RenderedPage],
    cover: Option<&ImagePayload>,
) -> Result<Document, AssemblyFailure> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = add_font(&mut doc, Font::Helvetica);
    let bold_id = add_font(&mut doc, Font::HelveticaBold);
    let fonts = dictionary! {
        Font::Helvetica.resource_name() => regular_id,
        Font::HelveticaBold.resource_name() => bold_id,
    };

    let mut page_ids = Vec::with_capacity(pages.len() + 1);

    let mut cover_page = PageBuilder::new();
    match cover {
        Some(image) => {
            let image_id = embed_image(&mut doc, image)?;
            cover_page.image(image_id, 0.0, 0.0, PAGE_WIDTH_MM, PAGE_HEIGHT_MM);

            let box_w = PAGE_WIDTH_MM * 0.8;
            let box_h = 80.0;
            let box_x = (PAGE_WIDTH_MM - box_w) / 2.0;
            let box_y = 70.0;
            cover_page.rounded_rect(box_x, box_y, box_w, box_h, 5.0, 1.0);

            cover_page.centered_text(Font::HelveticaBold, 32.0, BLACK, TITLE, box_y + 30.0);
            cover_page.centered_text(Font::Helvetica, 24.0, BLACK, &format!("For {}", child_name), box_y + 50.0);
            cover_page.centered_text(Font::Helvetica, 16.0, GREY, &format!("Theme: {}", theme), box_y + 65.0);
        }
        None => {
            cover_page.centered_text(Font::HelveticaBold, 32.0, BLACK, TITLE, 80.0);
            cover_page.centered_text(Font::Helvetica, 24.0, BLACK, &format!("For {}", child_name), 100.0);
            cover_page.centered_text(Font::Helvetica, 16.0, GREY, &format!("Theme: {}", theme), 120.0);
            cover_page.centered_text(Font::Helvetica, 12.0, LIGHT_GREY, ATTRIBUTION, 250.0);
        }
    }
    page_ids.push(cover_page.finish(&mut doc, pages_id, &fonts)?);

    let max_w = PAGE_WIDTH_MM - MARGIN_MM * 2.0;
    let max_h = PAGE_HEIGHT_MM - MARGIN_MM * 2.0 - CAPTION_SPACE_MM;
    let (img_w, img_h) = fit_portrait(max_w, max_h);
    let img_x = (PAGE_WIDTH_MM - img_w) / 2.0;

    for (index, page) in pages.iter().enumerate() {
        let mut builder = PageBuilder::new();
        let header = format!("Page {} - {}'s {} Adventure", index + 1, child_name, theme);
        builder.text(Font::Helvetica, 10.0, BLACK, &header, 10.0, 10.0);

        let image_id = embed_image(&mut doc, &page.image)?;
        builder.image(image_id, img_x, IMAGE_TOP_MM, img_w, img_h);

        let caption = caption_text(page.prompt.as_str());
        builder.centered_text(Font::Helvetica, 8.0, LIGHT_GREY, &caption, PAGE_HEIGHT_MM - 10.0);

        page_ids.push(builder.finish(&mut doc, pages_id, &fonts)?);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => int(page_ids.len() as i64),
        "MediaBox" => vec![int(0), int(0), num(mm(PAGE_WIDTH_MM)), num(mm(PAGE_HEIGHT_MM))],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

fn add_font(doc: &mut Document, font: Font) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    })
}

const EMBEDDABLE_MIME: [&str; 5] = ["image/png", "image/jpeg", "image/jpg", "image/gif", "image/webp"];

/// Decodes a PNG, JPEG, GIF or WebP payload and stores it as an RGB image
/// XObject.
fn embed_image(doc: &mut Document, payload: &ImagePayload) -> Result<ObjectId, AssemblyFailure> {
    let mime = payload.mime_type.trim().to_ascii_lowercase();
    if !EMBEDDABLE_MIME.contains(&mime.as_str()) {
        return Err(AssemblyFailure::UnsupportedMime(payload.mime_type.clone()));
    }
    let bytes = payload.decode()?;
    let rgb = flatten_on_white(&image::load_from_memory(&bytes)?);
    let (width, height) = rgb.dimensions();
    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => int(width as i64),
            "Height" => int(height as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => int(8),
        },
        rgb.into_raw(),
    );
    Ok(doc.add_object(stream))
}

/// Composites any transparency over a white page.
fn flatten_on_white(img: &image::DynamicImage) -> image::RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    image::RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let over_white = |c: u8| ((c as u32 * a as u32 + 255 * (255 - a as u32) + 127) / 255) as u8;
        image::Rgb([over_white(r), over_white(g), over_white(b)])
    })
}

struct PageBuilder {
    operations: Vec<Operation>,
    images: Vec<ObjectId>,
}

impl PageBuilder {
    fn new() -> Self {
        Self {
            operations: Vec::new(),
            images: Vec::new(),
        }
    }

    /// `x_mm` is the left edge, `baseline_mm` is measured from the page top.
    fn text(&mut self, font: Font, size: f32, grey: f32, text: &str, x_mm: f32, baseline_mm: f32) {
        let encoded = encode_win_ansi(text);
        self.text_at_points(font, size, grey, encoded, mm(x_mm), baseline_mm);
    }

    fn centered_text(&mut self, font: Font, size: f32, grey: f32, text: &str, baseline_mm: f32) {
        let encoded = encode_win_ansi(text);
        let width = font.text_width(&encoded, size);
        let x = (mm(PAGE_WIDTH_MM) - width) / 2.0;
        self.text_at_points(font, size, grey, encoded, x, baseline_mm);
    }

    fn text_at_points(&mut self, font: Font, size: f32, grey: f32, encoded: Vec<u8>, x: f32, baseline_mm: f32) {
        let y = mm(PAGE_HEIGHT_MM - baseline_mm);
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.resource_name().into(), num(size)]),
            Operation::new("g", vec![num(grey)]),
            Operation::new("Td", vec![num(x), num(y)]),
            Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn image(&mut self, image_id: ObjectId, x_mm: f32, y_mm: f32, w_mm: f32, h_mm: f32) {
        self.images.push(image_id);
        let name = format!("Im{}", self.images.len());
        let bottom = PAGE_HEIGHT_MM - y_mm - h_mm;
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![num(mm(w_mm)), int(0), int(0), num(mm(h_mm)), num(mm(x_mm)), num(mm(bottom))],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn rounded_rect(&mut self, x_mm: f32, y_mm: f32, w_mm: f32, h_mm: f32, r_mm: f32, grey: f32) {
        let (x, y) = (mm(x_mm), mm(PAGE_HEIGHT_MM - y_mm - h_mm));
        let (w, h, r) = (mm(w_mm), mm(h_mm), mm(r_mm));
        // Bezier handle length for a quarter circle.
        let k = r * 0.552_284_8;

        let point = |op: &str, coords: &[f32]| Operation::new(op, coords.iter().map(|v| num(*v)).collect());
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("g", vec![num(grey)]),
            point("m", &[x + r, y]),
            point("l", &[x + w - r, y]),
            point("c", &[x + w - r + k, y, x + w, y + r - k, x + w, y + r]),
            point("l", &[x + w, y + h - r]),
            point("c", &[x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h]),
            point("l", &[x + r, y + h]),
            point("c", &[x + r - k, y + h, x, y + h - r + k, x, y + h - r]),
            point("l", &[x, y + r]),
            point("c", &[x, y + r - k, x + r - k, y, x + r, y]),
            Operation::new("h", vec![]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn finish(self, doc: &mut Document, parent: ObjectId, fonts: &Dictionary) -> Result<ObjectId, AssemblyFailure> {
        let mut xobjects = Dictionary::new();
        for (i, id) in self.images.iter().enumerate() {
            xobjects.set(format!("Im{}", i + 1), Object::Reference(*id));
        }

        let content = Content {
            operations: self.operations,
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let resources = dictionary! {
            "Font" => fonts.clone(),
            "XObject" => xobjects,
        };
        Ok(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => parent,
            "Contents" => content_id,
            "Resources" => resources,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_payload(width: u32, height: u32) -> ImagePayload {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        ImagePayload::from_bytes("image/png", &buf)
    }

    fn page(index: usize, prompt: &str) -> RenderedPage {
        RenderedPage::new(index, png_payload(3, 4), prompt.into())
    }

    fn page_text(doc: &Document, page_number: u32) -> String {
        let pages = doc.get_pages();
        let id = pages[&page_number];
        String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).to_string()
    }

    #[test]
    fn test_fit_portrait_keeps_ratio_and_bounds() {
        let regions = [(170.0, 237.0), (300.0, 200.0), (100.0, 1000.0), (90.0, 120.0), (50.0, 10.0)];
        for (w, h) in regions {
            let (fw, fh) = fit_portrait(w, h);
            assert!((fw / fh - 0.75).abs() < 1e-4, "ratio for {}x{}", w, h);
            assert!(fw <= w + 1e-4 && fh <= h + 1e-4, "bounds for {}x{}", w, h);
            assert!((fw - w).abs() < 1e-4 || (fh - h).abs() < 1e-4, "fills {}x{}", w, h);
        }

        let (w, h) = fit_portrait(170.0, 237.0);
        assert_eq!(w, 170.0);
        assert!((h - 226.666_67).abs() < 1e-3);

        let (w, h) = fit_portrait(300.0, 200.0);
        assert_eq!((w, h), (150.0, 200.0));
    }

    #[test]
    fn test_caption_truncation() {
        assert_eq!(caption_text("A short one"), "A short one");

        let exact: String = "x".repeat(80);
        assert_eq!(caption_text(&exact), exact);

        let long: String = "y".repeat(81);
        let caption = caption_text(&long);
        assert_eq!(caption.chars().count(), 83);
        assert!(caption.ends_with("y..."));
    }

    #[test]
    fn test_book_file_name() {
        assert_eq!(book_file_name("Leo"), "Leo_Coloring_Book.pdf");
        assert_eq!(book_file_name("../Mia"), ".._Mia_Coloring_Book.pdf");
    }

    #[test]
    fn test_page_count_is_pages_plus_cover() {
        let pages = vec![page(0, "first"), page(1, "second"), page(3, "fourth")];
        let bytes = assemble("Leo", "space dinosaurs", &pages, None).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 4);
    }

    #[test]
    fn test_content_pages_follow_input_order() {
        let pages = vec![page(0, "a lion"), page(1, "a zebra"), page(2, "a giraffe")];
        let doc = layout("Leo", "safari", &pages, None).unwrap();

        for (n, prompt) in [(2, "a lion"), (3, "a zebra"), (4, "a giraffe")] {
            let text = page_text(&doc, n);
            assert!(text.contains(&format!("Page {} - Leo's safari Adventure", n - 1)));
            assert!(text.contains(prompt), "page {} should carry caption {:?}", n, prompt);
            assert!(text.contains("/Im1 Do"));
        }
    }

    #[test]
    fn test_plain_cover_has_attribution() {
        let doc = layout("Mia", "ocean", &[], None).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let cover = page_text(&doc, 1);
        assert!(cover.contains("Coloring Book"));
        assert!(cover.contains("For Mia"));
        assert!(cover.contains("Theme: ocean"));
        assert!(cover.contains(ATTRIBUTION));
        assert!(!cover.contains(" Do"));
    }

    #[test]
    fn test_image_cover_draws_image_and_panel() {
        let cover_image = png_payload(6, 8);
        let doc = layout("Mia", "ocean", &[page(0, "a whale")], Some(&cover_image)).unwrap();
        assert_eq!(doc.get_pages().len(), 2);

        let cover = page_text(&doc, 1);
        assert!(cover.contains("/Im1 Do"));
        assert!(cover.contains("For Mia"));
        assert!(!cover.contains(ATTRIBUTION));
        // The panel fill comes after the image so the text stays readable.
        let image_at = cover.find("/Im1 Do").unwrap();
        let panel_at = cover.find("\nf\n").unwrap();
        assert!(panel_at > image_at);
    }

    #[test]
    fn test_transparency_is_flattened_on_white() {
        let mut rgba = image::RgbaImage::from_pixel(2, 1, image::Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, image::Rgba([0, 0, 0, 255]));
        let flat = flatten_on_white(&image::DynamicImage::ImageRgba8(rgba));
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [0, 0, 0]);

        let half = image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 128]));
        let flat = flatten_on_white(&image::DynamicImage::ImageRgba8(half));
        assert_eq!(flat.get_pixel(0, 0).0, [127, 127, 127]);
    }

    #[test]
    fn test_transparent_cover_embeds_white_pixels() {
        let rgba = image::RgbaImage::from_pixel(3, 4, image::Rgba([0, 0, 0, 0]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let cover = ImagePayload::from_bytes("image/png", &buf);

        let doc = layout("Mia", "ocean", &[], Some(&cover)).unwrap();
        let pixels = doc
            .objects
            .values()
            .find_map(|obj| match obj {
                Object::Stream(stream) if stream.dict.has(b"Width") => Some(stream.content.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(pixels.len(), 3 * 4 * 3);
        assert!(pixels.iter().all(|b| *b == 255));
    }

    #[test]
    fn test_curly_quotes_reach_the_caption() {
        let doc = layout("Leo", "castles", &[page(0, "A dragon\u{2019}s castle")], None).unwrap();
        let pages = doc.get_pages();
        let content = doc.get_page_content(pages[&2]).unwrap();
        let expected: &[u8] = b"A dragon\x92s castle";
        assert!(content.windows(expected.len()).any(|w| w == expected));
        assert!(!String::from_utf8_lossy(&content).contains("dragon?s"));
    }

    #[test]
    fn test_unsupported_mime_is_rejected() {
        let mut odd = page(0, "odd");
        odd.image.mime_type = "image/tiff".to_string();
        let err = assemble("Leo", "space", &[odd], None).unwrap_err();
        assert!(matches!(err, AssemblyFailure::UnsupportedMime(ref m) if m == "image/tiff"));

        let mut jpeg_label = page(0, "label");
        jpeg_label.image.mime_type = "IMAGE/JPEG".to_string();
        // The label only gates the type; decoding still sniffs the bytes.
        assert!(assemble("Leo", "space", &[jpeg_label], None).is_ok());
    }

    #[test]
    fn test_corrupt_payload_fails() {
        let mut broken = page(0, "broken");
        broken.image = ImagePayload::new("image/png", "%%% not base64 %%%");
        let err = assemble("Leo", "space", &[broken], None).unwrap_err();
        assert!(matches!(err, AssemblyFailure::Payload(_)));

        let mut garbage = page(0, "garbage");
        garbage.image = ImagePayload::from_bytes("image/png", b"definitely not an image");
        let err = assemble("Leo", "space", &[garbage], None).unwrap_err();
        assert!(matches!(err, AssemblyFailure::Image(_)));
    }
}
