//! Page rasterization for OCR: every image a page draws, composed onto a
//! white canvas at its content-stream placement.

use fax::decoder::{decode_g3, decode_g4, pels};
use fax::Color;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object};
use tracing::{debug, trace};

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Nesting bound for form XObjects drawing other forms.
const MAX_FORM_DEPTH: usize = 8;

/// Affine transform `[a b c d e f]` using the PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Transform(pub [f32; 6]);

impl Transform {
    pub const IDENTITY: Transform = Transform([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// Read six numeric operands (a `cm` operation or a form `Matrix`).
    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let mut m = [0.0; 6];
        for (slot, operand) in m.iter_mut().zip(operands) {
            *slot = operand.as_float().ok()?;
        }
        Some(Transform(m))
    }

    /// `self` applied first, then `outer`.
    pub fn then(self, outer: Transform) -> Transform {
        let [a, b, c, d, e, f] = self.0;
        let [oa, ob, oc, od, oe, of] = outer.0;
        Transform([
            a * oa + b * oc,
            a * ob + b * od,
            c * oa + d * oc,
            c * ob + d * od,
            e * oa + f * oc + oe,
            e * ob + f * od + of,
        ])
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Bounding box of the unit square under this transform.
    fn unit_bounds(&self) -> (f32, f32, f32, f32) {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ];
        corners.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

/// A decoded image and where the page draws it (unit square to user space).
pub(crate) struct Placement {
    pub image: DynamicImage,
    pub transform: Transform,
}

/// Walk a content stream, collecting every image drawn, including those
/// inside form XObjects.
pub(crate) fn collect_placements(
    doc: &Document,
    content: &[u8],
    resources: Option<&Dictionary>,
    base: Transform,
    depth: usize,
    out: &mut Vec<Placement>,
) {
    let content = match Content::decode(content) {
        Ok(content) => content,
        Err(e) => {
            debug!("Could not parse content stream: {}", e);
            return;
        }
    };

    let mut ctm = base;
    let mut saved = Vec::new();

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => saved.push(ctm),
            "Q" => ctm = saved.pop().unwrap_or(base),
            "cm" => {
                if let Some(m) = Transform::from_operands(&op.operands) {
                    ctm = m.then(ctm);
                }
            }
            "Do" => {
                let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                    continue;
                };
                let Some(xobject) = resources.and_then(|r| lookup_xobject(doc, r, name)) else {
                    trace!("Unresolved XObject {}", String::from_utf8_lossy(name));
                    continue;
                };
                draw_xobject(doc, xobject, resources, ctm, depth, out);
            }
            _ => {}
        }
    }
}

fn lookup_xobject<'a>(doc: &'a Document, resources: &'a Dictionary, name: &[u8]) -> Option<&'a Object> {
    let xobjects = resources.get(b"XObject").ok()?;
    let (_, xobjects) = doc.dereference(xobjects).ok()?;
    let entry = xobjects.as_dict().ok()?.get(name).ok()?;
    doc.dereference(entry).ok().map(|(_, obj)| obj)
}

fn draw_xobject(
    doc: &Document,
    xobject: &Object,
    parent_resources: Option<&Dictionary>,
    ctm: Transform,
    depth: usize,
    out: &mut Vec<Placement>,
) {
    let Object::Stream(stream) = xobject else {
        return;
    };
    let subtype = stream.dict.get(b"Subtype").ok().and_then(|s| s.as_name().ok());

    match subtype {
        Some(b"Image") => {
            if let Some(image) = decode_image_xobject(doc, xobject) {
                out.push(Placement { image, transform: ctm });
            }
        }
        Some(b"Form") if depth < MAX_FORM_DEPTH => {
            let matrix = stream
                .dict
                .get(b"Matrix")
                .ok()
                .and_then(|m| m.as_array().ok())
                .and_then(|m| Transform::from_operands(m))
                .unwrap_or(Transform::IDENTITY);
            let resources = stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|r| doc.dereference(r).ok())
                .and_then(|(_, r)| r.as_dict().ok())
                .or(parent_resources);
            let content = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            collect_placements(doc, &content, resources, matrix.then(ctm), depth + 1, out);
        }
        Some(b"Form") => debug!("Form XObjects nested too deeply, skipping"),
        _ => {}
    }
}

/// Compose placements onto a white canvas covering `page_box`
/// (`[x0, y0, x1, y1]` in points) at `dpi`, with the longest edge capped
/// at `max_edge` pixels.
pub(crate) fn compose(placements: &[Placement], page_box: [f32; 4], dpi: u32, max_edge: u32) -> DynamicImage {
    let [x0, y0, x1, y1] = page_box;
    let (width_pt, height_pt) = ((x1 - x0).abs().max(1.0), (y1 - y0).abs().max(1.0));

    let mut scale = dpi as f32 / POINTS_PER_INCH;
    let longest = width_pt.max(height_pt) * scale;
    if longest > max_edge as f32 {
        scale *= max_edge as f32 / longest;
    }

    let canvas_w = ((width_pt * scale).round() as u32).max(1);
    let canvas_h = ((height_pt * scale).round() as u32).max(1);
    let mut canvas = RgbImage::from_pixel(canvas_w, canvas_h, Rgb([255, 255, 255]));
    let (left_edge, top_edge) = (x0.min(x1), y0.max(y1));

    for placement in placements {
        let (bx0, by0, bx1, by1) = placement.transform.unit_bounds();
        let left = ((bx0 - left_edge) * scale).round();
        let top = ((top_edge - by1) * scale).round();
        let w = ((bx1 - bx0) * scale).round();
        let h = ((by1 - by0) * scale).round();

        let off_page = left >= canvas_w as f32 || top >= canvas_h as f32 || left + w <= 0.0 || top + h <= 0.0;
        if w < 1.0 || h < 1.0 || off_page {
            trace!("Image placed outside the page, skipping");
            continue;
        }
        // Bound the resample size; overlay clips whatever hangs off the canvas.
        let (w, h) = (w.min(canvas_w as f32 * 2.0) as u32, h.min(canvas_h as f32 * 2.0) as u32);

        let [a, _, _, d, _, _] = placement.transform.0;
        let mut image = if (placement.image.width(), placement.image.height()) == (w, h) {
            placement.image.clone()
        } else {
            placement.image.resize_exact(w, h, FilterType::Triangle)
        };
        if a < 0.0 {
            image = image.fliph();
        }
        if d < 0.0 {
            image = image.flipv();
        }

        imageops::overlay(&mut canvas, &image.to_rgb8(), left as i64, top as i64);
    }

    trace!("Composed {} image(s) onto {}x{} canvas", placements.len(), canvas_w, canvas_h);
    DynamicImage::ImageRgb8(canvas)
}

/// Decode an image XObject stream into pixels.
///
/// Supports JPEG, CCITT fax, raw 8-bit RGB / grayscale and 1-bit
/// grayscale samples; anything else yields `None`.
pub(crate) fn decode_image_xobject(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;
    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    if width == 0 || height == 0 {
        return None;
    }

    match filter_name(dict) {
        Some(b"DCTDecode") => {
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .ok();
        }
        Some(b"CCITTFaxDecode") => return decode_ccitt(&stream.content, width, height, dict),
        Some(b"JPXDecode") | Some(b"JBIG2Decode") => {
            debug!("Skipping {}x{} image with unsupported filter", width, height);
            return None;
        }
        _ => {}
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(if is_mask { b"DeviceGray".as_slice() } else { b"DeviceRGB".as_slice() });

    let (w, h) = (width as usize, height as usize);
    match (color_space, bits) {
        (b"DeviceRGB" | b"RGB" | b"CalRGB", 8) if data.len() >= w * h * 3 => {
            RgbImage::from_raw(width, height, data[..w * h * 3].to_vec()).map(DynamicImage::ImageRgb8)
        }
        (b"DeviceGray" | b"G" | b"CalGray", 8) if data.len() >= w * h => {
            GrayImage::from_raw(width, height, data[..w * h].to_vec()).map(DynamicImage::ImageLuma8)
        }
        (b"DeviceGray" | b"G" | b"CalGray", 1) => unpack_bilevel(&data, width, height),
        (space, bits) => {
            trace!(
                "Could not decode image: colorspace={}, bits={}, data_len={}",
                String::from_utf8_lossy(space),
                bits,
                data.len()
            );
            None
        }
    }
}

fn filter_name(dict: &Dictionary) -> Option<&[u8]> {
    match dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
        _ => None,
    }
}

/// Decode parameters for the last filter.
fn decode_parms(dict: &Dictionary) -> Option<&Dictionary> {
    match dict.get(b"DecodeParms").ok()? {
        Object::Dictionary(parms) => Some(parms),
        Object::Array(arr) => arr.last().and_then(|o| o.as_dict().ok()),
        _ => None,
    }
}

/// Decode CCITT Group 3 (`K >= 0`) or Group 4 (`K < 0`) data to 8-bit gray.
fn decode_ccitt(data: &[u8], width: u32, height: u32, dict: &Dictionary) -> Option<DynamicImage> {
    let parms = decode_parms(dict);
    let parm = |key: &'static [u8]| parms.and_then(|p| p.get(key).ok());

    let k = parm(b"K").and_then(|o| o.as_i64().ok()).unwrap_or(0);
    let columns = parm(b"Columns")
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(i64::from(width));
    let columns = u16::try_from(columns).ok()?;
    let rows = u16::try_from(height).ok()?;

    // Decode [1 0] swaps which sample value is painted dark.
    let inverted = dict
        .get(b"Decode")
        .ok()
        .and_then(|d| d.as_array().ok())
        .and_then(|d| d.first())
        .and_then(|v| v.as_float().ok())
        .is_some_and(|v| v >= 1.0);
    let black_is_1 = matches!(parm(b"BlackIs1"), Some(Object::Boolean(true)));
    let black_dark = black_is_1 == inverted;
    let (black, white) = if black_dark { (0u8, 255u8) } else { (255u8, 0u8) };

    let (w, h) = (usize::from(columns), usize::from(rows));
    let mut pixels: Vec<u8> = Vec::with_capacity(w * h);
    let on_line = |transitions: &[u16]| {
        if pixels.len() < w * h {
            pixels.extend(pels(transitions, columns).map(|c| match c {
                Color::Black => black,
                Color::White => white,
            }));
        }
    };
    let complete = if k < 0 {
        decode_g4(data.iter().copied(), columns, Some(rows), on_line)
    } else {
        decode_g3(data.iter().copied(), on_line)
    };

    if pixels.is_empty() {
        debug!("CCITT stream produced no rows");
        return None;
    }
    if complete.is_none() || pixels.len() < w * h {
        trace!("CCITT stream ended after {} of {} rows", pixels.len() / w.max(1), h);
    }
    pixels.resize(w * h, white);

    GrayImage::from_raw(u32::from(columns), height, pixels).map(DynamicImage::ImageLuma8)
}

/// Expand 1-bit packed rows (each row padded to a byte) to 8-bit gray.
pub(crate) fn unpack_bilevel(data: &[u8], width: u32, height: u32) -> Option<DynamicImage> {
    let row_bytes = (width as usize).div_ceil(8);
    if data.len() < row_bytes * height as usize {
        return None;
    }
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for row in data.chunks(row_bytes).take(height as usize) {
        for x in 0..width as usize {
            let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
            pixels.push(if bit == 1 { 255 } else { 0 });
        }
    }
    GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
}
