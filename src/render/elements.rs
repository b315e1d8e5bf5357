//! Per-element draw routines.
//!
//! Each element is painted inside its own save/restore pair, so styles and
//! transforms never carry over to the next element.

use qrcode::{EcLevel, QrCode};
use std::f32::consts::PI;

use super::{IssueKind, QrMode, RenderIssue, ThumbnailOptions};
use crate::assets::ResourceLoader;
use crate::canvas::{Canvas, FontSpec, Path, Shadow, TextAlign, TextBaseline, deg_to_rad};
use crate::color::{Rgba, parse_color};
use crate::template::{
    Align, DynamicFieldData, Element, ElementKind, ElementStyle, QrCodeData, ShapeData, ShapeKind,
    TableData, TextData,
};

/// Grid cells per axis drawn for a table, whatever its box size.
const MAX_GRID_CELLS: u32 = 4096;

const DEFAULT_FONT_SIZE: f32 = 12.0;
const DEFAULT_FONT_FAMILY: &str = "Arial";
const LINE_HEIGHT: f32 = 1.2;

const FIELD_ACCENT: Rgba = Rgba::rgb(0x00, 0x7a, 0xcc);
const FIELD_DASH: [f32; 2] = [5.0, 5.0];
const FIELD_FONT_SIZE: f32 = 10.0;

const PLACEHOLDER_FILL: Rgba = Rgba::rgb(0xf0, 0xf0, 0xf0);
const PLACEHOLDER_BORDER: Rgba = Rgba::rgb(0xcc, 0xcc, 0xcc);
const PLACEHOLDER_LABEL: Rgba = Rgba::rgb(0x66, 0x66, 0x66);

/// Element rectangle in device pixels.
#[derive(Debug, Clone, Copy)]
struct PixelRect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl PixelRect {
    fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Paint one element at `scale` pixels per millimeter.
pub async fn paint_element<C: Canvas + Send>(
    canvas: &mut C,
    element: &Element,
    index: usize,
    scale: f32,
    loader: &dyn ResourceLoader,
    options: &ThumbnailOptions,
    issues: &mut Vec<RenderIssue>,
) {
    let rect = PixelRect {
        x: element.position.x * scale,
        y: element.position.y * scale,
        width: element.size.width * scale,
        height: element.size.height * scale,
    };

    canvas.save();
    if element.rotation != 0.0 {
        let (cx, cy) = rect.center();
        canvas.translate(cx, cy);
        canvas.rotate(deg_to_rad(element.rotation));
        canvas.translate(-cx, -cy);
    }

    if let Some(style) = &element.style {
        apply_styles(canvas, style);
    }

    let style = element.style.as_ref();
    let issue = match &element.kind {
        ElementKind::Text(data) => {
            draw_text(canvas, data, style, rect, scale);
            None
        }
        ElementKind::Image(data) => match data.source() {
            Some(url) => match loader.load_image(url).await {
                Ok(image) => {
                    canvas.draw_image(&image, rect.x, rect.y, rect.width, rect.height);
                    None
                }
                Err(e) => {
                    paint_placeholder(canvas, rect.x, rect.y, rect.width, rect.height, "IMG");
                    Some((IssueKind::AssetUnavailable, e.to_string()))
                }
            },
            None => {
                paint_placeholder(canvas, rect.x, rect.y, rect.width, rect.height, "IMG");
                Some((IssueKind::AssetUnavailable, "image element has no url".to_string()))
            }
        },
        ElementKind::QrCode(data) => match options.qr_mode {
            QrMode::Placeholder => {
                paint_placeholder(canvas, rect.x, rect.y, rect.width, rect.height, "QR");
                None
            }
            QrMode::Encode => draw_qr(canvas, data, rect),
        },
        ElementKind::Shape(data) => draw_shape(canvas, data, style, rect),
        ElementKind::DynamicField(data) => {
            draw_dynamic_field(canvas, data, rect, scale);
            None
        }
        ElementKind::Table(data) => {
            draw_table(canvas, data, rect);
            None
        }
        ElementKind::Unknown { kind } => {
            let label = kind.to_uppercase();
            paint_placeholder(canvas, rect.x, rect.y, rect.width, rect.height, &label);
            Some((IssueKind::UnknownElement, format!("unknown element type '{}'", kind)))
        }
    };
    canvas.restore();

    if let Some((kind, message)) = issue {
        issues.push(RenderIssue {
            element_index: Some(index),
            element_id: element.id.clone(),
            kind,
            message,
        });
    }
}

/// Set canvas state from an element's style.
///
/// Invalid colors are ignored, like assigning a bad color string to a
/// canvas. A background color replaces the text color as fill.
fn apply_styles<C: Canvas>(canvas: &mut C, style: &ElementStyle) {
    if let Some(family) = &style.font {
        canvas.set_font(
            FontSpec::new(family.clone(), style_font_size(style))
                .bold(style.is_bold())
                .italic(style.is_italic()),
        );
    }
    if let Some(color) = style.color.as_deref().and_then(parse_color) {
        canvas.set_fill_color(color);
    }
    if let Some(align) = style.align {
        canvas.set_text_align(text_align(align));
    }
    if let Some(color) = style.border_color.as_deref().and_then(parse_color) {
        canvas.set_stroke_color(color);
    }
    if let Some(width) = style.border_width {
        canvas.set_line_width(width);
    }
    if let Some(color) = style.background_color.as_deref().and_then(parse_color) {
        canvas.set_fill_color(color);
    }
    if let Some(color) = style.shadow_color.as_deref().and_then(parse_color) {
        canvas.set_shadow(Some(Shadow {
            color,
            blur: style.shadow_blur.unwrap_or(0.0).max(0.0),
            offset_x: style.shadow_offset_x.unwrap_or(0.0),
            offset_y: style.shadow_offset_y.unwrap_or(0.0),
        }));
    }
    if let Some(opacity) = style.opacity {
        canvas.set_global_alpha(opacity.clamp(0.0, 1.0));
    }
}

/// Font size from the style in template units; missing or zero means 12.
fn style_font_size(style: &ElementStyle) -> f32 {
    style
        .size
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE)
}

fn text_align(align: Align) -> TextAlign {
    match align {
        Align::Left => TextAlign::Left,
        Align::Center => TextAlign::Center,
        Align::Right => TextAlign::Right,
    }
}

fn draw_text<C: Canvas>(
    canvas: &mut C,
    data: &TextData,
    style: Option<&ElementStyle>,
    rect: PixelRect,
    scale: f32,
) {
    let font_size = style.map(style_font_size).unwrap_or(DEFAULT_FONT_SIZE) * scale;
    let family = style
        .and_then(|s| s.font.clone())
        .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());
    let bold = style.is_some_and(ElementStyle::is_bold);
    let italic = style.is_some_and(ElementStyle::is_italic);
    let color = style
        .and_then(|s| s.color.as_deref())
        .and_then(parse_color)
        .unwrap_or(Rgba::BLACK);
    let align = style.and_then(|s| s.align).map(text_align).unwrap_or_default();
    let underline = style.and_then(|s| s.underline).unwrap_or(false);

    canvas.set_font(FontSpec::new(family, font_size).bold(bold).italic(italic));
    canvas.set_fill_color(color);
    canvas.set_text_align(align);

    let line_height = font_size * LINE_HEIGHT;
    for (i, line) in data.display_content().split('\n').enumerate() {
        let baseline = rect.y + font_size + i as f32 * line_height;
        canvas.fill_text(line, rect.x, baseline);

        if underline && !line.is_empty() {
            let width = canvas.measure_text(line);
            let left = match align {
                TextAlign::Left => rect.x,
                TextAlign::Center => rect.x - width / 2.0,
                TextAlign::Right => rect.x - width,
            };
            let thickness = (font_size / 15.0).max(1.0);
            canvas.fill_rect(left, baseline + font_size * 0.1, width, thickness);
        }
    }
}

/// Shape paint comes from the element style first, then the shape's own
/// settings, then black with a 1px line and no fill.
fn draw_shape<C: Canvas>(
    canvas: &mut C,
    data: &ShapeData,
    style: Option<&ElementStyle>,
    rect: PixelRect,
) -> Option<(IssueKind, String)> {
    let stroke = style
        .and_then(|s| s.border_color.as_deref())
        .and_then(parse_color)
        .or_else(|| data.stroke_color.as_deref().and_then(parse_color))
        .unwrap_or(Rgba::BLACK);
    let line_width = style
        .and_then(|s| s.border_width)
        .or(data.stroke_width)
        .filter(|w| w.is_finite() && *w > 0.0)
        .unwrap_or(1.0);
    let background = style
        .and_then(|s| s.background_color.as_deref())
        .and_then(parse_color)
        .or_else(|| data.fill_color.as_deref().and_then(parse_color));

    canvas.set_stroke_color(stroke);
    canvas.set_line_width(line_width);
    if let Some(fill) = background {
        canvas.set_fill_color(fill);
    }

    let PixelRect {
        x,
        y,
        width,
        height,
    } = rect;
    match &data.shape {
        ShapeKind::Rectangle => {
            if background.is_some() {
                canvas.fill_rect(x, y, width, height);
            }
            canvas.stroke_rect(x, y, width, height);
        }
        ShapeKind::Circle => {
            let mut path = Path::new();
            let (cx, cy) = rect.center();
            path.arc(cx, cy, width.min(height) / 2.0, 0.0, 2.0 * PI);
            if background.is_some() {
                canvas.fill_path(&path);
            }
            canvas.stroke_path(&path);
        }
        ShapeKind::Triangle => {
            let mut path = Path::new();
            path.move_to(x + width / 2.0, y);
            path.line_to(x, y + height);
            path.line_to(x + width, y + height);
            path.close();
            if background.is_some() {
                canvas.fill_path(&path);
            }
            canvas.stroke_path(&path);
        }
        ShapeKind::Line => {
            canvas.stroke_path(&Path::line(x, y, x + width, y + height));
        }
        ShapeKind::Other(name) => {
            paint_placeholder(canvas, x, y, width, height, "SHAPE");
            return Some((
                IssueKind::UnsupportedShape,
                format!("unsupported shape '{}'", name),
            ));
        }
    }
    None
}

fn draw_dynamic_field<C: Canvas>(
    canvas: &mut C,
    data: &DynamicFieldData,
    rect: PixelRect,
    scale: f32,
) {
    canvas.set_stroke_color(FIELD_ACCENT);
    canvas.set_line_width(1.0);
    canvas.set_line_dash(&FIELD_DASH);
    canvas.stroke_rect(rect.x, rect.y, rect.width, rect.height);
    canvas.set_line_dash(&[]);

    let (cx, cy) = rect.center();
    canvas.set_font(FontSpec::new(DEFAULT_FONT_FAMILY, FIELD_FONT_SIZE * scale));
    canvas.set_fill_color(FIELD_ACCENT);
    canvas.set_text_align(TextAlign::Center);
    canvas.set_text_baseline(TextBaseline::Middle);
    canvas.fill_text(data.display_name(), cx, cy);
}

/// Grid lines only; cell contents are not drawn in thumbnails.
fn draw_table<C: Canvas>(canvas: &mut C, data: &TableData, rect: PixelRect) {
    let rows = visible_cells(data.row_count(), rect.height);
    let columns = visible_cells(data.column_count(), rect.width);
    let cell_width = rect.width / columns as f32;
    let cell_height = rect.height / rows as f32;

    let stroke = data
        .style
        .border_color
        .as_deref()
        .and_then(parse_color)
        .unwrap_or(Rgba::BLACK);
    let line_width = data.style.border_width.filter(|w| *w > 0.0).unwrap_or(1.0);
    canvas.set_stroke_color(stroke);
    canvas.set_line_width(line_width);

    for i in 0..=rows {
        let y = rect.y + i as f32 * cell_height;
        canvas.stroke_path(&Path::line(rect.x, y, rect.x + rect.width, y));
    }
    for j in 0..=columns {
        let x = rect.x + j as f32 * cell_width;
        canvas.stroke_path(&Path::line(x, rect.y, x, rect.y + rect.height));
    }
}

/// Cap a cell count at one cell per pixel of the box; finer grids are a
/// solid block either way.
fn visible_cells(count: u32, extent: f32) -> u32 {
    let limit = if extent.is_finite() {
        extent.abs().floor().clamp(1.0, MAX_GRID_CELLS as f32) as u32
    } else {
        1
    };
    count.min(limit)
}

/// Error correction level from a schema string; defaults to M.
fn ec_level(name: Option<&str>) -> EcLevel {
    match name.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("L") => EcLevel::L,
        Some("Q") => EcLevel::Q,
        Some("H") => EcLevel::H,
        _ => EcLevel::M,
    }
}

/// Draw a scannable QR symbol centered in the element box.
fn draw_qr<C: Canvas>(
    canvas: &mut C,
    data: &QrCodeData,
    rect: PixelRect,
) -> Option<(IssueKind, String)> {
    if data.content.is_empty() {
        paint_placeholder(canvas, rect.x, rect.y, rect.width, rect.height, "QR");
        return None;
    }
    let code = match QrCode::with_error_correction_level(
        data.content.as_bytes(),
        ec_level(data.error_correction.as_deref()),
    ) {
        Ok(code) => code,
        Err(e) => {
            paint_placeholder(canvas, rect.x, rect.y, rect.width, rect.height, "QR");
            return Some((IssueKind::QrEncode, format!("QR code generation failed: {}", e)));
        }
    };

    let foreground = data
        .foreground_color
        .as_deref()
        .and_then(parse_color)
        .unwrap_or(Rgba::BLACK);
    let background = data
        .background_color
        .as_deref()
        .and_then(parse_color)
        .unwrap_or(Rgba::WHITE);

    // Two-module quiet zone on each side
    let modules = code.width();
    let side = rect.width.min(rect.height);
    let module = side / (modules + 4) as f32;
    let left = rect.x + (rect.width - side) / 2.0 + 2.0 * module;
    let top = rect.y + (rect.height - side) / 2.0 + 2.0 * module;

    canvas.set_fill_color(background);
    canvas.fill_rect(
        rect.x + (rect.width - side) / 2.0,
        rect.y + (rect.height - side) / 2.0,
        side,
        side,
    );

    let mut dark = Path::new();
    for qy in 0..modules {
        for qx in 0..modules {
            if code[(qx, qy)] == qrcode::Color::Dark {
                let x = left + qx as f32 * module;
                let y = top + qy as f32 * module;
                dark.subpaths.extend(Path::rect(x, y, module, module).subpaths);
            }
        }
    }
    canvas.set_fill_color(foreground);
    canvas.fill_path(&dark);
    None
}

/// Gray box with a centered label, used wherever content cannot be drawn.
pub fn paint_placeholder<C: Canvas>(
    canvas: &mut C,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    label: &str,
) {
    canvas.set_fill_color(PLACEHOLDER_FILL);
    canvas.fill_rect(x, y, width, height);

    canvas.set_stroke_color(PLACEHOLDER_BORDER);
    canvas.set_line_width(1.0);
    canvas.stroke_rect(x, y, width, height);

    canvas.set_fill_color(PLACEHOLDER_LABEL);
    canvas.set_font(FontSpec::new(DEFAULT_FONT_FAMILY, width.min(height) / 3.0));
    canvas.set_text_align(TextAlign::Center);
    canvas.set_text_baseline(TextBaseline::Middle);
    canvas.fill_text(label, x + width / 2.0, y + height / 2.0);
}
