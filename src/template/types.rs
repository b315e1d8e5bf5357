//! Element types for the template schema.
//!
//! Elements arrive from the editor as `{"type": ..., "position": ..., "size":
//! ..., "style": ..., "data": ...}` objects where the shape of `data` depends
//! on `type`. On the Rust side the pair becomes a single [`ElementKind`] with
//! one variant per kind, each carrying its own typed payload, so the draw
//! dispatch is an exhaustive match.
//!
//! Payload fields use the same defaults the editor's renderer applies to
//! absent or empty values (e.g. text content falls back to `"Text"`, a table
//! without rows gets three).

use serde::{Deserialize, Serialize};

/// Top-left corner of an element, in template-space millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Element extent, in template-space millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// Horizontal text alignment relative to the text anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Optional visual properties of an element.
///
/// Every field is optional; an absent field means "do not apply this visual
/// property". Keys are camelCase, matching the editor's JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyle {
    #[serde(default)]
    pub font: Option<String>,
    /// Font size in template points; scaled with the page.
    #[serde(default)]
    pub size: Option<f32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub bold: Option<bool>,
    #[serde(default)]
    pub italic: Option<bool>,
    #[serde(default)]
    pub underline: Option<bool>,
    #[serde(default)]
    pub align: Option<Align>,
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub border_width: Option<f32>,
    #[serde(default)]
    pub background_color: Option<String>,
    /// 0.0 (invisible) to 1.0 (opaque).
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub shadow_color: Option<String>,
    #[serde(default)]
    pub shadow_blur: Option<f32>,
    #[serde(default)]
    pub shadow_offset_x: Option<f32>,
    #[serde(default)]
    pub shadow_offset_y: Option<f32>,
}

impl ElementStyle {
    pub fn is_bold(&self) -> bool {
        self.bold.unwrap_or(false)
    }

    pub fn is_italic(&self) -> bool {
        self.italic.unwrap_or(false)
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// Text element payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextData {
    #[serde(default)]
    pub content: String,
}

impl TextData {
    /// Content to paint; empty content shows the editor's `"Text"` stand-in.
    pub fn display_content(&self) -> &str {
        if self.content.is_empty() {
            "Text"
        } else {
            &self.content
        }
    }
}

/// Image element payload. `url` wins over `asset_url` when both are set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub asset_url: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

impl ImageData {
    /// The URL to load, ignoring empty strings.
    pub fn source(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.asset_url.as_deref().filter(|u| !u.is_empty()))
    }
}

/// QR code element payload.
///
/// The thumbnail shows a placeholder for QR codes; the payload is only
/// encoded when the caller opts into [`crate::render::QrMode::Encode`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QrCodeData {
    #[serde(default)]
    pub content: String,
    /// "L", "M" (default), "Q" or "H".
    #[serde(default)]
    pub error_correction: Option<String>,
    #[serde(default)]
    pub foreground_color: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
}

/// Shape kinds. Anything the renderer does not know is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(into = "String")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Circle,
    Triangle,
    Line,
    Other(String),
}

impl From<String> for ShapeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "rectangle" => ShapeKind::Rectangle,
            "circle" => ShapeKind::Circle,
            "triangle" => ShapeKind::Triangle,
            "line" => ShapeKind::Line,
            _ => ShapeKind::Other(s),
        }
    }
}

impl From<ShapeKind> for String {
    fn from(kind: ShapeKind) -> Self {
        match kind {
            ShapeKind::Rectangle => "rectangle".into(),
            ShapeKind::Circle => "circle".into(),
            ShapeKind::Triangle => "triangle".into(),
            ShapeKind::Line => "line".into(),
            ShapeKind::Other(s) => s,
        }
    }
}

impl<'de> Deserialize<'de> for ShapeKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ShapeKind::from(s))
    }
}

/// Shape element payload.
///
/// `fill_color` / `stroke_color` / `stroke_width` are the editor's own shape
/// settings; the element style (`backgroundColor`, `borderColor`,
/// `borderWidth`) takes precedence when present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeData {
    #[serde(default)]
    pub shape: ShapeKind,
    #[serde(default)]
    pub fill_color: Option<String>,
    #[serde(default)]
    pub stroke_color: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f32>,
}

/// Dynamic field payload: a variable filled in at document-generation time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicFieldData {
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub field_type: Option<String>,
}

impl DynamicFieldData {
    /// Name shown inside the dashed box.
    pub fn display_name(&self) -> &str {
        if !self.field_name.is_empty() {
            &self.field_name
        } else {
            self.label
                .as_deref()
                .filter(|l| !l.is_empty())
                .unwrap_or("Field")
        }
    }
}

/// Border settings of a table grid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableStyle {
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub border_width: Option<f32>,
}

/// Table element payload. Cell text is carried but not painted in previews.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableData {
    #[serde(default)]
    pub rows: u32,
    #[serde(default)]
    pub columns: u32,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default, alias = "cells")]
    pub data: Vec<Vec<String>>,
    #[serde(default)]
    pub style: TableStyle,
}

impl TableData {
    /// Row count, treating 0 as "unset" (3 rows).
    pub fn row_count(&self) -> u32 {
        if self.rows == 0 { 3 } else { self.rows }
    }

    /// Column count, treating 0 as "unset" (3 columns).
    pub fn column_count(&self) -> u32 {
        if self.columns == 0 { 3 } else { self.columns }
    }
}

// ============================================================================
// ELEMENT
// ============================================================================

/// The closed set of element kinds, each with its typed payload.
///
/// `Unknown` holds element types from newer schema versions; they are painted
/// as a labeled placeholder instead of failing the whole template.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Text(TextData),
    Image(ImageData),
    QrCode(QrCodeData),
    Shape(ShapeData),
    DynamicField(DynamicFieldData),
    Table(TableData),
    Unknown { kind: String },
}

impl ElementKind {
    /// The schema `type` string of this kind.
    pub fn type_name(&self) -> &str {
        match self {
            ElementKind::Text(_) => "text",
            ElementKind::Image(_) => "image",
            ElementKind::QrCode(_) => "qr_code",
            ElementKind::Shape(_) => "shape",
            ElementKind::DynamicField(_) => "dynamic_field",
            ElementKind::Table(_) => "table",
            ElementKind::Unknown { kind } => kind,
        }
    }

    /// Build a kind from the schema `type` string and its raw `data` payload.
    ///
    /// A `null` or absent payload deserializes to the payload's defaults.
    pub fn from_parts(kind: &str, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        let data = if data.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            data
        };
        Ok(match kind {
            "text" => ElementKind::Text(serde_json::from_value(data)?),
            "image" => ElementKind::Image(serde_json::from_value(data)?),
            "qr_code" => ElementKind::QrCode(deserialize_qr(data)?),
            "shape" => ElementKind::Shape(serde_json::from_value(data)?),
            "dynamic_field" => ElementKind::DynamicField(serde_json::from_value(data)?),
            "table" => ElementKind::Table(serde_json::from_value(data)?),
            other => ElementKind::Unknown {
                kind: other.to_string(),
            },
        })
    }
}

/// QR payloads appear both as `{"content": ...}` and as a bare string.
fn deserialize_qr(data: serde_json::Value) -> Result<QrCodeData, serde_json::Error> {
    match data {
        serde_json::Value::String(content) => Ok(QrCodeData {
            content,
            ..Default::default()
        }),
        other => serde_json::from_value(other),
    }
}

fn default_true() -> bool {
    true
}

/// Wire form of an element, before `type` + `data` are fused.
#[derive(Deserialize)]
struct RawElement {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    kind: String,
    position: Position,
    size: Size,
    #[serde(default)]
    rotation: f32,
    #[serde(default, rename = "zIndex", alias = "z_index")]
    z_index: i32,
    #[serde(default)]
    locked: bool,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    style: Option<ElementStyle>,
    #[serde(default)]
    data: serde_json::Value,
}

/// One positioned, styled, typed unit of content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawElement")]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    pub position: Position,
    pub size: Size,
    /// Degrees, applied around the element's own center.
    pub rotation: f32,
    /// Carried for editors; paint order is schema order.
    pub z_index: i32,
    pub locked: bool,
    pub visible: bool,
    pub style: Option<ElementStyle>,
}

impl TryFrom<RawElement> for Element {
    type Error = String;

    fn try_from(raw: RawElement) -> Result<Self, Self::Error> {
        let kind = ElementKind::from_parts(&raw.kind, raw.data)
            .map_err(|e| format!("{} element data: {}", raw.kind, e))?;
        Ok(Element {
            id: raw.id,
            kind,
            position: raw.position,
            size: raw.size,
            rotation: raw.rotation,
            z_index: raw.z_index,
            locked: raw.locked,
            visible: raw.visible,
            style: raw.style,
        })
    }
}

impl Element {
    /// Create a visible, unrotated, unstyled element.
    pub fn new(kind: ElementKind, position: Position, size: Size) -> Self {
        Self {
            id: String::new(),
            kind,
            position,
            size,
            rotation: 0.0,
            z_index: 0,
            locked: false,
            visible: true,
            style: None,
        }
    }

    pub fn with_style(mut self, style: ElementStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Element {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_text_element() {
        let el = parse(
            r#"{"type": "text", "position": {"x": 10, "y": 20}, "size": {"width": 50, "height": 10},
                "style": {"size": 14, "bold": true, "align": "center"},
                "data": {"content": "Hello"}}"#,
        );
        assert!(matches!(&el.kind, ElementKind::Text(t) if t.content == "Hello"));
        assert_eq!(el.position, Position { x: 10.0, y: 20.0 });
        assert!(el.visible);
        assert_eq!(el.rotation, 0.0);
        let style = el.style.unwrap();
        assert_eq!(style.size, Some(14.0));
        assert!(style.is_bold());
        assert_eq!(style.align, Some(Align::Center));
    }

    #[test]
    fn test_style_camel_case_keys() {
        let el = parse(
            r##"{"type": "shape", "position": {"x": 0, "y": 0}, "size": {"width": 5, "height": 5},
                "style": {"borderColor": "#ff0000", "borderWidth": 2, "backgroundColor": "#00ff00",
                          "shadowColor": "#000", "shadowBlur": 4, "shadowOffsetX": 1, "shadowOffsetY": 2},
                "data": {"shape": "circle"}}"##,
        );
        let style = el.style.unwrap();
        assert_eq!(style.border_color.as_deref(), Some("#ff0000"));
        assert_eq!(style.border_width, Some(2.0));
        assert_eq!(style.background_color.as_deref(), Some("#00ff00"));
        assert_eq!(style.shadow_blur, Some(4.0));
        assert_eq!(style.shadow_offset_y, Some(2.0));
    }

    #[test]
    fn test_missing_data_uses_defaults() {
        let el = parse(
            r#"{"type": "table", "position": {"x": 0, "y": 0}, "size": {"width": 5, "height": 5}}"#,
        );
        match el.kind {
            ElementKind::Table(t) => {
                assert_eq!(t.row_count(), 3);
                assert_eq!(t.column_count(), 3);
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_text_empty_content_shows_stand_in() {
        assert_eq!(TextData::default().display_content(), "Text");
        let t = TextData {
            content: "A\nB".into(),
        };
        assert_eq!(t.display_content(), "A\nB");
    }

    #[test]
    fn test_shape_kinds() {
        assert_eq!(ShapeKind::from("circle".to_string()), ShapeKind::Circle);
        assert_eq!(
            ShapeKind::from("arrow".to_string()),
            ShapeKind::Other("arrow".into())
        );
        let el = parse(
            r#"{"type": "shape", "position": {"x": 0, "y": 0}, "size": {"width": 5, "height": 5},
                "data": {"shape": "hexagon"}}"#,
        );
        assert!(
            matches!(el.kind, ElementKind::Shape(ShapeData { shape: ShapeKind::Other(ref s), .. }) if s == "hexagon")
        );
    }

    #[test]
    fn test_image_source_precedence() {
        let both = ImageData {
            url: Some("a.png".into()),
            asset_url: Some("b.png".into()),
            ..Default::default()
        };
        assert_eq!(both.source(), Some("a.png"));
        let asset_only = ImageData {
            url: Some(String::new()),
            asset_url: Some("b.png".into()),
            ..Default::default()
        };
        assert_eq!(asset_only.source(), Some("b.png"));
        assert_eq!(ImageData::default().source(), None);
    }

    #[test]
    fn test_qr_bare_string_payload() {
        let el = parse(
            r#"{"type": "qr_code", "position": {"x": 0, "y": 0}, "size": {"width": 5, "height": 5},
                "data": "https://example.com"}"#,
        );
        assert!(matches!(el.kind, ElementKind::QrCode(ref q) if q.content == "https://example.com"));
    }

    #[test]
    fn test_unknown_type_is_kept() {
        let el = parse(
            r#"{"type": "barcode", "position": {"x": 0, "y": 0}, "size": {"width": 5, "height": 5}}"#,
        );
        assert_eq!(el.kind.type_name(), "barcode");
        assert!(matches!(el.kind, ElementKind::Unknown { .. }));
    }

    #[test]
    fn test_visibility_and_z_index() {
        let el = parse(
            r#"{"type": "text", "position": {"x": 0, "y": 0}, "size": {"width": 5, "height": 5},
                "visible": false, "zIndex": 7, "rotation": 45}"#,
        );
        assert!(!el.visible);
        assert_eq!(el.z_index, 7);
        assert_eq!(el.rotation, 45.0);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let result: Result<Element, _> = serde_json::from_str(
            r#"{"type": "table", "position": {"x": 0, "y": 0}, "size": {"width": 5, "height": 5},
                "data": {"rows": "many"}}"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("table element data"), "unexpected error: {}", err);
    }

    #[test]
    fn test_dynamic_field_display_name() {
        let named = DynamicFieldData {
            field_name: "serial".into(),
            ..Default::default()
        };
        assert_eq!(named.display_name(), "serial");
        let labeled = DynamicFieldData {
            label: Some("Serial number".into()),
            ..Default::default()
        };
        assert_eq!(labeled.display_name(), "Serial number");
        assert_eq!(DynamicFieldData::default().display_name(), "Field");
    }
}
