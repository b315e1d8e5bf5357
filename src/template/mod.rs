//! # Template Model
//!
//! The JSON description of a document template: page settings plus an
//! ordered list of elements. The same types are constructible in Rust and
//! deserializable from the editor's JSON.
//!
//! ```
//! use docthumb::template::*;
//!
//! let schema: TemplateSchema = serde_json::from_str(r#"{
//!     "page_size": "A4",
//!     "orientation": "landscape",
//!     "elements": [
//!         {"type": "text", "position": {"x": 10, "y": 10},
//!          "size": {"width": 100, "height": 20}, "data": {"content": "Warranty"}}
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(schema.page_dimensions_mm(), (297.0, 210.0));
//! assert_eq!(schema.elements.len(), 1);
//! ```

pub mod types;

pub use types::*;

use serde::{Deserialize, Serialize};

// ============================================================================
// PAGE GEOMETRY
// ============================================================================

/// Physical page formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    #[serde(alias = "a4")]
    A4,
    #[serde(alias = "a5")]
    A5,
    #[serde(alias = "letter", alias = "LETTER")]
    Letter,
}

impl PageSize {
    /// Portrait `(width, height)` in millimeters.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::A5 => (148.0, 210.0),
            PageSize::Letter => (216.0, 279.0),
        }
    }
}

/// Page orientation. Landscape swaps the page's width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page `(width, height)` in millimeters after applying orientation.
pub fn page_dimensions_mm(page_size: PageSize, orientation: Orientation) -> (f32, f32) {
    let (w, h) = page_size.dimensions_mm();
    match orientation {
        Orientation::Portrait => (w, h),
        Orientation::Landscape => (h, w),
    }
}

/// Pixels per millimeter for painting a page into a `pixel_width` x
/// `pixel_height` raster.
///
/// The smaller of the two axis ratios wins so the page keeps its aspect
/// ratio. Painting is anchored at the top-left corner; any leftover margin on
/// the other axis stays blank.
pub fn compute_scale(
    page_size: PageSize,
    orientation: Orientation,
    pixel_width: u32,
    pixel_height: u32,
) -> f32 {
    let (page_w, page_h) = page_dimensions_mm(page_size, orientation);
    let scale_x = pixel_width as f32 / page_w;
    let scale_y = pixel_height as f32 / page_h;
    scale_x.min(scale_y)
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Deserialize `elements`, treating `null` and non-array values as empty.
fn deserialize_elements<'de, D>(deserializer: D) -> Result<Vec<Element>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                serde_json::from_value(v)
                    .map_err(|e| serde::de::Error::custom(format!("elements[{}]: {}", i, e)))
            })
            .collect(),
        _ => Ok(Vec::new()),
    }
}

/// Page settings plus the ordered element list. Element order is paint order.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TemplateSchema {
    #[serde(default)]
    pub page_size: PageSize,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default, deserialize_with = "deserialize_elements")]
    pub elements: Vec<Element>,
}

impl TemplateSchema {
    pub fn new(page_size: PageSize, orientation: Orientation) -> Self {
        Self {
            page_size,
            orientation,
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Parse a schema document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Page `(width, height)` in millimeters after applying orientation.
    pub fn page_dimensions_mm(&self) -> (f32, f32) {
        page_dimensions_mm(self.page_size, self.orientation)
    }

    /// Pixels per millimeter for a raster of the given size.
    pub fn scale_for(&self, pixel_width: u32, pixel_height: u32) -> f32 {
        compute_scale(self.page_size, self.orientation, pixel_width, pixel_height)
    }
}

// ============================================================================
// TEMPLATE
// ============================================================================

/// Template metadata as kept by the surrounding application.
///
/// Only `name` and the schema reference matter to the renderer. When
/// `schema` is set it is used directly; otherwise `json_schema_url` is
/// fetched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub json_schema_url: Option<String>,
    #[serde(default)]
    pub schema: Option<TemplateSchema>,
}

impl Template {
    /// A template whose schema lives at `url`.
    pub fn with_schema_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            json_schema_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// A template carrying its schema inline.
    pub fn with_schema(name: impl Into<String>, schema: TemplateSchema) -> Self {
        Self {
            name: name.into(),
            schema: Some(schema),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_dimensions_table() {
        let cases = [
            (PageSize::A4, Orientation::Portrait, (210.0, 297.0)),
            (PageSize::A4, Orientation::Landscape, (297.0, 210.0)),
            (PageSize::A5, Orientation::Portrait, (148.0, 210.0)),
            (PageSize::A5, Orientation::Landscape, (210.0, 148.0)),
            (PageSize::Letter, Orientation::Portrait, (216.0, 279.0)),
            (PageSize::Letter, Orientation::Landscape, (279.0, 216.0)),
        ];
        for (size, orientation, expected) in cases {
            assert_eq!(
                page_dimensions_mm(size, orientation),
                expected,
                "{:?} {:?}",
                size,
                orientation
            );
        }
    }

    #[test]
    fn test_scale_uses_shorter_axis() {
        // 300x424 over 210x297: x ratio 1.4286, y ratio 1.4276
        let s = compute_scale(PageSize::A4, Orientation::Portrait, 300, 424);
        assert!((s - 424.0 / 297.0).abs() < 1e-6);

        // Landscape into a portrait raster: width limits
        let s = compute_scale(PageSize::A4, Orientation::Landscape, 300, 424);
        assert!((s - 300.0 / 297.0).abs() < 1e-6);
    }

    #[test]
    fn test_scale_for_exact_page() {
        let s = compute_scale(PageSize::A5, Orientation::Portrait, 148, 210);
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_schema_defaults() {
        let schema = TemplateSchema::from_json("{}").unwrap();
        assert_eq!(schema.page_size, PageSize::A4);
        assert_eq!(schema.orientation, Orientation::Portrait);
        assert!(schema.elements.is_empty());
    }

    #[test]
    fn test_schema_page_names() {
        let schema =
            TemplateSchema::from_json(r#"{"page_size": "Letter", "orientation": "landscape"}"#)
                .unwrap();
        assert_eq!(schema.page_size, PageSize::Letter);
        assert_eq!(schema.page_dimensions_mm(), (279.0, 216.0));

        let lower = TemplateSchema::from_json(r#"{"page_size": "a5"}"#).unwrap();
        assert_eq!(lower.page_size, PageSize::A5);
    }

    #[test]
    fn test_schema_non_array_elements_is_empty() {
        let schema = TemplateSchema::from_json(r#"{"elements": null}"#).unwrap();
        assert!(schema.elements.is_empty());
        let schema = TemplateSchema::from_json(r#"{"elements": {"not": "a list"}}"#).unwrap();
        assert!(schema.elements.is_empty());
    }

    #[test]
    fn test_schema_bad_element_reports_index() {
        let err = TemplateSchema::from_json(
            r#"{"elements": [
                {"type": "text", "position": {"x": 0, "y": 0}, "size": {"width": 1, "height": 1}},
                {"type": "text", "position": {"x": 0}}
            ]}"#,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("elements[1]"), "unexpected error: {}", err);
    }

    #[test]
    fn test_template_inline_schema() {
        let template: Template = serde_json::from_str(
            r#"{"id": "t-1", "name": "Warranty", "schema": {"page_size": "A5"}}"#,
        )
        .unwrap();
        assert_eq!(template.name, "Warranty");
        assert_eq!(template.schema.unwrap().page_size, PageSize::A5);
        assert!(template.json_schema_url.is_none());
    }
}
