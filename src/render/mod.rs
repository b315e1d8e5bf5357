//! # Template Rasterizer
//!
//! Paints a [`TemplateSchema`] onto a [`Canvas`] and encodes the result.
//!
//! ## Rendering Pipeline
//!
//! ```text
//! Template → resolve schema → clear to white → scale (mm → px) → paint elements → encode
//!                 │                                                  │
//!                 └── failure: whole-template placeholder             └── failure: element placeholder
//! ```
//!
//! A render always yields an image. Missing schemas, broken image links and
//! unknown shapes become gray placeholders and are reported through
//! [`Thumbnail::issues`]. Sizes the output format cannot store are rejected
//! as [`ThumbnailError::InvalidOptions`] before painting; past that point
//! only an encoder error is returned as an error.
//!
//! ## Example
//!
//! ```no_run
//! use docthumb::{Rasterizer, RendererConfig, Template, ThumbnailOptions};
//!
//! # async fn example() -> Result<(), docthumb::ThumbnailError> {
//! let mut rasterizer = Rasterizer::from_config(&RendererConfig::default())?;
//! let template = Template::with_schema_url("Warranty", "https://cdn.example.com/t/42.json");
//! let thumb = rasterizer
//!     .render_thumbnail(&template, &ThumbnailOptions::default())
//!     .await?;
//! assert_eq!(thumb.mime_type(), "image/jpeg");
//! # Ok(())
//! # }
//! ```

mod elements;
mod pool;

pub use elements::{paint_element, paint_placeholder};
pub use pool::{PooledRasterizer, RasterizerPool};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::assets::{HttpLoader, ResourceLoader};
use crate::canvas::{Canvas, FontBook, Surface};
use crate::color::Rgba;
use crate::config::RendererConfig;
use crate::encode::{self, Thumbnail, ThumbnailFormat};
use crate::error::ThumbnailError;
use crate::template::{Template, TemplateSchema};

/// How QR code elements are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrMode {
    /// Gray "QR" placeholder box, as the template gallery shows them.
    #[default]
    Placeholder,
    /// Encode the element's payload as a real QR symbol.
    Encode,
}

/// Output settings for one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailOptions {
    pub width: u32,
    pub height: u32,
    /// 0..1; JPEG only.
    pub quality: f32,
    pub format: ThumbnailFormat,
    pub qr_mode: QrMode,
}

impl Default for ThumbnailOptions {
    /// 300x424 (A4 ratio) JPEG at quality 0.8.
    fn default() -> Self {
        Self {
            width: 300,
            height: 424,
            quality: 0.8,
            format: ThumbnailFormat::Jpeg,
            qr_mode: QrMode::Placeholder,
        }
    }
}

impl ThumbnailOptions {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_format(mut self, format: ThumbnailFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_qr_mode(mut self, qr_mode: QrMode) -> Self {
        self.qr_mode = qr_mode;
        self
    }

    /// Reject sizes that cannot describe an image or that the output format
    /// cannot store, before anything is painted.
    pub fn validate(&self) -> Result<(), ThumbnailError> {
        if self.width == 0 || self.height == 0 {
            return Err(ThumbnailError::InvalidOptions(format!(
                "Thumbnail size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        let max = self.format.max_dimension();
        if self.width > max || self.height > max {
            return Err(ThumbnailError::InvalidOptions(format!(
                "{} thumbnails are at most {}px per side, got {}x{}",
                self.format, max, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// What went wrong, for a contained failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The schema could not be resolved; the whole template is a placeholder.
    SchemaUnavailable,
    /// An image element had no source or its image failed to load.
    AssetUnavailable,
    /// A shape element named a shape with no draw routine.
    UnsupportedShape,
    /// An element type this renderer does not know.
    UnknownElement,
    /// A QR payload could not be encoded.
    QrEncode,
}

/// A failure that was painted over with a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderIssue {
    /// Index into the schema's element list; `None` for template-level issues.
    pub element_index: Option<usize>,
    pub element_id: String,
    pub kind: IssueKind,
    pub message: String,
}

impl RenderIssue {
    pub fn template(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            element_index: None,
            element_id: String::new(),
            kind,
            message: message.into(),
        }
    }
}

/// Result of painting a template onto a canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaintOutcome {
    /// The whole-template placeholder was painted.
    pub fallback: bool,
    pub issues: Vec<RenderIssue>,
}

/// Resolve the template's schema: inline first, then its URL.
pub async fn resolve_schema(
    template: &Template,
    loader: &dyn ResourceLoader,
) -> Result<TemplateSchema, ThumbnailError> {
    if let Some(schema) = &template.schema {
        return Ok(schema.clone());
    }
    match template.json_schema_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => loader.load_schema(url).await,
        _ => Err(ThumbnailError::SchemaUnavailable(format!(
            "Template '{}' has no schema reference",
            template.name
        ))),
    }
}

/// Paint a schema onto `canvas`, which must already be sized.
///
/// Clears to white, scales millimeters to pixels with the page anchored at
/// the top-left corner, and paints visible elements in schema order. Element
/// failures are returned as issues.
pub async fn paint_schema<C: Canvas + Send>(
    canvas: &mut C,
    schema: &TemplateSchema,
    loader: &dyn ResourceLoader,
    options: &ThumbnailOptions,
) -> Vec<RenderIssue> {
    let (width, height) = (canvas.width(), canvas.height());
    canvas.set_fill_color(Rgba::WHITE);
    canvas.fill_rect(0.0, 0.0, width as f32, height as f32);

    let scale = schema.scale_for(width, height);
    tracing::debug!(
        width,
        height,
        scale,
        page_size = ?schema.page_size,
        orientation = ?schema.orientation,
        elements = schema.elements.len(),
        "painting schema"
    );

    let mut issues = Vec::new();
    for (index, element) in schema.elements.iter().enumerate() {
        if !element.visible {
            continue;
        }
        paint_element(canvas, element, index, scale, loader, options, &mut issues).await;
    }
    issues
}

/// Paint the whole-template placeholder labeled with `label`.
pub fn paint_fallback<C: Canvas>(canvas: &mut C, label: &str) {
    let (width, height) = (canvas.width(), canvas.height());
    canvas.reset(width, height);
    canvas.set_fill_color(Rgba::WHITE);
    canvas.fill_rect(0.0, 0.0, width as f32, height as f32);
    paint_placeholder(canvas, 0.0, 0.0, width as f32, height as f32, label);
}

/// Size `canvas` per `options` and paint `template` onto it.
///
/// This is the whole render minus encoding; it works on any canvas, so a
/// [`crate::canvas::Recorder`] captures exactly what a thumbnail would show.
pub async fn paint_template<C: Canvas + Send>(
    canvas: &mut C,
    template: &Template,
    loader: &dyn ResourceLoader,
    options: &ThumbnailOptions,
) -> PaintOutcome {
    canvas.reset(options.width, options.height);

    match resolve_schema(template, loader).await {
        Ok(schema) => PaintOutcome {
            fallback: false,
            issues: paint_schema(canvas, &schema, loader, options).await,
        },
        Err(e) => {
            tracing::info!(template = %template.name, error = %e, "rendering template placeholder");
            paint_fallback(canvas, &template.name);
            PaintOutcome {
                fallback: true,
                issues: vec![RenderIssue::template(IssueKind::SchemaUnavailable, e.to_string())],
            }
        }
    }
}

/// Renders templates into thumbnails.
///
/// Owns a reusable drawing surface, so one rasterizer renders one template
/// at a time (`render_thumbnail` takes `&mut self`). Use a
/// [`RasterizerPool`] for concurrent renders.
pub struct Rasterizer {
    surface: Surface,
    loader: Arc<dyn ResourceLoader>,
    defaults: ThumbnailOptions,
}

impl Rasterizer {
    /// Rasterizer with built-in fonts and the given resource loader.
    pub fn new(loader: Arc<dyn ResourceLoader>) -> Self {
        Self::with_fonts(loader, FontBook::builtin())
    }

    pub fn with_fonts(loader: Arc<dyn ResourceLoader>, fonts: FontBook) -> Self {
        Self {
            surface: Surface::with_fonts(0, 0, fonts),
            loader,
            defaults: ThumbnailOptions::default(),
        }
    }

    /// Rasterizer with an [`HttpLoader`] and the configured fonts and
    /// default options.
    pub fn from_config(config: &RendererConfig) -> Result<Self, ThumbnailError> {
        let loader: Arc<dyn ResourceLoader> = Arc::new(HttpLoader::new(config)?);
        Self::from_config_with_loader(config, loader)
    }

    /// Like [`Rasterizer::from_config`], sharing an existing loader.
    pub fn from_config_with_loader(
        config: &RendererConfig,
        loader: Arc<dyn ResourceLoader>,
    ) -> Result<Self, ThumbnailError> {
        let mut rasterizer = Self::with_fonts(loader, config.font_book()?);
        rasterizer.defaults = config.defaults.clone();
        Ok(rasterizer)
    }

    /// Options used by [`Rasterizer::render_default`].
    pub fn defaults(&self) -> &ThumbnailOptions {
        &self.defaults
    }

    /// The drawing surface as left by the last render.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Render `template` into an encoded thumbnail.
    ///
    /// Always produces an image of exactly `options.width` x
    /// `options.height`; see the module docs for the failure rules.
    #[tracing::instrument(skip_all, fields(template = %template.name))]
    pub async fn render_thumbnail(
        &mut self,
        template: &Template,
        options: &ThumbnailOptions,
    ) -> Result<Thumbnail, ThumbnailError> {
        options.validate()?;

        let outcome =
            paint_template(&mut self.surface, template, self.loader.as_ref(), options).await;
        for issue in &outcome.issues {
            tracing::warn!(
                element = ?issue.element_index,
                kind = ?issue.kind,
                "{}",
                issue.message
            );
        }

        let bytes = encode::encode(self.surface.pixels(), options.format, options.quality)?;
        tracing::debug!(
            bytes = bytes.len(),
            format = %options.format,
            fallback = outcome.fallback,
            "encoded thumbnail"
        );

        Ok(Thumbnail {
            bytes,
            format: options.format,
            width: options.width,
            height: options.height,
            fallback: outcome.fallback,
            issues: outcome.issues,
        })
    }

    /// Render with this rasterizer's default options.
    pub async fn render_default(&mut self, template: &Template) -> Result<Thumbnail, ThumbnailError> {
        let options = self.defaults.clone();
        self.render_thumbnail(template, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawOp, Recorder};
    use crate::template::{Element, ElementKind, PageSize, Position, Size, TextData};
    use async_trait::async_trait;
    use image::RgbaImage;
    use pretty_assertions::assert_eq;

    /// Loader with nothing behind it.
    struct NoResources;

    #[async_trait]
    impl ResourceLoader for NoResources {
        async fn load_schema(&self, url: &str) -> Result<TemplateSchema, ThumbnailError> {
            Err(ThumbnailError::SchemaUnavailable(format!("404: {}", url)))
        }

        async fn load_image(&self, url: &str) -> Result<Arc<RgbaImage>, ThumbnailError> {
            Err(ThumbnailError::AssetUnavailable(format!("404: {}", url)))
        }
    }

    fn text(content: &str) -> Element {
        Element::new(
            ElementKind::Text(TextData {
                content: content.into(),
            }),
            Position { x: 10.0, y: 10.0 },
            Size {
                width: 50.0,
                height: 10.0,
            },
        )
    }

    #[test]
    fn test_default_options() {
        let opts = ThumbnailOptions::default();
        assert_eq!((opts.width, opts.height), (300, 424));
        assert_eq!(opts.quality, 0.8);
        assert_eq!(opts.format, ThumbnailFormat::Jpeg);
        assert_eq!(opts.qr_mode, QrMode::Placeholder);
    }

    #[test]
    fn test_zero_size_is_invalid() {
        let err = ThumbnailOptions::default().with_size(0, 10).validate().unwrap_err();
        assert!(matches!(err, ThumbnailError::InvalidOptions(_)));
    }

    #[test]
    fn test_size_beyond_format_limit_is_invalid() {
        let webp = ThumbnailOptions::default().with_format(ThumbnailFormat::WebP);
        assert!(webp.clone().with_size(16_383, 16_383).validate().is_ok());
        let err = webp.with_size(20_000, 20_000).validate().unwrap_err();
        assert!(matches!(err, ThumbnailError::InvalidOptions(_)));

        let jpeg = ThumbnailOptions::default().with_size(70_000, 10);
        assert!(jpeg.validate().is_err());
        assert!(jpeg.with_format(ThumbnailFormat::Png).validate().is_ok());
    }

    #[tokio::test]
    async fn test_inline_schema_wins_over_url() {
        let mut template = Template::with_schema(
            "Inline",
            TemplateSchema::new(PageSize::A5, Default::default()),
        );
        template.json_schema_url = Some("https://example.invalid/ignored.json".into());
        let schema = resolve_schema(&template, &NoResources).await.unwrap();
        assert_eq!(schema.page_size, PageSize::A5);
    }

    #[tokio::test]
    async fn test_missing_schema_reference_falls_back() {
        let template = Template {
            name: "Orphan".into(),
            ..Default::default()
        };
        let mut rec = Recorder::new(0, 0);
        let outcome =
            paint_template(&mut rec, &template, &NoResources, &ThumbnailOptions::default()).await;
        assert!(outcome.fallback);
        assert_eq!(outcome.issues[0].kind, IssueKind::SchemaUnavailable);
        let label = rec.ops().iter().find_map(DrawOp::text);
        assert_eq!(label, Some("Orphan"));
    }

    #[tokio::test]
    async fn test_invisible_elements_are_skipped() {
        let mut hidden = text("hidden");
        hidden.visible = false;
        let schema = TemplateSchema::default()
            .with_element(text("first"))
            .with_element(hidden)
            .with_element(text("last"));
        let mut rec = Recorder::new(300, 424);
        let issues =
            paint_schema(&mut rec, &schema, &NoResources, &ThumbnailOptions::default()).await;
        assert!(issues.is_empty());
        let texts: Vec<&str> = rec.ops().iter().filter_map(DrawOp::text).collect();
        assert_eq!(texts, vec!["first", "last"]);
    }

    #[tokio::test]
    async fn test_render_thumbnail_reports_size_and_format() {
        let mut rasterizer = Rasterizer::new(Arc::new(NoResources));
        let template = Template::with_schema("T", TemplateSchema::default().with_element(text("Hi")));
        let options = ThumbnailOptions::default()
            .with_size(60, 80)
            .with_format(ThumbnailFormat::Png);
        let thumb = rasterizer.render_thumbnail(&template, &options).await.unwrap();
        assert_eq!((thumb.width, thumb.height), (60, 80));
        assert_eq!(thumb.mime_type(), "image/png");
        assert!(!thumb.fallback);
        let decoded = image::load_from_memory(&thumb.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (60, 80));
    }

    #[tokio::test]
    async fn test_render_thumbnail_rejects_zero_size() {
        let mut rasterizer = Rasterizer::new(Arc::new(NoResources));
        let template = Template::with_schema("T", TemplateSchema::default());
        let err = rasterizer
            .render_thumbnail(&template, &ThumbnailOptions::default().with_size(10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbnailError::InvalidOptions(_)));
    }

    #[tokio::test]
    async fn test_oversize_request_is_rejected_before_painting() {
        let mut rasterizer = Rasterizer::new(Arc::new(NoResources));
        let template = Template::with_schema("T", TemplateSchema::default().with_element(text("Hi")));
        let options = ThumbnailOptions::default()
            .with_size(20_000, 20_000)
            .with_format(ThumbnailFormat::WebP);
        let err = rasterizer.render_thumbnail(&template, &options).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::InvalidOptions(_)));
        // The surface was never grown to the requested size
        assert!(rasterizer.surface().width() < 20_000);
    }
}
