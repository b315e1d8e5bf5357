//! # DocThumb - Template Thumbnail Rasterizer
//!
//! DocThumb turns DocFactory document templates into small raster previews
//! for the template gallery. It provides:
//!
//! - **Template model**: page size, orientation and typed, positioned elements
//! - **Canvas**: a software 2D canvas (paths, text, images, shadows)
//! - **Rasterizer**: per-element draw routines with placeholder fallbacks
//! - **Encoding**: JPEG, PNG and WebP output at any size
//!
//! ## Quick Start
//!
//! ```no_run
//! use docthumb::{Rasterizer, RendererConfig, Template, ThumbnailPreset};
//!
//! # async fn example() -> Result<(), docthumb::ThumbnailError> {
//! let mut rasterizer = Rasterizer::from_config(&RendererConfig::default())?;
//!
//! let template = Template::with_schema_url(
//!     "Warranty Certificate",
//!     "https://storage.example.com/templates/warranty.json",
//! );
//!
//! // 300x424 JPEG, quality 0.8
//! let thumb = rasterizer
//!     .render_thumbnail(&template, &ThumbnailPreset::Card.options())
//!     .await?;
//!
//! std::fs::write("warranty.jpg", &thumb.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`template`] | Template and schema data model |
//! | [`canvas`] | Drawing surfaces: raster [`canvas::Surface`] and [`canvas::Recorder`] |
//! | [`render`] | The rasterizer and element draw routines |
//! | [`assets`] | Schema and image loading |
//! | [`encode`] | Output formats |
//! | [`config`] | Renderer configuration and size presets |
//! | [`color`] | CSS color parsing |
//! | [`error`] | Error types |
//!
//! ## Failure Model
//!
//! Rendering is best-effort: a template whose schema cannot be loaded is
//! drawn as one large placeholder carrying the template name, and an element
//! that cannot be drawn (broken image link, unknown shape) becomes a small
//! labeled placeholder. These are reported in [`Thumbnail::issues`]. Only a
//! size the output format cannot store (rejected before painting) or an
//! encoder failure returns an error.

pub mod assets;
pub mod canvas;
pub mod color;
pub mod config;
pub mod encode;
pub mod error;
pub mod render;
pub mod template;

// Re-exports for convenience
pub use assets::{HttpLoader, ResourceLoader};
pub use config::{RendererConfig, ThumbnailPreset};
pub use encode::{Thumbnail, ThumbnailFormat};
pub use error::ThumbnailError;
pub use render::{QrMode, Rasterizer, RasterizerPool, RenderIssue, ThumbnailOptions};
pub use template::{Template, TemplateSchema};
