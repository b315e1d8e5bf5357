//! A fixed set of rasterizers shared by concurrent renders.
//!
//! A rasterizer owns a mutable surface, so it serves one render at a time.
//! The pool hands each checkout a rasterizer of its own and returns it when
//! the guard drops; callers beyond the pool size wait for one to free up.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::{Rasterizer, ThumbnailOptions};
use crate::assets::{HttpLoader, ResourceLoader};
use crate::config::RendererConfig;
use crate::encode::Thumbnail;
use crate::error::ThumbnailError;
use crate::template::Template;

/// Pool of idle rasterizers guarded by a semaphore.
#[derive(Clone)]
pub struct RasterizerPool {
    idle: Arc<Mutex<Vec<Rasterizer>>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl RasterizerPool {
    pub fn new(rasterizers: Vec<Rasterizer>) -> Self {
        let size = rasterizers.len();
        Self {
            idle: Arc::new(Mutex::new(rasterizers)),
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// `size` rasterizers sharing one [`HttpLoader`] (and its image cache).
    pub fn from_config(config: &RendererConfig, size: usize) -> Result<Self, ThumbnailError> {
        let loader: Arc<dyn ResourceLoader> = Arc::new(HttpLoader::new(config)?);
        let rasterizers = (0..size)
            .map(|_| Rasterizer::from_config_with_loader(config, loader.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rasterizers))
    }

    /// Total number of rasterizers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Rasterizers not currently checked out.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop handing out rasterizers; pending and future checkouts fail.
    pub fn close(&self) {
        self.permits.close();
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Rasterizer>> {
        // A panic mid-push/pop cannot leave the Vec inconsistent
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for an idle rasterizer.
    pub async fn checkout(&self) -> Result<PooledRasterizer, ThumbnailError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ThumbnailError::PoolClosed)?;
        let rasterizer = self.lock_idle().pop().ok_or(ThumbnailError::PoolClosed)?;
        tracing::trace!(available = self.available(), "rasterizer checked out");
        Ok(PooledRasterizer {
            rasterizer: Some(rasterizer),
            pool: self.clone(),
            _permit: permit,
        })
    }

    /// Check out a rasterizer, render, and return it.
    pub async fn render_thumbnail(
        &self,
        template: &Template,
        options: &ThumbnailOptions,
    ) -> Result<Thumbnail, ThumbnailError> {
        let mut rasterizer = self.checkout().await?;
        rasterizer.render_thumbnail(template, options).await
    }
}

/// A checked-out rasterizer; returns to the pool on drop.
pub struct PooledRasterizer {
    rasterizer: Option<Rasterizer>,
    pool: RasterizerPool,
    // Released after the rasterizer is back in the idle list
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledRasterizer {
    type Target = Rasterizer;

    fn deref(&self) -> &Rasterizer {
        self.rasterizer
            .as_ref()
            .unwrap_or_else(|| unreachable!("rasterizer taken before drop"))
    }
}

impl DerefMut for PooledRasterizer {
    fn deref_mut(&mut self) -> &mut Rasterizer {
        self.rasterizer
            .as_mut()
            .unwrap_or_else(|| unreachable!("rasterizer taken before drop"))
    }
}

impl Drop for PooledRasterizer {
    fn drop(&mut self) {
        if let Some(rasterizer) = self.rasterizer.take() {
            self.pool.lock_idle().push(rasterizer);
        }
    }
}
