//! Progress-callback trait for per-image events of an image command.
//!
//! Inject an [`Arc<dyn ImageProgressCallback>`] via
//! [`crate::config::RelayConfigBuilder::progress_callback`] to follow an image
//! batch as each attachment is downloaded, recognised and translated.
//!
//! # Example
//!
//! ```rust
//! use tr_relay::{ImageProgressCallback, RelayConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ImageProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, image: usize, total: usize, line_count: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Image {image}/{total}: {line_count} lines");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//! let config = RelayConfig::builder()
//!     .progress_callback(cb as Arc<dyn ImageProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the image pipeline as it processes each attachment.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Images are processed one at a time, in attachment
/// order, but several image commands may run at once, so implementations
/// must be `Send + Sync`.
pub trait ImageProgressCallback: Send + Sync {
    /// Called once before the first image.
    ///
    /// # Arguments
    /// * `total_images`: qualifying image attachments that will be processed
    fn on_batch_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called before an image is downloaded.
    ///
    /// # Arguments
    /// * `image`: 1-indexed image number
    /// * `total`: images in the batch
    fn on_image_start(&self, image: usize, total: usize) {
        let _ = (image, total);
    }

    /// Called when an image is recognised and translated.
    ///
    /// # Arguments
    /// * `line_count`: lines the OCR engine recognised (0 for a blank image)
    fn on_image_complete(&self, image: usize, total: usize, line_count: usize) {
        let _ = (image, total, line_count);
    }

    /// Called when an image fails; the batch continues.
    fn on_image_error(&self, image: usize, total: usize, error: &str) {
        let _ = (image, total, error);
    }

    /// Called once after every image has been attempted.
    fn on_batch_complete(&self, total_images: usize, success_count: usize) {
        let _ = (total_images, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ImageProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RelayConfig`].
pub type ProgressCallback = Arc<dyn ImageProgressCallback>;
