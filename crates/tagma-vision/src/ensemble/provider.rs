//! Object detection provider traits and lazy model loading.

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;
use tagma_models::{NormalizedRect, RawDetection};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::{VisionError, VisionResult};

/// Object detection model execution.
///
/// Boxes are normalized to the image passed in, with a top-left origin.
#[async_trait]
pub trait ObjectDetectionProvider: Send + Sync {
    /// Run inference on one image.
    async fn detect(&self, image: &DynamicImage) -> VisionResult<Vec<RawDetection>>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Loads an object detection model on demand.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the model. Failures are reported as
    /// [`VisionError::ModelUnavailable`].
    async fn load(&self) -> VisionResult<Arc<dyn ObjectDetectionProvider>>;

    /// Loader name for logging.
    fn name(&self) -> &'static str;
}

/// Provider that loads its model on first use.
///
/// A failed load leaves the model unloaded; the next request retries.
pub struct LazyModel {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn ObjectDetectionProvider>>,
}

impl LazyModel {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    async fn model(&self) -> VisionResult<&Arc<dyn ObjectDetectionProvider>> {
        self.model
            .get_or_try_init(|| async {
                match self.loader.load().await {
                    Ok(model) => {
                        info!(loader = self.loader.name(), "Detection model loaded");
                        Ok(model)
                    }
                    Err(e) => {
                        warn!(
                            loader = self.loader.name(),
                            error = %e,
                            "Detection model failed to load, will retry on next frame"
                        );
                        Err(match e {
                            VisionError::ModelUnavailable(_) => e,
                            other => VisionError::model_unavailable(other.to_string()),
                        })
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl ObjectDetectionProvider for LazyModel {
    async fn detect(&self, image: &DynamicImage) -> VisionResult<Vec<RawDetection>> {
        self.model().await?.detect(image).await
    }

    fn name(&self) -> &'static str {
        self.loader.name()
    }
}

/// Extract the pixel region covered by `rect`.
///
/// The region is rounded outward to whole pixels and clipped to the image.
/// Fails when the region is empty, which happens for frames with no rows
/// or columns.
pub fn crop_region(image: &DynamicImage, rect: &NormalizedRect) -> VisionResult<DynamicImage> {
    let (width, height) = image.dimensions();
    let (x, y, w, h) = rect.denormalize(tagma_models::FrameSize::new(width, height));

    let x0 = (x.floor().max(0.0) as u32).min(width);
    let y0 = (y.floor().max(0.0) as u32).min(height);
    let x1 = ((x + w).ceil().max(0.0) as u32).min(width);
    let y1 = ((y + h).ceil().max(0.0) as u32).min(height);
    let (w, h) = (x1.saturating_sub(x0), y1.saturating_sub(y0));

    if w == 0 || h == 0 {
        return Err(VisionError::crop_failure(
            format!("{:.3},{:.3} {:.3}x{:.3}", rect.x, rect.y, rect.width, rect.height),
            format!("empty region in {}x{} frame", width, height),
        ));
    }

    Ok(image.crop_imm(x0, y0, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider;

    #[async_trait]
    impl ObjectDetectionProvider for FixedProvider {
        async fn detect(&self, _image: &DynamicImage) -> VisionResult<Vec<RawDetection>> {
            Ok(vec![RawDetection::new(NormalizedRect::UNIT, "head-yellow", 0.9)])
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    /// Fails the first `failures` loads, then succeeds.
    struct FlakyLoader {
        failures: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ModelLoader for FlakyLoader {
        async fn load(&self) -> VisionResult<Arc<dyn ObjectDetectionProvider>> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(VisionError::model_unavailable("weights missing"));
            }
            Ok(Arc::new(FixedProvider))
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_lazy_model_retries_after_failed_load() {
        let loader = Arc::new(FlakyLoader {
            failures: 1,
            attempts: AtomicUsize::new(0),
        });
        let model = LazyModel::new(loader.clone());
        let image = DynamicImage::new_rgb8(8, 8);

        let first = model.detect(&image).await;
        assert!(matches!(first, Err(VisionError::ModelUnavailable(_))));
        assert!(!model.is_loaded());

        let second = model.detect(&image).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(model.is_loaded());

        model.detect(&image).await.unwrap();
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 2);
    }

    struct BrokenLoader;

    #[async_trait]
    impl ModelLoader for BrokenLoader {
        async fn load(&self) -> VisionResult<Arc<dyn ObjectDetectionProvider>> {
            Err(VisionError::inference_failed("runtime init failed"))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_lazy_model_reports_load_errors_as_unavailable() {
        let model = LazyModel::new(Arc::new(BrokenLoader));
        let image = DynamicImage::new_rgb8(8, 8);

        let err = tokio_test::block_on(model.detect(&image)).unwrap_err();
        assert!(matches!(err, VisionError::ModelUnavailable(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_crop_region_rounds_outward() {
        let image = DynamicImage::new_rgb8(504, 896);
        let rect = NormalizedRect::from_corners(0.4, 0.0, 1.0, 0.6);
        let crop = crop_region(&image, &rect).unwrap();
        // x spans 201.6..504 and y spans 0..537.6.
        assert_eq!(crop.dimensions(), (303, 538));
    }

    #[test]
    fn test_quadrant_crops_reach_frame_edges() {
        let image = DynamicImage::new_rgb8(504, 896);
        let q4 = NormalizedRect::from_corners(0.4, 0.4, 1.0, 1.0);
        let (x, y, _, _) = q4.denormalize(tagma_models::FrameSize::new(504, 896));
        let crop = crop_region(&image, &q4).unwrap();
        let (w, h) = crop.dimensions();
        assert_eq!(x.floor() as u32 + w, 504);
        assert_eq!(y.floor() as u32 + h, 896);
    }

    #[test]
    fn test_crop_region_fails_on_empty_frame() {
        let image = DynamicImage::new_rgb8(4, 0);
        let rect = NormalizedRect::from_corners(0.0, 0.0, 0.6, 0.6);
        assert!(matches!(
            crop_region(&image, &rect),
            Err(VisionError::CropFailure { .. })
        ));
    }
}
