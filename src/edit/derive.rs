use std::sync::Arc;

use crate::edit::asset::ImageAsset;

/// Turns the source image and the service's guidance into the new edited
/// artifact. This is where a real image-processing backend plugs in.
pub trait ArtifactDeriver: Send + Sync + 'static {
    fn derive_edited_artifact(&self, image: &ImageAsset, response_text: &str) -> ImageAsset;
}

pub type SharedArtifactDeriver = Arc<dyn ArtifactDeriver>;

/// The remote service returns text only, so the edited artifact is the
/// submitted image itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughDeriver;

impl ArtifactDeriver for PassThroughDeriver {
    fn derive_edited_artifact(&self, image: &ImageAsset, _response_text: &str) -> ImageAsset {
        image.clone()
    }
}
