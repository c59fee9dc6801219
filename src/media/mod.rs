//! Media ingestion: turn uploaded bytes into a [`MediaReference`].
//!
//! The remote blob store is preferred. When it is unusable or any blob call
//! fails, the file is embedded as a data URI instead: raster images are
//! downscaled and re-encoded as JPEG first, everything else is inlined as-is.
//! Callers store the reference in a document either way.

pub mod compress;
pub mod data_uri;

use std::sync::Arc;

use crate::{
    config::MediaConfig,
    error::{FallbackReason, MediaError, RemoteError},
    fallback::{FallbackCallback, FallbackReporter, Operation},
    mode::ModeSelector,
    remote::BlobStore,
    types::MediaReference,
};

pub use compress::compress_image;
pub use data_uri::DataUri;

/// MIME type of compressed inline images.
pub const INLINE_IMAGE_MIME: &str = "image/jpeg";

/// The `type/subtype` part of a MIME type, lowercased, without parameters.
pub fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// `true` for image types the pipeline re-encodes.
///
/// Vector formats are not raster images and are inlined verbatim.
pub fn is_raster_image(mime_type: &str) -> bool {
    let essence = mime_essence(mime_type);
    essence.starts_with("image/") && essence != "image/svg+xml"
}

pub struct MediaPipelineOptions {
    /// Remote blob store; `None` means always inline.
    pub blobs: Option<Arc<dyn BlobStore>>,
    pub mode: Option<Arc<dyn ModeSelector>>,
    pub config: MediaConfig,
    pub on_fallback: Option<Arc<FallbackCallback>>,
}

pub struct MediaPipeline {
    blobs: Option<Arc<dyn BlobStore>>,
    mode: Option<Arc<dyn ModeSelector>>,
    config: MediaConfig,
    reporter: FallbackReporter,
}

impl MediaPipeline {
    pub fn new(options: MediaPipelineOptions) -> Self {
        Self {
            blobs: options.blobs,
            mode: options.mode,
            config: options.config,
            reporter: FallbackReporter::new(options.on_fallback),
        }
    }

    /// A pipeline that always inlines.
    pub fn local_only(config: MediaConfig) -> Self {
        Self::new(MediaPipelineOptions {
            blobs: None,
            mode: None,
            config,
            on_fallback: None,
        })
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Upload `bytes` to `path` and return its public URL, or fall back to an
    /// inline data URI.
    ///
    /// Only decode/encode failures on the inline path are returned as errors.
    pub async fn upload_binary(
        &self,
        bytes: &[u8],
        mime_type: &str,
        path: &str,
    ) -> Result<MediaReference, MediaError> {
        let reason = match self.usable_blobs() {
            Some(blobs) => match upload(blobs.as_ref(), bytes, mime_type, path).await {
                Ok(url) => return Ok(MediaReference::new(url)),
                Err(e) => FallbackReason::RemoteFailed(e),
            },
            None => FallbackReason::RemoteUnavailable,
        };

        self.reporter.report(Operation::Upload, path, reason);
        self.inline(bytes, mime_type)
    }

    /// The local encoding used by [`upload_binary`](Self::upload_binary).
    ///
    /// Raster images whose format this build cannot decode are inlined
    /// verbatim like any other file.
    pub fn inline(&self, bytes: &[u8], mime_type: &str) -> Result<MediaReference, MediaError> {
        let essence = mime_essence(mime_type);
        if is_raster_image(&essence) && compress::has_decoder(bytes, &essence) {
            let jpeg = compress_image(
                bytes,
                self.config.max_dimension(),
                self.config.jpeg_quality(),
            )?;
            tracing::debug!(
                original = bytes.len(),
                compressed = jpeg.len(),
                "inlined compressed image"
            );
            return Ok(MediaReference::new(data_uri::encode(INLINE_IMAGE_MIME, &jpeg)));
        }
        Ok(MediaReference::new(data_uri::encode(mime_type, bytes)))
    }

    fn usable_blobs(&self) -> Option<&Arc<dyn BlobStore>> {
        let blobs = self.blobs.as_ref()?;
        match &self.mode {
            Some(mode) if !mode.remote_usable() => None,
            _ => Some(blobs),
        }
    }
}

async fn upload(
    blobs: &dyn BlobStore,
    bytes: &[u8],
    mime_type: &str,
    path: &str,
) -> Result<String, RemoteError> {
    blobs.put(path, bytes, mime_type).await?;
    blobs.public_url(path).await
}
