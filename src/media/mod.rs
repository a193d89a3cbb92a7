//! Media device acquisition
//!
//! The controller owns every track for the lifetime of one session. Tracks
//! stop when dropped, so releasing the owning session releases the device.

mod headless;
mod retry;

use async_trait::async_trait;

pub use headless::HeadlessMedia;
pub use retry::{RetryPolicy, acquire_camera, acquire_microphone, acquire_with_retry};

use crate::Result;

/// Kind of media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Platform handle behind a track
pub trait TrackSource: Send {
    /// Release the underlying device; called at most once
    fn stop(&mut self);
}

/// A live camera or microphone track
pub struct MediaTrack {
    kind: TrackKind,
    label: String,
    source: Option<Box<dyn TrackSource>>,
}

impl MediaTrack {
    #[must_use]
    pub fn new(kind: TrackKind, label: impl Into<String>, source: impl TrackSource + 'static) -> Self {
        Self {
            kind,
            label: label.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TrackKind {
        self.kind
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the device is still held
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.source.is_some()
    }

    /// Release the device. Safe to call repeatedly
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            tracing::debug!(kind = %self.kind, label = %self.label, "media track stopped");
        }
    }
}

impl Drop for MediaTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Identifies a track attached to the streaming connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub kind: TrackKind,
    pub label: String,
}

impl From<&MediaTrack> for TrackInfo {
    fn from(track: &MediaTrack) -> Self {
        Self {
            kind: track.kind,
            label: track.label.clone(),
        }
    }
}

/// Source of camera and microphone tracks
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open the camera
    ///
    /// # Errors
    ///
    /// `Error::PermissionDenied` if access is refused, `Error::TransientDevice`
    /// if the device is busy or failed to start
    async fn open_camera(&self) -> Result<MediaTrack>;

    /// Open the microphone
    ///
    /// # Errors
    ///
    /// Same classification as [`MediaDevices::open_camera`]
    async fn open_microphone(&self) -> Result<MediaTrack>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counting(Arc<AtomicUsize>);

    impl TrackSource for Counting {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn stop_releases_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut track = MediaTrack::new(TrackKind::Audio, "mic", Counting(Arc::clone(&stops)));
        assert!(track.is_live());

        track.stop();
        track.stop();
        drop(track);

        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let stops = Arc::new(AtomicUsize::new(0));
        {
            let _track = MediaTrack::new(TrackKind::Video, "cam", Counting(Arc::clone(&stops)));
        }
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn track_info_copies_identity() {
        let track = MediaTrack::new(TrackKind::Video, "front", Counting(Arc::default()));
        let info = TrackInfo::from(&track);
        assert_eq!(info.kind, TrackKind::Video);
        assert_eq!(info.label, "front");
    }
}
