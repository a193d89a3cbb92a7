//! Media devices for machines without a camera
//!
//! Camera requests are refused; the microphone is a virtual track. Used by
//! the console simulation, where audio arrives as typed text.

use async_trait::async_trait;

use super::{MediaDevices, MediaTrack, TrackKind, TrackSource};
use crate::error::Device;
use crate::{Error, Result};

/// Headless device set
#[derive(Debug, Clone, Default)]
pub struct HeadlessMedia;

struct VirtualInput;

impl TrackSource for VirtualInput {
    fn stop(&mut self) {}
}

#[async_trait]
impl MediaDevices for HeadlessMedia {
    async fn open_camera(&self) -> Result<MediaTrack> {
        Err(Error::PermissionDenied(Device::Camera))
    }

    async fn open_microphone(&self) -> Result<MediaTrack> {
        Ok(MediaTrack::new(TrackKind::Audio, "virtual-input", VirtualInput))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn camera_is_denied() {
        let err = HeadlessMedia.open_camera().await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(Device::Camera)));
    }

    #[tokio::test]
    async fn microphone_is_virtual() {
        let track = HeadlessMedia.open_microphone().await.unwrap();
        assert_eq!(track.kind(), TrackKind::Audio);
        assert!(track.is_live());
    }
}
