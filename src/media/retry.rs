//! Bounded retry for device acquisition
//!
//! Permission denial is final. Transient failures are retried with a fixed
//! delay, up to `max_retries` times after the first attempt.

use std::future::Future;
use std::time::Duration;

use super::{MediaDevices, MediaTrack};
use crate::config::MediaConfig;
use crate::error::Device;
use crate::{Error, Result};

/// Retry policy for device acquisition
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&MediaConfig::default())
    }
}

impl From<&MediaConfig> for RetryPolicy {
    fn from(config: &MediaConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.retry_delay,
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently, or retries run out
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-retryable error
pub async fn acquire_with_retry<F, Fut>(
    device: Device,
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<MediaTrack>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<MediaTrack>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Ok(track) => {
                tracing::debug!(%device, retries, "device acquired");
                return Ok(track);
            }
            Err(e) if e.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                tracing::warn!(
                    %device,
                    error = %e,
                    attempt = retries,
                    max_retries = policy.max_retries,
                    "device acquisition failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Acquire the camera, degrading to audio-only on any failure
pub async fn acquire_camera(devices: &dyn MediaDevices, policy: &RetryPolicy) -> Option<MediaTrack> {
    match acquire_with_retry(Device::Camera, policy, || devices.open_camera()).await {
        Ok(track) => Some(track),
        Err(Error::PermissionDenied(_)) => {
            tracing::info!("camera permission denied, continuing audio-only");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "camera unavailable, continuing audio-only");
            None
        }
    }
}

/// Acquire the microphone; the session cannot run without it
///
/// # Errors
///
/// Returns the classified device error when the microphone cannot be opened
pub async fn acquire_microphone(
    devices: &dyn MediaDevices,
    policy: &RetryPolicy,
) -> Result<MediaTrack> {
    acquire_with_retry(Device::Microphone, policy, || devices.open_microphone())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "microphone unavailable"))
}
