//! Configuration management for the coaching orchestrator
//!
//! Values resolve env (`COACH_*`) > TOML file > defaults.

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use crate::Result;

use file::CoachConfigFile;

/// Default session length (5 minutes)
const DEFAULT_DURATION_SECS: u64 = 300;

/// Default shared deadline for config fetch + connection open
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Default backend URL for local development
const DEFAULT_BACKEND_URL: &str = "http://localhost:8787";

/// Orchestrator configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Session timing
    pub session: SessionConfig,

    /// Device acquisition
    pub media: MediaConfig,

    /// Tone adaptation
    pub tone: ToneConfig,

    /// Virtual message scheduling
    pub scheduler: SchedulerConfig,

    /// External services
    pub backend: BackendConfig,
}

/// Session timing configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Total session length
    pub duration: Duration,

    /// Countdown decrement
    pub tick: Duration,

    /// Shared deadline for config fetch, credential fetch and connection open
    pub connect_timeout: Duration,

    /// Pause after tearing down a stale session before starting a new one
    pub start_grace: Duration,

    /// Delay before the cleanup guard re-arms
    pub cleanup_reset_delay: Duration,

    /// Upper bound on how long the observing flag stays raised
    pub observing_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(DEFAULT_DURATION_SECS),
            tick: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            start_grace: Duration::from_millis(500),
            cleanup_reset_delay: Duration::from_millis(100),
            observing_window: Duration::from_secs(8),
        }
    }
}

/// Device acquisition configuration
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Try to enable the camera
    pub video: bool,

    /// Retries after the first attempt for transient device errors
    pub max_retries: u32,

    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            video: true,
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Tone state machine configuration
#[derive(Debug, Clone)]
pub struct ToneConfig {
    /// Identical signals closer than this are treated as duplicate dispatch
    pub debounce: Duration,

    /// Minimum time between committed tone transitions
    pub min_change_interval: Duration,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            min_change_interval: Duration::from_secs(15),
        }
    }
}

/// Virtual message scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often idle conditions are checked
    pub poll_interval: Duration,

    /// Required quiet time for each cooldown condition
    pub cooldown: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            cooldown: Duration::from_secs(10),
        }
    }
}

/// External service configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Configuration/credential service base URL
    pub url: String,

    /// Bearer key for backend calls (from `COACH_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Memory extraction endpoint; memory persistence is skipped when unset
    pub memory_url: Option<String>,

    /// Reward service endpoint; awards are skipped when unset
    pub rewards_url: Option<String>,

    /// Stable user identifier
    pub user_id: String,

    /// BCP 47 locale forwarded to the backend
    pub locale: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            api_key: None,
            memory_url: None,
            rewards_url: None,
            user_id: "local".to_string(),
            locale: "en-US".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if an environment override cannot be parsed
    pub fn load() -> Result<Self> {
        Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration from the environment and an explicit config file
    ///
    /// # Errors
    ///
    /// Returns error if an environment override cannot be parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::resolve(file::load_from(path), |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups
    ///
    /// # Errors
    ///
    /// Returns error if a numeric or boolean override is malformed
    pub fn resolve<F>(fc: CoachConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let session = SessionConfig {
            duration: secs(&env, "COACH_SESSION_SECS")?
                .or(fc.session.duration_secs.map(Duration::from_secs))
                .unwrap_or(defaults.session.duration),
            tick: fc
                .session
                .tick_ms
                .map_or(defaults.session.tick, Duration::from_millis),
            connect_timeout: secs(&env, "COACH_CONNECT_TIMEOUT_SECS")?
                .or(fc.session.connect_timeout_secs.map(Duration::from_secs))
                .unwrap_or(defaults.session.connect_timeout),
            start_grace: fc
                .session
                .start_grace_ms
                .map_or(defaults.session.start_grace, Duration::from_millis),
            cleanup_reset_delay: defaults.session.cleanup_reset_delay,
            observing_window: fc
                .session
                .observing_window_secs
                .map_or(defaults.session.observing_window, Duration::from_secs),
        };

        let media = MediaConfig {
            video: flag(&env, "COACH_VIDEO")?
                .or(fc.media.video)
                .unwrap_or(defaults.media.video),
            max_retries: parse(&env, "COACH_CAMERA_RETRIES")?
                .or(fc.media.camera_retries)
                .unwrap_or(defaults.media.max_retries),
            retry_delay: fc
                .media
                .retry_delay_ms
                .map_or(defaults.media.retry_delay, Duration::from_millis),
        };

        let tone = ToneConfig {
            debounce: fc
                .tone
                .debounce_ms
                .map_or(defaults.tone.debounce, Duration::from_millis),
            min_change_interval: secs(&env, "COACH_TONE_INTERVAL_SECS")?
                .or(fc.tone.min_change_interval_secs.map(Duration::from_secs))
                .unwrap_or(defaults.tone.min_change_interval),
        };

        let scheduler = SchedulerConfig {
            poll_interval: fc
                .scheduler
                .poll_ms
                .map_or(defaults.scheduler.poll_interval, Duration::from_millis),
            cooldown: secs(&env, "COACH_SCHEDULER_COOLDOWN_SECS")?
                .or(fc.scheduler.cooldown_secs.map(Duration::from_secs))
                .unwrap_or(defaults.scheduler.cooldown),
        };

        let backend = BackendConfig {
            url: env("COACH_BACKEND_URL")
                .or(fc.backend.url)
                .unwrap_or(defaults.backend.url),
            api_key: env("COACH_API_KEY").map(SecretString::from),
            memory_url: env("COACH_MEMORY_URL").or(fc.backend.memory_url),
            rewards_url: env("COACH_REWARDS_URL").or(fc.backend.rewards_url),
            user_id: env("COACH_USER_ID")
                .or(fc.backend.user_id)
                .unwrap_or(defaults.backend.user_id),
            locale: env("COACH_LOCALE")
                .or(fc.backend.locale)
                .unwrap_or(defaults.backend.locale),
        };

        Ok(Self {
            session,
            media,
            tone,
            scheduler,
            backend,
        })
    }
}

fn parse<F, T>(env: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| crate::Error::Config(format!("invalid value for {key}: {raw}")))
        })
        .transpose()
}

fn secs<F>(env: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse::<F, u64>(env, key)?.map(Duration::from_secs))
}

fn flag<F>(env: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        None => Ok(None),
        Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(v) if v == "0" || v.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(v) => Err(crate::Error::Config(format!("invalid value for {key}: {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = Config::resolve(CoachConfigFile::default(), env_of(&[])).unwrap();
        assert_eq!(config.session.duration, Duration::from_secs(300));
        assert_eq!(config.media.max_retries, 2);
        assert_eq!(config.tone.debounce, Duration::from_millis(300));
        assert!(config.media.video);
        assert!(config.backend.api_key.is_none());
    }

    #[test]
    fn env_beats_file() {
        let mut fc = CoachConfigFile::default();
        fc.session.duration_secs = Some(600);
        fc.backend.locale = Some("de-DE".to_string());

        let config = Config::resolve(
            fc,
            env_of(&[("COACH_SESSION_SECS", "120"), ("COACH_API_KEY", "sk-test")]),
        )
        .unwrap();

        assert_eq!(config.session.duration, Duration::from_secs(120));
        assert_eq!(config.backend.locale, "de-DE");
        assert_eq!(
            config.backend.api_key.as_ref().map(|k| k.expose_secret()),
            Some("sk-test")
        );
    }

    #[test]
    fn video_flag_parses_both_spellings() {
        let off = Config::resolve(CoachConfigFile::default(), env_of(&[("COACH_VIDEO", "0")]))
            .unwrap();
        assert!(!off.media.video);

        let on = Config::resolve(
            CoachConfigFile::default(),
            env_of(&[("COACH_VIDEO", "TRUE")]),
        )
        .unwrap();
        assert!(on.media.video);
    }

    #[test]
    fn malformed_override_is_an_error() {
        let err = Config::resolve(
            CoachConfigFile::default(),
            env_of(&[("COACH_CAMERA_RETRIES", "many")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("COACH_CAMERA_RETRIES"));
    }
}
