//! Configuration management for the aria client

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default assistant endpoint
pub const DEFAULT_ENDPOINT: &str = "wss://assist.omni.dev/v1/assist";

/// Default conversation language
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Default capture/playback sample rate in hertz
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Default bytes per captured audio chunk (100ms of 16kHz 16-bit mono)
pub const DEFAULT_CHUNK_BYTES: usize = 3200;

/// Default per-turn deadline in seconds
pub const DEFAULT_DEADLINE_SECS: u64 = 185;

/// Default initial playback volume percentage
pub const DEFAULT_VOLUME: u8 = 50;

/// Device model identifier used when none is configured
const DEFAULT_DEVICE_MODEL: &str = "aria-client";

/// Aria client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant service endpoint (ws:// or wss:// URL)
    pub endpoint: String,

    /// Language code for the conversation (e.g. "en-US")
    pub language_code: String,

    /// Registered device identity
    pub device: DeviceIdentity,

    /// Audio stream parameters
    pub audio: AudioSettings,

    /// Per-turn deadline in seconds
    pub deadline_secs: u64,

    /// Initial playback volume percentage (0-100)
    pub volume_percentage: u8,

    /// Path to the data directory (device identity, caches)
    pub data_dir: PathBuf,
}

/// Audio stream parameters
#[derive(Debug, Clone)]
pub struct AudioSettings {
    /// Capture and playback sample rate in hertz
    pub sample_rate: u32,

    /// Size of each captured chunk in bytes
    pub chunk_bytes: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

/// Identity of this device instance, persisted across runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Device instance identifier
    pub id: String,

    /// Device model identifier
    pub model_id: String,
}

impl DeviceIdentity {
    /// Load the persisted device identity, or generate and save a new one.
    ///
    /// Remote registration is a separate concern; this only mints a local
    /// instance id so the service can correlate turns from one device.
    ///
    /// # Errors
    ///
    /// Returns error if the identity file cannot be read or written
    pub fn load_or_create(path: &Path, model_id: Option<&str>) -> Result<Self> {
        if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            let identity: Self = serde_json::from_str(&raw)?;
            tracing::debug!(device = %identity.id, path = %path.display(), "loaded device identity");
            return Ok(identity);
        }

        let identity = Self {
            id: uuid::Uuid::new_v4().to_string(),
            model_id: model_id.unwrap_or(DEFAULT_DEVICE_MODEL).to_string(),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&identity)?)?;
        tracing::info!(device = %identity.id, path = %path.display(), "registered new device identity");

        Ok(identity)
    }
}

/// On-disk configuration file shape; every field optional
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    endpoint: Option<String>,
    language_code: Option<String>,
    device_model_id: Option<String>,
    sample_rate: Option<u32>,
    chunk_bytes: Option<usize>,
    deadline_secs: Option<u64>,
    volume_percentage: Option<u8>,
}

impl ConfigFile {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Command-line overrides applied on top of file and environment values
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Assistant endpoint
    pub endpoint: Option<String>,
    /// Conversation language code
    pub language_code: Option<String>,
    /// Device instance identifier
    pub device_id: Option<String>,
    /// Device model identifier
    pub device_model_id: Option<String>,
    /// Capture/playback sample rate
    pub sample_rate: Option<u32>,
    /// Per-turn deadline in seconds
    pub deadline_secs: Option<u64>,
}

impl Config {
    /// Load configuration with precedence: CLI overrides > environment >
    /// config file > defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the config file is malformed or the device identity
    /// cannot be established
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let dirs = directories::ProjectDirs::from("dev", "omni", "aria")
            .ok_or_else(|| Error::Config("could not determine home directory".to_string()))?;

        let config_path = dirs.config_dir().join("aria.toml");
        let data_dir = dirs.data_dir().to_path_buf();

        Self::load_from(&config_path, &data_dir, overrides)
    }

    /// Load configuration from explicit paths (testable variant)
    ///
    /// # Errors
    ///
    /// Returns error if the config file is malformed or the device identity
    /// cannot be established
    pub fn load_from(config_path: &Path, data_dir: &Path, overrides: &Overrides) -> Result<Self> {
        let file = ConfigFile::load(config_path)?;

        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| std::env::var("ARIA_ENDPOINT").ok())
            .or(file.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let language_code = overrides
            .language_code
            .clone()
            .or_else(|| std::env::var("ARIA_LANG").ok())
            .or(file.language_code)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let model_id = overrides
            .device_model_id
            .clone()
            .or(file.device_model_id);

        let device = if let Some(id) = overrides.device_id.clone() {
            DeviceIdentity {
                id,
                model_id: model_id.unwrap_or_else(|| DEFAULT_DEVICE_MODEL.to_string()),
            }
        } else {
            DeviceIdentity::load_or_create(&data_dir.join("device.json"), model_id.as_deref())?
        };

        let chunk_bytes = file.chunk_bytes.unwrap_or(DEFAULT_CHUNK_BYTES);
        if chunk_bytes == 0 {
            return Err(Error::Config(
                "chunk_bytes must be positive".to_string(),
            ));
        }
        let sample_rate = overrides
            .sample_rate
            .or(file.sample_rate)
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        if sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".to_string()));
        }
        let audio = AudioSettings {
            sample_rate,
            chunk_bytes,
        };

        Ok(Self {
            endpoint,
            language_code,
            device,
            audio,
            deadline_secs: overrides
                .deadline_secs
                .or(file.deadline_secs)
                .unwrap_or(DEFAULT_DEADLINE_SECS),
            volume_percentage: file.volume_percentage.unwrap_or(DEFAULT_VOLUME),
            data_dir: data_dir.to_path_buf(),
        })
    }
}
