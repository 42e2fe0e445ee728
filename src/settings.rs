// src/settings.rs

//! # Settings Persistence
//!
//! Calibration and gain sets are stored as `postcard` encoded blobs in a
//! key value store provided by the board (flash, EEPROM, NVS partition).
//! A stored blob must decode to exactly one value with no bytes left over;
//! anything else counts as a miss and the caller falls back to defaults.

use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Largest settings blob in bytes.
pub const SETTINGS_CAPACITY: usize = 64;

/// Key of the IMU calibration.
pub const CALIBRATION_KEY: &str = "imu";

/// Key of the roll and pitch rate gains.
pub const ROLL_PITCH_GAINS_KEY: &str = "pid-v-pr";

/// Key of the yaw rate gains.
pub const YAW_GAINS_KEY: &str = "pid-v-y";

/// Non-volatile key value store.
pub trait Storage {
    /// Bytes stored under `key`, `None` when absent or unreadable.
    fn load(&mut self, key: &str) -> Option<heapless::Vec<u8, SETTINGS_CAPACITY>>;

    /// Replaces the bytes under `key`. Returns whether the write succeeded.
    fn save(&mut self, key: &str, bytes: &[u8]) -> bool;
}

/// Settings load or store failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Nothing is stored under the key.
    #[error("no value stored")]
    Missing,
    /// The stored blob is shorter or longer than the value.
    #[error("stored value has the wrong size")]
    SizeMismatch,
    /// The value does not fit the buffer.
    #[error("value could not be encoded")]
    Encode,
    /// The stored blob is not a valid encoding.
    #[error("stored value could not be decoded")]
    Decode,
    /// The store rejected the write.
    #[error("write failed")]
    WriteFailed,
}

/// Loads and decodes the value stored under `key`.
pub fn load_settings<T, S>(storage: &mut S, key: &str) -> Result<T, SettingsError>
where
    T: DeserializeOwned,
    S: Storage + ?Sized,
{
    debug!("loading settings {}", key);
    let bytes = storage.load(key).ok_or_else(|| {
        warn!("settings {} missing", key);
        SettingsError::Missing
    })?;

    let (value, rest) = postcard::take_from_bytes::<T>(&bytes).map_err(|e| {
        warn!("settings {} read fail: {:?}", key, e);
        match e {
            postcard::Error::DeserializeUnexpectedEnd => SettingsError::SizeMismatch,
            _ => SettingsError::Decode,
        }
    })?;
    if !rest.is_empty() {
        warn!("settings {} read fail: {} trailing bytes", key, rest.len());
        return Err(SettingsError::SizeMismatch);
    }
    Ok(value)
}

/// Encodes `value` and stores it under `key`.
pub fn save_settings<T, S>(storage: &mut S, key: &str, value: &T) -> Result<(), SettingsError>
where
    T: Serialize,
    S: Storage + ?Sized,
{
    debug!("saving settings {}", key);
    let mut buffer = [0u8; SETTINGS_CAPACITY];
    let encoded = postcard::to_slice(value, &mut buffer).map_err(|e| {
        warn!("settings {} encode fail: {:?}", key, e);
        SettingsError::Encode
    })?;

    if storage.save(key, encoded) {
        Ok(())
    } else {
        warn!("settings {} write fail", key);
        Err(SettingsError::WriteFailed)
    }
}
