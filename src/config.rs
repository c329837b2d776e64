//! Playlist options.
//!
//! Every option is parsed on its own: a missing, mistyped or out-of-range value
//! is logged and replaced by its default, never an error.

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub title_card_duration: Duration,
    pub background_color: String,
    /// Local path or URL, `None` when unset.
    pub background_image: Option<String>,
    /// `None` disables the idle shuffle.
    pub idle_shuffle_timeout: Option<Duration>,
    /// `None` disables the quit challenge.
    pub password: Option<String>,

    pub serial_advance_code: u8,
    pub serial_retreat_code: u8,
    pub serial_baud_rate: u32,
    pub serial_scan_interval: Duration,
    pub quit_grace_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title_card_duration: TITLE_CARD_DURATION,
            background_color: BACKGROUND_COLOR.to_string(),
            background_image: None,
            idle_shuffle_timeout: Some(IDLE_SHUFFLE_TIMEOUT),
            password: None,
            serial_advance_code: SERIAL_ADVANCE_CODE,
            serial_retreat_code: SERIAL_RETREAT_CODE,
            serial_baud_rate: SERIAL_BAUD_RATE,
            serial_scan_interval: SERIAL_SCAN_INTERVAL,
            quit_grace_period: QUIT_GRACE_PERIOD,
        }
    }
}

impl Config {
    /// Builds a config from the playlist's `config` block.
    pub fn from_json(value: &Value) -> Self {
        let mut config = Config::default();
        let Some(map) = value.as_object() else {
            if !value.is_null() {
                warn!("config block is not an object, using defaults");
            }
            return config;
        };

        for (key, value) in map {
            match key.as_str() {
                "titleCardDurationMs" => match positive_ms(value) {
                    Some(d) => config.title_card_duration = d,
                    None => rejected(key, value),
                },
                "backgroundColor" => match value.as_str() {
                    Some(s) if !s.trim().is_empty() => config.background_color = s.trim().to_string(),
                    _ => rejected(key, value),
                },
                "backgroundImagePath" => match value.as_str() {
                    Some(s) if s.trim().is_empty() => config.background_image = None,
                    Some(s) => config.background_image = Some(s.trim().to_string()),
                    None => rejected(key, value),
                },
                "idleShuffleTimeoutMs" => match idle_timeout(value) {
                    Some(timeout) => config.idle_shuffle_timeout = timeout,
                    None => rejected(key, value),
                },
                "password" => match value {
                    Value::String(s) if s.is_empty() => config.password = None,
                    Value::String(s) => config.password = Some(s.clone()),
                    Value::Null => config.password = None,
                    _ => rejected(key, value),
                },
                "serialAdvanceChar" => match single_byte(value) {
                    Some(b) => config.serial_advance_code = b,
                    None => rejected(key, value),
                },
                "serialRetreatChar" => match single_byte(value) {
                    Some(b) => config.serial_retreat_code = b,
                    None => rejected(key, value),
                },
                "serialBaudRate" => match value.as_u64().and_then(|n| u32::try_from(n).ok()) {
                    Some(rate) if rate > 0 => config.serial_baud_rate = rate,
                    _ => rejected(key, value),
                },
                "serialScanIntervalMs" => match positive_ms(value) {
                    Some(d) => config.serial_scan_interval = d,
                    None => rejected(key, value),
                },
                "quitGracePeriodMs" => match non_negative_ms(value) {
                    Some(d) => config.quit_grace_period = d,
                    None => rejected(key, value),
                },
                _ => warn!(option = %key, "ignoring unrecognized config option"),
            }
        }

        if config.serial_advance_code == config.serial_retreat_code {
            warn!(
                code = config.serial_advance_code,
                "serial advance and retreat codes collide, using defaults"
            );
            config.serial_advance_code = SERIAL_ADVANCE_CODE;
            config.serial_retreat_code = SERIAL_RETREAT_CODE;
        }

        config
    }
}

/// Overlays `overrides` on `base`, key by key. Non-object inputs leave `base` untouched.
pub fn merge(base: &mut Value, overrides: &Value) {
    let Some(overrides) = overrides.as_object() else {
        return;
    };
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    if let Some(base) = base.as_object_mut() {
        for (key, value) in overrides {
            base.insert(key.clone(), value.clone());
        }
    }
}

fn rejected(key: &str, value: &Value) {
    warn!(option = %key, value = %value, "invalid config value, using default");
}

fn finite_ms(value: &Value) -> Option<f64> {
    value.as_f64().filter(|ms| ms.is_finite())
}

fn millis(ms: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(ms / 1000.0)
        .ok()
        .filter(|d| *d <= MAX_CONFIG_DURATION)
}

fn positive_ms(value: &Value) -> Option<Duration> {
    finite_ms(value).filter(|ms| *ms > 0.0).and_then(millis)
}

fn non_negative_ms(value: &Value) -> Option<Duration> {
    finite_ms(value).filter(|ms| *ms >= 0.0).and_then(millis)
}

// Some(None) means "disabled", None means "invalid".
fn idle_timeout(value: &Value) -> Option<Option<Duration>> {
    match value {
        Value::Bool(false) | Value::Null => Some(None),
        Value::Number(_) => {
            let ms = value.as_f64()?;
            if !ms.is_finite() || ms < 0.0 {
                None
            } else if ms == 0.0 {
                Some(None)
            } else {
                millis(ms).map(Some)
            }
        }
        _ => None,
    }
}

fn single_byte(value: &Value) -> Option<u8> {
    let s = value.as_str()?;
    match s.as_bytes() {
        [b] => Some(*b),
        _ => None,
    }
}
