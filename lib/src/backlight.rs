use crate::consts::*;
use crate::errors::*;
use crate::event::Button;
use crate::util::*;

use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

make_log_macro!(debug, "backlight");

/// Snapshot of a backlight device's brightness, in device units.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BacklightState {
    /// Last value read from the current brightness file. Not clamped.
    pub current: i64,
    /// Last value read from `max_brightness`, never negative.
    pub maximum: i64,
    pub device_id: String,
}

impl BacklightState {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Default::default()
        }
    }

    /// `current / maximum`, or `0.0` for a device reporting no range.
    pub fn fraction(&self) -> f64 {
        if self.maximum == 0 {
            return 0.0;
        }
        self.current as f64 / self.maximum as f64
    }

    /// Brightness as a percentage of the maximum, rounded half away from zero.
    pub fn percent(&self) -> i64 {
        (self.fraction() * 100.0).round() as i64
    }

    /// Raw units moved by one adjustment. Always at least 1.
    pub fn step(&self) -> i64 {
        (self.maximum / STEP_DIVISOR).max(1)
    }

    /// The value a click with `button` should write, if it adjusts brightness at all.
    pub fn adjusted(&self, button: Button) -> Option<i64> {
        match button {
            Button::ScrollUp => Some(self.current.saturating_add(self.step())),
            Button::ScrollDown => Some(self.current.saturating_sub(self.step())),
            _ => None,
        }
    }
}

/// Represents a physical backlight device whose brightness level can be queried and set.
#[derive(Clone, Debug)]
pub struct Backlight {
    state: BacklightState,
    max_brightness_file: PathBuf,
    read_brightness_file: PathBuf,
    write_brightness_file: PathBuf,
}

impl Backlight {
    /// Does no I/O; values stay zero until the first [`Backlight::refresh`].
    pub fn new(devices_path: impl AsRef<Path>, device_id: &str) -> Self {
        let device_path = devices_path.as_ref().join(device_id);

        Self {
            read_brightness_file: device_path.join({
                if device_id == DEVICE_AMD {
                    FILE_BRIGHTNESS_AMD
                } else {
                    FILE_BRIGHTNESS
                }
            }),
            max_brightness_file: device_path.join(FILE_MAX_BRIGHTNESS),
            write_brightness_file: device_path.join(FILE_BRIGHTNESS_WRITE),
            state: BacklightState::new(device_id),
        }
    }

    pub fn state(&self) -> &BacklightState {
        &self.state
    }

    /// The file whose modifications signal a brightness change.
    pub fn read_brightness_file(&self) -> &Path {
        &self.read_brightness_file
    }

    /// Re-read `max_brightness` and the current brightness, in that order.
    ///
    /// Both values are committed together; on error the previous state is kept.
    pub async fn refresh(&mut self) -> Result<()> {
        let maximum = read_brightness(&self.max_brightness_file).await?;
        if maximum < 0 {
            return Err(BacklightError::read(
                &self.max_brightness_file,
                ReadCause::NegativeMaximum(maximum),
            ));
        }
        let current = read_brightness(&self.read_brightness_file).await?;

        debug!("{}: {current}/{maximum}", self.state.device_id);
        self.state.maximum = maximum;
        self.state.current = current;
        Ok(())
    }

    /// Write a raw brightness value. Range checking is left to the driver.
    pub async fn set_brightness(&self, target: i64) -> Result<()> {
        debug!("{}: writing {target}", self.state.device_id);
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.write_brightness_file)
            .await
            .map_err(|err| BacklightError::write(&self.write_brightness_file, err))?;
        file.write_all(target.to_string().as_bytes())
            .await
            .map_err(|err| BacklightError::write(&self.write_brightness_file, err))
    }
}
