#![warn(clippy::match_same_arms)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::unnecessary_wraps)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod util;
mod backlight;
mod config;
mod consts;
mod errors;
mod event;
mod watch;
mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use crate::backlight::{Backlight, BacklightState};
pub use crate::config::BacklightConfig;
pub use crate::consts::{DEFAULT_DEVICE, DEVICES_PATH};
pub use crate::errors::{BacklightError, ReadCause};
pub use crate::event::{Button, ClickEvent, Update};
use crate::errors::*;
use crate::watch::{Formatter, WatchLoop};
use crate::watcher::file_watcher;

make_log_macro!(debug, "backlight_watch");

/// Used to construct [`BacklightModule`] from a [`BacklightConfig`]
#[derive(Default)]
pub struct BacklightBuilder<'a> {
    device: Option<&'a str>,
    config: Option<BacklightConfig>,
}

impl<'a> BacklightBuilder<'a> {
    /// Create a new [`BacklightBuilder`].
    pub fn new() -> Self {
        BacklightBuilder::default()
    }

    /// Overrides the device named by the config.
    pub fn with_device(mut self, device: &'a str) -> Self {
        self.device = Some(device);
        self
    }

    /// Defaults to [`BacklightConfig::new()`].
    pub fn with_config(mut self, config: BacklightConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Returns a [`BacklightModule`] with the default `"{percent}%"` output.
    pub async fn build(self) -> Result<BacklightModule> {
        let config = match self.config {
            Some(config) => config,
            None => BacklightConfig::new().await?,
        };
        let device = self.device.unwrap_or(&config.device);
        debug!("building module for {device}");

        Ok(BacklightModule::new(device).with_devices_path(config.devices_path))
    }
}

/// A status bar module reporting one backlight device's brightness.
///
/// The module is consumed by [`BacklightModule::run`], so its output format is
/// fixed for the whole life of the watch loop.
pub struct BacklightModule<O = String> {
    device_id: String,
    devices_path: PathBuf,
    format: Formatter<O>,
}

impl BacklightModule {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            devices_path: PathBuf::from(DEVICES_PATH),
            format: Arc::new(|state: &BacklightState| format!("{}%", state.percent())),
        }
    }
}

impl<O: Send + 'static> BacklightModule<O> {
    /// Replace how a [`BacklightState`] is turned into renderer output.
    pub fn with_format<P, F>(self, format: F) -> BacklightModule<P>
    where
        F: Fn(&BacklightState) -> P + Send + Sync + 'static,
    {
        BacklightModule {
            device_id: self.device_id,
            devices_path: self.devices_path,
            format: Arc::new(format),
        }
    }

    /// Defaults to `/sys/class/backlight`.
    pub fn with_devices_path(mut self, devices_path: impl Into<PathBuf>) -> Self {
        self.devices_path = devices_path.into();
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn devices_path(&self) -> &Path {
        &self.devices_path
    }

    /// Watch the device until `cancel` fires or a fatal error occurs.
    ///
    /// Every formatted state and every error is sent on `updates`. Scroll
    /// events received on `commands` adjust the brightness; a failed
    /// adjustment is reported but does not stop the loop. Fatal errors are
    /// both sent on `updates` and returned.
    pub async fn run(
        self,
        updates: mpsc::Sender<Update<O>>,
        commands: mpsc::Receiver<ClickEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let backlight = Backlight::new(&self.devices_path, &self.device_id);

        let (_watcher, events) = match file_watcher(backlight.read_brightness_file()) {
            Ok(subscription) => subscription,
            Err(err) => {
                let err = BacklightError::from(err);
                let _ = updates.send(Update::Error(err.clone())).await;
                return Err(err);
            }
        };

        WatchLoop::new(backlight, self.format, updates)
            .run(events, commands, cancel)
            .await
    }
}
