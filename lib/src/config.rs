use crate::consts::*;
use crate::errors::*;
use crate::util::*;

use std::path::PathBuf;

use serde::Deserialize;
use serde::Deserializer;
use smart_default::SmartDefault;

make_log_macro!(debug, "config");

#[derive(Deserialize, Clone, Debug, PartialEq, SmartDefault)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct BacklightConfig {
    /// Name of the directory under `devices_path`, e.g. `intel_backlight`
    #[default(DEFAULT_DEVICE.to_string())]
    #[serde(deserialize_with = "deserialize_device")]
    pub device: String,

    #[default(PathBuf::from(DEVICES_PATH))]
    pub devices_path: PathBuf,
}

fn deserialize_device<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let device: String = Deserialize::deserialize(deserializer)?;
    debug!("{:?}", device);

    if device.is_empty() || device.contains('/') {
        return Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Str(&device),
            &"a device name without '/'",
        ));
    }

    Ok(device)
}

impl BacklightConfig {
    /// Load `config.toml` from the user's config dir, or the defaults if there is none.
    pub async fn new() -> Result<Self> {
        if let Some(config_path) = find_file("config", Some("toml")) {
            debug!("loading {}", config_path.display());
            deserialize_toml_file(config_path).await
        } else {
            debug!("no config file, using defaults");
            Ok(BacklightConfig::default())
        }
    }
}
