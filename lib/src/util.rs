use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::io::AsyncReadExt as _;

use crate::consts::CONFIG_DIR;
use crate::errors::*;

macro_rules! make_log_macro {
    (@wdoll $macro_name:ident, $block_name:literal, ($dol:tt)) => {
        #[allow(unused_macros)]
        macro_rules! $macro_name {
            ($dol($args:tt)+) => {
                ::log::$macro_name!(target: $block_name, $dol($args)+);
            };
        }
    };
    ($macro_name:ident, $block_name:literal) => {
        make_log_macro!(@wdoll $macro_name, $block_name, ($));
    };
}

/// Look for `<config dir>/backlight_watch/<file>.<extension>`.
pub fn find_file(file: &str, extension: Option<&str>) -> Option<PathBuf> {
    let mut path = dirs::config_dir()?.join(CONFIG_DIR).join(file);
    if let Some(extension) = extension {
        path.set_extension(extension);
    }
    path.is_file().then_some(path)
}

pub async fn deserialize_toml_file<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let contents = read_file(path).await.map_err(|err| {
        BacklightError::Other(format!("Failed to read {}: {err}", path.display()))
    })?;

    toml::from_str(&contents).map_err(|err| {
        let location_msg = err
            .span()
            .map(|span| {
                let line = 1 + contents.as_bytes()[..(span.start)]
                    .iter()
                    .filter(|b| **b == b'\n')
                    .count();
                format!(" at line {line}")
            })
            .unwrap_or_default();
        BacklightError::Other(format!(
            "Failed to deserialize TOML file {}{}: {}",
            path.display(),
            location_msg,
            err.message()
        ))
    })
}

pub async fn read_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut content = String::new();
    file.read_to_string(&mut content).await?;
    Ok(content)
}

/// Parse the contents of a sysfs brightness file.
///
/// Exactly one trailing newline is accepted; anything else that is not a
/// plain decimal integer is an error.
pub fn parse_brightness(content: &str) -> Result<i64, ReadCause> {
    let value = content.strip_suffix('\n').unwrap_or(content);
    value.parse().map_err(|source| ReadCause::Parse {
        content: value.to_string(),
        source,
    })
}

/// Read and parse a brightness file, attributing failures to `path`.
pub async fn read_brightness(path: &Path) -> Result<i64> {
    let content = read_file(path)
        .await
        .map_err(|err| BacklightError::read(path, err))?;
    parse_brightness(&content).map_err(|cause| BacklightError::read(path, cause))
}
