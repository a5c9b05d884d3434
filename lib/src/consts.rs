/// Location of backlight devices
pub const DEVICES_PATH: &str = "/sys/class/backlight";

/// Device used when neither the caller nor the config names one
pub const DEFAULT_DEVICE: &str = "intel_backlight";

/// Filename for device's max brightness
pub const FILE_MAX_BRIGHTNESS: &str = "max_brightness";

/// Filename for current brightness.
pub const FILE_BRIGHTNESS: &str = "actual_brightness";

/// amdgpu drivers set the actual_brightness in a different scale than
/// [0, max_brightness], so we have to use the 'brightness' file instead.
pub const FILE_BRIGHTNESS_AMD: &str = "brightness";

/// Device name of the amdgpu backlight
pub const DEVICE_AMD: &str = "amdgpu_bl0";

/// set the requested brightness level
pub const FILE_BRIGHTNESS_WRITE: &str = "brightness";

/// Adjustments move by this fraction of `max_brightness`
pub const STEP_DIVISOR: i64 = 100;

/// Directory name under the user's config dir
pub const CONFIG_DIR: &str = "backlight_watch";
