pub mod correlate;
pub mod enumerate;
pub mod name_index;
pub mod report;
#[cfg(target_os = "windows")]
pub mod windows;

pub use correlate::resolve_friendly_name;
pub use enumerate::{Displays, enumerate_displays, select_best_mode};
pub use name_index::{NameIndex, decode_friendly_name};
pub use report::{DisplayReport, ReportFormat, ReportWriter};

#[cfg(target_os = "windows")]
use crate::windows::{
    WindowsDisplayEnumeration as PlatformDisplayEnumeration, WindowsError as PlatformError,
    WmiMonitorIdentities as PlatformHardwareInfo,
};

/// The error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// There is no display backend for the target platform.
    #[error("Display enumeration is not supported on this platform.")]
    UnsupportedPlatform,
    /// Binding to the display subsystem failed.
    #[cfg(target_os = "windows")]
    #[error("Initialization failed.")]
    InitializationError(#[source] PlatformError),
}

bitflags::bitflags! {
    /// State flags reported for an adapter or a monitor.
    ///
    /// Unknown bits are kept as-is, so the value always matches what the OS reported.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateFlags: u32 {
        /// The device is part of the desktop.
        const ACTIVE = 0x0000_0001;
        /// The primary desktop is on this device.
        const PRIMARY_DEVICE = 0x0000_0004;
        /// The device is a pseudo device used to mirror drawing.
        const MIRRORING_DRIVER = 0x0000_0008;
        /// The device is VGA compatible.
        const VGA_COMPATIBLE = 0x0000_0010;
        /// The device is removable.
        const REMOVABLE = 0x0000_0020;
    }
}

impl StateFlags {
    /// Whether the device is currently active.
    pub fn is_active(self) -> bool {
        self.contains(Self::ACTIVE)
    }
}

/// A device described by the display subsystem.
///
/// The same shape is used for adapters and for the monitor attached to an adapter.
/// For a monitor, `device_id` looks like `MONITOR\<HardwareID>\<InstancePath>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayDevice {
    /// The device path, e.g. `\\.\DISPLAY1`.
    pub name: String,
    /// A human readable description of the device.
    pub description: String,
    /// The hardware instance path.
    pub device_id: String,
    pub state_flags: StateFlags,
}

/// A mode a device can be driven at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct DisplayMode {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Refresh rate in hertz.
    pub frequency: u32,
}

impl DisplayMode {
    pub fn new(width: u32, height: u32, frequency: u32) -> Self {
        Self {
            width,
            height,
            frequency,
        }
    }

    /// The pixel area of the mode.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether this mode is preferable to `other`.
    ///
    /// A larger area wins. On an equal area the higher frequency wins.
    /// A full tie is not an improvement, so the earlier mode is kept.
    pub fn is_better_than(&self, other: &Self) -> bool {
        let (area, other_area) = (self.area(), other.area());
        area > other_area || (area == other_area && self.frequency > other.frequency)
    }
}

/// Which mode to ask the display subsystem for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelector {
    /// The mode the device is currently driven at.
    Current,
    /// The n-th supported mode.
    Index(u32),
}

/// Access to the OS display subsystem.
///
/// Ordinals are contiguous: the first `None` means there are no more items.
pub trait DisplayEnumeration {
    /// Describes the adapter at `ordinal`.
    fn describe_adapter(&self, ordinal: u32) -> Option<DisplayDevice>;

    /// Describes the monitor at `ordinal` attached to the adapter named `adapter_name`.
    fn describe_attached_monitor(
        &self,
        adapter_name: &str,
        ordinal: u32,
    ) -> Option<DisplayDevice>;

    /// Describes a mode of the adapter named `adapter_name`.
    fn describe_mode(&self, adapter_name: &str, selector: ModeSelector) -> Option<DisplayMode>;
}

/// A monitor identification row as reported by the hardware-info source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorIdentity {
    /// The instance key, e.g. `DISPLAY\VSCB931\5&1a2b3c4d&0&UID4352_0`.
    pub instance_key: String,
    /// The friendly name as UTF-16 code units, possibly NUL padded.
    pub raw_name: Option<Vec<u16>>,
}

impl MonitorIdentity {
    pub fn new(instance_key: impl Into<String>, raw_name: Option<Vec<u16>>) -> Self {
        Self {
            instance_key: instance_key.into(),
            raw_name,
        }
    }
}

/// A source of monitor identification data, queried once per run.
pub trait HardwareInfoSource {
    type Error: std::error::Error;

    /// Returns every monitor identification row known to the source.
    fn query_monitor_identities(&self) -> Result<Vec<MonitorIdentity>, Self::Error>;
}

/// The error reported by [`UnavailableHardwareInfo`].
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("No hardware-info source is available on this platform.")]
pub struct HardwareInfoUnavailable;

/// A hardware-info source that never has any data.
///
/// Used on platforms without a hardware-info backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableHardwareInfo;

impl HardwareInfoSource for UnavailableHardwareInfo {
    type Error = HardwareInfoUnavailable;

    fn query_monitor_identities(&self) -> Result<Vec<MonitorIdentity>, Self::Error> {
        Err(HardwareInfoUnavailable)
    }
}

/// Binds to the display subsystem of the current platform.
///
/// # Errors
/// Returns [`Error::UnsupportedPlatform`] if there is no backend for the target,
/// or an initialization error if the backend cannot be bound.
#[cfg(target_os = "windows")]
pub fn system_enumeration() -> Result<PlatformDisplayEnumeration, Error> {
    PlatformDisplayEnumeration::new().map_err(Error::InitializationError)
}

/// Binds to the display subsystem of the current platform.
///
/// # Errors
/// Returns [`Error::UnsupportedPlatform`] if there is no backend for the target.
#[cfg(not(target_os = "windows"))]
pub fn system_enumeration() -> Result<Box<dyn DisplayEnumeration>, Error> {
    Err(Error::UnsupportedPlatform)
}

/// Returns the hardware-info source of the current platform.
#[cfg(target_os = "windows")]
pub fn system_hardware_info() -> PlatformHardwareInfo {
    PlatformHardwareInfo::new()
}

/// Returns the hardware-info source of the current platform.
#[cfg(not(target_os = "windows"))]
pub fn system_hardware_info() -> UnavailableHardwareInfo {
    UnavailableHardwareInfo
}

impl<T: DisplayEnumeration + ?Sized> DisplayEnumeration for Box<T> {
    fn describe_adapter(&self, ordinal: u32) -> Option<DisplayDevice> {
        (**self).describe_adapter(ordinal)
    }

    fn describe_attached_monitor(
        &self,
        adapter_name: &str,
        ordinal: u32,
    ) -> Option<DisplayDevice> {
        (**self).describe_attached_monitor(adapter_name, ordinal)
    }

    fn describe_mode(&self, adapter_name: &str, selector: ModeSelector) -> Option<DisplayMode> {
        (**self).describe_mode(adapter_name, selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_does_not_overflow() {
        let mode = DisplayMode::new(u32::MAX, u32::MAX, 60);
        assert_eq!(mode.area(), u64::from(u32::MAX) * u64::from(u32::MAX));
    }

    #[test]
    fn larger_area_wins_regardless_of_frequency() {
        let big = DisplayMode::new(2560, 1440, 30);
        let small = DisplayMode::new(1920, 1080, 240);
        assert!(big.is_better_than(&small));
        assert!(!small.is_better_than(&big));
    }

    #[test]
    fn full_tie_is_not_better() {
        let mode = DisplayMode::new(1024, 768, 75);
        assert!(!mode.is_better_than(&mode));
    }

    #[test]
    fn unknown_state_bits_are_retained() {
        let flags = StateFlags::from_bits_retain(0x8000_0001);
        assert!(flags.is_active());
        assert_eq!(flags.bits(), 0x8000_0001);
    }
}
