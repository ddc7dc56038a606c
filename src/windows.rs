use std::{ffi::c_void, marker::PhantomData};

use smallvec::SmallVec;
use windows::{
    Win32::{
        Foundation::RPC_E_CHANGED_MODE,
        Graphics::Gdi::*,
        System::{
            Com::*,
            LibraryLoader::GetModuleHandleW,
            Ole::{SafeArrayAccessData, SafeArrayGetLBound, SafeArrayGetUBound, SafeArrayUnaccessData},
            Variant::*,
            Wmi::*,
        },
    },
    core::{BSTR, PCWSTR, VARIANT, w},
};

use crate::{
    DisplayDevice, DisplayEnumeration, DisplayMode, HardwareInfoSource, ModeSelector,
    MonitorIdentity, StateFlags,
};

/// The error type for Windows-specific operations.
/// This is a type alias for [`windows::core::Error`][windows::core::Error].
///
/// [windows::core::Error]: https://docs.rs/windows/latest/windows/core/struct.Error.html
pub type WindowsError = windows::core::Error;

/// Device names are at most 32 UTF-16 code units long.
type WideName = SmallVec<[u16; 40]>;

fn to_wide(text: &str) -> WideName {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Reads a fixed-size buffer up to the first NUL, or the whole buffer if there is none.
fn string_from_wide(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// The display subsystem as seen through `EnumDisplayDevicesW` and `EnumDisplaySettingsW`.
#[derive(Debug, Clone, Copy)]
pub struct WindowsDisplayEnumeration {
    _private: (),
}

impl WindowsDisplayEnumeration {
    /// Binds to the display subsystem.
    ///
    /// # Errors
    /// Returns a [`WindowsError`] if `user32.dll` is not loaded in this process.
    pub fn new() -> Result<Self, WindowsError> {
        unsafe { GetModuleHandleW(w!("user32.dll"))? };

        Ok(Self { _private: () })
    }

    /// Calls `EnumDisplayDevicesW` for the device at `ordinal` below `parent`,
    /// or below the root if `parent` is `None`.
    fn describe_device(parent: Option<&str>, ordinal: u32) -> Option<DisplayDevice> {
        let parent = parent.map(to_wide);
        let parent = parent
            .as_ref()
            .map_or(PCWSTR::null(), |name| PCWSTR(name.as_ptr()));

        let mut device = DISPLAY_DEVICEW {
            cb: std::mem::size_of::<DISPLAY_DEVICEW>() as _,
            ..Default::default()
        };

        if !unsafe { EnumDisplayDevicesW(parent, ordinal, &mut device, 0) }.as_bool() {
            return None;
        }

        Some(DisplayDevice {
            name: string_from_wide(&device.DeviceName),
            description: string_from_wide(&device.DeviceString),
            device_id: string_from_wide(&device.DeviceID),
            state_flags: StateFlags::from_bits_retain(device.StateFlags.0),
        })
    }
}

impl DisplayEnumeration for WindowsDisplayEnumeration {
    fn describe_adapter(&self, ordinal: u32) -> Option<DisplayDevice> {
        Self::describe_device(None, ordinal)
    }

    fn describe_attached_monitor(
        &self,
        adapter_name: &str,
        ordinal: u32,
    ) -> Option<DisplayDevice> {
        Self::describe_device(Some(adapter_name), ordinal)
    }

    fn describe_mode(&self, adapter_name: &str, selector: ModeSelector) -> Option<DisplayMode> {
        let name = to_wide(adapter_name);
        let mode_number = match selector {
            ModeSelector::Current => ENUM_CURRENT_SETTINGS,
            ModeSelector::Index(i) => ENUM_DISPLAY_SETTINGS_MODE(i),
        };

        let mut mode = DEVMODEW {
            dmSize: std::mem::size_of::<DEVMODEW>() as _,
            ..Default::default()
        };

        unsafe { EnumDisplaySettingsW(PCWSTR(name.as_ptr()), mode_number, &mut mode) }
            .as_bool()
            .then(|| DisplayMode::new(mode.dmPelsWidth, mode.dmPelsHeight, mode.dmDisplayFrequency))
    }
}

/// Keeps COM initialized on the current thread while alive.
struct ComApartment {
    owned: bool,
}

impl ComApartment {
    fn enter() -> Result<Self, WindowsError> {
        let result = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };

        // COM is already running in another threading model; use it as is.
        if result == RPC_E_CHANGED_MODE {
            return Ok(Self { owned: false });
        }
        result.ok()?;

        // Fails with `RPC_E_TOO_LATE` if the process already set its own security.
        if let Err(e) = unsafe {
            CoInitializeSecurity(
                None,
                -1,
                None,
                None,
                RPC_C_AUTHN_LEVEL_DEFAULT,
                RPC_C_IMP_LEVEL_IMPERSONATE,
                None,
                EOAC_NONE,
                None,
            )
        } {
            log::debug!("CoInitializeSecurity: {e}");
        }

        Ok(Self { owned: true })
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.owned {
            unsafe { CoUninitialize() };
        }
    }
}

/// Locked element data of a `SAFEARRAY`, unlocked on drop.
struct SafeArrayData<'a> {
    array: *const SAFEARRAY,
    data: *const c_void,
    _variant: PhantomData<&'a VARIANT>,
}

impl<'a> SafeArrayData<'a> {
    /// # Safety
    /// `array` must point to a valid `SAFEARRAY` that outlives `'a`.
    unsafe fn access(array: *const SAFEARRAY) -> Result<Self, WindowsError> {
        let mut data = std::ptr::null_mut();
        unsafe { SafeArrayAccessData(array, &mut data)? };

        Ok(Self {
            array,
            data,
            _variant: PhantomData,
        })
    }

    /// # Safety
    /// The array must hold at least `len` elements of type `T`.
    unsafe fn elements<T>(&self, len: usize) -> &[T] {
        if len == 0 || self.data.is_null() {
            return &[];
        }

        unsafe { std::slice::from_raw_parts(self.data as *const T, len) }
    }
}

impl Drop for SafeArrayData<'_> {
    fn drop(&mut self) {
        _ = unsafe { SafeArrayUnaccessData(self.array) };
    }
}

/// Reads a one-dimensional integer array property as UTF-16 code units.
///
/// WMI reports `uint16[]` properties as arrays of `VT_I4`, so every element is narrowed.
/// Returns `None` for `NULL` or a non-integer property.
fn code_units(value: &VARIANT) -> Result<Option<Vec<u16>>, WindowsError> {
    let raw = value.as_raw();
    let vt = unsafe { raw.Anonymous.Anonymous.vt };

    if vt & VT_ARRAY.0 == 0 {
        return Ok(None);
    }

    let array = unsafe { raw.Anonymous.Anonymous.Anonymous.parray } as *const SAFEARRAY;
    if array.is_null() {
        return Ok(None);
    }

    let lower = unsafe { SafeArrayGetLBound(array, 1)? };
    let upper = unsafe { SafeArrayGetUBound(array, 1)? };
    let len = usize::try_from(i64::from(upper) - i64::from(lower) + 1).unwrap_or(0);

    let data = unsafe { SafeArrayData::access(array)? };
    let units = match VARENUM(vt & !VT_ARRAY.0) {
        VT_I4 | VT_UI4 | VT_INT | VT_UINT => unsafe { data.elements::<u32>(len) }
            .iter()
            .map(|&unit| unit as u16)
            .collect(),
        VT_I2 | VT_UI2 => unsafe { data.elements::<u16>(len) }.to_vec(),
        VT_I1 | VT_UI1 => unsafe { data.elements::<u8>(len) }
            .iter()
            .map(|&unit| u16::from(unit))
            .collect(),
        other => {
            log::debug!("Ignoring an array of {other:?}");
            return Ok(None);
        }
    };

    Ok(Some(units))
}

/// Monitor identification data from the `WmiMonitorID` WMI class.
#[derive(Debug, Clone)]
pub struct WmiMonitorIdentities {
    namespace: &'static str,
    query: &'static str,
}

impl Default for WmiMonitorIdentities {
    fn default() -> Self {
        Self::new()
    }
}

impl WmiMonitorIdentities {
    pub fn new() -> Self {
        Self {
            namespace: "root\\WMI",
            query: "SELECT InstanceName, UserFriendlyName FROM WmiMonitorID",
        }
    }

    fn read_identity(object: &IWbemClassObject) -> Result<Option<MonitorIdentity>, WindowsError> {
        let mut instance_name = VARIANT::default();
        unsafe { object.Get(w!("InstanceName"), 0, &mut instance_name, None, None)? };

        let Ok(instance_key) = BSTR::try_from(&instance_name) else {
            return Ok(None);
        };
        if instance_key.is_empty() {
            return Ok(None);
        }

        let mut friendly_name = VARIANT::default();
        unsafe { object.Get(w!("UserFriendlyName"), 0, &mut friendly_name, None, None)? };

        Ok(Some(MonitorIdentity::new(
            instance_key.to_string(),
            code_units(&friendly_name)?,
        )))
    }
}

impl HardwareInfoSource for WmiMonitorIdentities {
    type Error = WindowsError;

    fn query_monitor_identities(&self) -> Result<Vec<MonitorIdentity>, Self::Error> {
        let _apartment = ComApartment::enter()?;

        let locator: IWbemLocator =
            unsafe { CoCreateInstance(&WbemLocator, None, CLSCTX_INPROC_SERVER)? };
        let services = unsafe {
            locator.ConnectServer(
                &BSTR::from(self.namespace),
                &BSTR::new(),
                &BSTR::new(),
                &BSTR::new(),
                WBEM_FLAG_CONNECT_USE_MAX_WAIT.0,
                &BSTR::new(),
                None,
            )?
        };
        let rows = unsafe {
            services.ExecQuery(
                &BSTR::from("WQL"),
                &BSTR::from(self.query),
                WBEM_FLAG_FORWARD_ONLY | WBEM_FLAG_RETURN_IMMEDIATELY,
                None,
            )?
        };

        let mut identities = Vec::new();
        loop {
            let mut objects: [Option<IWbemClassObject>; 1] = [None];
            let mut returned = 0;
            unsafe { rows.Next(WBEM_INFINITE, &mut objects, &mut returned) }.ok()?;

            let Some(object) = objects[0].take().filter(|_| returned > 0) else {
                break;
            };

            match Self::read_identity(&object)? {
                Some(identity) => identities.push(identity),
                None => log::debug!("Skipping a WmiMonitorID row without an instance name"),
            }
        }

        log::debug!("{} monitor identities from WMI", identities.len());
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_buffers_stop_at_nul() {
        let mut buffer = [0u16; 32];
        for (slot, unit) in buffer.iter_mut().zip("\\\\.\\DISPLAY1".encode_utf16()) {
            *slot = unit;
        }
        assert_eq!(string_from_wide(&buffer), "\\\\.\\DISPLAY1");
    }

    #[test]
    fn full_wide_buffer_is_read_entirely() {
        let buffer = [u16::from(b'A'); 4];
        assert_eq!(string_from_wide(&buffer), "AAAA");
    }

    #[test]
    fn wide_names_are_nul_terminated() {
        assert_eq!(to_wide("AB").as_slice(), &[65, 66, 0]);
    }

    #[test_log::test]
    fn enumeration_is_restartable() {
        let enumeration = WindowsDisplayEnumeration::new().unwrap();
        let index = crate::NameIndex::new();

        let first = crate::enumerate_displays(&enumeration, &index).count();
        let second = crate::enumerate_displays(&enumeration, &index).count();
        assert_eq!(first, second);
    }
}
