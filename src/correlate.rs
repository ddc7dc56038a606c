//! Matching of monitor device ids against hardware-info instance keys.
//!
//! The display subsystem names a monitor `MONITOR\<HardwareID>\<InstancePath>` while
//! the hardware-info source keys it as `DISPLAY\<HardwareID>\<InstancePath>`. The two
//! instance paths are encoded differently for the same monitor, so only the
//! hardware id is compared.

use crate::NameIndex;

const INSTANCE_KEY_PREFIX: &str = "DISPLAY\\";

/// Extracts the hardware id segment of a monitor device id.
///
/// Returns `None` for a blank id or an id without a `\` separator. The segment
/// may be empty, e.g. for `MONITOR\`.
pub fn hardware_id(monitor_device_id: &str) -> Option<&str> {
    if monitor_device_id.trim().is_empty() {
        return None;
    }

    monitor_device_id.split('\\').nth(1)
}

/// Resolves the friendly name of the monitor with `monitor_device_id`.
///
/// The first entry of `index` whose key starts with `DISPLAY\<HardwareID>`,
/// ignoring case, provides the name. Returns an empty string if nothing matches.
///
/// A hardware id that is a prefix of a longer one also matches the longer one,
/// and an empty hardware id matches every `DISPLAY\` key.
pub fn resolve_friendly_name(monitor_device_id: &str, index: &NameIndex) -> String {
    let Some(hardware_id) = hardware_id(monitor_device_id) else {
        return String::new();
    };
    let prefix = format!("{INSTANCE_KEY_PREFIX}{hardware_id}");

    index
        .iter()
        .find(|(key, _)| starts_with_ignore_case(key, &prefix))
        .map(|(key, name)| {
            log::debug!("{monitor_device_id} matched {key}");
            name.to_owned()
        })
        .unwrap_or_default()
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    let mut text = text.chars().flat_map(char::to_uppercase);

    prefix
        .chars()
        .flat_map(char::to_uppercase)
        .all(|expected| text.next() == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(entries: &[(&str, &str)]) -> NameIndex {
        entries.iter().copied().collect()
    }

    #[test]
    fn blank_id_has_no_name() {
        let index = index(&[("DISPLAY\\VSCB931\\x", "Acme")]);
        assert_eq!(resolve_friendly_name("", &index), "");
        assert_eq!(resolve_friendly_name("   ", &index), "");
    }

    #[test]
    fn id_without_separator_has_no_name() {
        let index = index(&[("DISPLAY\\GARBAGE\\x", "Acme")]);
        assert_eq!(resolve_friendly_name("GARBAGE", &index), "");
    }

    #[test]
    fn empty_hardware_id_matches_first_entry() {
        let index = index(&[
            ("DISPLAY\\VSCB931\\x", "Acme"),
            ("DISPLAY\\GSM5B09\\1", "LG ULTRAGEAR"),
        ]);
        assert_eq!(resolve_friendly_name("MONITOR\\", &index), "Acme");
        assert_eq!(resolve_friendly_name("MONITOR\\\\7&1", &index), "Acme");
    }

    #[test]
    fn matches_on_hardware_id_ignoring_instance_path() {
        let index = index(&[("DISPLAY\\VSCB931\\x", "Acme 27\"")]);
        assert_eq!(
            resolve_friendly_name("MONITOR\\VSCB931\\7&73cdc58&0&UID20738", &index),
            "Acme 27\""
        );
    }

    #[test]
    fn matching_ignores_case() {
        let index = index(&[("display\\vscb931\\5&2b4&0&UID4352_0", "Acme")]);
        assert_eq!(
            resolve_friendly_name("MONITOR\\VSCB931\\{4d36e96e}\\0001", &index),
            "Acme"
        );
    }

    #[test]
    fn hardware_id_without_instance_path() {
        let index = index(&[("DISPLAY\\DEL41A8\\1", "DELL U2720Q")]);
        assert_eq!(resolve_friendly_name("MONITOR\\DEL41A8", &index), "DELL U2720Q");
    }

    #[test]
    fn first_match_in_insertion_order_wins() {
        let index = index(&[
            ("DISPLAY\\GSM5B09\\1", "LG ULTRAGEAR"),
            ("DISPLAY\\VSCB931\\1", "First"),
            ("DISPLAY\\VSCB931\\2", "Second"),
        ]);
        assert_eq!(resolve_friendly_name("MONITOR\\VSCB931\\9", &index), "First");
    }

    #[test]
    fn no_match_has_no_name() {
        let index = index(&[("DISPLAY\\GSM5B09\\1", "LG ULTRAGEAR")]);
        assert_eq!(resolve_friendly_name("MONITOR\\VSCB931\\9", &index), "");
        assert_eq!(resolve_friendly_name("MONITOR\\VSCB931\\9", &NameIndex::new()), "");
    }

    #[test]
    fn shorter_hardware_id_matches_longer_key() {
        let index = index(&[("DISPLAY\\VSC12345\\1", "Longer")]);
        assert_eq!(resolve_friendly_name("MONITOR\\VSC1\\1", &index), "Longer");
    }

    #[test]
    fn key_from_other_namespace_does_not_match() {
        let index = index(&[("MONITOR\\VSCB931\\1", "Wrong namespace")]);
        assert_eq!(resolve_friendly_name("MONITOR\\VSCB931\\1", &index), "");
    }

    #[test]
    fn hardware_id_extraction() {
        assert_eq!(hardware_id("MONITOR\\VSCB931\\7&1"), Some("VSCB931"));
        assert_eq!(hardware_id("MONITOR"), None);
        assert_eq!(hardware_id("MONITOR\\"), Some(""));
        assert_eq!(hardware_id(""), None);
    }
}
