//! The adapter → monitor → mode walk.

use std::iter::FusedIterator;

use crate::{
    DisplayEnumeration, DisplayMode, DisplayReport, ModeSelector, NameIndex,
    resolve_friendly_name,
};

/// Picks the best of `modes`.
///
/// See [`DisplayMode::is_better_than`] for the ordering. The first of several
/// equal modes is returned.
pub fn select_best_mode(modes: impl IntoIterator<Item = DisplayMode>) -> Option<DisplayMode> {
    modes.into_iter().fold(None, |best, mode| match best {
        Some(best) if !mode.is_better_than(&best) => Some(best),
        _ => Some(mode),
    })
}

/// Iterates every supported mode of an adapter until the subsystem reports no more.
struct SupportedModes<'a, E: ?Sized> {
    enumeration: &'a E,
    adapter_name: &'a str,
    ordinal: u32,
}

impl<E: DisplayEnumeration + ?Sized> Iterator for SupportedModes<'_, E> {
    type Item = DisplayMode;

    fn next(&mut self) -> Option<Self::Item> {
        let mode = self
            .enumeration
            .describe_mode(self.adapter_name, ModeSelector::Index(self.ordinal))?;
        log::trace!("{} mode #{}: {mode:?}", self.adapter_name, self.ordinal);

        self.ordinal += 1;
        Some(mode)
    }
}

fn resolve_mode<E: DisplayEnumeration + ?Sized>(
    enumeration: &E,
    adapter_name: &str,
    is_active: bool,
) -> Option<DisplayMode> {
    if is_active {
        let mode = enumeration.describe_mode(adapter_name, ModeSelector::Current);
        if mode.is_none() {
            log::debug!("{adapter_name} is active but has no current mode");
        }
        mode
    } else {
        select_best_mode(SupportedModes {
            enumeration,
            adapter_name,
            ordinal: 0,
        })
    }
}

/// A lazy sequence of [`DisplayReport`]s, one per adapter.
///
/// Created by [`enumerate_displays`].
pub struct Displays<'a, E: ?Sized> {
    enumeration: &'a E,
    index: &'a NameIndex,
    ordinal: u32,
    finished: bool,
}

impl<E: DisplayEnumeration + ?Sized> Iterator for Displays<'_, E> {
    type Item = DisplayReport;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let Some(adapter) = self.enumeration.describe_adapter(self.ordinal) else {
            log::debug!("Enumerated {} adapter(s)", self.ordinal);
            self.finished = true;
            return None;
        };

        let (monitor_id, friendly_name) =
            match self.enumeration.describe_attached_monitor(&adapter.name, 0) {
                Some(monitor) => {
                    let name = resolve_friendly_name(&monitor.device_id, self.index);
                    (monitor.device_id, name)
                }
                None => {
                    log::debug!("{} has no attached monitor", adapter.name);
                    (String::new(), String::new())
                }
            };

        let active = adapter.state_flags.is_active();
        let resolution = resolve_mode(self.enumeration, &adapter.name, active);
        log::debug!(
            "Adapter #{} {}: active = {active}, resolution = {resolution:?}",
            self.ordinal,
            adapter.name
        );

        let report = DisplayReport {
            index: self.ordinal,
            name: adapter.name,
            description: adapter.description,
            device_id: adapter.device_id,
            monitor_id,
            friendly_name,
            active,
            resolution,
        };

        self.ordinal += 1;
        Some(report)
    }
}

impl<E: DisplayEnumeration + ?Sized> FusedIterator for Displays<'_, E> {}

/// Walks every adapter of `enumeration` and describes it.
///
/// Nothing is queried until the returned iterator is advanced, and every call
/// starts over from the first adapter.
pub fn enumerate_displays<'a, E: DisplayEnumeration + ?Sized>(
    enumeration: &'a E,
    index: &'a NameIndex,
) -> Displays<'a, E> {
    Displays {
        enumeration,
        index,
        ordinal: 0,
        finished: false,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{DisplayDevice, StateFlags};

    fn mode(width: u32, height: u32, frequency: u32) -> DisplayMode {
        DisplayMode::new(width, height, frequency)
    }

    #[test]
    fn frequency_breaks_area_ties() {
        let modes = [mode(800, 600, 60), mode(1920, 1080, 60), mode(1920, 1080, 144)];
        assert_eq!(select_best_mode(modes), Some(mode(1920, 1080, 144)));
    }

    #[test]
    fn first_mode_is_kept_against_lower_frequency() {
        let modes = [mode(1024, 768, 75), mode(1024, 768, 60)];
        assert_eq!(select_best_mode(modes), Some(mode(1024, 768, 75)));
    }

    #[test]
    fn larger_area_later_in_list_wins() {
        let modes = [mode(1920, 1080, 240), mode(640, 480, 60), mode(2560, 1440, 60)];
        assert_eq!(select_best_mode(modes), Some(mode(2560, 1440, 60)));
    }

    #[test]
    fn different_shapes_with_equal_area_keep_first() {
        let modes = [mode(1600, 900, 60), mode(1200, 1200, 60)];
        assert_eq!(select_best_mode(modes), Some(mode(1600, 900, 60)));
    }

    #[test]
    fn no_modes_no_best() {
        assert_eq!(select_best_mode(std::iter::empty()), None);
    }

    #[test]
    fn zero_sized_mode_is_still_a_mode() {
        assert_eq!(select_best_mode([mode(0, 0, 0)]), Some(mode(0, 0, 0)));
    }

    /// A single inactive adapter whose mode queries are counted.
    struct CountingAdapter {
        modes: Vec<DisplayMode>,
        mode_queries: Cell<u32>,
    }

    impl DisplayEnumeration for CountingAdapter {
        fn describe_adapter(&self, ordinal: u32) -> Option<DisplayDevice> {
            (ordinal == 0).then(|| DisplayDevice {
                name: "\\\\.\\DISPLAY1".into(),
                state_flags: StateFlags::empty(),
                ..Default::default()
            })
        }

        fn describe_attached_monitor(&self, _: &str, _: u32) -> Option<DisplayDevice> {
            None
        }

        fn describe_mode(&self, _: &str, selector: ModeSelector) -> Option<DisplayMode> {
            self.mode_queries.set(self.mode_queries.get() + 1);
            match selector {
                ModeSelector::Current => panic!("inactive adapters have no current mode"),
                ModeSelector::Index(i) => self.modes.get(i as usize).copied(),
            }
        }
    }

    #[test_log::test]
    fn inactive_scan_stops_at_first_missing_mode() {
        let adapter = CountingAdapter {
            modes: vec![mode(800, 600, 60), mode(1280, 1024, 75)],
            mode_queries: Cell::new(0),
        };

        let reports: Vec<_> = enumerate_displays(&adapter, &NameIndex::new()).collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].resolution, Some(mode(1280, 1024, 75)));
        assert_eq!(reports[0].monitor_id, "");
        assert_eq!(adapter.mode_queries.get(), 3);
    }

    #[test_log::test]
    fn iterator_stays_finished() {
        let adapter = CountingAdapter {
            modes: Vec::new(),
            mode_queries: Cell::new(0),
        };

        let index = NameIndex::new();
        let mut displays = enumerate_displays(&adapter, &index);
        assert!(displays.next().is_some());
        assert!(displays.next().is_none());
        assert!(displays.next().is_none());
    }
}
