//! Formatting of display reports.

use std::{
    fmt::Write as _,
    io::{self, Write},
    str::FromStr,
};

use serde::Serialize;

use crate::DisplayMode;

/// Everything known about one adapter.
///
/// Missing data is explicit: an empty string for ids and names, `None` for the resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayReport {
    /// The enumeration ordinal of the adapter.
    pub index: u32,
    /// The adapter device path.
    pub name: String,
    pub description: String,
    pub device_id: String,
    /// The device id of the attached monitor, or empty if there is none.
    pub monitor_id: String,
    /// The resolved monitor name, or empty if it is unknown.
    pub friendly_name: String,
    pub active: bool,
    /// The current mode of an active adapter, or the best supported mode of an inactive one.
    pub resolution: Option<DisplayMode>,
}

/// The output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Indented key/value blocks, written as each display is described.
    #[default]
    Yaml,
    /// A single JSON document.
    Json,
}

impl ReportFormat {
    pub const NAMES: [&'static str; 2] = ["yaml", "json"];
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown report format `{0}`.")]
pub struct UnknownFormat(String);

impl FromStr for ReportFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(UnknownFormat(s.to_owned())),
        }
    }
}

#[derive(Serialize)]
struct Document<'a> {
    monitors: &'a [DisplayReport],
}

/// Writes reports in a [`ReportFormat`].
pub struct ReportWriter<W> {
    out: W,
    format: ReportFormat,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self { out, format }
    }

    /// Writes a complete document containing `reports`.
    ///
    /// Returns how many reports were written.
    pub fn write_all<I>(&mut self, reports: I) -> io::Result<usize>
    where
        I: IntoIterator<Item = DisplayReport>,
    {
        match self.format {
            ReportFormat::Yaml => {
                writeln!(self.out, "monitors:")?;

                let mut count = 0;
                for report in reports {
                    self.out.write_all(yaml_block(&report)?.as_bytes())?;
                    self.out.flush()?;
                    count += 1;
                }

                Ok(count)
            }
            ReportFormat::Json => {
                let monitors: Vec<_> = reports.into_iter().collect();

                serde_json::to_writer_pretty(&mut self.out, &Document { monitors: &monitors })?;
                writeln!(self.out)?;
                self.out.flush()?;

                Ok(monitors.len())
            }
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn yaml_block(report: &DisplayReport) -> io::Result<String> {
    let mut block = String::new();

    // Writing into a `String` cannot fail.
    let _ = writeln!(block, "  - name: {}", quote(&report.name)?);
    let _ = writeln!(block, "    description: {}", quote(&report.description)?);
    let _ = writeln!(block, "    device_id: {}", quote(&report.device_id)?);
    let _ = writeln!(block, "    monitor_id: {}", quote(&report.monitor_id)?);
    let _ = writeln!(block, "    friendly_name: {}", quote(&report.friendly_name)?);
    let _ = writeln!(block, "    active: {}", report.active);

    match report.resolution {
        Some(mode) => {
            let _ = writeln!(block, "    resolution:");
            let _ = writeln!(block, "      width: {}", mode.width);
            let _ = writeln!(block, "      height: {}", mode.height);
            let _ = writeln!(block, "      frequency: {}", mode.frequency);
        }
        None => {
            let _ = writeln!(block, "    resolution: null");
        }
    }

    block.push('\n');
    Ok(block)
}

/// Renders `value` as a YAML double-quoted scalar.
///
/// A JSON string literal is also a valid double-quoted YAML scalar.
fn quote(value: &str) -> io::Result<String> {
    Ok(serde_json::to_string(value)?)
}
