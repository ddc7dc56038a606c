use std::{
    io::{self, BufWriter},
    process::ExitCode,
};

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use display_report::{
    DisplayEnumeration, HardwareInfoSource, NameIndex, ReportFormat, ReportWriter,
    enumerate_displays, system_enumeration, system_hardware_info,
};

/// The display subsystem could not be bound.
const EXIT_UNAVAILABLE: u8 = 2;

fn command() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Output format.")
                .value_parser(ReportFormat::NAMES)
                .ignore_case(true)
                .default_value("yaml"),
        )
        .arg(
            Arg::new("no-names")
                .long("no-names")
                .help("Do not look up monitor names.")
                .action(ArgAction::SetTrue),
        )
}

/// Builds the name index, or an empty one without querying `source` if names are off.
fn load_names<S, F>(skip_names: bool, source: F) -> NameIndex
where
    S: HardwareInfoSource,
    F: FnOnce() -> S,
{
    if skip_names {
        log::debug!("Monitor name lookup is disabled");
        return NameIndex::new();
    }

    NameIndex::build(&source())
}

fn report<E>(enumeration: &E, index: &NameIndex, format: ReportFormat) -> anyhow::Result<()>
where
    E: DisplayEnumeration + ?Sized,
{
    log::info!("{} monitor name(s) known", index.len());

    let stdout = io::stdout().lock();
    let mut writer = ReportWriter::new(BufWriter::new(stdout), format);
    let count = writer
        .write_all(enumerate_displays(enumeration, index))
        .context("Failed to write the report")?;

    log::info!("Reported {count} display(s)");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = command().get_matches();
    let format = matches
        .get_one::<String>("format")
        .and_then(|name| name.parse().ok())
        .unwrap_or_default();
    let skip_names = matches.get_flag("no-names");

    let enumeration = match system_enumeration() {
        Ok(enumeration) => enumeration,
        Err(e) => {
            log::error!("{:#}", anyhow::Error::new(e));
            return ExitCode::from(EXIT_UNAVAILABLE);
        }
    };

    let index = load_names(skip_names, system_hardware_info);

    match report(&enumeration, &index, format) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
