use std::env;
use std::io::Write;

use console::Style;
use log::Log;
use simplelog::{CombinedLogger, SharedLogger};

use crate::prelude::*;

pub struct LocalLogger {
    log_level: log::LevelFilter,
}

impl LocalLogger {
    /// Level resolution: `--debug` forces Trace, otherwise `TR_LOG` is
    /// parsed as a level filter, otherwise Info.
    pub fn new(debug: bool) -> Self {
        let log_level = if debug {
            log::LevelFilter::Trace
        } else {
            env::var("TR_LOG")
                .ok()
                .and_then(|log_level| log_level.parse::<log::LevelFilter>().ok())
                .unwrap_or(log::LevelFilter::Info)
        };

        LocalLogger { log_level }
    }
}

impl Log for LocalLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.log_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        print_record(record);
    }

    fn flush(&self) {
        std::io::stdout().flush().unwrap();
    }
}

/// Print a log record to the console with the appropriate style
fn print_record(record: &log::Record) {
    let error_style = Style::new().red();
    let info_style = Style::new().white();
    let warn_style = Style::new().yellow();
    let debug_style = Style::new().blue().dim();
    let trace_style = Style::new().black().dim();

    match record.level() {
        log::Level::Error => eprintln!("{}", error_style.apply_to(record.args())),
        log::Level::Warn => eprintln!("{}", warn_style.apply_to(record.args())),
        log::Level::Info => println!("{}", info_style.apply_to(record.args())),
        log::Level::Debug => println!(
            "{}",
            debug_style.apply_to(format!("[DEBUG::{}] {}", record.target(), record.args())),
        ),
        log::Level::Trace => println!(
            "{}",
            trace_style.apply_to(format!("[TRACE::{}] {}", record.target(), record.args()))
        ),
    }
}

impl SharedLogger for LocalLogger {
    fn level(&self) -> log::LevelFilter {
        self.log_level
    }

    fn config(&self) -> Option<&simplelog::Config> {
        None
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        Box::new(*self)
    }
}

pub fn get_local_logger(debug: bool) -> Box<dyn SharedLogger> {
    Box::new(LocalLogger::new(debug))
}

pub fn init_local_logger(debug: bool) -> Result<()> {
    let logger = get_local_logger(debug);
    CombinedLogger::init(vec![logger])?;
    Ok(())
}
