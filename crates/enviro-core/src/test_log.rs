//! Log capture for unit tests.
//!
//! Records are kept per test thread so parallel tests do not see each
//! other's output.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use std::sync::{Mutex, Once};
use std::thread::{self, ThreadId};

use log::{Level, LevelFilter, Log, Metadata, Record};

struct CapturingLogger {
    records: Mutex<Vec<(ThreadId, Level, String)>>,
}

static LOGGER: CapturingLogger = CapturingLogger {
    records: Mutex::new(Vec::new()),
};

static INIT: Once = Once::new();

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = self.records.lock() {
            records.push((
                thread::current().id(),
                record.level(),
                record.args().to_string(),
            ));
        }
    }

    fn flush(&self) {}
}

/// Install the logger (once per process) and clear this thread's records.
pub fn capture() {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
    let me = thread::current().id();
    if let Ok(mut records) = LOGGER.records.lock() {
        records.retain(|(id, _, _)| *id != me);
    }
}

/// Messages logged by the current thread at exactly `level`.
pub fn messages(level: Level) -> Vec<String> {
    let me = thread::current().id();
    LOGGER
        .records
        .lock()
        .map(|records| {
            records
                .iter()
                .filter(|(id, lvl, _)| *id == me && *lvl == level)
                .map(|(_, _, msg)| msg.clone())
                .collect()
        })
        .unwrap_or_default()
}

pub fn warnings() -> usize {
    messages(Level::Warn).len()
}
