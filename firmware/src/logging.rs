//! `log` backend that prints `[TAG] message` lines on the console.
//!
//! Warnings and errors are tagged `[WARNING]` / `[ERROR]`; everything else
//! takes its tag from the record target (`boot`, `reg`, `auth`, ...).
use core::fmt::{self, Write};

use heapless::String;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use shared::console::Tag;
use static_cell::StaticCell;

use crate::console::LINE_CAPACITY;

/// Where finished log lines go, typically the USB serial port.
pub trait LineSink: Send + Sync {
    fn write_line(&self, line: &str);
}

pub struct TaggedLogger<S> {
    sink: S,
    level: LevelFilter,
}

impl<S: LineSink> TaggedLogger<S> {
    pub const fn new(sink: S, level: LevelFilter) -> Self {
        Self { sink, level }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Tag for a record: severity wins over the component target.
pub fn tag_for(level: Level, target: &str) -> Option<Tag> {
    match level {
        Level::Error => Some(Tag::Error),
        Level::Warn => Some(Tag::Warning),
        _ => Tag::from_target(target),
    }
}

/// Render `record` as one console line without the trailing newline.
pub fn format_record<W: Write>(out: &mut W, record: &Record<'_>) -> fmt::Result {
    match tag_for(record.level(), record.target()) {
        Some(tag) => write!(out, "{} {}", tag.label(), record.args()),
        None => write!(out, "{}", record.args()),
    }
}

impl<S: LineSink> Log for TaggedLogger<S> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut line: String<LINE_CAPACITY> = String::new();
        // An overlong line is emitted truncated.
        let _ = format_record(&mut line, record);
        self.sink.write_line(&line);
    }

    fn flush(&self) {}
}

/// Install `logger` as the global `log` backend.
pub fn install<S: LineSink + 'static>(
    cell: &'static StaticCell<TaggedLogger<S>>,
    logger: TaggedLogger<S>,
) -> Result<(), SetLoggerError> {
    let level = logger.level;
    let logger: &'static TaggedLogger<S> = cell.init(logger);
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}
