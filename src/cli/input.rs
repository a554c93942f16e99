//! Newline-delimited JSON event input

use anyhow::{Context, Result};
use log::warn;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::event::Event;

/// Outcome of reading one input line
#[derive(Debug, Clone, PartialEq)]
pub enum EventLine {
    Event(Event),
    Blank,
    Invalid { line: usize, reason: String },
}

/// Parse a single line. Objects need a string `type` field.
pub fn parse_line(line_number: usize, line: &str) -> EventLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return EventLine::Blank;
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => {
            return EventLine::Invalid {
                line: line_number,
                reason: e.to_string(),
            }
        }
    };

    match Event::from_value(value) {
        Some(event) if event.event_type().is_some() => EventLine::Event(event),
        Some(_) => EventLine::Invalid {
            line: line_number,
            reason: "missing string \"type\" field".to_string(),
        },
        None => EventLine::Invalid {
            line: line_number,
            reason: "not a JSON object".to_string(),
        },
    }
}

/// Totals for one input stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSummary {
    pub accepted: usize,
    pub skipped: usize,
}

/// Read every event from `reader`, calling `on_event` in input order.
/// Invalid lines are logged and skipped.
pub async fn read_events<R, F>(reader: R, mut on_event: F) -> Result<InputSummary>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(Event),
{
    let mut summary = InputSummary::default();
    let mut lines = reader.lines();
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await.context("Failed to read event input")? {
        line_number += 1;
        match parse_line(line_number, &line) {
            EventLine::Event(event) => {
                on_event(event);
                summary.accepted += 1;
            }
            EventLine::Blank => {}
            EventLine::Invalid { line, reason } => {
                warn!("Skipping input line {}: {}", line, reason);
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}
