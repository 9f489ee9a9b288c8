//! candump log parser
//!
//! Parses the log format written by `candump -L` from can-utils:
//!
//! ```text
//! (1700000000.123456) can0 766#0000000003010000
//! ```
//!
//! ## Supported
//! - Classic CAN data frames with 11-bit or 29-bit identifiers, 0-8 bytes
//! - Blank lines and lines starting with `#` (skipped)
//!
//! ## Not supported
//! - CAN-FD frames (`##`) and remote frames (`#R`) are reported as errors

use crate::types::{CanFrame, NodeError, Result, CAN_MAX_DLC};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const CAN_STD_ID_MAX: u32 = 0x7FF;
const CAN_EXT_ID_MAX: u32 = 0x1FFF_FFFF;

/// candump log parser
pub struct CandumpParser;

impl CandumpParser {
    /// Open a candump log and return an iterator over its frames
    pub fn open(path: &Path) -> Result<CandumpFrameIterator<BufReader<File>>> {
        log::info!("Parsing candump log: {:?}", path);

        let file = File::open(path)?;
        Ok(CandumpFrameIterator::new(BufReader::new(file)))
    }
}

/// Iterator over CAN frames from a candump log
pub struct CandumpFrameIterator<R> {
    reader: R,
    line_number: usize,
    buffer: String,
}

impl<R: BufRead> CandumpFrameIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for CandumpFrameIterator<R> {
    type Item = Result<CanFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_number += 1;

            match parse_line(&self.buffer, self.line_number) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Parse one candump line; `Ok(None)` for blank and comment lines
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<CanFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let err = |reason: String| NodeError::FrameParse {
        line: line_number,
        reason,
    };

    let mut fields = line.split_whitespace();
    let (timestamp, interface, frame) = match (fields.next(), fields.next(), fields.next()) {
        (Some(t), Some(i), Some(f)) => (t, i, f),
        _ => return Err(err(format!("expected '(time) iface id#data', got {:?}", line))),
    };

    let timestamp_ns = parse_timestamp(timestamp).map_err(err)?;
    let channel = parse_channel(interface);

    let (id, data) = frame
        .split_once('#')
        .ok_or_else(|| err(format!("missing '#' in frame {:?}", frame)))?;

    if data.starts_with('#') {
        return Err(err("CAN-FD frames are not supported".to_string()));
    }
    if data.starts_with('R') || data.starts_with('r') {
        return Err(err("remote frames are not supported".to_string()));
    }

    let (can_id, is_extended) = parse_identifier(id).map_err(err)?;
    let payload = parse_payload(data).map_err(err)?;

    Ok(Some(
        CanFrame::new(can_id, &payload)
            .with_timestamp_ns(timestamp_ns)
            .with_channel(channel)
            .with_extended(is_extended),
    ))
}

/// candump writes standard IDs as 3 hex digits and extended IDs as 8
fn parse_identifier(id: &str) -> std::result::Result<(u32, bool), String> {
    if id.is_empty() || id.len() > 8 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("invalid identifier {:?}", id));
    }

    let can_id = u32::from_str_radix(id, 16)
        .map_err(|e| format!("invalid identifier {:?}: {}", id, e))?;
    let is_extended = id.len() > 3;

    if is_extended && can_id > CAN_EXT_ID_MAX {
        return Err(format!("identifier {:?} exceeds 29 bits", id));
    }
    if !is_extended && can_id > CAN_STD_ID_MAX {
        return Err(format!("identifier {:?} exceeds 11 bits", id));
    }

    Ok((can_id, is_extended))
}

fn parse_timestamp(field: &str) -> std::result::Result<u64, String> {
    let inner = field
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("timestamp {:?} is not parenthesized", field))?;

    let (secs, frac) = inner.split_once('.').unwrap_or((inner, ""));
    if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid fractional seconds in {:?}", field));
    }

    let secs: u64 = secs
        .parse()
        .map_err(|e| format!("invalid seconds in {:?}: {}", field, e))?;
    let nanos: u64 = if frac.is_empty() {
        0
    } else {
        // Right-pad to nanosecond precision
        format!("{:0<9}", frac)
            .parse()
            .map_err(|e| format!("invalid fractional seconds in {:?}: {}", field, e))?
    };

    secs.checked_mul(1_000_000_000)
        .and_then(|ns| ns.checked_add(nanos))
        .ok_or_else(|| format!("timestamp {:?} out of range", field))
}

/// Trailing interface number (`can1` -> 1), zero when absent
fn parse_channel(interface: &str) -> u8 {
    interface
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .unwrap_or(0)
}

fn parse_payload(data: &str) -> std::result::Result<Vec<u8>, String> {
    let data = data.replace('.', "");
    if !data.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("non-hex characters in payload {:?}", data));
    }
    if data.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in payload {:?}", data));
    }
    if data.len() / 2 > CAN_MAX_DLC {
        return Err(format!("payload {:?} longer than {} bytes", data, CAN_MAX_DLC));
    }

    (0..data.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&data[i..i + 2], 16)
                .map_err(|e| format!("invalid payload byte {:?}: {}", &data[i..i + 2], e))
        })
        .collect()
}
