//! Parsing of the status source's peer listing.
//!
//! Two layouts are accepted. The primary one is the tab-separated
//! `wg show all dump`:
//!
//! ```text
//! wg0  <private-key>  <public-key>  51820  off
//! wg0  <public-key>  <preshared>  203.0.113.5:40112  10.6.0.2/32  1760000000  1048576  2048  off
//! ```
//!
//! The fallback is the `pivpn -c` style table, framed by `:::` marker lines
//! and carrying human-readable byte columns. Anything containing a tab is
//! treated as a dump.

use std::net::Ipv4Addr;

use chrono::{Local, NaiveDateTime, TimeZone};

use super::models::PeerRecord;
use crate::error::Error;
use crate::ui::formatters::parse_size;

const DUMP_MIN_FIELDS: usize = 8;
const TABLE_MIN_FIELDS: usize = 6;
const SENTINEL: &str = ":::";
const FOOTER_MARKER: &str = "disabled";
const TITLE_TOKEN: &str = "name";
const TABLE_TIME_FORMAT: &str = "%b %d %Y - %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFormat {
    Dump,
    Table,
}

impl StatusFormat {
    pub fn detect(raw: &str) -> Self {
        if raw.contains('\t') {
            StatusFormat::Dump
        } else {
            StatusFormat::Table
        }
    }
}

/// Everything one parse produced, including the lines it refused
#[derive(Debug)]
pub struct ParseOutcome {
    pub format: StatusFormat,
    pub records: Vec<PeerRecord>,
    /// One `MalformedRecord` per dropped line
    pub rejected: Vec<Error>,
}

pub struct StatusParser;

impl StatusParser {
    pub fn parse(raw: &str) -> Vec<PeerRecord> {
        Self::parse_detailed(raw).records
    }

    pub fn parse_detailed(raw: &str) -> ParseOutcome {
        let format = StatusFormat::detect(raw);
        let mut outcome = ParseOutcome {
            format,
            records: Vec::new(),
            rejected: Vec::new(),
        };

        match format {
            StatusFormat::Dump => parse_dump(raw, &mut outcome),
            StatusFormat::Table => parse_table(raw, &mut outcome),
        }

        outcome
    }
}

fn parse_dump(raw: &str, outcome: &mut ParseOutcome) {
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match parse_dump_line(line) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => outcome.rejected.push(Error::malformed(index + 1, reason)),
        }
    }
}

fn parse_dump_line(line: &str) -> Result<PeerRecord, String> {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < DUMP_MIN_FIELDS {
        return Err(format!(
            "expected at least {} fields, found {}",
            DUMP_MIN_FIELDS,
            cols.len()
        ));
    }

    let virtual_ip = first_ipv4(cols[4])
        .ok_or_else(|| format!("no IPv4 address in allowed-ips {:?}", cols[4]))?;

    Ok(PeerRecord {
        interface: cols[0].trim().to_string(),
        public_key: cols[1].trim().to_string(),
        endpoint: endpoint(cols[3]),
        virtual_ip,
        latest_handshake: cols[5].trim().parse().unwrap_or(0),
        rx_bytes: cols[6].trim().parse().unwrap_or(0),
        tx_bytes: cols[7].trim().parse().unwrap_or(0),
        name_hint: None,
    })
}

fn parse_table(raw: &str, outcome: &mut ParseOutcome) {
    for (index, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with(SENTINEL) {
            if trimmed.to_ascii_lowercase().contains(FOOTER_MARKER) {
                break;
            }
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens[0].eq_ignore_ascii_case(TITLE_TOKEN) {
            continue;
        }

        match parse_table_row(&tokens) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => outcome.rejected.push(Error::malformed(index + 1, reason)),
        }
    }
}

fn parse_table_row(tokens: &[&str]) -> Result<PeerRecord, String> {
    if tokens.len() < TABLE_MIN_FIELDS {
        return Err(format!(
            "expected at least {} columns, found {}",
            TABLE_MIN_FIELDS,
            tokens.len()
        ));
    }

    let virtual_ip =
        first_ipv4(tokens[2]).ok_or_else(|| format!("no IPv4 virtual IP in {:?}", tokens[2]))?;

    Ok(PeerRecord {
        interface: String::new(),
        public_key: String::new(),
        endpoint: endpoint(tokens[1]),
        virtual_ip,
        latest_handshake: table_handshake(&tokens[5..].join(" ")),
        rx_bytes: parse_size(tokens[3]),
        tx_bytes: parse_size(tokens[4]),
        name_hint: Some(tokens[0].to_string()),
    })
}

/// First IPv4 entry of a comma-separated address list, prefix stripped
fn first_ipv4(list: &str) -> Option<String> {
    list.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.split('/').next().unwrap_or(part))
        .find(|ip| ip.parse::<Ipv4Addr>().is_ok())
        .map(str::to_string)
}

fn endpoint(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "(none)" {
        None
    } else {
        Some(raw.to_string())
    }
}

/// `Oct 14 2026 - 10:00:00` in local time; `(not yet)` and friends mean never
fn table_handshake(text: &str) -> i64 {
    NaiveDateTime::parse_from_str(text.trim(), TABLE_TIME_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|datetime| datetime.timestamp())
        .unwrap_or(0)
}
