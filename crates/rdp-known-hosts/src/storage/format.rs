//! Table file codec.
//!
//! The table is line-oriented UTF-8 text, one endpoint per line:
//!
//! ```text
//! # comment
//! host<TAB>port<TAB>fingerprint<TAB>base64(subject)<TAB>base64(issuer)
//! ```
//!
//! The writer always separates fields with a single tab and ends lines with
//! `\n`. The reader accepts any run of spaces and tabs between fields and any
//! of `\n`, `\r\n` or a bare `\r` as a line terminator. Malformed lines are
//! reported as [`FormatWarning`]s and skipped; they never fail the parse.
//!
//! Comment, blank and malformed lines are kept verbatim in the parsed
//! [`Table`] and written back byte for byte, so a rewrite only ever touches
//! the record lines it changes. This includes lines that are not UTF-8.

use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::certificate::CertificateData;

// ── Format constants ──────────────────────────────────────────────────────────

const FIELD_COUNT: usize = 5;
const FIELD_SEPARATOR: char = '\t';
const COMMENT_MARKER: char = '#';

/// Stand-in for an empty subject or issuer, whose base64 form would be an
/// empty field. Not a base64 string, so it cannot collide with a payload.
const EMPTY_FIELD: &str = "-";

/// Reader-side base64: padding optional, non-canonical trailing bits allowed.
/// The writer always emits canonical padded `STANDARD` output.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

// ── FormatWarning ─────────────────────────────────────────────────────────────

/// A malformed table line that was skipped during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatWarning {
    /// 1-based line number in the table file.
    pub line: usize,
    /// What was wrong with the line.
    pub reason: String,
}

impl fmt::Display for FormatWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Line {
    Record(CertificateData),
    /// Comment, blank or malformed line, written back as-is.
    Verbatim(Vec<u8>),
}

/// In-memory image of one table file.
///
/// Records never carry PEM text; that lives in side-files.
#[derive(Debug, Clone, Default)]
pub struct Table {
    lines: Vec<Line>,
    warnings: Vec<FormatWarning>,
}

impl Table {
    /// An empty table, as for a store whose file does not exist yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse table text. Never fails: malformed lines become warnings.
    pub fn parse(text: &str) -> Self {
        Self::parse_bytes(text.as_bytes())
    }

    /// Parse the raw contents of a table file.
    ///
    /// A record line that is not UTF-8 is malformed; any other line is kept
    /// as raw bytes, whatever its encoding.
    pub fn parse_bytes(bytes: &[u8]) -> Self {
        let mut table = Self::new();

        for (index, raw) in split_lines(bytes).into_iter().enumerate() {
            let trimmed = trim_ascii(raw);
            if trimmed.is_empty() || trimmed.starts_with(&[COMMENT_MARKER as u8]) {
                table.lines.push(Line::Verbatim(raw.to_vec()));
                continue;
            }

            let decoded = std::str::from_utf8(trimmed)
                .map_err(|e| format!("line is not UTF-8: {e}"))
                .and_then(decode_record);
            match decoded {
                Ok(record) => table.lines.push(Line::Record(record)),
                Err(reason) => {
                    let warning = FormatWarning {
                        line: index + 1,
                        reason,
                    };
                    log::warn!("skipping malformed known-hosts entry at {warning}");
                    table.warnings.push(warning);
                    table.lines.push(Line::Verbatim(raw.to_vec()));
                }
            }
        }

        table
    }

    /// Serialize the table back to file contents.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in &self.lines {
            match line {
                Line::Record(record) => out.extend_from_slice(encode_record(record).as_bytes()),
                Line::Verbatim(raw) => out.extend_from_slice(raw),
            }
            out.push(b'\n');
        }
        out
    }

    /// Return the first record for `(host, port)`.
    pub fn get(&self, host: &str, port: u16) -> Option<&CertificateData> {
        self.records().find(|r| r.is_for(host, port))
    }

    /// Insert or replace the record for `data`'s endpoint.
    ///
    /// The first existing record for the endpoint is replaced in place and
    /// any later duplicates are dropped; otherwise the record is appended.
    /// Returns the record that was replaced.
    pub fn upsert(&mut self, data: &CertificateData) -> Option<CertificateData> {
        let record = data.clone().without_pem();
        let position = self.position(data.host(), data.port());

        match position {
            Some(index) => {
                let previous = std::mem::replace(&mut self.lines[index], Line::Record(record));
                self.drop_records_after(index, data.host(), data.port());
                match previous {
                    Line::Record(previous) => Some(previous),
                    Line::Verbatim(_) => None,
                }
            }
            None => {
                self.lines.push(Line::Record(record));
                None
            }
        }
    }

    /// Remove every record for `(host, port)`, returning the first.
    pub fn remove(&mut self, host: &str, port: u16) -> Option<CertificateData> {
        let removed = self.get(host, port).cloned();
        if removed.is_some() {
            self.lines
                .retain(|line| !matches!(line, Line::Record(r) if r.is_for(host, port)));
        }
        removed
    }

    /// Iterate well-formed records in file order.
    pub fn records(&self) -> impl Iterator<Item = &CertificateData> {
        self.lines.iter().filter_map(|line| match line {
            Line::Record(record) => Some(record),
            Line::Verbatim(_) => None,
        })
    }

    /// Number of well-formed records.
    pub fn len(&self) -> usize {
        self.records().count()
    }

    /// `true` if the table holds no well-formed record.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Malformed lines found by [`Table::parse`].
    pub fn warnings(&self) -> &[FormatWarning] {
        &self.warnings
    }

    fn position(&self, host: &str, port: u16) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| matches!(line, Line::Record(r) if r.is_for(host, port)))
    }

    fn drop_records_after(&mut self, index: usize, host: &str, port: u16) {
        let mut current = 0;
        self.lines.retain(|line| {
            let keep = current <= index || !matches!(line, Line::Record(r) if r.is_for(host, port));
            current += 1;
            keep
        });
    }
}

// ── Record codec ──────────────────────────────────────────────────────────────

/// Encode one record as a table line, without terminator.
pub fn encode_record(record: &CertificateData) -> String {
    [
        record.host().to_string(),
        record.port().to_string(),
        record.fingerprint().to_string(),
        encode_field(record.subject()),
        encode_field(record.issuer()),
    ]
    .join(&FIELD_SEPARATOR.to_string())
}

/// Decode one non-comment table line.
///
/// Returns a human-readable reason when the line is malformed.
pub fn decode_record(line: &str) -> std::result::Result<CertificateData, String> {
    let fields: Vec<&str> = line
        .split([' ', '\t'])
        .filter(|field| !field.is_empty())
        .collect();

    let [host, port, fingerprint, subject, issuer] = fields.as_slice() else {
        return Err(format!(
            "expected {FIELD_COUNT} fields, found {}",
            fields.len()
        ));
    };

    let port: u16 = port
        .parse()
        .map_err(|_| format!("invalid port {port:?}"))?;
    let subject = decode_field(subject).map_err(|e| format!("invalid subject: {e}"))?;
    let issuer = decode_field(issuer).map_err(|e| format!("invalid issuer: {e}"))?;

    CertificateData::from_parts(host, port, &subject, &issuer, fingerprint)
        .map_err(|e| e.to_string())
}

fn encode_field(value: &str) -> String {
    if value.is_empty() {
        EMPTY_FIELD.to_string()
    } else {
        STANDARD.encode(value.as_bytes())
    }
}

fn decode_field(field: &str) -> std::result::Result<String, String> {
    if field == EMPTY_FIELD {
        return Ok(String::new());
    }
    let bytes = LENIENT.decode(field).map_err(|e| e.to_string())?;
    // A lossy decode would be re-encoded with U+FFFD on the next rewrite.
    String::from_utf8(bytes).map_err(|_| "not UTF-8 after base64 decoding".to_string())
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !first.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    bytes
}

/// Split on `\n`, `\r\n` or a bare `\r`. A trailing terminator does not
/// produce an empty final line.
fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&bytes[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&bytes[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    if start < bytes.len() {
        lines.push(&bytes[start..]);
    }
    lines
}

// ── Tests ─────────────────────────────────────────────────────────────────────
