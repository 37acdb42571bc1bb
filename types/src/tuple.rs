// Copyright (C) 2019-2026 The gossipmap authors.
// This file is part of the gossipmap library.

// The gossipmap library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// The gossipmap library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with the gossipmap library. If not, see <https://www.gnu.org/licenses/>.

//! Encoding for the "stringified tuple" values the coordination store holds
//! (spec §3, §9). The original crawler parses these back with Python's
//! `eval`; per the Design Notes that is explicitly disallowed here in favor
//! of a small, safe, purpose-built parser (see [`TupleField::parse_fields`]).

use std::fmt::Write as _;

use thiserror::Error;

use crate::address::Address;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TupleError {
    #[error("malformed tuple: {0}")]
    Malformed(String),
    #[error("expected {expected} fields, found {found}")]
    WrongArity { expected: usize, found: usize },
    #[error("invalid integer field: {0}")]
    InvalidInt(String),
}

/// A single scalar field inside an encoded tuple: either a quoted string or
/// a bare integer, mirroring the two literal kinds `crawl.py`/`ping.py`
/// actually ever stash in Redis tuples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Str(String),
    Int(i64),
}

impl Field {
    pub fn as_str(&self) -> Result<&str, TupleError> {
        match self {
            Field::Str(s) => Ok(s),
            Field::Int(_) => Err(TupleError::Malformed("expected string field".into())),
        }
    }

    pub fn as_int(&self) -> Result<i64, TupleError> {
        match self {
            Field::Int(i) => Ok(*i),
            Field::Str(_) => Err(TupleError::Malformed("expected integer field".into())),
        }
    }
}

/// Encodes a sequence of fields as `(f0, f1, ..., fn)`, quoting strings with
/// single quotes and escaping embedded quotes/backslashes.
pub fn encode(fields: &[Field]) -> String {
    let mut out = String::from("(");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match field {
            Field::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Field::Str(s) => {
                out.push('\'');
                for c in s.chars() {
                    if c == '\'' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('\'');
            }
        }
    }
    out.push(')');
    out
}

/// Parses a tuple produced by [`encode`] back into its scalar fields.
///
/// This is a deliberately narrow recursive-descent parser over exactly the
/// grammar `encode` produces: `'(' field (', ' field)* ')'` where a field is
/// either a single-quoted string or a bare (possibly negative) integer. It
/// never executes or interprets the input as code.
pub fn parse(input: &str) -> Result<Vec<Field>, TupleError> {
    let input = input.trim();
    let inner = input
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| TupleError::Malformed(input.to_string()))?;

    let mut fields = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        // Skip separating ", " (and tolerate a leading space after the comma).
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        match chars.peek() {
            Some('\'') => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                s.push(escaped);
                            } else {
                                return Err(TupleError::Malformed(input.to_string()));
                            }
                        }
                        Some('\'') => break,
                        Some(c) => s.push(c),
                        None => return Err(TupleError::Malformed(input.to_string())),
                    }
                }
                fields.push(Field::Str(s));
            }
            Some(_) => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    s.push(c);
                    chars.next();
                }
                let trimmed = s.trim();
                let n: i64 = trimmed
                    .parse()
                    .map_err(|_| TupleError::InvalidInt(trimmed.to_string()))?;
                fields.push(Field::Int(n));
            }
            None => break,
        }

        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(other) => return Err(TupleError::Malformed(format!("unexpected '{other}' in {input}"))),
        }
    }

    Ok(fields)
}

/// Asserts the parsed field count matches `expected`, a common guard before
/// destructuring into a typed record.
pub fn require_arity(fields: &[Field], expected: usize) -> Result<(), TupleError> {
    if fields.len() != expected {
        return Err(TupleError::WrongArity {
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

/// A candidate address plus the gossip timestamp it was harvested with —
/// the `(host, port, services, timestamp)` shape stashed in a peer's cached
/// address book (spec §3 "Cached address book").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub address: Address,
    pub timestamp: i64,
}

impl Candidate {
    pub fn encode(&self) -> String {
        encode(&[
            Field::Str(self.address.host.to_string()),
            Field::Int(self.address.port as i64),
            Field::Int(self.address.services as i64),
            Field::Int(self.timestamp),
        ])
    }

    /// Encodes just `(host, port, services)`, the shape used by the
    /// `pending` set once the harvest timestamp has been stripped.
    pub fn encode_address(address: &Address) -> String {
        encode(&[
            Field::Str(address.host.to_string()),
            Field::Int(address.port as i64),
            Field::Int(address.services as i64),
        ])
    }

    pub fn parse_address(input: &str) -> Result<Address, TupleError> {
        let fields = parse(input)?;
        require_arity(&fields, 3)?;
        let host = fields[0].as_str()?;
        let port = fields[1].as_int()?;
        let services = fields[2].as_int()?;
        Address::parse(host, port, services as u64).map_err(|e| TupleError::Malformed(e.to_string()))
    }

    pub fn parse(input: &str) -> Result<Self, TupleError> {
        let fields = parse(input)?;
        require_arity(&fields, 4)?;
        let host = fields[0].as_str()?;
        let port = fields[1].as_int()?;
        let services = fields[2].as_int()?;
        let timestamp = fields[3].as_int()?;
        let address = Address::parse(host, port, services as u64).map_err(|e| TupleError::Malformed(e.to_string()))?;
        Ok(Self { address, timestamp })
    }
}

/// `(host, port, services, height)`, the pinger's `reachable` set entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachableNode {
    pub address: Address,
    pub height: u32,
}

impl ReachableNode {
    pub fn encode(&self) -> String {
        encode(&[
            Field::Str(self.address.host.to_string()),
            Field::Int(self.address.port as i64),
            Field::Int(self.address.services as i64),
            Field::Int(self.height as i64),
        ])
    }

    pub fn parse(input: &str) -> Result<Self, TupleError> {
        let fields = parse(input)?;
        require_arity(&fields, 4)?;
        let host = fields[0].as_str()?;
        let port = fields[1].as_int()?;
        let services = fields[2].as_int()?;
        let height = fields[3].as_int()?;
        let address = Address::parse(host, port, services as u64).map_err(|e| TupleError::Malformed(e.to_string()))?;
        Ok(Self {
            address,
            height: height.max(0) as u32,
        })
    }
}

/// `version:{host}-{port}` value: `(protocol_version, user_agent, services)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub protocol_version: u32,
    pub user_agent: String,
    pub services: u64,
}

impl VersionRecord {
    pub fn encode(&self) -> String {
        encode(&[
            Field::Int(self.protocol_version as i64),
            Field::Str(self.user_agent.clone()),
            Field::Int(self.services as i64),
        ])
    }

    pub fn parse(input: &str) -> Result<Self, TupleError> {
        let fields = parse(input)?;
        require_arity(&fields, 3)?;
        Ok(Self {
            protocol_version: fields[0].as_int()?.max(0) as u32,
            user_agent: fields[1].as_str()?.to_string(),
            services: fields[2].as_int()?.max(0) as u64,
        })
    }
}

/// `height:{host}-{port}-{services}` value: a bare integer, kept here only
/// to name the concept in one place.
pub type HeightRecord = u32;

/// `nodes` history-list entry: `(timestamp, reachable_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: i64,
    pub reachable: u64,
}

impl HistoryEntry {
    pub fn encode(&self) -> String {
        encode(&[Field::Int(self.timestamp), Field::Int(self.reachable as i64)])
    }

    pub fn parse(input: &str) -> Result<Self, TupleError> {
        let fields = parse(input)?;
        require_arity(&fields, 2)?;
        Ok(Self {
            timestamp: fields[0].as_int()?,
            reachable: fields[1].as_int()?.max(0) as u64,
        })
    }
}

/// `open` set member: `(host, port)`, the pinger's exclusive-session claim
/// (spec §3 "Open set / Opendata set").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEntry {
    pub host: String,
    pub port: u16,
}

impl OpenEntry {
    pub fn from_address(address: &Address) -> Self {
        Self { host: address.host.to_string(), port: address.port }
    }

    pub fn encode(&self) -> String {
        encode(&[Field::Str(self.host.clone()), Field::Int(self.port as i64)])
    }

    pub fn parse(input: &str) -> Result<Self, TupleError> {
        let fields = parse(input)?;
        require_arity(&fields, 2)?;
        Ok(Self {
            host: fields[0].as_str()?.to_string(),
            port: fields[1].as_int()?.max(0) as u16,
        })
    }
}

/// `opendata` set member: `(host, port, user_agent, start_time, services)`,
/// the pinger's observability record for a live session (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpendataEntry {
    pub host: String,
    pub port: u16,
    pub user_agent: String,
    pub start_time: i64,
    pub services: u64,
}

impl OpendataEntry {
    pub fn encode(&self) -> String {
        encode(&[
            Field::Str(self.host.clone()),
            Field::Int(self.port as i64),
            Field::Str(self.user_agent.clone()),
            Field::Int(self.start_time),
            Field::Int(self.services as i64),
        ])
    }

    pub fn parse(input: &str) -> Result<Self, TupleError> {
        let fields = parse(input)?;
        require_arity(&fields, 5)?;
        Ok(Self {
            host: fields[0].as_str()?.to_string(),
            port: fields[1].as_int()?.max(0) as u16,
            user_agent: fields[2].as_str()?.to_string(),
            start_time: fields[3].as_int()?,
            services: fields[4].as_int()?.max(0) as u64,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_open_entry() {
        let entry = OpenEntry { host: "1.2.3.4".to_string(), port: 8333 };
        assert_eq!(OpenEntry::parse(&entry.encode()).unwrap(), entry);
    }

    #[test]
    fn round_trips_opendata_entry() {
        let entry = OpendataEntry {
            host: "1.2.3.4".to_string(),
            port: 8333,
            user_agent: "/Satoshi:25.0.0/".to_string(),
            start_time: 1_700_000_000,
            services: 9,
        };
        assert_eq!(OpendataEntry::parse(&entry.encode()).unwrap(), entry);
    }

    #[test]
    fn round_trips_candidate() {
        let address = Address::parse("1.2.3.4", 8333, 9).unwrap();
        let candidate = Candidate { address, timestamp: 1_700_000_000 };
        let encoded = candidate.encode();
        assert_eq!(Candidate::parse(&encoded).unwrap(), candidate);
    }

    #[test]
    fn round_trips_onion_and_escapes() {
        let address = Address::parse("abcdefghij234567.onion", 8333, 0).unwrap();
        let encoded = Candidate::encode_address(&address);
        assert_eq!(Candidate::parse_address(&encoded).unwrap(), address);
    }

    #[test]
    fn round_trips_version_record_with_embedded_quote() {
        let record = VersionRecord {
            protocol_version: 70016,
            user_agent: "/Satoshi:25.0.0'test/".to_string(),
            services: 9,
        };
        let encoded = record.encode();
        assert_eq!(VersionRecord::parse(&encoded).unwrap(), record);
    }

    #[test]
    fn rejects_malformed_tuple() {
        assert!(parse("not-a-tuple").is_err());
        assert!(parse("(1, 2").is_err());
    }

    #[test]
    fn history_entry_round_trips() {
        let entry = HistoryEntry { timestamp: 1_700_000_000, reachable: 12345 };
        assert_eq!(HistoryEntry::parse(&entry.encode()).unwrap(), entry);
    }
}
