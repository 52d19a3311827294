//! Parsing of control lines and notification datagrams.
//!
//! Parsers accept a single line with or without its `\n` / `\r\n`
//! terminator. Fields are separated by runs of whitespace.

use std::str::FromStr;

use memd_core::{DomainError, Member, ScreenName};
use thiserror::Error;

use crate::message::{ACPT, EXIT, HELO, JOIN, RJCT};
use crate::{ClientMessage, DaemonMessage, Notification, RosterEntry, ROSTER_DELIMITER};

/// Errors produced while parsing wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed HELO (expected 'HELO <screenName> <address> <notifyPort>'): {0}")]
    MalformedHelo(String),

    #[error("unexpected arguments to {command}: {line}")]
    UnexpectedArguments { command: &'static str, line: String },

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("invalid member: {0}")]
    InvalidMember(#[from] DomainError),

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("malformed notification: {0}")]
    MalformedNotification(String),
}

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

fn parse_port(raw: &str) -> Result<u16, ParseError> {
    raw.parse::<u16>()
        .map_err(|_| ParseError::InvalidPort(raw.to_string()))
}

/// Parses `<screenName> <address> <notifyPort>` from exactly three fields.
fn parse_entry_fields(fields: &[&str]) -> Option<Result<RosterEntry, ParseError>> {
    let [name, address, port] = fields else {
        return None;
    };
    Some(parse_entry(name, address, port))
}

fn parse_entry(name: &str, address: &str, port: &str) -> Result<RosterEntry, ParseError> {
    Ok(RosterEntry {
        screen_name: ScreenName::new(name)?,
        address: address.to_string(),
        notify_port: parse_port(port)?,
    })
}

impl FromStr for ClientMessage {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = strip_terminator(line);
        let fields: Vec<&str> = line.split_whitespace().collect();

        let Some((command, args)) = fields.split_first() else {
            return Err(ParseError::Empty);
        };

        match *command {
            HELO => {
                let [name, address, port] = args else {
                    return Err(ParseError::MalformedHelo(line.to_string()));
                };
                let screen_name = ScreenName::new(*name)?;
                let member = Member::new(screen_name, address, parse_port(port)?)?;
                Ok(Self::Helo(member))
            }
            EXIT if args.is_empty() => Ok(Self::Exit),
            EXIT => Err(ParseError::UnexpectedArguments {
                command: EXIT,
                line: line.to_string(),
            }),
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

impl FromStr for DaemonMessage {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = strip_terminator(line);
        let malformed = || ParseError::MalformedReply(line.to_string());

        if let Some(body) = line.strip_prefix(ACPT).and_then(|b| b.strip_prefix(' ')) {
            let roster = body
                .split(ROSTER_DELIMITER)
                .map(|entry| {
                    let fields: Vec<&str> = entry.split_whitespace().collect();
                    parse_entry_fields(&fields).unwrap_or_else(|| Err(malformed()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::Accept { roster });
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [RJCT, name] => Ok(Self::Reject {
                screen_name: ScreenName::new(*name)?,
            }),
            [] => Err(ParseError::Empty),
            _ => Err(malformed()),
        }
    }
}

impl FromStr for Notification {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = strip_terminator(line);
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields.split_first() {
            None => Err(ParseError::Empty),
            Some((&JOIN, rest)) => parse_entry_fields(rest)
                .unwrap_or_else(|| Err(ParseError::MalformedNotification(line.to_string())))
                .map(Self::Join),
            Some((&EXIT, [name])) => Ok(Self::Exit {
                screen_name: ScreenName::new(*name)?,
            }),
            Some(_) => Err(ParseError::MalformedNotification(line.to_string())),
        }
    }
}
