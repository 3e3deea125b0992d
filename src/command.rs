//! Line-oriented command input: `ADD <id> <BUY|SELL> <price> <quantity>` and
//! `CANCEL <id>`, one per line.
//!
//! Lines whose keyword is neither `ADD` nor `CANCEL` are skipped. Price and
//! quantity are kept signed here; range checks belong to the engine so they
//! surface as `InvalidOrderParameters`.

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::models::{OrderId, Side};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Command {
    Add {
        id: OrderId,
        side: Side,
        price: i64,
        quantity: i64,
    },
    Cancel {
        id: OrderId,
    },
}

impl Command {
    pub fn order_id(&self) -> OrderId {
        match *self {
            Self::Add { id, .. } | Self::Cancel { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("invalid side {0:?}, expected BUY or SELL")]
    InvalidSide(String),
    #[error("invalid {field} {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("failed to read line {line}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: ParseError,
    },
}

/// Parses one line. `Ok(None)` means the line carries no command and is skipped.
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("ADD") => {
            let id = parse_field(tokens.next(), "id")?;
            let side = parse_side(tokens.next())?;
            let price = parse_field(tokens.next(), "price")?;
            let quantity = parse_field(tokens.next(), "quantity")?;
            Ok(Some(Command::Add {
                id,
                side,
                price,
                quantity,
            }))
        }
        Some("CANCEL") => {
            let id = parse_field(tokens.next(), "id")?;
            Ok(Some(Command::Cancel { id }))
        }
        _ => Ok(None),
    }
}

/// Yields the commands in `reader` with their 1-based line numbers, skipping
/// lines without a command.
pub fn read_commands<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(usize, Command), ReadError>> {
    reader.lines().enumerate().filter_map(|(idx, line)| {
        let line_no = idx + 1;
        match line {
            Err(source) => Some(Err(ReadError::Io { line: line_no, source })),
            Ok(text) => match parse_line(&text) {
                Ok(Some(command)) => Some(Ok((line_no, command))),
                Ok(None) => None,
                Err(source) => Some(Err(ReadError::Parse { line: line_no, source })),
            },
        }
    })
}

fn parse_side(token: Option<&str>) -> Result<Side, ParseError> {
    match token {
        Some("BUY") => Ok(Side::Buy),
        Some("SELL") => Ok(Side::Sell),
        Some(other) => Err(ParseError::InvalidSide(other.to_string())),
        None => Err(ParseError::MissingField("side")),
    }
}

fn parse_field<T: std::str::FromStr>(token: Option<&str>, field: &'static str) -> Result<T, ParseError> {
    let token = token.ok_or(ParseError::MissingField(field))?;
    token.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: token.to_string(),
    })
}
