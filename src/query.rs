//! Free-text query parsing and the shareable `#<stop>[,<service>]` view fragment.

use std::fmt;
use std::str::FromStr;

use crate::models::is_stop_code;

const STOP_CODE_LEN: usize = 5;

/// What a search box entry asks for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryIntent {
    pub stop_code: Option<String>,
    pub service_filter: Option<String>,
}

/// Parse a search box entry.
///
/// The first run of five digits is the stop code. Only when a stop code is
/// present, the first whole token of 1-3 digits plus an optional letter is
/// taken as the service filter, upper-cased. Tokens are separated by
/// whitespace, commas or `#`.
pub fn parse(input: &str) -> QueryIntent {
    let Some(stop_code) = find_stop_code(input) else {
        return QueryIntent::default();
    };

    let service_filter = tokens(input)
        .filter(|token| *token != stop_code)
        .find(|token| is_service_no(token))
        .map(|token| token.to_ascii_uppercase());

    QueryIntent {
        stop_code: Some(stop_code.to_string()),
        service_filter,
    }
}

/// Leftmost run of five ASCII digits
fn find_stop_code(input: &str) -> Option<&str> {
    let bytes = input.as_bytes();
    (0..bytes.len().saturating_sub(STOP_CODE_LEN - 1))
        .find(|&i| bytes[i..i + STOP_CODE_LEN].iter().all(u8::is_ascii_digit))
        .map(|i| &input[i..i + STOP_CODE_LEN])
}

fn tokens(input: &str) -> impl Iterator<Item = &str> {
    input
        .split(|c: char| c.is_whitespace() || c == ',' || c == '#')
        .filter(|t| !t.is_empty())
}

/// 1-3 digits optionally followed by one letter, e.g. "15", "43e", "858A"
pub fn is_service_no(token: &str) -> bool {
    let digits = token.bytes().take_while(u8::is_ascii_digit).count();
    let rest = &token.as_bytes()[digits..];
    (1..=3).contains(&digits) && (rest.is_empty() || (rest.len() == 1 && rest[0].is_ascii_alphabetic()))
}

/// Addressable view state, `<stopCode>` or `<stopCode>,<service>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFragment {
    pub stop_code: String,
    pub service: Option<String>,
}

impl ViewFragment {
    pub fn new(stop_code: impl Into<String>, service: Option<String>) -> Self {
        Self {
            stop_code: stop_code.into(),
            service,
        }
    }
}

impl fmt::Display for ViewFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service {
            Some(service) => write!(f, "{},{}", self.stop_code, service),
            None => write!(f, "{}", self.stop_code),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FragmentError {
    #[error("Invalid stop code in fragment: {0}")]
    InvalidStopCode(String),
    #[error("Invalid service in fragment: {0}")]
    InvalidService(String),
}

impl FromStr for ViewFragment {
    type Err = FragmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('#');
        let (code, service) = match s.split_once(',') {
            Some((code, service)) => (code.trim(), Some(service.trim())),
            None => (s, None),
        };

        if !is_stop_code(code) {
            return Err(FragmentError::InvalidStopCode(code.to_string()));
        }

        let service = match service {
            None | Some("") => None,
            Some(svc) if is_service_no(svc) => Some(svc.to_ascii_uppercase()),
            Some(svc) => return Err(FragmentError::InvalidService(svc.to_string())),
        };

        Ok(ViewFragment::new(code, service))
    }
}
