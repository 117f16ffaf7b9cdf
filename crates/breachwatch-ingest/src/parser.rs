//! Dump line parser
//!
//! One record per line: `url<delim>username<delim>secret`. The delimiter is
//! `,` when the line contains a comma and `;` otherwise. There is no quoting,
//! so a field that contains the delimiter misparses.

use breachwatch_common::digest::secret_digest;
use breachwatch_common::NewBreachRecord;

use crate::domain::decompose;
use crate::error::ParseError;

/// Number of fields in a well-formed line
pub const FIELD_COUNT: usize = 3;

/// The three trimmed columns of a line, before hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialFields<'a> {
    pub url: &'a str,
    pub username: &'a str,
    pub secret: &'a str,
}

/// Pick the delimiter for a line
pub fn delimiter_for(line: &str) -> char {
    if line.contains(',') {
        ','
    } else {
        ';'
    }
}

/// Split a non-blank line into its three trimmed fields
pub fn split_fields(line: &str) -> Result<CredentialFields<'_>, ParseError> {
    let parts: Vec<&str> = line.split(delimiter_for(line)).map(str::trim).collect();

    let &[url, username, secret] = parts.as_slice() else {
        return Err(ParseError::FieldCount {
            expected: FIELD_COUNT,
            actual: parts.len(),
        });
    };

    if url.is_empty() || username.is_empty() || secret.is_empty() {
        return Err(ParseError::MissingFields);
    }

    Ok(CredentialFields {
        url,
        username,
        secret,
    })
}

/// Parse one line into a record ready to persist
///
/// Blank and whitespace-only lines yield `Ok(None)`.
pub fn parse_line(line: &str, source_file: &str) -> Result<Option<NewBreachRecord>, ParseError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let fields = split_fields(line)?;
    let parts = decompose(fields.url);

    Ok(Some(NewBreachRecord {
        username: fields.username.to_string(),
        domain: parts.domain,
        subdomain: parts.subdomain,
        password_hash: secret_digest(fields.secret),
        source_file: source_file.to_string(),
    }))
}
