// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! E.164 recipient normalization.
//!
//! Callers hand us phone numbers in whatever shape the storefront captured
//! them (`0911 23 45 67`, `+251-911-234567`, `251911234567@s.whatsapp.net`).
//! Every transport works from the canonical digit string produced here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CourierError;

/// Suffix used by the socket protocol for individual chats.
const USER_JID_SUFFIX: &str = "@s.whatsapp.net";

/// Shortest and longest digit counts accepted as a full international number.
const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 15;

/// Numbers at or below this length are treated as national numbers that lack
/// the country code.
const NATIONAL_MAX_DIGITS: usize = 9;

/// A normalized E.164 phone identifier, stored as digits without the leading `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Recipient(String);

impl Recipient {
    /// Parses and normalizes a phone number.
    ///
    /// `default_country_code` (digits only, e.g. `"251"`) is applied to numbers
    /// written with a national trunk prefix (`0...`) or without any country code.
    pub fn parse(raw: &str, default_country_code: &str) -> Result<Self, CourierError> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_suffix(USER_JID_SUFFIX).unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(CourierError::InvalidInput("recipient phone number is empty".into()));
        }

        let compact: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.' | '\u{a0}'))
            .collect();

        let (international, rest) = if let Some(rest) = compact.strip_prefix('+') {
            (true, rest)
        } else if let Some(rest) = compact.strip_prefix("00") {
            (true, rest)
        } else {
            (false, compact.as_str())
        };

        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(CourierError::InvalidInput(format!(
                "recipient `{raw}` contains non-digit characters"
            )));
        }

        let digits = if international {
            rest.to_string()
        } else if let Some(national) = rest.strip_prefix('0') {
            format!("{default_country_code}{national}")
        } else if rest.len() <= NATIONAL_MAX_DIGITS {
            format!("{default_country_code}{rest}")
        } else {
            rest.to_string()
        };

        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(CourierError::InvalidInput(format!(
                "recipient `{raw}` normalizes to {} digits, expected {MIN_DIGITS}-{MAX_DIGITS}",
                digits.len()
            )));
        }

        Ok(Self(digits))
    }

    /// The canonical digits, without `+`.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Socket-protocol address for this recipient.
    pub fn jid(&self) -> String {
        format!("{}{USER_JID_SUFFIX}", self.0)
    }

    /// Log-safe rendering that keeps only the last four digits.
    pub fn masked(&self) -> String {
        let visible = self.0.len().saturating_sub(4);
        format!("+{}{}", "*".repeat(visible), &self.0[visible..])
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.0)
    }
}

impl TryFrom<String> for Recipient {
    type Error = CourierError;

    /// Deserialized recipients must already carry their country code.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.starts_with('+') || value.starts_with("00") {
            Self::parse(value, "")
        } else {
            Self::parse(&format!("+{value}"), "")
        }
    }
}

impl From<Recipient> for String {
    fn from(value: Recipient) -> Self {
        value.0
    }
}
