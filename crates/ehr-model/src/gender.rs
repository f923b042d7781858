//! Patient gender codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Gender as recorded in a patient extract.
///
/// Source databases disagree on spelling and case; [`Gender::from_code`]
/// normalizes the common encodings and maps everything else to `Invalid`
/// so the validator can reject the line without panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    Unknown,
    Invalid,
}

impl Gender {
    /// Parse a raw gender code. Never fails; unrecognized values become
    /// `Invalid` and empty/`u`/`unknown` become `Unknown`.
    pub fn from_code(value: &str) -> Gender {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "U" | "UNKNOWN" => Gender::Unknown,
            "F" | "FEMALE" => Gender::Female,
            "M" | "MALE" => Gender::Male,
            _ => Gender::Invalid,
        }
    }

    /// Single-letter code used by the human-readable exports.
    pub fn as_code(&self) -> &'static str {
        match self {
            Gender::Female => "F",
            Gender::Male => "M",
            Gender::Unknown => "U",
            Gender::Invalid => "X",
        }
    }

    /// Integer code used by the encoded row format. `Invalid` shares the
    /// absent-data sentinel range; it never survives validation.
    pub fn to_wire(self) -> i32 {
        match self {
            Gender::Unknown => 0,
            Gender::Female => 1,
            Gender::Male => 2,
            Gender::Invalid => -1,
        }
    }

    pub fn from_wire(value: i32) -> Gender {
        match value {
            0 => Gender::Unknown,
            1 => Gender::Female,
            2 => Gender::Male,
            _ => Gender::Invalid,
        }
    }

    /// True for every value the validator accepts.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Gender::Invalid)
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}
