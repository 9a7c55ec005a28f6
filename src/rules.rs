//! Field-level checks shared by every registration form.
//!
//! All checks are pure and total: they take a literal string and answer yes or no.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_derive::{Deserialize, Serialize};

// Letters and spaces, at least three of them. Applied to the trimmed value.
static PERSON_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z ]{3,}$").expect("PERSON_NAME_REGEX: invalid pattern"));

// Letters, whitespace, hyphens and apostrophes. Used by the hackathon and CTF
// forms for people's names.
static LOOSE_PERSON_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z\s\-']+$").expect("LOOSE_PERSON_NAME_REGEX: invalid pattern")
});

// Team, university and organization names may also carry digits.
static ORGANIZATION_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9\s\-']+$").expect("ORGANIZATION_NAME_REGEX: invalid pattern")
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("EMAIL_REGEX: invalid pattern")
});

// Egyptian mobile numbers. The class `[0-2,5]` admits a literal comma as well;
// that is the published pattern and it is kept as is.
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^01[0-2,5][0-9]{8}$").expect("PHONE_REGEX: invalid pattern"));

static NATIONAL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{14}$").expect("NATIONAL_ID_REGEX: invalid pattern"));

pub fn is_person_name(value: &str) -> bool {
    PERSON_NAME_REGEX.is_match(value.trim())
}

pub fn is_loose_person_name(value: &str) -> bool {
    LOOSE_PERSON_NAME_REGEX.is_match(value)
}

pub fn is_organization_name(value: &str) -> bool {
    ORGANIZATION_NAME_REGEX.is_match(value)
}

pub fn is_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

pub fn is_phone(value: &str) -> bool {
    PHONE_REGEX.is_match(value)
}

pub fn is_national_id(value: &str) -> bool {
    NATIONAL_ID_REGEX.is_match(value)
}

/// Length in characters of the trimmed value.
pub fn trimmed_len(value: &str) -> usize {
    value.trim().chars().count()
}

/// Named value patterns a form definition can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    PersonName,
    LoosePersonName,
    OrganizationName,
    Email,
    Phone,
    NationalId,
}

impl Pattern {
    pub fn matches(self, value: &str) -> bool {
        match self {
            Pattern::PersonName => is_person_name(value),
            Pattern::LoosePersonName => is_loose_person_name(value),
            Pattern::OrganizationName => is_organization_name(value),
            Pattern::Email => is_email(value),
            Pattern::Phone => is_phone(value),
            Pattern::NationalId => is_national_id(value),
        }
    }

    /// Whether an empty value is reported as missing rather than malformed.
    ///
    /// Contact values (email, phone, national ID) are always reported as
    /// malformed, empty or not.
    pub fn empty_is_missing(self) -> bool {
        matches!(
            self,
            Pattern::PersonName | Pattern::LoosePersonName | Pattern::OrganizationName
        )
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::PersonName => write!(f, "must contain only letters and spaces"),
            Pattern::LoosePersonName => {
                write!(f, "must contain only letters, spaces, hyphens or apostrophes")
            }
            Pattern::OrganizationName => write!(
                f,
                "must contain only letters, digits, spaces, hyphens or apostrophes"
            ),
            Pattern::Email => write!(f, "invalid email format"),
            Pattern::Phone => write!(f, "invalid Egyptian phone number"),
            Pattern::NationalId => write!(f, "invalid national ID"),
        }
    }
}
