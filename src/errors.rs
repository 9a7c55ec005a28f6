use thiserror::Error;

use crate::models::Perk;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    UserError(#[from] UserError),
    #[error("unexpected error occurred: {0}")]
    SystemError(#[from] SystemError),
}

/// Mistakes made by whoever drives a form: they are reported back, never logged as failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("no such form: `{0}`")]
    NoSuchForm(String),
    #[error("form `{0}` has no field named `{1}`")]
    NoSuchField(String, String),
    #[error("no member at position {0}")]
    NoSuchMember(usize),
    #[error("this form has no {0}")]
    NoSuchRole(&'static str),
    #[error("this form does not offer {0}")]
    PerkNotOffered(Perk),
    #[error("a team may have at most {0} members")]
    MemberLimitReached(usize),
    #[error("a team needs at least {0} members")]
    MemberMinimumReached(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SystemError {
    #[error("invalid form definition `{0}`: {1}")]
    InvalidFormDefinition(String, String),
    #[error("duplicate form id: {0}")]
    DuplicateForm(String),
}
