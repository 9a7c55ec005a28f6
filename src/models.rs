use std::collections::BTreeMap;
use std::fmt;

use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(default, setter(into))]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default)]
    pub full_name: String,
    #[serde(default, alias = "whatsapp")]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub accommodation: bool,
    #[serde(default)]
    pub lunch: bool,
}

impl Participant {
    pub fn get(&self, field: ParticipantField) -> &str {
        match field {
            ParticipantField::FullName => &self.full_name,
            ParticipantField::Phone => &self.phone,
            ParticipantField::Email => &self.email,
            ParticipantField::NationalId => &self.national_id,
        }
    }

    pub fn set(&mut self, field: ParticipantField, value: String) {
        match field {
            ParticipantField::FullName => self.full_name = value,
            ParticipantField::Phone => self.phone = value,
            ParticipantField::Email => self.email = value,
            ParticipantField::NationalId => self.national_id = value,
        }
    }

    pub fn has(&self, perk: Perk) -> bool {
        match perk {
            Perk::Accommodation => self.accommodation,
            Perk::Lunch => self.lunch,
        }
    }

    pub(crate) fn flip(&mut self, perk: Perk) {
        match perk {
            Perk::Accommodation => self.accommodation = !self.accommodation,
            Perk::Lunch => self.lunch = !self.lunch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticipantField {
    FullName,
    Phone,
    Email,
    NationalId,
}

impl ParticipantField {
    pub const ALL: [ParticipantField; 4] = [
        ParticipantField::FullName,
        ParticipantField::Phone,
        ParticipantField::Email,
        ParticipantField::NationalId,
    ];
}

/// A limited-slot checkbox carried by each participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perk {
    Accommodation,
    Lunch,
}

impl fmt::Display for Perk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Perk::Accommodation => write!(f, "accommodation"),
            Perk::Lunch => write!(f, "lunch"),
        }
    }
}

/// Who a participant entry belongs to within a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Leader,
    Supervisor,
    /// Zero-based position in the member list.
    Member(usize),
}

/// File metadata as handed over by a file picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub mime_type: String,
}

impl Attachment {
    pub fn new<N: Into<String>, M: Into<String>>(name: N, size: u64, mime_type: M) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }

    /// Lowercased extension without the dot, if the name has one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// The complete set of values of one form instance at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub leader: Option<Participant>,
    #[serde(default)]
    pub supervisor: Option<Participant>,
    #[serde(default)]
    pub members: Vec<Participant>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

impl Submission {
    /// Value of a plain field; absent fields read as empty.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn participant(&self, role: Role) -> Option<&Participant> {
        match role {
            Role::Leader => self.leader.as_ref(),
            Role::Supervisor => self.supervisor.as_ref(),
            Role::Member(index) => self.members.get(index),
        }
    }

    pub(crate) fn participant_mut(&mut self, role: Role) -> Option<&mut Participant> {
        match role {
            Role::Leader => self.leader.as_mut(),
            Role::Supervisor => self.supervisor.as_mut(),
            Role::Member(index) => self.members.get_mut(index),
        }
    }

    /// Every participant entry in slot order: leader, members, supervisor.
    pub fn roster(&self) -> Vec<(Role, &Participant)> {
        let mut roster = Vec::with_capacity(self.members.len() + 2);
        if let Some(leader) = &self.leader {
            roster.push((Role::Leader, leader));
        }
        roster.extend(
            self.members
                .iter()
                .enumerate()
                .map(|(index, member)| (Role::Member(index), member)),
        );
        if let Some(supervisor) = &self.supervisor {
            roster.push((Role::Supervisor, supervisor));
        }
        roster
    }
}
