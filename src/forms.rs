//! Registration forms described as data.
//!
//! A [`FormDefinition`] lists the plain fields of a form, the participant
//! roles it carries (leader, supervisor, members), the optional attachment and
//! the limited-slot perks it offers. Built-in forms live in [`presets`]; more
//! can be declared in the configuration file with the same schema.

pub mod presets;

use std::collections::{BTreeMap, HashSet};

use serde_derive::{Deserialize, Serialize};

use crate::errors::{SystemError, UserError};
use crate::models::{Participant, ParticipantField, Perk, Role, Submission};
use crate::rules::Pattern;

/// The select value that unlocks a free-text companion field.
pub const OTHER: &str = "Other";

fn default_true() -> bool {
    true
}

fn default_slot_cap() -> usize {
    crate::slots::LimitedSlotSelector::DEFAULT_CAP
}

/// How a single text value is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRule {
    #[serde(default)]
    pub pattern: Option<Pattern>,
    /// Minimum length of the trimmed value, in characters.
    #[serde(default)]
    pub min_len: usize,
    #[serde(default = "default_true")]
    pub required: bool,
}

impl TextRule {
    pub const fn present() -> Self {
        Self {
            pattern: None,
            min_len: 0,
            required: true,
        }
    }

    pub const fn matching(pattern: Pattern) -> Self {
        Self {
            pattern: Some(pattern),
            min_len: 0,
            required: true,
        }
    }

    pub const fn min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl Default for TextRule {
    fn default() -> Self {
        Self::present()
    }
}

/// When a conditional field takes part in validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Condition {
    Equals { field: String, value: String },
    OneOf { field: String, values: Vec<String> },
    NoneOf { field: String, values: Vec<String> },
    /// A checkbox field, stored as the literal `"true"`.
    Checked { field: String },
    All { conditions: Vec<Condition> },
}

impl Condition {
    /// Active when the select `field` is set to `Other`.
    pub fn other_selected<S: Into<String>>(field: S) -> Self {
        Condition::Equals {
            field: field.into(),
            value: OTHER.to_string(),
        }
    }

    pub fn holds(&self, submission: &Submission) -> bool {
        match self {
            Condition::Equals { field, value } => submission.field(field) == value,
            Condition::OneOf { field, values } => {
                let current = submission.field(field);
                values.iter().any(|v| v == current)
            }
            Condition::NoneOf { field, values } => {
                let current = submission.field(field);
                values.iter().all(|v| v != current)
            }
            Condition::Checked { field } => submission.field(field) == "true",
            Condition::All { conditions } => conditions.iter().all(|c| c.holds(submission)),
        }
    }

    fn referenced_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Equals { field, .. }
            | Condition::OneOf { field, .. }
            | Condition::NoneOf { field, .. }
            | Condition::Checked { field } => out.push(field),
            Condition::All { conditions } => {
                conditions.iter().for_each(|c| c.referenced_fields(out))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub rule: TextRule,
    /// Closed set of accepted values, for selects. Empty means free text.
    #[serde(default)]
    pub options: Vec<String>,
    /// Only validated while this holds; ignored otherwise.
    #[serde(default)]
    pub when: Option<Condition>,
    /// Fields wiped whenever this one changes.
    #[serde(default)]
    pub clears: Vec<String>,
}

impl FieldSpec {
    pub fn new<S: Into<String>>(name: S, rule: TextRule) -> Self {
        Self {
            name: name.into(),
            rule,
            options: Vec::new(),
            when: None,
            clears: Vec::new(),
        }
    }

    pub fn required<S: Into<String>>(name: S) -> Self {
        Self::new(name, TextRule::present())
    }

    pub fn select<S: Into<String>>(name: S, options: &[&str]) -> Self {
        let mut spec = Self::required(name);
        spec.options = options.iter().map(|o| o.to_string()).collect();
        spec
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    pub fn clears(mut self, fields: &[&str]) -> Self {
        self.clears = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn is_active(&self, submission: &Submission) -> bool {
        self.when.as_ref().map_or(true, |c| c.holds(submission))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRule {
    pub field: String,
    /// Accepted extensions, lowercase and without the dot.
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub mime_types: Vec<String>,
    pub max_bytes: u64,
    #[serde(default = "default_true")]
    pub required: bool,
}

impl FileRule {
    pub const MB: u64 = 1024 * 1024;

    pub fn new<S: Into<String>>(field: S, max_bytes: u64) -> Self {
        Self {
            field: field.into(),
            extensions: Vec::new(),
            mime_types: Vec::new(),
            max_bytes,
            required: true,
        }
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn mime_types(mut self, mime_types: &[&str]) -> Self {
        self.mime_types = mime_types.iter().map(|m| m.to_string()).collect();
        self
    }

    /// An attachment is accepted when either its extension or its MIME type is listed.
    pub fn accepts(&self, extension: Option<&str>, mime_type: &str) -> bool {
        let by_extension = extension.map_or(false, |ext| self.extensions.iter().any(|e| e == ext));
        let by_mime = !mime_type.is_empty() && self.mime_types.iter().any(|m| m == mime_type);
        by_extension || by_mime
    }
}

/// Rules for the four identity fields of a participant. Unset fields are not collected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRules {
    #[serde(default)]
    pub full_name: Option<TextRule>,
    #[serde(default)]
    pub phone: Option<TextRule>,
    #[serde(default)]
    pub email: Option<TextRule>,
    #[serde(default)]
    pub national_id: Option<TextRule>,
    /// Reachable contact rather than an attendee: never holds perks.
    #[serde(default)]
    pub contact_only: bool,
}

impl ParticipantRules {
    /// Name, phone, email and national ID, all required.
    pub fn standard(name: Pattern) -> Self {
        Self {
            full_name: Some(TextRule::matching(name).min_len(3)),
            phone: Some(TextRule::matching(Pattern::Phone)),
            email: Some(TextRule::matching(Pattern::Email)),
            national_id: Some(TextRule::matching(Pattern::NationalId)),
            contact_only: false,
        }
    }

    /// A contact-only entry: email and phone.
    pub fn contact() -> Self {
        Self {
            full_name: None,
            phone: Some(TextRule::matching(Pattern::Phone)),
            email: Some(TextRule::matching(Pattern::Email)),
            national_id: None,
            contact_only: true,
        }
    }

    pub fn get(&self, field: ParticipantField) -> Option<&TextRule> {
        match field {
            ParticipantField::FullName => self.full_name.as_ref(),
            ParticipantField::Phone => self.phone.as_ref(),
            ParticipantField::Email => self.email.as_ref(),
            ParticipantField::NationalId => self.national_id.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPolicy {
    pub min: usize,
    pub max: usize,
    /// Number of blank member entries a fresh form starts with.
    #[serde(default)]
    pub initial: usize,
    pub rules: ParticipantRules,
}

/// Labels used to spell a participant's error keys, e.g. `member2Email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldLabels {
    pub prefix: String,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub national_id: String,
}

impl FieldLabels {
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
            full_name: "Name".to_string(),
            phone: "Phone".to_string(),
            email: "Email".to_string(),
            national_id: "NationalId".to_string(),
        }
    }

    pub fn full_name<S: Into<String>>(mut self, label: S) -> Self {
        self.full_name = label.into();
        self
    }

    pub fn phone<S: Into<String>>(mut self, label: S) -> Self {
        self.phone = label.into();
        self
    }

    pub fn suffix(&self, field: ParticipantField) -> &str {
        match field {
            ParticipantField::FullName => &self.full_name,
            ParticipantField::Phone => &self.phone,
            ParticipantField::Email => &self.email,
            ParticipantField::NationalId => &self.national_id,
        }
    }
}

/// Per-form spelling of flat error keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStyle {
    /// 0 or 1: the number the first member is keyed with.
    pub index_base: usize,
    pub member: FieldLabels,
    pub leader: FieldLabels,
    pub supervisor: FieldLabels,
}

impl Default for KeyStyle {
    fn default() -> Self {
        Self {
            index_base: 1,
            member: FieldLabels::new("member"),
            leader: FieldLabels::new("teamLeader").phone("WhatsApp"),
            supervisor: FieldLabels::new("supervisor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub id: String,
    pub title: String,
    #[builder(default)]
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub leader: Option<ParticipantRules>,
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub supervisor: Option<ParticipantRules>,
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub members: Option<MemberPolicy>,
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub attachment: Option<FileRule>,
    #[builder(default)]
    #[serde(default)]
    pub perks: Vec<Perk>,
    #[builder(default = "default_slot_cap()")]
    #[serde(default = "default_slot_cap")]
    pub slot_cap: usize,
    #[builder(default)]
    #[serde(default)]
    pub key_style: KeyStyle,
}

impl FormDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn offers(&self, perk: Perk) -> bool {
        self.perks.contains(&perk)
    }

    pub fn rules_for(&self, role: Role) -> Option<&ParticipantRules> {
        match role {
            Role::Leader => self.leader.as_ref(),
            Role::Supervisor => self.supervisor.as_ref(),
            Role::Member(_) => self.members.as_ref().map(|m| &m.rules),
        }
    }

    /// The participants competing for perk slots, in slot order.
    pub fn perk_roster<'s>(&self, submission: &'s Submission) -> Vec<(Role, &'s Participant)> {
        submission
            .roster()
            .into_iter()
            .filter(|(role, _)| self.rules_for(*role).map_or(false, |r| !r.contact_only))
            .collect()
    }

    /// The values a freshly mounted form starts with, and returns to after a successful submit.
    pub fn empty_submission(&self) -> Submission {
        let initial_members = self.members.as_ref().map_or(0, |m| m.initial);
        Submission {
            fields: self
                .fields
                .iter()
                .map(|f| (f.name.clone(), String::new()))
                .collect::<BTreeMap<_, _>>(),
            leader: self.leader.as_ref().map(|_| Participant::default()),
            supervisor: self.supervisor.as_ref().map(|_| Participant::default()),
            members: vec![Participant::default(); initial_members],
            attachment: None,
        }
    }

    /// Rejects definitions the validator could not apply consistently.
    pub fn check(&self) -> Result<(), SystemError> {
        let invalid = |reason: String| SystemError::InvalidFormDefinition(self.id.clone(), reason);

        if self.id.trim().is_empty() {
            return Err(invalid("empty form id".to_string()));
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(invalid(format!("field `{}` declared twice", field.name)));
            }
        }
        if let Some(attachment) = &self.attachment {
            if !names.insert(attachment.field.as_str()) {
                return Err(invalid(format!(
                    "attachment `{}` shadows a field",
                    attachment.field
                )));
            }
        }

        for field in &self.fields {
            let mut referenced = Vec::new();
            if let Some(condition) = &field.when {
                condition.referenced_fields(&mut referenced);
            }
            referenced.extend(field.clears.iter().map(String::as_str));
            if let Some(unknown) = referenced.into_iter().find(|r| self.field(r).is_none()) {
                return Err(invalid(format!(
                    "field `{}` refers to unknown field `{}`",
                    field.name, unknown
                )));
            }
        }

        if let Some(members) = &self.members {
            if members.min > members.max {
                return Err(invalid(format!(
                    "member bounds {}..={} are empty",
                    members.min, members.max
                )));
            }
            if members.initial > members.max {
                return Err(invalid(format!(
                    "{} initial members exceed the maximum of {}",
                    members.initial, members.max
                )));
            }
        }

        if self.key_style.index_base > 1 {
            return Err(invalid("member index base must be 0 or 1".to_string()));
        }

        if !self.perks.is_empty() && self.slot_cap == 0 {
            return Err(invalid("perks offered with a slot cap of 0".to_string()));
        }

        Ok(())
    }
}

/// Every form the application knows about, by id.
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    forms: BTreeMap<String, FormDefinition>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_forms() -> Result<Self, SystemError> {
        let mut registry = Self::new();
        for form in presets::builtin()? {
            registry.insert(form)?;
        }
        Ok(registry)
    }

    /// Adds a new form. Ids must be unique.
    pub fn insert(&mut self, form: FormDefinition) -> Result<(), SystemError> {
        form.check()?;
        if self.forms.contains_key(&form.id) {
            return Err(SystemError::DuplicateForm(form.id));
        }
        self.forms.insert(form.id.clone(), form);
        Ok(())
    }

    /// Adds a form, replacing any existing one with the same id.
    pub fn replace(&mut self, form: FormDefinition) -> Result<Option<FormDefinition>, SystemError> {
        form.check()?;
        Ok(self.forms.insert(form.id.clone(), form))
    }

    pub fn get(&self, id: &str) -> Result<&FormDefinition, UserError> {
        self.forms
            .get(id)
            .ok_or_else(|| UserError::NoSuchForm(id.to_string()))
    }

    pub fn forms(&self) -> impl Iterator<Item = &FormDefinition> {
        self.forms.values()
    }
}
