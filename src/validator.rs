use std::collections::BTreeMap;
use std::fmt;

use serde_derive::Serialize;

use crate::forms::{FileRule, FormDefinition, KeyStyle, ParticipantRules, TextRule};
use crate::models::{Attachment, Participant, ParticipantField, Perk, Role, Submission};
use crate::rules::{trimmed_len, Pattern};

/// Flat key reported when the member count is out of bounds.
pub const TEAM_MEMBERS_KEY: &str = "teamMembers";

/// Why a single value was refused. Never fatal: collected into an [`ErrorMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum FieldError {
    Required,
    InvalidFormat(FormatViolation),
    TooLarge { max_bytes: u64 },
    InvalidType { allowed: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "violation")]
pub enum FormatViolation {
    TooShort { min: usize },
    Pattern { pattern: Pattern },
    NotAnOption,
    MemberCount { min: usize, max: usize },
    SlotCapExceeded { perk: Perk, cap: usize },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Required => write!(f, "is required"),
            FieldError::InvalidFormat(violation) => violation.fmt(f),
            FieldError::TooLarge { max_bytes } => {
                write!(f, "file size must not exceed {}", format_size(*max_bytes))
            }
            FieldError::InvalidType { allowed } => {
                write!(f, "file must be one of: {}", allowed.join(", "))
            }
        }
    }
}

// Whole megabytes print as such; anything else keeps two decimals at most.
fn format_size(bytes: u64) -> String {
    if bytes % FileRule::MB == 0 {
        format!("{} MB", bytes / FileRule::MB)
    } else if bytes >= FileRule::MB / 100 {
        let megabytes = format!("{:.2}", bytes as f64 / FileRule::MB as f64);
        format!("{} MB", megabytes.trim_end_matches('0').trim_end_matches('.'))
    } else {
        format!("{} bytes", bytes)
    }
}

impl fmt::Display for FormatViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatViolation::TooShort { min } => write!(f, "must be at least {} characters", min),
            FormatViolation::Pattern { pattern } => pattern.fmt(f),
            FormatViolation::NotAnOption => write!(f, "is not one of the offered options"),
            FormatViolation::MemberCount { min, max } => {
                write!(f, "team must have between {} and {} members", min, max)
            }
            FormatViolation::SlotCapExceeded { perk, cap } => {
                write!(f, "at most {} participants may request {}", cap, perk)
            }
        }
    }
}

/// Identifies what an error is attached to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    /// A plain field, the attachment, or a form-wide rule.
    Field(String),
    Participant(Role, ParticipantField),
}

impl FieldKey {
    pub fn field<S: Into<String>>(name: S) -> Self {
        FieldKey::Field(name.into())
    }

    pub fn member(index: usize, field: ParticipantField) -> Self {
        FieldKey::Participant(Role::Member(index), field)
    }

    /// Spells the key the way the form names its inputs, e.g. `member2Email`.
    pub fn flat(&self, style: &KeyStyle) -> String {
        match self {
            FieldKey::Field(name) => name.clone(),
            FieldKey::Participant(Role::Leader, field) => {
                format!("{}{}", style.leader.prefix, style.leader.suffix(*field))
            }
            FieldKey::Participant(Role::Supervisor, field) => {
                format!("{}{}", style.supervisor.prefix, style.supervisor.suffix(*field))
            }
            FieldKey::Participant(Role::Member(index), field) => format!(
                "{}{}{}",
                style.member.prefix,
                index + style.index_base,
                style.member.suffix(*field)
            ),
        }
    }
}

/// Validation result of one submission: empty iff the submission is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMap {
    errors: BTreeMap<FieldKey, FieldError>,
}

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, key: &FieldKey) -> Option<&FieldError> {
        self.errors.get(key)
    }

    pub fn field(&self, name: &str) -> Option<&FieldError> {
        self.errors.get(&FieldKey::field(name))
    }

    pub fn participant(&self, role: Role, field: ParticipantField) -> Option<&FieldError> {
        self.errors.get(&FieldKey::Participant(role, field))
    }

    pub fn insert(&mut self, key: FieldKey, error: FieldError) {
        self.errors.insert(key, error);
    }

    pub fn remove(&mut self, key: &FieldKey) -> Option<FieldError> {
        self.errors.remove(key)
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    /// Drops every error attached to a member entry.
    pub fn clear_members(&mut self) {
        self.errors
            .retain(|key, _| !matches!(key, FieldKey::Participant(Role::Member(_), _)));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &FieldError)> {
        self.errors.iter()
    }

    /// Member errors grouped by zero-based member index, then by field.
    pub fn members(&self) -> BTreeMap<usize, BTreeMap<ParticipantField, &FieldError>> {
        let mut grouped: BTreeMap<usize, BTreeMap<ParticipantField, &FieldError>> = BTreeMap::new();
        for (key, error) in &self.errors {
            if let FieldKey::Participant(Role::Member(index), field) = key {
                grouped.entry(*index).or_default().insert(*field, error);
            }
        }
        grouped
    }

    /// Flat `key -> message` view, keyed the way the form names its inputs.
    pub fn flatten(&self, style: &KeyStyle) -> BTreeMap<String, String> {
        self.errors
            .iter()
            .map(|(key, error)| (key.flat(style), error.to_string()))
            .collect()
    }
}

/// Checks a text value against its rule.
pub fn check_text(value: &str, rule: &TextRule) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return match rule.pattern {
            _ if !rule.required => Ok(()),
            Some(pattern) if !pattern.empty_is_missing() => {
                Err(FieldError::InvalidFormat(FormatViolation::Pattern { pattern }))
            }
            _ => Err(FieldError::Required),
        };
    }

    if trimmed_len(value) < rule.min_len {
        return Err(FieldError::InvalidFormat(FormatViolation::TooShort {
            min: rule.min_len,
        }));
    }

    match rule.pattern {
        Some(pattern) if !pattern.matches(value) => {
            Err(FieldError::InvalidFormat(FormatViolation::Pattern { pattern }))
        }
        _ => Ok(()),
    }
}

pub fn check_attachment(attachment: Option<&Attachment>, rule: &FileRule) -> Result<(), FieldError> {
    let attachment = match attachment {
        Some(attachment) => attachment,
        None if rule.required => return Err(FieldError::Required),
        None => return Ok(()),
    };

    if attachment.size > rule.max_bytes {
        return Err(FieldError::TooLarge {
            max_bytes: rule.max_bytes,
        });
    }

    if !rule.accepts(attachment.extension().as_deref(), &attachment.mime_type) {
        return Err(FieldError::InvalidType {
            allowed: rule.extensions.clone(),
        });
    }

    Ok(())
}

/// Runs every rule of one form over a submission.
///
/// Pure and total: the same submission always yields the same [`ErrorMap`].
pub struct FormValidator<'a> {
    form: &'a FormDefinition,
}

impl<'a> FormValidator<'a> {
    pub fn new(form: &'a FormDefinition) -> Self {
        Self { form }
    }

    #[tracing::instrument(skip_all, fields(form = %self.form.id))]
    pub fn validate(&self, submission: &Submission) -> ErrorMap {
        let mut errors = ErrorMap::new();

        self.validate_fields(submission, &mut errors);

        if let Some(rule) = &self.form.attachment {
            if let Err(err) = check_attachment(submission.attachment.as_ref(), rule) {
                errors.insert(FieldKey::field(rule.field.as_str()), err);
            }
        }

        let blank = Participant::default();
        if let Some(rules) = &self.form.leader {
            let leader = submission.leader.as_ref().unwrap_or(&blank);
            Self::validate_participant(Role::Leader, leader, rules, &mut errors);
        }

        if let Some(policy) = &self.form.members {
            let count = submission.members.len();
            if count < policy.min || count > policy.max {
                errors.insert(
                    FieldKey::field(TEAM_MEMBERS_KEY),
                    FieldError::InvalidFormat(FormatViolation::MemberCount {
                        min: policy.min,
                        max: policy.max,
                    }),
                );
            }
            for (index, member) in submission.members.iter().enumerate() {
                Self::validate_participant(Role::Member(index), member, &policy.rules, &mut errors);
            }
        }

        if let Some(rules) = &self.form.supervisor {
            let supervisor = submission.supervisor.as_ref().unwrap_or(&blank);
            Self::validate_participant(Role::Supervisor, supervisor, rules, &mut errors);
        }

        self.validate_slots(submission, &mut errors);

        tracing::debug!(errors = errors.len(), "validated submission");
        errors
    }

    fn validate_fields(&self, submission: &Submission, errors: &mut ErrorMap) {
        for spec in &self.form.fields {
            let conditional = spec.when.is_some();
            if !spec.is_active(submission) {
                tracing::trace!(field = %spec.name, "inactive, skipped");
                continue;
            }

            let value = submission.field(&spec.name);
            let result = check_text(value, &spec.rule).and_then(|()| {
                let chosen = value.trim();
                if spec.options.is_empty() || chosen.is_empty() || spec.options.iter().any(|o| o == chosen) {
                    Ok(())
                } else {
                    Err(FieldError::InvalidFormat(FormatViolation::NotAnOption))
                }
            });

            if let Err(err) = result {
                // A companion field that was asked for but not filled in
                // properly is reported as missing, whatever the reason.
                let err = if conditional { FieldError::Required } else { err };
                errors.insert(FieldKey::field(spec.name.as_str()), err);
            }
        }
    }

    fn validate_participant(
        role: Role,
        participant: &Participant,
        rules: &ParticipantRules,
        errors: &mut ErrorMap,
    ) {
        for field in ParticipantField::ALL {
            let Some(rule) = rules.get(field) else {
                continue;
            };
            if let Err(err) = check_text(participant.get(field), rule) {
                errors.insert(FieldKey::Participant(role, field), err);
            }
        }
    }

    fn validate_slots(&self, submission: &Submission, errors: &mut ErrorMap) {
        let roster = self.form.perk_roster(submission);
        for &perk in &self.form.perks {
            let taken = roster.iter().filter(|(_, p)| p.has(perk)).count();
            if taken > self.form.slot_cap {
                errors.insert(
                    FieldKey::field(perk.to_string()),
                    FieldError::InvalidFormat(FormatViolation::SlotCapExceeded {
                        perk,
                        cap: self.form.slot_cap,
                    }),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::presets;
    use crate::forms::FormRegistry;
    use crate::models::ParticipantBuilder;

    fn form(id: &str) -> FormDefinition {
        FormRegistry::with_builtin_forms().unwrap().get(id).unwrap().clone()
    }

    fn valid_person(name: &str) -> Participant {
        ParticipantBuilder::default()
            .full_name(name)
            .phone("01012345678")
            .email("a@b.com")
            .national_id("12345678901234")
            .build()
            .unwrap()
    }

    fn set(submission: &mut Submission, pairs: &[(&str, &str)]) {
        for (k, v) in pairs {
            submission.fields.insert(k.to_string(), v.to_string());
        }
    }

    #[test]
    fn required_text_distinguishes_missing_from_malformed() {
        let rule = TextRule::matching(Pattern::OrganizationName).min_len(3);

        assert_eq!(check_text("   ", &rule), Err(FieldError::Required));
        assert_eq!(
            check_text("AB", &rule),
            Err(FieldError::InvalidFormat(FormatViolation::TooShort { min: 3 }))
        );
        assert_eq!(
            check_text("Team #1", &rule),
            Err(FieldError::InvalidFormat(FormatViolation::Pattern {
                pattern: Pattern::OrganizationName
            }))
        );
        assert_eq!(check_text("Al-Sayed Team", &rule), Ok(()));
    }

    #[test]
    fn empty_contact_values_are_malformed_not_missing() {
        let rule = TextRule::matching(Pattern::Email);
        assert_eq!(
            check_text("", &rule),
            Err(FieldError::InvalidFormat(FormatViolation::Pattern {
                pattern: Pattern::Email
            }))
        );
        assert_eq!(check_text("", &rule.optional()), Ok(()));
        assert!(check_text("not-an-email", &rule.optional()).is_err());
    }

    #[test]
    fn attachment_checks_presence_size_then_type() {
        let rule = FileRule::new("pitchDeck", 10 * FileRule::MB)
            .extensions(&["ppt", "pptx", "pdf"]);

        assert_eq!(check_attachment(None, &rule), Err(FieldError::Required));
        assert_eq!(
            check_attachment(Some(&Attachment::new("deck.pdf", 11 * FileRule::MB, "")), &rule),
            Err(FieldError::TooLarge {
                max_bytes: 10 * FileRule::MB
            })
        );
        assert!(matches!(
            check_attachment(Some(&Attachment::new("deck.zip", 1024, "application/zip")), &rule),
            Err(FieldError::InvalidType { .. })
        ));
        assert_eq!(
            check_attachment(Some(&Attachment::new("deck.PDF", 10 * FileRule::MB, "")), &rule),
            Ok(())
        );
    }

    #[test]
    fn other_companion_is_required_only_when_other_is_chosen() {
        let form = form(presets::GRADUATION_PROJECT);
        let validator = FormValidator::new(&form);
        let mut submission = form.empty_submission();

        set(&mut submission, &[("projectCategory", "Other"), ("otherCategory", "")]);
        assert_eq!(
            validator.validate(&submission).field("otherCategory"),
            Some(&FieldError::Required)
        );

        set(
            &mut submission,
            &[("projectCategory", "Power and Green Environment"), ("otherCategory", "")],
        );
        assert_eq!(validator.validate(&submission).field("otherCategory"), None);

        set(&mut submission, &[("otherCategory", "#### anything")]);
        assert_eq!(validator.validate(&submission).field("otherCategory"), None);
    }

    #[test]
    fn too_short_companion_is_reported_as_required() {
        let form = form(presets::SCHOOL_PROJECT);
        let mut submission = form.empty_submission();
        set(&mut submission, &[("projectCategory", "Other"), ("otherCategory", "AI")]);

        let errors = FormValidator::new(&form).validate(&submission);
        assert_eq!(errors.field("otherCategory"), Some(&FieldError::Required));
    }

    #[test]
    fn track_is_not_required_for_trackless_categories() {
        let form = form(presets::GRADUATION_PROJECT);
        let validator = FormValidator::new(&form);
        let mut submission = form.empty_submission();

        set(&mut submission, &[("projectCategory", "Civil Engineering")]);
        assert_eq!(validator.validate(&submission).field("projectTrack"), None);

        set(&mut submission, &[("projectCategory", "Power and Green Environment")]);
        assert_eq!(
            validator.validate(&submission).field("projectTrack"),
            Some(&FieldError::Required)
        );
    }

    #[test]
    fn select_values_outside_the_options_are_refused() {
        let form = form(presets::GRADUATION_PROJECT);
        let mut submission = form.empty_submission();
        set(&mut submission, &[("projectCategory", "Astrology")]);

        let errors = FormValidator::new(&form).validate(&submission);
        assert_eq!(
            errors.field("projectCategory"),
            Some(&FieldError::InvalidFormat(FormatViolation::NotAnOption))
        );
    }

    #[test]
    fn member_errors_use_the_forms_index_base() {
        let graduation = form(presets::GRADUATION_PROJECT);
        let mut submission = graduation.empty_submission();
        submission.members = vec![valid_person("Ali Hassan"), Participant::default()];

        let errors = FormValidator::new(&graduation).validate(&submission);
        let flat = errors.flatten(&graduation.key_style);
        assert_eq!(flat.get("member2Name").map(String::as_str), Some("is required"));
        assert!(flat.contains_key("member2Email"));
        assert!(!flat.contains_key("member1Name"));

        let hackathon = form(presets::HACKATHON);
        let mut submission = hackathon.empty_submission();
        submission.members = vec![Participant::default()];
        let flat = FormValidator::new(&hackathon)
            .validate(&submission)
            .flatten(&hackathon.key_style);
        assert!(flat.contains_key("member0FullName"));
        assert!(flat.contains_key("member0Whatsapp"));
        assert!(flat.contains_key("leaderNationalId"));
    }

    #[test]
    fn member_errors_group_by_index() {
        let form = form(presets::GRADUATION_PROJECT);
        let mut submission = form.empty_submission();
        submission.members = vec![valid_person("Ali Hassan"), Participant::default()];

        let errors = FormValidator::new(&form).validate(&submission);
        let grouped = errors.members();
        assert!(!grouped.contains_key(&0));
        assert_eq!(grouped[&1].len(), 4);
    }

    #[test]
    fn member_count_outside_bounds_is_reported() {
        let form = form(presets::GRADUATION_PROJECT);
        let mut submission = form.empty_submission();
        submission.members = vec![valid_person("Ali Hassan")];

        let errors = FormValidator::new(&form).validate(&submission);
        assert_eq!(
            errors.field(TEAM_MEMBERS_KEY),
            Some(&FieldError::InvalidFormat(FormatViolation::MemberCount { min: 2, max: 7 }))
        );
    }

    #[test]
    fn optional_supervisor_email_may_be_blank() {
        let form = form(presets::TECHNICAL_SUBMISSION);
        let mut submission = form.empty_submission();
        let mut supervisor = valid_person("Mona Adel");
        supervisor.email.clear();
        submission.supervisor = Some(supervisor);

        let errors = FormValidator::new(&form).validate(&submission);
        assert_eq!(errors.participant(Role::Supervisor, ParticipantField::Email), None);
        assert_eq!(errors.participant(Role::Supervisor, ParticipantField::FullName), None);
        assert!(errors
            .flatten(&form.key_style)
            .contains_key("teamLeaderWhatsApp"));
    }

    #[test]
    fn more_perk_holders_than_slots_is_an_error() {
        let form = form(presets::HACKATHON);
        let mut submission = form.empty_submission();
        let mut holder = valid_person("Ali Hassan");
        holder.accommodation = true;
        submission.leader = Some(holder.clone());
        submission.members = vec![holder.clone(), holder];

        let errors = FormValidator::new(&form).validate(&submission);
        assert!(matches!(
            errors.field("accommodation"),
            Some(FieldError::InvalidFormat(FormatViolation::SlotCapExceeded { cap: 2, .. }))
        ));
    }

    #[test]
    fn contact_leader_is_not_counted_for_slots() {
        let form = form(presets::TECHNICAL_SUBMISSION);
        let mut submission = form.empty_submission();
        let mut holder = valid_person("Mona Adel");
        holder.accommodation = true;
        submission.leader = Some(holder.clone());
        submission.members = vec![holder.clone(), holder];

        let errors = FormValidator::new(&form).validate(&submission);
        assert_eq!(errors.field("accommodation"), None);
    }

    #[test]
    fn validation_is_idempotent() {
        let form = form(presets::SCHOOL_PROJECT);
        let mut submission = form.empty_submission();
        set(&mut submission, &[("projectTitle", "Al"), ("projectCategory", "Other")]);
        let validator = FormValidator::new(&form);

        assert_eq!(validator.validate(&submission), validator.validate(&submission));
    }

    #[test]
    fn error_messages_read_naturally() {
        assert_eq!(
            FieldError::InvalidFormat(FormatViolation::TooShort { min: 50 }).to_string(),
            "must be at least 50 characters"
        );
        assert_eq!(
            FieldError::TooLarge {
                max_bytes: 25 * FileRule::MB
            }
            .to_string(),
            "file size must not exceed 25 MB"
        );
        assert_eq!(
            FieldError::TooLarge {
                max_bytes: 3 * FileRule::MB / 2
            }
            .to_string(),
            "file size must not exceed 1.5 MB"
        );
        assert_eq!(
            FieldError::TooLarge {
                max_bytes: FileRule::MB / 2
            }
            .to_string(),
            "file size must not exceed 0.5 MB"
        );
        assert_eq!(
            FieldError::TooLarge { max_bytes: 2048 }.to_string(),
            "file size must not exceed 2048 bytes"
        );
        assert_eq!(
            FieldError::InvalidFormat(FormatViolation::Pattern {
                pattern: Pattern::Phone
            })
            .to_string(),
            "invalid Egyptian phone number"
        );
    }
}
