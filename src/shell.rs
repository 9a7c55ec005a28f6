//! The observable state of one form instance and its lifecycle:
//! edit, submit, validate, then either keep the errors or reset.

use std::future::{self, Future};
use std::sync::Arc;

use serde_derive::Serialize;

use crate::errors::{Result, UserError};
use crate::forms::FormDefinition;
use crate::models::{Attachment, ParticipantField, Perk, Role, Submission};
use crate::services::{Ack, SubmissionError, SubmissionService};
use crate::slots::{LimitedSlotSelector, SlotOutcome};
use crate::validator::{ErrorMap, FieldKey, FormValidator, TEAM_MEMBERS_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Editing,
    /// Valid and handed to the submission service; waiting for its answer.
    Pending,
    /// Accepted. Only passed through on the way back to `Editing`.
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeKind {
    Success,
    Error,
    Loading,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new<S: Into<String>>(kind: NoticeKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Where notices are shown. The shell also keeps the latest one itself.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
    fn dismiss(&self) {}
    /// Called on every phase change, including `Pending` while a submit is in flight.
    fn phase_changed(&self, _phase: Phase) {}
}

/// Writes notices to the log.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.kind {
            NoticeKind::Error => tracing::warn!(message = %notice.message, "notice"),
            _ => tracing::info!(kind = ?notice.kind, message = %notice.message, "notice"),
        }
    }

    fn phase_changed(&self, phase: Phase) {
        tracing::debug!(?phase, "phase changed");
    }
}

/// One user edit. Applying it yields a new [`Submission`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    SetField { name: String, value: String },
    SetParticipant { role: Role, field: ParticipantField, value: String },
    AddMember,
    RemoveMember(usize),
    TogglePerk { role: Role, perk: Perk },
    Attach(Attachment),
    Detach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The perk toggle was refused because every slot is taken. Nothing changed.
    SlotCapReached { perk: Perk, cap: usize },
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// The form was reset and the service returned this receipt.
    Accepted(Ack),
    /// Validation failed; the values are kept for correction.
    Invalid(ErrorMap),
    /// The service refused or failed; the values are kept.
    Failed(SubmissionError),
    /// Cancelled while pending; nothing was committed.
    Cancelled,
}

/// Computes the submission that results from an edit, and the error keys it makes stale.
pub fn reduce(
    form: &FormDefinition,
    submission: &Submission,
    edit: &Edit,
) -> Result<(Submission, EditOutcome, Vec<FieldKey>)> {
    let mut next = submission.clone();
    let mut stale = Vec::new();

    match edit {
        Edit::SetField { name, value } => {
            let spec = form
                .field(name)
                .ok_or_else(|| UserError::NoSuchField(form.id.clone(), name.clone()))?;
            let changed = next.field(name) != value;
            next.fields.insert(name.clone(), value.clone());
            stale.push(FieldKey::field(name.as_str()));
            if changed {
                for cleared in &spec.clears {
                    next.fields.insert(cleared.clone(), String::new());
                    stale.push(FieldKey::field(cleared.as_str()));
                }
            }
        }
        Edit::SetParticipant { role, field, value } => {
            let participant = next
                .participant_mut(*role)
                .ok_or_else(|| missing_participant(*role))?;
            participant.set(*field, value.clone());
            stale.push(FieldKey::Participant(*role, *field));
        }
        Edit::AddMember => {
            let policy = form.members.as_ref().ok_or(UserError::NoSuchRole("member list"))?;
            if next.members.len() >= policy.max {
                return Err(UserError::MemberLimitReached(policy.max).into());
            }
            next.members.push(Default::default());
            stale.push(FieldKey::field(TEAM_MEMBERS_KEY));
        }
        Edit::RemoveMember(index) => {
            let policy = form.members.as_ref().ok_or(UserError::NoSuchRole("member list"))?;
            if *index >= next.members.len() {
                return Err(UserError::NoSuchMember(*index).into());
            }
            if next.members.len() <= policy.min {
                return Err(UserError::MemberMinimumReached(policy.min).into());
            }
            next.members.remove(*index);
            stale.push(FieldKey::field(TEAM_MEMBERS_KEY));
        }
        Edit::TogglePerk { role, perk } => {
            if !form.offers(*perk) {
                return Err(UserError::PerkNotOffered(*perk).into());
            }
            if next.participant(*role).is_none() {
                return Err(missing_participant(*role).into());
            }
            let roster = form.perk_roster(&next);
            let position = roster
                .iter()
                .position(|(r, _)| r == role)
                .ok_or(UserError::PerkNotOffered(*perk))?;
            let participants: Vec<_> = roster.into_iter().map(|(_, p)| p.clone()).collect();

            let selector = LimitedSlotSelector::new(form.slot_cap);
            let (toggled, outcome) = selector.toggle(&participants, position, *perk)?;
            if !outcome.changed() {
                return Ok((
                    next,
                    EditOutcome::SlotCapReached {
                        perk: *perk,
                        cap: form.slot_cap,
                    },
                    stale,
                ));
            }
            if let Some(participant) = next.participant_mut(*role) {
                *participant = toggled[position].clone();
            }
            stale.push(FieldKey::field(perk.to_string()));
        }
        Edit::Attach(attachment) => {
            let rule = form.attachment.as_ref().ok_or(UserError::NoSuchRole("attachment"))?;
            next.attachment = Some(attachment.clone());
            stale.push(FieldKey::field(rule.field.as_str()));
        }
        Edit::Detach => {
            let rule = form.attachment.as_ref().ok_or(UserError::NoSuchRole("attachment"))?;
            next.attachment = None;
            stale.push(FieldKey::field(rule.field.as_str()));
        }
    }

    Ok((next, EditOutcome::Applied, stale))
}

fn missing_participant(role: Role) -> UserError {
    match role {
        Role::Leader => UserError::NoSuchRole("leader"),
        Role::Supervisor => UserError::NoSuchRole("supervisor"),
        Role::Member(index) => UserError::NoSuchMember(index),
    }
}

// Leaves `Pending` however the await ends, including when the submit
// future is dropped. The exit phase is `Editing` unless the service accepted.
struct PendingGuard<'a> {
    phase: &'a mut Phase,
    notifier: Option<&'a dyn Notifier>,
    exit: Phase,
}

impl<'a> PendingGuard<'a> {
    fn enter(phase: &'a mut Phase, notifier: Option<&'a dyn Notifier>) -> Self {
        *phase = Phase::Pending;
        if let Some(notifier) = notifier {
            notifier.phase_changed(Phase::Pending);
        }
        Self {
            phase,
            notifier,
            exit: Phase::Editing,
        }
    }

    fn leave_as(&mut self, phase: Phase) {
        self.exit = phase;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        *self.phase = self.exit;
        if let Some(notifier) = self.notifier {
            notifier.phase_changed(self.exit);
        }
    }
}

pub struct FormShell {
    form: FormDefinition,
    submission: Submission,
    errors: ErrorMap,
    phase: Phase,
    notice: Option<Notice>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl FormShell {
    pub fn new(form: FormDefinition) -> Self {
        let submission = form.empty_submission();
        Self::with_submission(form, submission)
    }

    /// Starts from prefilled values instead of an empty form.
    pub fn with_submission(form: FormDefinition, submission: Submission) -> Self {
        Self {
            form,
            submission,
            errors: ErrorMap::new(),
            phase: Phase::Editing,
            notice: None,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn form(&self) -> &FormDefinition {
        &self.form
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    #[tracing::instrument(skip_all, fields(form = %self.form.id, edit = ?edit))]
    pub fn apply(&mut self, edit: Edit) -> Result<EditOutcome> {
        let (next, outcome, stale) = reduce(&self.form, &self.submission, &edit)?;

        if let EditOutcome::SlotCapReached { perk, cap } = outcome {
            tracing::debug!(%perk, cap, "perk toggle ignored");
            return Ok(outcome);
        }

        if matches!(edit, Edit::RemoveMember(_)) {
            // Member keys are positional; after a removal they no longer line up.
            self.errors.clear_members();
        }
        for key in &stale {
            self.errors.remove(key);
        }
        self.submission = next;

        Ok(outcome)
    }

    /// Runs the validator without submitting and keeps its result for display.
    pub fn validate(&mut self) -> &ErrorMap {
        self.errors = FormValidator::new(&self.form).validate(&self.submission);
        &self.errors
    }

    pub fn reset(&mut self) {
        tracing::debug!(form = %self.form.id, "reset form");
        self.submission = self.form.empty_submission();
        self.errors.clear();
    }

    pub fn dismiss_notice(&mut self) {
        if self.notice.take().is_some() {
            if let Some(notifier) = &self.notifier {
                notifier.dismiss();
            }
        }
    }

    pub async fn submit<S>(&mut self, service: &S) -> SubmitOutcome
    where
        S: SubmissionService + ?Sized,
    {
        self.submit_until(service, future::pending()).await
    }

    /// Validates, then hands the submission to `service` unless `cancel` resolves first.
    ///
    /// All or nothing: values are reset only once the service accepts. A
    /// cancelled or failed attempt leaves the values as they were.
    #[tracing::instrument(skip_all, fields(form = %self.form.id))]
    pub async fn submit_until<S, C>(&mut self, service: &S, cancel: C) -> SubmitOutcome
    where
        S: SubmissionService + ?Sized,
        C: Future<Output = ()>,
    {
        if !self.validate().is_empty() {
            tracing::info!(errors = self.errors.len(), "form has errors");
            self.show(Notice::new(NoticeKind::Error, "Please fix the highlighted fields."));
            return SubmitOutcome::Invalid(self.errors.clone());
        }

        self.show(Notice::new(NoticeKind::Loading, "Submitting form..."));
        let submission = self.submission.clone();

        let result = {
            let mut pending = PendingGuard::enter(&mut self.phase, self.notifier.as_deref());
            let result = tokio::select! {
                result = service.submit(&self.form.id, &submission) => Some(result),
                _ = cancel => None,
            };
            if matches!(result, Some(Ok(_))) {
                pending.leave_as(Phase::Submitted);
            }
            result
        };

        match result {
            Some(Ok(ack)) => {
                tracing::info!(reference = %ack.reference, "form submitted");
                self.reset();
                self.set_phase(Phase::Editing);
                self.show(Notice::new(NoticeKind::Success, "Form submitted successfully!"));
                SubmitOutcome::Accepted(ack)
            }
            Some(Err(err)) => {
                tracing::warn!(?err, "submission failed");
                self.show(Notice::new(NoticeKind::Error, err.to_string()));
                SubmitOutcome::Failed(err)
            }
            None => {
                tracing::info!("submission cancelled");
                self.dismiss_notice();
                SubmitOutcome::Cancelled
            }
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        if let Some(notifier) = &self.notifier {
            notifier.phase_changed(phase);
        }
    }

    fn show(&mut self, notice: Notice) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(&notice);
        }
        self.notice = Some(notice);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::Error;
    use crate::forms::{presets, FormRegistry};
    use crate::services::{SimulatedSubmissionService, SubmissionResult};

    fn shell(id: &str) -> FormShell {
        FormShell::new(FormRegistry::with_builtin_forms().unwrap().get(id).unwrap().clone())
    }

    fn set(shell: &mut FormShell, name: &str, value: &str) {
        shell
            .apply(Edit::SetField {
                name: name.to_string(),
                value: value.to_string(),
            })
            .unwrap();
    }

    fn set_person(shell: &mut FormShell, role: Role, name: &str) {
        for (field, value) in [
            (ParticipantField::FullName, name),
            (ParticipantField::Phone, "01012345678"),
            (ParticipantField::Email, "a@b.com"),
            (ParticipantField::NationalId, "12345678901234"),
        ] {
            shell
                .apply(Edit::SetParticipant {
                    role,
                    field,
                    value: value.to_string(),
                })
                .unwrap();
        }
    }

    fn filled_ctf() -> FormShell {
        let mut shell = shell(presets::CTF);
        set(&mut shell, "teamName", "Null Pointers");
        set(&mut shell, "universityName", "Aswan University");
        set_person(&mut shell, Role::Leader, "Ali Hassan");
        shell
    }

    struct FailingService;

    #[async_trait]
    impl SubmissionService for FailingService {
        async fn submit(&self, _: &str, _: &Submission) -> SubmissionResult<Ack> {
            Err(SubmissionError::RegistrationClosed)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        kinds: Mutex<Vec<NoticeKind>>,
        phases: Mutex<Vec<Phase>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: &Notice) {
            self.kinds.lock().unwrap().push(notice.kind);
        }

        fn phase_changed(&self, phase: Phase) {
            self.phases.lock().unwrap().push(phase);
        }
    }

    // Accepts only if the shell reported `Pending` before the request went out.
    struct PhaseCheckingService {
        notifier: Arc<RecordingNotifier>,
    }

    #[async_trait]
    impl SubmissionService for PhaseCheckingService {
        async fn submit(&self, form_id: &str, _: &Submission) -> SubmissionResult<Ack> {
            let last = self.notifier.phases.lock().unwrap().last().copied();
            if last != Some(Phase::Pending) {
                return Err(SubmissionError::UnexpectedError(format!("phase was {:?}", last)));
            }
            SimulatedSubmissionService::new(Duration::ZERO)
                .submit(form_id, &Submission::default())
                .await
        }
    }

    #[test]
    fn editing_a_field_clears_its_error() {
        let mut shell = shell(presets::CTF);
        shell.validate();
        assert!(shell.errors().field("teamName").is_some());

        set(&mut shell, "teamName", "x");

        assert!(shell.errors().field("teamName").is_none());
        assert!(shell.errors().field("universityName").is_some());
    }

    #[test]
    fn edits_replace_the_submission_value() {
        let mut shell = shell(presets::CTF);
        let before = shell.submission().clone();

        set(&mut shell, "teamName", "Null Pointers");

        assert_eq!(before.field("teamName"), "");
        assert_eq!(shell.submission().field("teamName"), "Null Pointers");
    }

    #[test]
    fn unknown_field_is_refused() {
        let mut shell = shell(presets::CTF);
        let err = shell
            .apply(Edit::SetField {
                name: "favouriteColour".to_string(),
                value: "blue".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::UserError(UserError::NoSuchField(_, _))));
    }

    #[test]
    fn changing_category_clears_the_track() {
        let mut shell = shell(presets::GRADUATION_PROJECT);
        set(&mut shell, "projectCategory", "Information and Communications Technology");
        set(&mut shell, "projectTrack", "IoT");

        set(&mut shell, "projectCategory", "Power and Green Environment");

        assert_eq!(shell.submission().field("projectTrack"), "");
    }

    #[test]
    fn member_list_respects_the_policy_bounds() {
        let mut shell = shell(presets::HACKATHON);
        shell.apply(Edit::AddMember).unwrap();
        shell.apply(Edit::AddMember).unwrap();

        let err = shell.apply(Edit::AddMember).unwrap_err();
        assert!(matches!(err, Error::UserError(UserError::MemberLimitReached(2))));
        assert_eq!(shell.submission().members.len(), 2);

        let mut shell = self::shell(presets::GRADUATION_PROJECT);
        let err = shell.apply(Edit::RemoveMember(1)).unwrap_err();
        assert!(matches!(err, Error::UserError(UserError::MemberMinimumReached(2))));
    }

    #[test]
    fn removing_a_member_drops_positional_errors() {
        let mut shell = shell(presets::GRADUATION_PROJECT);
        shell.apply(Edit::AddMember).unwrap();
        shell.validate();
        assert!(!shell.errors().members().is_empty());

        shell.apply(Edit::RemoveMember(0)).unwrap();

        assert!(shell.errors().members().is_empty());
        assert_eq!(shell.submission().members.len(), 2);
    }

    #[test]
    fn slot_cap_spans_leader_and_members() {
        let mut shell = shell(presets::HACKATHON);
        shell.apply(Edit::AddMember).unwrap();
        shell.apply(Edit::AddMember).unwrap();
        let toggle = |role| Edit::TogglePerk {
            role,
            perk: Perk::Accommodation,
        };

        assert_eq!(shell.apply(toggle(Role::Leader)).unwrap(), EditOutcome::Applied);
        assert_eq!(shell.apply(toggle(Role::Member(0))).unwrap(), EditOutcome::Applied);
        assert_eq!(
            shell.apply(toggle(Role::Member(1))).unwrap(),
            EditOutcome::SlotCapReached {
                perk: Perk::Accommodation,
                cap: 2
            }
        );
        assert!(!shell.submission().members[1].accommodation);

        shell.apply(toggle(Role::Leader)).unwrap();
        shell.apply(toggle(Role::Member(1))).unwrap();
        assert!(!shell.submission().leader.as_ref().unwrap().accommodation);
        assert!(shell.submission().members[1].accommodation);
    }

    #[test]
    fn contact_leader_holds_no_perk_slot() {
        let mut shell = shell(presets::TECHNICAL_SUBMISSION);
        shell.apply(Edit::AddMember).unwrap();
        let toggle = |role| Edit::TogglePerk {
            role,
            perk: Perk::Accommodation,
        };

        let err = shell.apply(toggle(Role::Leader)).unwrap_err();
        assert!(matches!(
            err,
            Error::UserError(UserError::PerkNotOffered(Perk::Accommodation))
        ));
        assert_eq!(shell.apply(toggle(Role::Member(0))).unwrap(), EditOutcome::Applied);
        assert_eq!(shell.apply(toggle(Role::Member(1))).unwrap(), EditOutcome::Applied);
        assert_eq!(
            shell.apply(toggle(Role::Supervisor)).unwrap(),
            EditOutcome::SlotCapReached {
                perk: Perk::Accommodation,
                cap: 2
            }
        );
    }

    #[test]
    fn perks_a_form_does_not_offer_are_refused() {
        let mut shell = shell(presets::CTF);
        let err = shell
            .apply(Edit::TogglePerk {
                role: Role::Leader,
                perk: Perk::Lunch,
            })
            .unwrap_err();
        assert!(matches!(err, Error::UserError(UserError::PerkNotOffered(Perk::Lunch))));
    }

    #[tokio::test]
    async fn invalid_submit_keeps_values_and_errors() {
        let mut shell = shell(presets::CTF);
        set(&mut shell, "teamName", "Null Pointers");

        let outcome = shell.submit(&SimulatedSubmissionService::new(Duration::ZERO)).await;

        assert!(matches!(outcome, SubmitOutcome::Invalid(ref errors) if !errors.is_empty()));
        assert_eq!(shell.submission().field("teamName"), "Null Pointers");
        assert!(shell.errors().field("universityName").is_some());
        assert_eq!(shell.notice().map(|n| n.kind), Some(NoticeKind::Error));
        assert_eq!(shell.phase(), Phase::Editing);
    }

    #[tokio::test]
    async fn accepted_submit_resets_the_form() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut shell = filled_ctf().with_notifier(notifier.clone());

        let outcome = shell.submit(&SimulatedSubmissionService::new(Duration::ZERO)).await;

        assert!(matches!(outcome, SubmitOutcome::Accepted(ref ack) if ack.form_id == "ctf"));
        assert_eq!(shell.submission(), &shell.form().empty_submission());
        assert!(shell.errors().is_empty());
        assert_eq!(shell.phase(), Phase::Editing);
        assert_eq!(
            *notifier.kinds.lock().unwrap(),
            vec![NoticeKind::Loading, NoticeKind::Success]
        );

        shell.dismiss_notice();
        assert!(shell.notice().is_none());
    }

    #[tokio::test]
    async fn failed_submit_keeps_the_values() {
        let mut shell = filled_ctf();
        let before = shell.submission().clone();

        let outcome = shell.submit(&FailingService).await;

        assert!(matches!(
            outcome,
            SubmitOutcome::Failed(SubmissionError::RegistrationClosed)
        ));
        assert_eq!(shell.submission(), &before);
        assert_eq!(shell.phase(), Phase::Editing);
    }

    #[tokio::test]
    async fn cancelled_submit_commits_nothing() {
        let mut shell = filled_ctf();
        let before = shell.submission().clone();
        let slow = SimulatedSubmissionService::new(Duration::from_secs(60));

        let outcome = shell.submit_until(&slow, async {}).await;

        assert!(matches!(outcome, SubmitOutcome::Cancelled));
        assert_eq!(shell.submission(), &before);
        assert_eq!(shell.phase(), Phase::Editing);
        assert!(shell.notice().is_none());
    }

    #[tokio::test]
    async fn dropped_submit_returns_to_editing() {
        let mut shell = filled_ctf();
        let before = shell.submission().clone();
        let slow = SimulatedSubmissionService::new(Duration::from_secs(60));

        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), shell.submit(&slow)).await;

        assert!(timed_out.is_err());
        assert_eq!(shell.phase(), Phase::Editing);
        assert_eq!(shell.submission(), &before);
    }

    #[tokio::test]
    async fn pending_is_reported_while_the_service_works() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut shell = filled_ctf().with_notifier(notifier.clone());
        let service = PhaseCheckingService {
            notifier: notifier.clone(),
        };

        let outcome = shell.submit(&service).await;

        assert!(matches!(outcome, SubmitOutcome::Accepted(_)));
        assert_eq!(
            *notifier.phases.lock().unwrap(),
            vec![Phase::Pending, Phase::Submitted, Phase::Editing]
        );
    }

    #[tokio::test]
    async fn cancelled_submit_reports_pending_then_editing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut shell = filled_ctf().with_notifier(notifier.clone());
        let slow = SimulatedSubmissionService::new(Duration::from_secs(60));

        shell.submit_until(&slow, async {}).await;

        assert_eq!(
            *notifier.phases.lock().unwrap(),
            vec![Phase::Pending, Phase::Editing]
        );
    }
}
