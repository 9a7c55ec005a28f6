//! Limited-slot perks: at most `cap` participants of one team may hold a
//! given perk at the same time. Every perk keeps its own count.

use serde_derive::Serialize;

use crate::errors::UserError;
use crate::models::{Participant, Perk};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotOutcome {
    /// The flag went from unset to set.
    Selected,
    /// The flag went from set to unset. Always allowed.
    Released,
    /// Every slot is taken; nothing changed.
    CapReached,
}

impl SlotOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, SlotOutcome::CapReached)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitedSlotSelector {
    cap: usize,
}

impl Default for LimitedSlotSelector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAP)
    }
}

impl LimitedSlotSelector {
    pub const DEFAULT_CAP: usize = 2;

    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn count(&self, participants: &[Participant], perk: Perk) -> usize {
        participants.iter().filter(|p| p.has(perk)).count()
    }

    pub fn has_free_slot(&self, participants: &[Participant], perk: Perk) -> bool {
        self.count(participants, perk) < self.cap
    }

    /// Flips `perk` on the participant at `index` and returns the resulting team.
    ///
    /// Unsetting is always allowed. Setting is allowed only while fewer than
    /// `cap` participants hold the perk; past that the team comes back
    /// unchanged with [`SlotOutcome::CapReached`].
    pub fn toggle(
        &self,
        participants: &[Participant],
        index: usize,
        perk: Perk,
    ) -> Result<(Vec<Participant>, SlotOutcome), UserError> {
        let target = participants.get(index).ok_or(UserError::NoSuchMember(index))?;

        let outcome = if target.has(perk) {
            SlotOutcome::Released
        } else if self.has_free_slot(participants, perk) {
            SlotOutcome::Selected
        } else {
            tracing::debug!(%perk, cap = self.cap, "slot cap reached, toggle ignored");
            return Ok((participants.to_vec(), SlotOutcome::CapReached));
        };

        let mut next = participants.to_vec();
        next[index].flip(perk);
        Ok((next, outcome))
    }
}
