//! Per-purpose processing consent and its downstream effects.
//!
//! The current state of a (subject, purpose) pair is a projection; its full
//! history lives in the audit log and is never overwritten.

use std::{convert::Infallible, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, subject::SubjectId};

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConsentState {
  #[default]
  Unset,
  Granted,
  Withdrawn,
}

/// How a requested state change applies to the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  /// The projection changes.
  Apply,
  /// Nothing changes, but the request is still recorded for audit purposes.
  Noop,
}

impl ConsentState {
  /// Allowed edges: `unset→granted`, `granted→withdrawn`, `withdrawn→granted`.
  /// Withdrawing a consent that was never granted, and repeating the current
  /// state, are no-ops. Nothing may return to `unset`.
  pub fn transition_to(self, next: Self) -> Result<Transition> {
    use ConsentState::*;
    match (self, next) {
      (_, Unset) => Err(Error::InvalidTransition { from: self, to: next }),
      (Unset, Granted) | (Granted, Withdrawn) | (Withdrawn, Granted) => {
        Ok(Transition::Apply)
      }
      (Unset, Withdrawn) | (Granted, Granted) | (Withdrawn, Withdrawn) => {
        Ok(Transition::Noop)
      }
    }
  }
}

// ─── Purpose ─────────────────────────────────────────────────────────────────

/// A named reason for processing a subject's data.
///
/// Purposes arrive as strings from callers; anything outside the known set is
/// kept as [`ConsentPurpose::Unrecognized`] so it can be recorded and reported
/// as a policy gap instead of silently mapping to nothing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConsentPurpose {
  AiProcessing,
  Marketing,
  Research,
  DataRetention,
  Unrecognized(String),
}

impl ConsentPurpose {
  pub fn parse(s: &str) -> Self {
    match s {
      "ai_processing" => Self::AiProcessing,
      "marketing" => Self::Marketing,
      "research" => Self::Research,
      "data_retention" => Self::DataRetention,
      other => Self::Unrecognized(other.to_owned()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::AiProcessing => "ai_processing",
      Self::Marketing => "marketing",
      Self::Research => "research",
      Self::DataRetention => "data_retention",
      Self::Unrecognized(s) => s,
    }
  }

  pub fn is_recognized(&self) -> bool { !matches!(self, Self::Unrecognized(_)) }

  /// The fixed list of downstream actions a change to `state` triggers.
  pub fn actions_for(&self, state: ConsentState) -> ActionPlan {
    use ConsentAction::*;
    use ConsentState::*;

    let actions: &'static [ConsentAction] = match (self, state) {
      (Self::Unrecognized(_), _) => return ActionPlan::PolicyGap,
      (_, Unset) => &[],

      (Self::AiProcessing, Withdrawn) => &[StopAiAnalysis, RetainExistingSummaries],
      (Self::Marketing, Withdrawn) => &[RemoveFromLists, StopPromotionalEmails],
      (Self::Research, Withdrawn) => &[ExcludeFromStudies, AnonymizeExistingData],
      (Self::DataRetention, Withdrawn) => &[ScheduleDeletion, NotifyLegalTeam],

      (Self::AiProcessing, Granted) => &[ResumeAiAnalysis],
      (Self::Marketing, Granted) => &[AddToLists],
      (Self::Research, Granted) => &[IncludeInStudies],
      (Self::DataRetention, Granted) => &[CancelScheduledDeletion],
    };
    ActionPlan::Actions(actions)
  }
}

impl fmt::Display for ConsentPurpose {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ConsentPurpose {
  type Err = Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Self::parse(s)) }
}

impl Serialize for ConsentPurpose {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for ConsentPurpose {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Ok(Self::parse(&s))
  }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// An instruction to a downstream actor (AI pipeline, mailing system,
/// research registry, deletion scheduler).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentAction {
  StopAiAnalysis,
  RetainExistingSummaries,
  RemoveFromLists,
  StopPromotionalEmails,
  ExcludeFromStudies,
  AnonymizeExistingData,
  ScheduleDeletion,
  NotifyLegalTeam,
  ResumeAiAnalysis,
  AddToLists,
  IncludeInStudies,
  CancelScheduledDeletion,
}

/// Result of mapping a purpose and state to actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPlan {
  Actions(&'static [ConsentAction]),
  /// The purpose has no mapping; nothing is triggered and the gap is reported.
  PolicyGap,
}

impl ActionPlan {
  pub fn actions(&self) -> &'static [ConsentAction] {
    match self {
      Self::Actions(actions) => actions,
      Self::PolicyGap => &[],
    }
  }
}

/// One action handed to a downstream actor. Delivery is at-least-once and the
/// receiver's responsibility; the engine only guarantees the intent was
/// recorded in audit event `event_id` first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedAction {
  pub subject_id: SubjectId,
  pub purpose:    ConsentPurpose,
  pub action:     ConsentAction,
  pub event_id:   Uuid,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// The current consent projection for one (subject, purpose) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
  pub subject_id:     SubjectId,
  pub purpose:        ConsentPurpose,
  pub state:          ConsentState,
  pub granted_at:     Option<DateTime<Utc>>,
  pub withdrawn_at:   Option<DateTime<Utc>>,
  /// Version of the privacy policy the subject was shown.
  pub policy_version: String,
  pub updated_at:     DateTime<Utc>,
}

impl ConsentRecord {
  /// The record as it exists the first time a subject/purpose is seen.
  pub fn unset(
    subject_id: SubjectId,
    purpose: ConsentPurpose,
    policy_version: impl Into<String>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      subject_id,
      purpose,
      state: ConsentState::Unset,
      granted_at: None,
      withdrawn_at: None,
      policy_version: policy_version.into(),
      updated_at: now,
    }
  }

  /// Apply an already-validated state change.
  pub fn apply(
    &self,
    state: ConsentState,
    policy_version: &str,
    at: DateTime<Utc>,
  ) -> Self {
    let mut next = self.clone();
    next.state = state;
    next.updated_at = at;
    next.policy_version = policy_version.to_owned();
    match state {
      ConsentState::Granted => next.granted_at = Some(at),
      ConsentState::Withdrawn => next.withdrawn_at = Some(at),
      ConsentState::Unset => {}
    }
    next
  }
}

/// One entry in a consent history, reconstructed from the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentTransition {
  pub purpose:        ConsentPurpose,
  pub from:           ConsentState,
  pub to:             ConsentState,
  pub noop:           bool,
  pub policy_version: String,
  pub actor:          String,
  pub at:             DateTime<Utc>,
}
