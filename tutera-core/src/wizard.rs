//! Course-authoring wizard steps and their transition table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::TuteraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WizardStep {
    /// The course list; no wizard open.
    #[default]
    List,
    BasicInfo,
    Content,
    Setup,
}

impl WizardStep {
    pub fn index(self) -> u8 {
        match self {
            WizardStep::List => 0,
            WizardStep::BasicInfo => 1,
            WizardStep::Content => 2,
            WizardStep::Setup => 3,
        }
    }

    pub fn is_authoring(self) -> bool {
        self != WizardStep::List
    }
}

impl TryFrom<u8> for WizardStep {
    type Error = WizardError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            0 => Ok(WizardStep::List),
            1 => Ok(WizardStep::BasicInfo),
            2 => Ok(WizardStep::Content),
            3 => Ok(WizardStep::Setup),
            other => Err(WizardError::InvalidStep(other)),
        }
    }
}

impl From<WizardStep> for u8 {
    fn from(step: WizardStep) -> u8 {
        step.index()
    }
}

/// What the author did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "id", rename_all = "camelCase")]
pub enum WizardEvent {
    /// Start a brand-new course.
    Create,
    /// Open an existing course from the list for editing.
    Edit(String),
    Next,
    Back,
    PublishConfirmed,
    BackToList,
}

impl WizardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WizardEvent::Create => "create",
            WizardEvent::Edit(_) => "edit",
            WizardEvent::Next => "next",
            WizardEvent::Back => "back",
            WizardEvent::PublishConfirmed => "publishConfirmed",
            WizardEvent::BackToList => "backToList",
        }
    }
}

/// What the store must do to the draft alongside a step change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftEffect {
    None,
    /// Replace the draft with an empty one.
    Fresh,
    /// Replace the draft with the listed course of that id.
    LoadCourse,
    /// Upsert the draft as published, then clear it.
    Publish,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("wizard step {0} is out of range (0..=3)")]
    InvalidStep(u8),

    #[error("cannot {event} from step {from}")]
    InvalidTransition { from: u8, event: &'static str },
}

impl From<WizardError> for TuteraError {
    fn from(e: WizardError) -> Self {
        match e {
            WizardError::InvalidStep(_) => TuteraError::bad_request(e.to_string()),
            WizardError::InvalidTransition { .. } => TuteraError::conflict(e.to_string()),
        }
    }
}

/// The transition table.
pub fn transition(from: WizardStep, event: &WizardEvent) -> Result<(WizardStep, DraftEffect), WizardError> {
    use DraftEffect as E;
    use WizardEvent as Ev;
    use WizardStep::*;

    let next = match (from, event) {
        (List, Ev::Create) => (BasicInfo, E::Fresh),
        (List, Ev::Edit(_)) => (BasicInfo, E::LoadCourse),
        (BasicInfo, Ev::Next) => (Content, E::None),
        (Content, Ev::Next) => (Setup, E::None),
        (Content, Ev::Back) => (BasicInfo, E::None),
        (Setup, Ev::Back) => (Content, E::None),
        (Setup, Ev::PublishConfirmed) => (List, E::Publish),
        (_, Ev::BackToList) => (List, E::None),
        (from, event) => {
            return Err(WizardError::InvalidTransition {
                from: from.index(),
                event: event.name(),
            })
        }
    };
    Ok(next)
}
