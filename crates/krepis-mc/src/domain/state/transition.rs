//! Transitions and the trail
//!
//! A transition is the maximal run of one thread between two decision
//! points. Once appended to the trail it is immutable; the trail is the
//! ordered list of transitions from the initial state to the current one.

use super::StateId;
use crate::domain::choice::{ChoiceGenerator, ChoiceValue};
use crate::domain::error::InternalError;
use crate::domain::threads::ThreadId;
use serde::Serialize;
use std::sync::Arc;

/// Raw choice indices per transition, outermost generator first
///
/// Indices are unpermuted, so a trace recorded under one randomization
/// seed replays under any other.
pub type ChoiceTrace = Vec<Vec<usize>>;

/// What one generator decided
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceRecord {
    /// Generator id
    pub id: String,
    /// Selected value
    pub value: ChoiceValue,
    /// Raw index of the selected value
    pub index: usize,
    /// Number of values the generator offered
    pub total: usize,
    /// Whether the generator decided which thread runs
    pub scheduling: bool,
}

impl ChoiceRecord {
    /// Capture the current decision of `cg`
    pub fn capture(cg: &ChoiceGenerator) -> Result<Self, InternalError> {
        Ok(Self {
            id: cg.id().to_string(),
            value: cg.current_choice()?,
            index: cg
                .current_raw_index()
                .ok_or_else(|| InternalError::NoCurrentChoice(cg.id().to_string()))?,
            total: cg.total_number_of_choices(),
            scheduling: cg.is_scheduling_point(),
        })
    }
}

/// One executed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Executing thread
    pub thread: ThreadId,
    /// Program counter before execution
    pub pc: usize,
}

/// A completed transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    /// Thread that ran
    pub thread: ThreadId,
    /// Decisions that selected this transition
    pub choices: Vec<ChoiceRecord>,
    /// Single-choice decisions folded in while running
    pub folded: Vec<ChoiceRecord>,
    /// Executed instructions
    pub steps: Vec<Step>,
    /// Output produced by the program
    pub output: String,
    /// Uncaught program exception that ended this path
    pub fault: Option<String>,
    /// State reached at the end of the transition
    pub state_id: Option<StateId>,
}

impl Transition {
    /// Number of executed instructions
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Whether no instruction executed
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Raw indices of the selecting decisions
    pub fn raw_indices(&self) -> Vec<usize> {
        self.choices.iter().map(|c| c.index).collect()
    }
}

/// Ordered transitions from the initial state
#[derive(Debug, Clone, Default)]
pub struct Trail {
    transitions: Vec<Arc<Transition>>,
}

impl Trail {
    /// Empty trail
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished transition
    pub fn push(&mut self, transition: Transition) {
        self.transitions.push(Arc::new(transition));
    }

    /// Drop transitions beyond `len`
    pub fn truncate(&mut self, len: usize) {
        self.transitions.truncate(len);
    }

    /// Number of transitions
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Whether no transition was executed
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Most recent transition
    pub fn last(&self) -> Option<&Transition> {
        self.transitions.last().map(Arc::as_ref)
    }

    /// Transitions in execution order
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().map(Arc::as_ref)
    }

    /// Owned copy for reports
    pub fn to_vec(&self) -> Vec<Transition> {
        self.iter().cloned().collect()
    }

    /// Trace that `Explorer::replay` accepts
    pub fn choice_trace(&self) -> ChoiceTrace {
        self.iter().map(Transition::raw_indices).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(indices: &[usize]) -> Transition {
        Transition {
            thread: ThreadId(0),
            choices: indices
                .iter()
                .map(|&i| ChoiceRecord {
                    id: "x".into(),
                    value: ChoiceValue::Int(i as i64),
                    index: i,
                    total: 3,
                    scheduling: false,
                })
                .collect(),
            folded: Vec::new(),
            steps: Vec::new(),
            output: String::new(),
            fault: None,
            state_id: None,
        }
    }

    #[test]
    fn test_choice_trace() {
        let mut trail = Trail::new();
        trail.push(transition(&[0]));
        trail.push(transition(&[2, 1]));
        assert_eq!(trail.choice_trace(), vec![vec![0], vec![2, 1]]);

        trail.truncate(1);
        assert_eq!(trail.len(), 1);
        assert!(trail.last().unwrap().is_empty());
    }

    #[test]
    fn test_capture_requires_started_generator() {
        let mut cg = ChoiceGenerator::int_interval("i", 5, 6, 1);
        assert!(ChoiceRecord::capture(&cg).is_err());
        cg.advance();
        let record = ChoiceRecord::capture(&cg).unwrap();
        assert_eq!(record.value, ChoiceValue::Int(5));
        assert_eq!((record.index, record.total), (0, 2));
    }
}
