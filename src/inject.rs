/// Manual-save variant: one save control per extracted post
use log::{debug, warn};

use crate::extract::Extractor;
use crate::node::PostNode;
use crate::record::Record;

/// Attribute stamped on a candidate once it has a control.
pub const MARKER_ATTR: &str = "data-postlist";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    Pending,
    Saved,
    Duplicate,
}

impl MarkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerState::Pending => "pending",
            MarkerState::Saved => "saved",
            MarkerState::Duplicate => "duplicate",
        }
    }

    pub fn parse(value: &str) -> Option<MarkerState> {
        match value {
            "pending" => Some(MarkerState::Pending),
            "saved" => Some(MarkerState::Saved),
            "duplicate" => Some(MarkerState::Duplicate),
            _ => None,
        }
    }
}

/// What happened when the user pressed a save control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    AlreadySaved,
}

impl SaveOutcome {
    /// Label shown on the control once it is disabled.
    pub fn label(&self) -> &'static str {
        match self {
            SaveOutcome::Saved => "Saved!",
            SaveOutcome::AlreadySaved => "Already saved",
        }
    }
}

/// A candidate that just got marked and still needs its control attached
#[derive(Debug, Clone)]
pub struct PendingControl<N> {
    pub node: N,
    pub record: Record,
}

#[derive(Debug, Clone, Default)]
pub struct Injector;

impl Injector {
    pub fn new() -> Self {
        Injector
    }

    pub fn state<N: PostNode>(&self, node: &N) -> Option<MarkerState> {
        node.attr(MARKER_ATTR).and_then(|v| MarkerState::parse(&v))
    }

    /// Mark every unmarked candidate that extracts cleanly and hand it back
    /// for a control. Candidates that fail extraction stay unmarked so a
    /// later scan can retry once their content has loaded.
    pub fn scan<N: PostNode>(&self, candidates: Vec<N>, extractor: &Extractor) -> Vec<PendingControl<N>> {
        let mut pending = Vec::new();

        for node in candidates {
            if node.attr(MARKER_ATTR).is_some() {
                continue;
            }
            let Some(record) = extractor.extract(&node) else {
                continue;
            };
            if !node.set_attr(MARKER_ATTR, MarkerState::Pending.as_str()) {
                warn!("could not mark candidate; skipping control");
                continue;
            }
            debug!("save control pending for post by {}", record.author);
            pending.push(PendingControl { node, record });
        }

        pending
    }

    /// Record the final state of a control after activation.
    pub fn complete<N: PostNode>(&self, node: &N, outcome: SaveOutcome) -> MarkerState {
        let state = match outcome {
            SaveOutcome::Saved => MarkerState::Saved,
            SaveOutcome::AlreadySaved => MarkerState::Duplicate,
        };
        node.set_attr(MARKER_ATTR, state.as_str());
        state
    }
}
