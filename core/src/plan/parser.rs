//! Plan text parser.
//!
//! Recovery runs as an ordered fallback chain; a stage only runs when the
//! previous one failed to produce a parseable plan, and each stage works on
//! the text the previous stage left behind:
//!
//! ```text
//! raw text
//!   ↓ direct parse
//!   ↓ extract first balanced {...} / [...] (only if text does not open with one)
//!   ↓ truncate around the outermost structure (repair_balance)
//!   ↓ strip control characters + trailing commas
//!   ↓ escape raw \n \r \t inside string literals
//!   ↓
//! Vec<StepDescriptor> | PlanParseError
//! ```

use tracing::debug;

use crate::error::PlanParseError;

use super::sanitize::{
    escape_controls_in_strings, extract_balanced, needs_extraction, repair_balance,
    strip_control_and_trailing_commas,
};
use super::types::{PlanDocument, StepDescriptor};

/// Parses model output into step descriptors, recovering from common
/// malformations. Does not validate dependencies; see `executor::graph`.
pub fn parse_plan(raw: &str) -> Result<Vec<StepDescriptor>, PlanParseError> {
    let mut last_err = match try_parse(raw) {
        Ok(steps) => return Ok(steps),
        Err(e) => e,
    };
    let mut current = raw.to_string();

    if needs_extraction(raw) {
        if let Some(span) = extract_balanced(raw) {
            current = span.to_string();
            match try_parse(&current) {
                Ok(steps) => return recovered("extract", steps),
                Err(e) => last_err = e,
            }
        }
    }

    let stages: [(&str, fn(&str) -> String); 3] = [
        ("repair_balance", repair_balance),
        ("strip_control", strip_control_and_trailing_commas),
        ("escape_strings", escape_controls_in_strings),
    ];

    for (name, stage) in stages {
        let next = stage(&current);
        if next == current {
            continue;
        }
        current = next;
        match try_parse(&current) {
            Ok(steps) => return recovered(name, steps),
            Err(e) => last_err = e,
        }
    }

    debug!(bytes = raw.len(), error = %last_err, "plan text unrecoverable");
    Err(PlanParseError::new(raw, current, last_err))
}

fn try_parse(text: &str) -> Result<Vec<StepDescriptor>, serde_json::Error> {
    serde_json::from_str::<PlanDocument>(text).map(PlanDocument::into_steps)
}

fn recovered(
    stage: &'static str,
    steps: Vec<StepDescriptor>,
) -> Result<Vec<StepDescriptor>, PlanParseError> {
    debug!(stage, steps = steps.len(), "plan text recovered");
    Ok(steps)
}
