//! Server-side mirror: rebuilds a snapshot from posted data and validates it.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::evaluate::evaluate_form;
use crate::types::{
    decode_posted, input_name, EvaluationReport, FieldId, FieldKind, Form, InputState, PostedData,
    Snapshot,
};

/// Field values reconstructed from a form post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    values: BTreeMap<FieldId, InputState>,
}

impl Submission {
    /// Read every field of `form` out of `posted`. Inputs the browser did
    /// not send (disabled or unchecked) come back empty.
    #[must_use]
    pub fn from_posted(form: &Form, posted: &PostedData) -> Self {
        let values = form
            .fields()
            .iter()
            .filter_map(|field| {
                let shape = form.default_state(field.id)?;
                let radio = matches!(field.kind, FieldKind::Radio { .. });
                Some((
                    field.id,
                    decode_posted(shape, radio, &input_name(field.id), posted),
                ))
            })
            .collect();
        Self { values }
    }

    #[must_use]
    pub fn value(&self, field: FieldId) -> Option<&InputState> {
        self.values.get(&field)
    }

    /// Overwrite computed fields with `computed`, returning whether any
    /// value differed from what was posted.
    fn apply_computed(&mut self, computed: &BTreeMap<FieldId, String>) -> bool {
        let mut changed = false;
        for (id, text) in computed {
            let value = InputState::Text(text.clone());
            if self.values.get(id) != Some(&value) {
                self.values.insert(*id, value);
                changed = true;
            }
        }
        changed
    }
}

impl Snapshot for Submission {
    fn input(&self, field: FieldId) -> Option<&InputState> {
        self.values.get(&field)
    }
}

/// Result of validating a posted form.
#[derive(Debug, Clone)]
#[must_use]
pub struct SubmissionOutcome {
    pub report: EvaluationReport,
    /// Required fields that are visible but blank, in form order.
    pub missing_required: Vec<FieldId>,
    /// The honeypot field was filled in.
    pub is_spam: bool,
    /// Values of visible fields. Computed fields carry the server's result.
    pub accepted: BTreeMap<FieldId, InputState>,
}

impl SubmissionOutcome {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_spam && self.missing_required.is_empty()
    }
}

/// Evaluate a posted form authoritatively.
///
/// Visibility is decided from scratch on the posted values. Hidden fields are
/// dropped from the accepted values even when the client sent them, and
/// required fields are only enforced while visible. Computed fields never
/// take the posted value: they are recalculated and fed back into the rules
/// until nothing changes.
pub fn validate_submission(form: &Form, posted: &PostedData) -> SubmissionOutcome {
    validate_submission_with_config(form, posted, &EngineConfig::default())
}

/// [`validate_submission`] with the cascade bounded by
/// `config.max_cascade_depth` instead of the default.
pub fn validate_submission_with_config(
    form: &Form,
    posted: &PostedData,
    config: &EngineConfig,
) -> SubmissionOutcome {
    let mut submission = Submission::from_posted(form, posted);
    let mut depth = 0;
    let report = loop {
        let report = evaluate_form(form, &submission);
        let computed = crate::calc::recalculate(form, &submission, report.state());
        if !submission.apply_computed(&computed) {
            break report;
        }
        if depth >= config.max_cascade_depth {
            warn!(
                form = form.definition().id,
                depth, "recalculation keeps changing values; cascade stopped"
            );
            break report;
        }
        depth += 1;
    };

    let is_spam = form
        .honeypot()
        .and_then(|f| submission.value(f.id))
        .is_some_and(|v| !v.is_blank());
    if is_spam {
        warn!(form = form.definition().id, "honeypot field filled in");
    }

    let mut missing_required = Vec::new();
    let mut accepted = BTreeMap::new();
    for field in form.fields() {
        if field.is_honeypot || report.is_field_hidden(field.id) {
            continue;
        }
        let Some(value) = submission.value(field.id).cloned() else {
            continue;
        };
        if field.is_required && value.is_blank() {
            missing_required.push(field.id);
        }
        accepted.insert(field.id, value);
    }

    debug!(
        form = form.definition().id,
        hidden = report.hidden().len(),
        missing = missing_required.len(),
        spam = is_spam,
        cascade = depth,
        "validated submission"
    );

    SubmissionOutcome {
        report,
        missing_required,
        is_spam,
        accepted,
    }
}
