//! Event-driven client session: re-evaluates the dependents of changed
//! fields, applies the decisions and recalculates computed fields once
//! everything has settled.

mod batch;
mod debounce;
mod effector;
mod live;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

pub use batch::Batch;
pub use debounce::Debouncer;
pub use effector::{Effect, NullRenderer, Renderer, Transition};
pub use live::LiveForm;

use crate::config::EngineConfig;
use crate::evaluate::{decide, EvaluationState};
use crate::types::{FieldId, Form, InputState, TargetId, Visibility};

/// What one recalculation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recalculation {
    /// Computed fields whose value changed, with their new value.
    pub changed: BTreeMap<FieldId, String>,
    /// How many recalculations in a row have fed back into conditional logic.
    pub cascade_depth: u32,
}

/// Notified once per recalculation.
pub trait RecalcListener {
    fn recalculated(&mut self, recalc: &Recalculation);
}

impl<F: FnMut(&Recalculation)> RecalcListener for F {
    fn recalculated(&mut self, recalc: &Recalculation) {
        self(recalc);
    }
}

/// A form being filled in.
///
/// All timing is driven by the caller: every entry point takes `now`, and
/// [`tick`](Self::tick) runs whatever debounced work has come due.
pub struct FormSession<R: Renderer> {
    form: Arc<Form>,
    config: EngineConfig,
    live: LiveForm,
    state: EvaluationState,
    renderer: R,
    listeners: Vec<Box<dyn RecalcListener>>,
    batch: Option<Batch>,
    keystrokes: Debouncer<FieldId>,
    recalc_due: Option<Instant>,
    cascade_depth: u32,
}

impl<R: Renderer> FormSession<R> {
    #[must_use]
    pub fn new(form: Arc<Form>, config: EngineConfig, renderer: R) -> Self {
        let live = LiveForm::new(&form);
        let keystrokes = Debouncer::new(config.keystroke_debounce());
        Self {
            form,
            config,
            live,
            state: EvaluationState::new(),
            renderer,
            listeners: Vec::new(),
            batch: None,
            keystrokes,
            recalc_due: None,
            cascade_depth: 0,
        }
    }

    pub fn add_listener(&mut self, listener: impl RecalcListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Evaluate every target once without animation, then recalculate
    /// immediately.
    pub fn init(&mut self, now: Instant) {
        self.cascade_depth = 0;
        let all = self.form.evaluation_order().to_vec();
        self.run(all, true, now);
    }

    /// A committed change (select, radio, checkbox, blur). Evaluated at once.
    pub fn change(&mut self, field: FieldId, state: InputState, now: Instant) {
        self.keystrokes.cancel(field);
        self.live.set(field, state);
        self.trigger([field], now);
    }

    /// Typing in a text input. Evaluation waits until the field has been
    /// quiet for the keystroke debounce.
    pub fn keystroke(&mut self, field: FieldId, text: impl Into<String>, now: Instant) {
        self.live.set_text(field, text);
        self.keystrokes.schedule(field, now);
    }

    /// Re-evaluate after changes made directly through [`live_mut`](Self::live_mut).
    pub fn trigger(&mut self, fields: impl IntoIterator<Item = FieldId>, now: Instant) {
        self.cascade_depth = 0;
        let targets = self.form.affected_by(fields);
        self.run(targets, false, now);
    }

    /// Run debounced keystroke batches and any recalculation that has come due.
    pub fn tick(&mut self, now: Instant) {
        let typed = self.keystrokes.take_due(now);
        if !typed.is_empty() {
            self.trigger(typed, now);
        }
        let recalc_ready = self.recalc_due.is_some_and(|due| due <= now);
        if recalc_ready && self.batch.is_none() {
            self.recalculate(false, now);
        }
    }

    /// The renderer finished animating `target`.
    pub fn transition_finished(&mut self, target: TargetId, now: Instant) {
        let settled = match self.batch.as_mut() {
            Some(batch) => batch.finish_transition(target) && batch.is_settled(),
            None => false,
        };
        if settled {
            self.settle(now);
        }
    }

    /// Process targets in rank order. Each target is decided at most once;
    /// a changed decision is applied and pulls in the targets that read or
    /// sit inside it.
    fn run(&mut self, targets: Vec<TargetId>, init: bool, now: Instant) {
        let form = Arc::clone(&self.form);
        let graph = form.graph();
        let animate = self.config.animate && !init;
        let mut batch = self.batch.take().unwrap_or_else(|| Batch::new(init));

        let mut worklist: BTreeSet<(usize, TargetId)> = targets
            .into_iter()
            .filter_map(|t| graph.rank(t).map(|rank| (rank, t)))
            .collect();
        let mut visited: BTreeSet<TargetId> = BTreeSet::new();

        while let Some((_, target)) = worklist.pop_first() {
            if !visited.insert(target) {
                continue;
            }
            let previous = self.state.get(target);
            let visibility = decide(&form, target, &self.live, &self.state);
            if previous == Some(visibility) {
                continue;
            }
            trace!(%target, %visibility, "decision changed");
            self.state.set(target, visibility);
            let transition = effector::apply(
                &form,
                &mut self.live,
                &mut self.renderer,
                target,
                previous,
                visibility,
                animate,
            );
            batch.record(target);
            if transition == Transition::Animating {
                batch.start_transition(target);
            }
            for follower in graph.followers(target) {
                if !visited.contains(&follower) {
                    if let Some(rank) = graph.rank(follower) {
                        worklist.insert((rank, follower));
                    }
                }
            }
        }

        debug!(
            changed = batch.changed().len(),
            pending = batch.pending(),
            init = batch.is_init(),
            "batch evaluated"
        );
        let settled = batch.is_settled();
        self.batch = Some(batch);
        if settled {
            self.settle(now);
        }
    }

    fn settle(&mut self, now: Instant) {
        let Some(batch) = self.batch.take() else {
            return;
        };
        // A cascade that changed no decision left every input as it was.
        if self.cascade_depth > 0 && batch.changed().is_empty() {
            self.cascade_depth = 0;
            return;
        }
        if batch.is_init() {
            self.recalculate(true, now);
        } else {
            self.recalc_due = Some(now + self.config.recalc_debounce());
        }
    }

    fn recalculate(&mut self, init: bool, now: Instant) {
        self.recalc_due = None;
        let form = Arc::clone(&self.form);
        let changed: BTreeMap<FieldId, String> =
            crate::calc::recalculate(&form, &self.live, &self.state)
                .into_iter()
                .filter(|(id, value)| {
                    !matches!(
                        self.live.value(*id),
                        Some(InputState::Text(current)) if current == value
                    )
                })
                .collect();
        for (id, value) in &changed {
            self.live.set_text(*id, value.clone());
        }

        let recalc = Recalculation {
            changed,
            cascade_depth: self.cascade_depth,
        };
        debug!(changed = recalc.changed.len(), depth = recalc.cascade_depth, "recalculated");
        for listener in &mut self.listeners {
            listener.recalculated(&recalc);
        }

        if recalc.changed.is_empty() {
            self.cascade_depth = 0;
            return;
        }
        if self.cascade_depth >= self.config.max_cascade_depth {
            warn!(
                depth = self.cascade_depth,
                "recalculation keeps changing values; cascade stopped"
            );
            self.cascade_depth = 0;
            return;
        }
        self.cascade_depth += 1;
        let targets = self.form.affected_by(recalc.changed.keys().copied());
        self.run(targets, init, now);
    }

    #[must_use]
    pub fn form(&self) -> &Form {
        &self.form
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn live(&self) -> &LiveForm {
        &self.live
    }

    /// Mutable access to the live inputs. Follow up with
    /// [`trigger`](Self::trigger) so dependents are re-evaluated.
    pub fn live_mut(&mut self) -> &mut LiveForm {
        &mut self.live
    }

    #[must_use]
    pub fn state(&self) -> &EvaluationState {
        &self.state
    }

    #[must_use]
    pub fn visibility(&self, target: TargetId) -> Option<Visibility> {
        self.state.get(target)
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// The batch still waiting on animated transitions, if any.
    #[must_use]
    pub fn pending_batch(&self) -> Option<&Batch> {
        self.batch.as_ref()
    }

    /// When [`tick`](Self::tick) next has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.keystrokes.next_deadline(), self.recalc_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
