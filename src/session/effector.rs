use tracing::trace;

use crate::types::{FieldId, Form, InputState, TargetId, Visibility};

use super::live::LiveForm;

/// One applied visibility change, handed to the [`Renderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub target: TargetId,
    pub visibility: Visibility,
    pub animate: bool,
}

/// Whether the renderer finished a transition synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Done,
    /// The renderer will report completion through
    /// [`FormSession::transition_finished`](super::FormSession::transition_finished).
    Animating,
}

/// The presentation layer a session drives.
pub trait Renderer {
    fn apply(&mut self, effect: &Effect) -> Transition;

    /// Called after a hidden field's value was reset to its default.
    fn value_reset(&mut self, _field: FieldId, _state: &InputState) {}
}

/// Renderer that does nothing and never animates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn apply(&mut self, _effect: &Effect) -> Transition {
        Transition::Done
    }
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn apply(&mut self, effect: &Effect) -> Transition {
        (**self).apply(effect)
    }

    fn value_reset(&mut self, field: FieldId, state: &InputState) {
        (**self).value_reset(field, state);
    }
}

/// Bring the live form in line with a new decision and hand the effect to
/// the renderer.
///
/// Hiding captures the display style, disables the field's inputs and, unless
/// the target was already hidden, resets its value to the default. Showing
/// enables the inputs and restores the captured style.
pub(crate) fn apply<R: Renderer + ?Sized>(
    form: &Form,
    live: &mut LiveForm,
    renderer: &mut R,
    target: TargetId,
    previous: Option<Visibility>,
    visibility: Visibility,
    animate: bool,
) -> Transition {
    let field = target.field_id();
    match visibility {
        Visibility::Hidden => {
            live.capture_display(target);
            if let Some(id) = field {
                live.set_disabled(id, true);
                if previous != Some(Visibility::Hidden) {
                    if let Some(default) = form.default_state(id) {
                        if live.reset(id, default) {
                            trace!(field = id, "reset to default");
                            renderer.value_reset(id, default);
                        }
                    }
                }
            }
        }
        Visibility::Shown => {
            if let Some(id) = field {
                live.set_disabled(id, false);
            }
            live.restore_display(target);
        }
    }
    renderer.apply(&Effect {
        target,
        visibility,
        animate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, FormBuilder};

    #[derive(Default)]
    struct Recorder {
        effects: Vec<Effect>,
        resets: Vec<FieldId>,
    }

    impl Renderer for Recorder {
        fn apply(&mut self, effect: &Effect) -> Transition {
            self.effects.push(effect.clone());
            Transition::Done
        }

        fn value_reset(&mut self, field: FieldId, _state: &InputState) {
            self.resets.push(field);
        }
    }

    #[test]
    fn hide_resets_and_disables() {
        let form = FormBuilder::new()
            .field(Field::text(1).default_value("foo"))
            .compile()
            .unwrap();
        let mut live = LiveForm::new(&form);
        live.set_text(1, "typed");
        let mut renderer = Recorder::default();
        let target = TargetId::Field(1);

        let shown = Some(Visibility::Shown);
        apply(&form, &mut live, &mut renderer, target, shown, Visibility::Hidden, true);
        assert_eq!(live.value(1), Some(&InputState::Text("foo".into())));
        assert!(live.is_disabled(1));
        assert_eq!(live.display(target), "none");
        assert_eq!(renderer.resets, vec![1]);
        assert!(renderer.effects[0].animate);

        let hidden = Some(Visibility::Hidden);
        apply(&form, &mut live, &mut renderer, target, hidden, Visibility::Shown, false);
        assert!(!live.is_disabled(1));
        assert_eq!(live.display(target), "");
    }

    #[test]
    fn already_hidden_target_is_not_reset() {
        let form = FormBuilder::new()
            .field(Field::text(1).default_value("foo"))
            .compile()
            .unwrap();
        let mut live = LiveForm::new(&form);
        live.set_text(1, "typed");
        let mut renderer = Recorder::default();
        let target = TargetId::Field(1);
        let hidden = Some(Visibility::Hidden);
        apply(&form, &mut live, &mut renderer, target, hidden, Visibility::Hidden, false);
        assert_eq!(live.value(1), Some(&InputState::Text("typed".into())));
        assert!(renderer.resets.is_empty());
    }

    #[test]
    fn unknown_previous_state_resets() {
        let form = FormBuilder::new()
            .field(Field::text(1).default_value("foo"))
            .compile()
            .unwrap();
        let mut live = LiveForm::new(&form);
        live.set_text(1, "prefilled");
        let mut renderer = Recorder::default();
        apply(&form, &mut live, &mut renderer, TargetId::Field(1), None, Visibility::Hidden, false);
        assert_eq!(live.value(1), Some(&InputState::Text("foo".into())));
    }
}
