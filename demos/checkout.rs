use std::sync::Arc;
use std::time::{Duration, Instant};

use formlogic::{
    field, Choice, Effect, EngineConfig, Field, FieldKind, FormBuilder, FormSession, InputState,
    Recalculation, Renderer, RuleGroup, Transition,
};
use tracing_subscriber::EnvFilter;

/// Prints every effect and pretends each animated one takes a while.
struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn apply(&mut self, effect: &Effect) -> Transition {
        println!(
            "  {} -> {}{}",
            effect.target,
            effect.visibility,
            if effect.animate { " (animated)" } else { "" }
        );
        if effect.animate {
            Transition::Animating
        } else {
            Transition::Done
        }
    }

    fn value_reset(&mut self, field: u32, state: &InputState) {
        println!("  field {field} reset to {state:?}");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let form = FormBuilder::new()
        .title("Checkout")
        .field(Field::radio(1, ["Pickup", "Delivery"]).labeled("Shipping"))
        .field(
            Field::section(2)
                .labeled("Delivery details")
                .logic(RuleGroup::show_if_all([field(1).is("Delivery")])),
        )
        .field(Field::text(3).labeled("Address").required())
        .field(Field::new(
            4,
            FieldKind::Product {
                base_price: None,
                choices: vec![
                    Choice::new("Express").priced("$12.50"),
                    Choice::new("Standard").priced("$4.00").selected(),
                ],
            },
        ))
        .field(Field::new(5, FieldKind::Product {
            base_price: Some("$20.00".to_owned()),
            choices: Vec::new(),
        }))
        .field(Field::new(6, FieldKind::Quantity { product_id: 5 }).default_value("1"))
        .field(Field::new(7, FieldKind::Total).labeled("Total"))
        .compile()
        .expect("failed to compile form");

    println!("{form}");

    let mut session = FormSession::new(Arc::new(form), EngineConfig::default(), ConsoleRenderer);
    session.add_listener(|r: &Recalculation| {
        for (id, value) in &r.changed {
            println!("  computed field {id} = {value}");
        }
    });

    let t0 = Instant::now();
    println!("init:");
    session.init(t0);

    println!("choose delivery:");
    session.live_mut().select(1, "Delivery");
    session.trigger([1], t0);
    for target in session.pending_batch().map(|b| b.changed().to_vec()).unwrap_or_default() {
        session.transition_finished(target, t0 + Duration::from_millis(200));
    }
    session.tick(t0 + Duration::from_millis(250));

    println!("order three:");
    session.keystroke(6, "3", t0 + Duration::from_millis(300));
    session.tick(t0 + Duration::from_millis(600));
    session.tick(t0 + Duration::from_millis(650));

    println!("posted: {:?}", session.live().to_posted());
}
