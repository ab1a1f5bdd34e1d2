use formlogic::{validate_submission, Form, Posted, PostedData};
use tracing_subscriber::EnvFilter;

const FORM: &str = r#"{
    "id": 3,
    "title": "Event registration",
    "fields": [
        {"id": 1, "type": "radio", "label": "Attending",
         "choices": [{"text": "Yes"}, {"text": "No"}]},
        {"id": 2, "type": "number", "label": "Guests", "isRequired": true,
         "conditionalLogic": {"actionType": "show", "logicType": "all",
                              "rules": [{"fieldId": 1, "operator": "is", "value": "Yes"}]}},
        {"id": 3, "type": "textarea", "label": "Dietary needs",
         "conditionalLogic": {"actionType": "show", "logicType": "all",
                              "rules": [{"fieldId": 2, "operator": ">", "value": "0"}]}},
        {"id": 4, "type": "text", "label": "Leave empty", "isHoneypot": true}
    ]
}"#;

fn post(pairs: &[(&str, &str)]) -> PostedData {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), Posted::from(*v)))
        .collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let form = Form::from_json(FORM).expect("failed to load form");
    println!("{form}");

    let submissions = [
        (
            "attending with guests",
            post(&[("input_1", "Yes"), ("input_2", "2"), ("input_3", "vegan")]),
        ),
        ("attending, guests missing", post(&[("input_1", "Yes")])),
        (
            "not attending, stale values",
            post(&[("input_1", "No"), ("input_2", "4"), ("input_3", "none")]),
        ),
        ("bot", post(&[("input_1", "No"), ("input_4", "http://spam")])),
    ];

    for (name, posted) in &submissions {
        let outcome = validate_submission(&form, posted);
        println!();
        println!("{name}:");
        println!("  {}", outcome.report);
        println!("  valid: {}, spam: {}", outcome.is_valid(), outcome.is_spam);
        println!("  missing required: {:?}", outcome.missing_required);
        println!("  accepted: {:?}", outcome.accepted);
    }
}
