use calmform::form::{FieldLens, FormModel};

#[derive(Clone, calmform::form::FormModel)]
struct DemoForm {
    email: String,
    accepted_terms: bool,
}

fn main() {
    let fields = DemoForm::fields();
    let lens = fields.email();
    let mut model = DemoForm {
        email: "a@calm.ui".to_string(),
        accepted_terms: false,
    };
    lens.set(&mut model, "b@calm.ui".to_string());
    assert_eq!(lens.key().as_str(), "email");
    assert_eq!(lens.get(&model), "b@calm.ui");
    assert_eq!(fields.accepted_terms().key().as_str(), "accepted_terms");

    let values = model.into_values();
    let restored = DemoForm::from_values(&values).expect("round trip");
    assert_eq!(restored.email, "b@calm.ui");
    assert!(!restored.accepted_terms);
}
