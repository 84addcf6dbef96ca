use futures::executor::block_on;

use crate::form::{FieldLens as _, FormModel as _};

#[derive(Clone, Debug, PartialEq, crate::form::FormModel)]
struct Signup {
    email: String,
    age: u8,
}

#[test]
fn prelude_exposes_control_surface() {
    use crate::prelude::*;

    let control = FormControl::<FieldKey>::new(FormOptions::default());
    let model = Signup {
        email: String::new(),
        age: 30,
    };
    let fields = Signup::fields();
    let email = control
        .register_lens(&model, fields.email(), |option| {
            option.validator(NotEmptyValidator::new().error_message("email is required"))
        })
        .expect("register email");
    control
        .register_lens(&model, fields.age(), |option| {
            option.validator(RangeValidator::new(18..=120))
        })
        .expect("register age");

    let is_valid = block_on(control.trigger([], false)).expect("trigger");
    assert!(!is_valid);
    assert_eq!(
        control.snapshot_field_state(email.name()).error,
        vec!["email is required".to_string()]
    );

    block_on(email.set("a@calm.ui".to_string())).expect("set email");
    assert!(block_on(control.trigger([], false)).expect("trigger"));
    assert_eq!(
        control.model::<Signup>().expect("read model"),
        Some(Signup {
            email: "a@calm.ui".to_string(),
            age: 30,
        })
    );
}

#[test]
fn derived_values_round_trip_through_the_model() {
    let model = Signup {
        email: "x@y.z".to_string(),
        age: 41,
    };
    let values = model.clone().into_values();
    assert_eq!(values.len(), 2);
    assert_eq!(Signup::from_values(&values), Some(model));

    let mut wrong_type = values;
    wrong_type.insert(
        Signup::fields().age().key(),
        crate::form::FieldValue::new(41_u32),
    );
    assert_eq!(Signup::from_values(&wrong_type), None);
}
