mod controller;
mod field;
mod model;
mod slot;
mod state;
mod validation;
mod validator;
mod validators;
mod value;


pub use calmform_derive::FormModel;
pub use controller::{
    FocusHandler, FormControl, FormError, FormOptions, FormResult, ResetFieldOptions,
    ResetOptions, Resolver, ResolverContext, ResolverResult, SetValueOptions, ValidationMode,
};
pub use field::{FieldAccessor, RegisterOption, UnregisterOptions};
pub use model::{FieldLens, FormModel};
pub use slot::{FormStateSlot, InMemoryStateSlot};
pub use state::{FieldErrors, FieldState, FormState, SubmissionState};
pub use validator::{
    BoxedValidationFuture, BoxedValidator, Combinator, CompoundValidator, DynValidator, PreMap,
    Validator, ValidatorExt, Verdict,
};
pub use validators::{
    Collection, FnValidator, LengthRangeValidator, MessageGenerator, NoopValidator,
    NotEmptyValidator, NotNilValidator, PatternValidator, RangeValidator,
};
pub use value::{FieldKey, FieldName, FieldValue, FormValues, ValueMap};
