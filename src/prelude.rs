pub use crate::form::{
    FieldAccessor, FieldErrors, FieldKey, FieldLens, FieldState, FieldValue, FormControl,
    FormError, FormModel, FormOptions, FormResult, FormState, LengthRangeValidator,
    NotEmptyValidator, NotNilValidator, PatternValidator, RangeValidator, RegisterOption,
    ResetFieldOptions, ResetOptions, SetValueOptions, SubmissionState, UnregisterOptions,
    ValidationMode, Validator, ValidatorExt, Verdict,
};
