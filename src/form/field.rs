use std::any::{Any, type_name};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use super::controller::{
    ControlShared, FormControl, FormError, FormResult, ValidationMode, read_lock, write_lock,
};
use super::state::SubmissionState;
use super::validator::{
    BoxedValidationFuture, BoxedValidator, DynValidator, Validator, ValidatorExt, Verdict,
};
use super::validators::NoopValidator;
use super::value::{FieldName, FieldValue};

pub(super) type FieldValidatorFn =
    Arc<dyn Fn(FieldValue) -> BoxedValidationFuture<'static, Verdict> + Send + Sync>;

pub struct RegisterOption<V> {
    pub field_ordinal: Option<usize>,
    pub validator: BoxedValidator<V>,
    pub default_value: V,
    pub should_unregister_on_unmount: bool,
}

impl<V> RegisterOption<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(default_value: V) -> Self {
        Self {
            field_ordinal: None,
            validator: NoopValidator::new().boxed(),
            default_value,
            should_unregister_on_unmount: false,
        }
    }

    pub fn validator(mut self, validator: impl Validator<V>) -> Self {
        self.validator = validator.boxed();
        self
    }

    pub fn ordinal(mut self, ordinal: usize) -> Self {
        self.field_ordinal = Some(ordinal);
        self
    }

    pub fn unregister_on_unmount(mut self, should_unregister_on_unmount: bool) -> Self {
        self.should_unregister_on_unmount = should_unregister_on_unmount;
        self
    }
}

pub(super) struct Field<K> {
    pub(super) ordinal: usize,
    pub(super) name: K,
    pub(super) default_value: FieldValue,
    pub(super) validator: FieldValidatorFn,
    pub(super) should_unregister_on_unmount: bool,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UnregisterOptions {
    pub keep_dirty: bool,
    pub keep_is_valid: bool,
    pub keep_error: bool,
    pub keep_value: bool,
    pub keep_default_value: bool,
}

/// Typed read/write handle for one registered field.
///
/// Holds only a weak reference to its control; once every [`FormControl`]
/// handle is gone, accessor calls fail with [`FormError::ControlDropped`].
pub struct FieldAccessor<K: FieldName, V> {
    name: K,
    control: Weak<ControlShared<K>>,
    _value: PhantomData<fn() -> V>,
}

impl<K: FieldName, V> Clone for FieldAccessor<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            control: self.control.clone(),
            _value: PhantomData,
        }
    }
}

impl<K, V> FieldAccessor<K, V>
where
    K: FieldName,
    V: Any + Clone + PartialEq + Debug + Send + Sync,
{
    pub fn name(&self) -> &K {
        &self.name
    }

    fn control(&self) -> FormResult<FormControl<K>> {
        self.control
            .upgrade()
            .map(|shared| FormControl { shared })
            .ok_or(FormError::ControlDropped)
    }

    /// Current value, or the field's default when the form holds none.
    pub fn get(&self) -> FormResult<V> {
        let control = self.control()?;
        let value = {
            let fields = read_lock(&control.shared.fields, "reading field default")?;
            let state = read_lock(&control.shared.state, "reading field value")?;
            state
                .form_values
                .get(&self.name)
                .or_else(|| fields.get(&self.name).map(|field| &field.default_value))
                .cloned()
        };
        let value = value.ok_or_else(|| FormError::UnknownField {
            field: format!("{:?}", self.name),
        })?;
        value.downcast::<V>().ok_or_else(|| FormError::TypeMismatch {
            field: format!("{:?}", self.name),
            expected: type_name::<V>(),
            found: value.type_name(),
        })
    }

    /// Writes the value, then validates if the mode asks for it on change.
    pub async fn set(&self, value: V) -> FormResult<()> {
        let control = self.control()?;
        control.write_field_value(&self.name, FieldValue::new(value), false)?;

        let options = control.options()?;
        let submitted = read_lock(&control.shared.state, "reading submission state")?
            .submission_state
            == SubmissionState::Submitted;
        let should_validate = options.validate_mode.contains(ValidationMode::OnChange)
            || (submitted && options.revalidate_mode.contains(ValidationMode::OnChange));

        if should_validate {
            control.trigger([self.name.clone()], false).await?;
        } else {
            control.sync_state()?;
        }
        Ok(())
    }
}

fn erase_validator<V>(validator: BoxedValidator<V>) -> FieldValidatorFn
where
    V: Any + Send + Sync,
{
    Arc::new(move |value: FieldValue| {
        let validator = validator.clone();
        Box::pin(async move {
            match value.downcast_ref::<V>() {
                Some(typed) => validator.evaluate(typed).await,
                None => {
                    warn!(
                        expected = type_name::<V>(),
                        found = value.type_name(),
                        "field value has an unexpected type"
                    );
                    Verdict::invalid(vec![format!(
                        "expected a value of type {}",
                        type_name::<V>()
                    )])
                }
            }
        })
    })
}

impl<K: FieldName> FormControl<K> {
    /// Registers `name`, or refreshes its options when already registered.
    ///
    /// A re-registration with a different default moves the value along with
    /// it as long as the field is not dirty.
    pub fn register<V>(
        &self,
        name: K,
        options: RegisterOption<V>,
    ) -> FormResult<FieldAccessor<K, V>>
    where
        V: Any + Clone + PartialEq + Debug + Send + Sync,
    {
        let default_value = FieldValue::new(options.default_value);
        let validator = erase_validator(options.validator);
        {
            let mut fields = write_lock(&self.shared.fields, "registering field")?;
            let mut state = write_lock(&self.shared.state, "registering field value")?;
            let ordinal = fields.len();
            match fields.get_mut(&name) {
                Some(field) => {
                    field.validator = validator;
                    field.should_unregister_on_unmount = options.should_unregister_on_unmount;
                    if let Some(ordinal) = options.field_ordinal {
                        field.ordinal = ordinal;
                    }
                    let previous_default = state
                        .default_values
                        .get(&name)
                        .unwrap_or(&field.default_value);
                    if *previous_default != default_value && !state.dirty_fields.contains(&name) {
                        state
                            .form_values
                            .insert(name.clone(), default_value.clone());
                    }
                    field.default_value = default_value.clone();
                    state.default_values.insert(name.clone(), default_value);
                }
                None => {
                    debug!(field = ?name, "registering field");
                    fields.insert(
                        name.clone(),
                        Field {
                            ordinal: options.field_ordinal.unwrap_or(ordinal),
                            name: name.clone(),
                            default_value: default_value.clone(),
                            validator,
                            should_unregister_on_unmount: options.should_unregister_on_unmount,
                        },
                    );
                    state
                        .form_values
                        .insert(name.clone(), default_value.clone());
                    state.default_values.insert(name.clone(), default_value);
                }
            }
        }

        Ok(self.accessor(name))
    }

    /// Typed handle for an already registered field.
    pub fn accessor<V>(&self, name: K) -> FieldAccessor<K, V> {
        FieldAccessor {
            name,
            control: Arc::downgrade(&self.shared),
            _value: PhantomData,
        }
    }

    /// Applies the same options to every listed name in one step.
    pub async fn unregister<I>(&self, names: I, options: UnregisterOptions) -> FormResult<()>
    where
        I: IntoIterator<Item = K>,
    {
        let names = names.into_iter().collect::<Vec<_>>();
        let unregister_all = self.options()?.should_unregister_on_unmount;
        debug!(fields = names.len(), ?options, "unregistering fields");
        {
            let mut fields = write_lock(&self.shared.fields, "unregistering fields")?;
            let mut state = write_lock(&self.shared.state, "unregistering field state")?;
            for name in &names {
                if unregister_all
                    || fields
                        .get(name)
                        .is_some_and(|field| field.should_unregister_on_unmount)
                {
                    fields.remove(name);
                }
                if !options.keep_value {
                    state.form_values.remove(name);
                }
                if !options.keep_error {
                    state.errors.remove_messages_only(name);
                }
                if !options.keep_dirty {
                    state.dirty_fields.remove(name);
                }
                if !options.keep_default_value {
                    state.default_values.remove(name);
                }
                if !options.keep_is_valid {
                    state.errors.remove_validity_only(name);
                }
            }
        }

        if !options.keep_is_valid && !options.keep_error {
            self.recompute_validity().await?;
        }
        self.sync_state()
    }

    pub async fn unregister_field(&self, name: K, options: UnregisterOptions) -> FormResult<()> {
        self.unregister([name], options).await
    }
}
