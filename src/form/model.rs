use std::any::Any;
use std::fmt::Debug;

use super::controller::{FormControl, FormResult, ResetOptions};
use super::field::{FieldAccessor, RegisterOption};
use super::value::{FieldKey, FormValues};

/// Typed handle on one field of a [`FormModel`].
pub trait FieldLens<T>: Copy + Send + Sync + 'static {
    type Value: Any + Clone + PartialEq + Debug + Send + Sync;

    fn key(self) -> FieldKey;
    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);
}

/// A plain struct whose fields map one-to-one onto form fields.
///
/// Usually derived with `#[derive(FormModel)]`.
pub trait FormModel: Clone + Send + Sync + 'static {
    type Fields;

    fn fields() -> Self::Fields;
    fn into_values(self) -> FormValues<FieldKey>;
    /// `None` when a field is missing or holds a value of another type.
    fn from_values(values: &FormValues<FieldKey>) -> Option<Self>;
}

impl FormControl<FieldKey> {
    /// Registers the field behind `lens`, taking its default from `model`.
    pub fn register_lens<M, L>(
        &self,
        model: &M,
        lens: L,
        options: impl FnOnce(RegisterOption<L::Value>) -> RegisterOption<L::Value>,
    ) -> FormResult<FieldAccessor<FieldKey, L::Value>>
    where
        M: FormModel,
        L: FieldLens<M>,
    {
        let default_value = lens.get(model).clone();
        self.register(lens.key(), options(RegisterOption::new(default_value)))
    }

    pub async fn reset_model<M: FormModel>(&self, model: M, options: ResetOptions) -> FormResult<()> {
        self.reset(model.into_values(), options).await
    }

    /// Current values read back as a model.
    pub fn model<M: FormModel>(&self) -> FormResult<Option<M>> {
        Ok(M::from_values(&self.values()?))
    }
}
