use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use std::sync::Arc;

/// Identity key for every per-field record.
pub trait FieldName: Clone + Ord + Hash + Debug + Send + Sync + 'static {}

impl<T> FieldName for T where T: Clone + Ord + Hash + Debug + Send + Sync + 'static {}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl From<&'static str> for FieldKey {
    fn from(value: &'static str) -> Self {
        Self(value)
    }
}

trait ErasedValue: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_erased(&self, other: &dyn ErasedValue) -> bool;
    fn fmt_erased(&self, f: &mut Formatter<'_>) -> std::fmt::Result;
    fn type_name(&self) -> &'static str;
}

impl<T> ErasedValue for T
where
    T: Any + PartialEq + Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_erased(&self, other: &dyn ErasedValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn fmt_erased(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A type-erased field value.
///
/// Any `PartialEq + Debug` type can be stored. Equality dispatches to the
/// concrete type's `PartialEq`, so two values of different types never compare
/// equal. Nested dictionaries are expressed as [`ValueMap`], whose equality is
/// structural.
#[derive(Clone)]
pub struct FieldValue(Arc<dyn ErasedValue>);

impl FieldValue {
    pub fn new<T>(value: T) -> Self
    where
        T: Any + PartialEq + Debug + Send + Sync,
    {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().as_any().downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.as_ref().as_any().is::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.as_ref().type_name()
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.as_ref().eq_erased(other.0.as_ref())
    }
}

impl Debug for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.as_ref().fmt_erased(f)
    }
}

pub type ValueMap = BTreeMap<String, FieldValue>;

pub type FormValues<K> = BTreeMap<K, FieldValue>;
