use std::collections::{BTreeMap, BTreeSet};

use super::value::{FieldName, FieldValue, FormValues};

/// Per-field messages plus the set of fields currently marked invalid.
///
/// The two halves are tracked independently: a field may be invalid with no
/// stored messages, and messages may outlive the invalid flag. Unregister and
/// reset rely on clearing one half while keeping the other.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldErrors<K: FieldName> {
    pub error_fields: BTreeSet<K>,
    pub messages: BTreeMap<K, Vec<String>>,
}

impl<K: FieldName> Default for FieldErrors<K> {
    fn default() -> Self {
        Self {
            error_fields: BTreeSet::new(),
            messages: BTreeMap::new(),
        }
    }
}

impl<K: FieldName> FieldErrors<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.error_fields.is_empty()
    }

    pub fn is_invalid(&self, name: &K) -> bool {
        self.error_fields.contains(name)
    }

    pub fn messages_for(&self, name: &K) -> &[String] {
        self.messages.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn set_messages(&mut self, name: K, messages: Option<Vec<String>>, is_valid: bool) {
        if is_valid {
            self.error_fields.remove(&name);
            self.messages.remove(&name);
            return;
        }
        self.error_fields.insert(name.clone());
        match messages {
            Some(messages) => {
                self.messages.insert(name, messages);
            }
            None => {
                self.messages.remove(&name);
            }
        }
    }

    pub fn remove(&mut self, name: &K) {
        self.set_messages(name.clone(), None, true);
    }

    pub fn remove_messages_only(&mut self, name: &K) {
        self.messages.remove(name);
    }

    pub fn remove_validity_only(&mut self, name: &K) {
        self.error_fields.remove(name);
    }

    /// Field sets are unioned; messages for a shared key are concatenated.
    pub fn union(mut self, other: Self) -> Self {
        self.merge(other);
        self
    }

    pub fn merge(&mut self, other: Self) {
        self.error_fields.extend(other.error_fields);
        for (name, messages) in other.messages {
            self.messages.entry(name).or_default().extend(messages);
        }
    }

    /// Replaces the entries of every name in `names` with what `other` reports
    /// for it. A name absent from `other.error_fields` becomes valid.
    pub(super) fn rewrite<'a, I>(&mut self, names: I, other: &Self)
    where
        I: IntoIterator<Item = &'a K>,
    {
        for name in names {
            self.set_messages(
                name.clone(),
                other.messages.get(name).cloned(),
                !other.is_invalid(name),
            );
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SubmissionState {
    #[default]
    NotSubmitted,
    Submitting,
    Submitted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormState<K: FieldName> {
    pub dirty_fields: BTreeSet<K>,
    pub form_values: FormValues<K>,
    pub default_values: FormValues<K>,
    pub submission_state: SubmissionState,
    pub is_submit_successful: bool,
    pub submit_count: u32,
    pub is_valid: bool,
    pub is_validating: bool,
    pub errors: FieldErrors<K>,
}

impl<K: FieldName> Default for FormState<K> {
    fn default() -> Self {
        Self {
            dirty_fields: BTreeSet::new(),
            form_values: BTreeMap::new(),
            default_values: BTreeMap::new(),
            submission_state: SubmissionState::NotSubmitted,
            is_submit_successful: false,
            submit_count: 0,
            is_valid: true,
            is_validating: false,
            errors: FieldErrors::new(),
        }
    }
}

impl<K: FieldName> FormState<K> {
    pub fn is_dirty(&self) -> bool {
        !self.dirty_fields.is_empty()
    }

    pub fn is_submitting(&self) -> bool {
        self.submission_state == SubmissionState::Submitting
    }

    pub fn value(&self, name: &K) -> Option<&FieldValue> {
        self.form_values.get(name)
    }

    pub fn field_state(&self, name: &K) -> FieldState {
        FieldState {
            is_dirty: self.dirty_fields.contains(name),
            is_invalid: self.errors.is_invalid(name),
            error: self.errors.messages_for(name).to_vec(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldState {
    pub is_dirty: bool,
    pub is_invalid: bool,
    pub error: Vec<String>,
}
