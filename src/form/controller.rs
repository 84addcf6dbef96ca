use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::future::{Future, ready};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::future::AbortHandle;
use tracing::{debug, trace};

use super::field::Field;
use super::slot::{FormStateSlot, InMemoryStateSlot};
use super::state::{FieldErrors, FieldState, FormState, SubmissionState};
use super::validation::{FocusRequest, ValidationRound};
use super::validator::BoxedValidationFuture;
use super::value::{FieldName, FieldValue, FormValues};

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("form control was dropped while a field accessor was still in use")]
    ControlDropped,
    #[error("field `{field}` is not registered and has no value")]
    UnknownField { field: String },
    #[error("field `{field}` holds a `{found}` where a `{expected}` was expected")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid validation pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

pub type FormResult<T> = Result<T, FormError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    OnSubmit,
    OnChange,
    All,
}

impl ValidationMode {
    pub fn contains(self, mode: ValidationMode) -> bool {
        self == ValidationMode::All || self == mode
    }
}

pub type ResolverContext = Arc<dyn Any + Send + Sync>;
pub type ResolverResult<K> = Result<FormValues<K>, FieldErrors<K>>;
pub type FocusHandler<K> = Arc<dyn Fn(&K) + Send + Sync>;

/// Form-wide validation that replaces the per-field validators.
///
/// Receives the current values, the configured context and the names being
/// validated. Success may carry updated values, which win over the stored
/// ones; failure carries the errors to merge.
pub trait Resolver<K: FieldName>: Send + Sync {
    fn resolve(
        &self,
        values: FormValues<K>,
        context: Option<ResolverContext>,
        names: Vec<K>,
    ) -> BoxedValidationFuture<'static, ResolverResult<K>>;
}

impl<K, F, Fut> Resolver<K> for F
where
    K: FieldName,
    F: Fn(FormValues<K>, Option<ResolverContext>, Vec<K>) -> Fut + Send + Sync,
    Fut: Future<Output = ResolverResult<K>> + Send + 'static,
{
    fn resolve(
        &self,
        values: FormValues<K>,
        context: Option<ResolverContext>,
        names: Vec<K>,
    ) -> BoxedValidationFuture<'static, ResolverResult<K>> {
        Box::pin(self(values, context, names))
    }
}

#[derive(Clone)]
pub struct FormOptions<K: FieldName> {
    pub validate_mode: ValidationMode,
    pub revalidate_mode: ValidationMode,
    pub resolver: Option<Arc<dyn Resolver<K>>>,
    pub context: Option<ResolverContext>,
    pub should_unregister_on_unmount: bool,
    pub should_focus_error: bool,
    pub validate_first_error_only: bool,
    pub error_display_delay: Duration,
    pub on_focus_field: Option<FocusHandler<K>>,
}

impl<K: FieldName> Default for FormOptions<K> {
    fn default() -> Self {
        Self {
            validate_mode: ValidationMode::OnSubmit,
            revalidate_mode: ValidationMode::OnChange,
            resolver: None,
            context: None,
            should_unregister_on_unmount: false,
            should_focus_error: true,
            validate_first_error_only: false,
            error_display_delay: Duration::ZERO,
            on_focus_field: None,
        }
    }
}

impl<K: FieldName> FormOptions<K> {
    pub fn resolver(mut self, resolver: impl Resolver<K> + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn context(mut self, context: impl Any + Send + Sync) -> Self {
        self.context = Some(Arc::new(context));
        self
    }

    pub fn on_focus_field(mut self, handler: impl Fn(&K) + Send + Sync + 'static) -> Self {
        self.on_focus_field = Some(Arc::new(handler));
        self
    }
}

impl<K: FieldName> Debug for FormOptions<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormOptions")
            .field("validate_mode", &self.validate_mode)
            .field("revalidate_mode", &self.revalidate_mode)
            .field("resolver", &self.resolver.is_some())
            .field("context", &self.context.is_some())
            .field(
                "should_unregister_on_unmount",
                &self.should_unregister_on_unmount,
            )
            .field("should_focus_error", &self.should_focus_error)
            .field("validate_first_error_only", &self.validate_first_error_only)
            .field("error_display_delay", &self.error_display_delay)
            .field("on_focus_field", &self.on_focus_field.is_some())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SetValueOptions {
    pub should_validate: bool,
    pub should_mark_dirty: bool,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResetOptions {
    pub keep_dirty: bool,
    pub keep_errors: bool,
    pub keep_is_valid: bool,
    pub keep_values: bool,
    pub keep_default_values: bool,
    pub keep_is_submitted: bool,
    pub keep_submit_count: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetFieldOptions {
    pub default_value: Option<FieldValue>,
    pub keep_dirty: bool,
    pub keep_error: bool,
}

impl ResetFieldOptions {
    pub fn default_value<V>(mut self, value: V) -> Self
    where
        V: Any + PartialEq + Debug + Send + Sync,
    {
        self.default_value = Some(FieldValue::new(value));
        self
    }
}

pub(super) struct ControlShared<K: FieldName> {
    pub(super) options: RwLock<FormOptions<K>>,
    pub(super) fields: RwLock<BTreeMap<K, Field<K>>>,
    pub(super) state: RwLock<FormState<K>>,
    pub(super) focused_field: RwLock<Option<K>>,
    pub(super) pending_errors: Mutex<Option<AbortHandle>>,
    pub(super) sync_guard: Mutex<()>,
    pub(super) slot: Arc<dyn FormStateSlot<K>>,
}

/// Owner of the field registry and the authoritative form state.
///
/// Cloning is cheap and yields another handle to the same form. Lock order
/// is `fields` before `state`; no lock is held across an `.await`.
///
/// A delayed error display lives inside the future of the call that started
/// it; dropping that future, or a newer round completing, cancels it.
#[derive(Clone)]
pub struct FormControl<K: FieldName> {
    pub(super) shared: Arc<ControlShared<K>>,
}

impl<K: FieldName> FormControl<K> {
    pub fn new(options: FormOptions<K>) -> Self {
        Self::with_slot(options, InMemoryStateSlot::new())
    }

    pub fn with_slot(options: FormOptions<K>, slot: impl FormStateSlot<K>) -> Self {
        Self {
            shared: Arc::new(ControlShared {
                options: RwLock::new(options),
                fields: RwLock::new(BTreeMap::new()),
                state: RwLock::new(FormState::default()),
                focused_field: RwLock::new(None),
                pending_errors: Mutex::new(None),
                sync_guard: Mutex::new(()),
                slot: Arc::new(slot),
            }),
        }
    }

    pub fn options(&self) -> FormResult<FormOptions<K>> {
        Ok(read_lock(&self.shared.options, "reading form options")?.clone())
    }

    pub fn set_options(&self, options: FormOptions<K>) -> FormResult<()> {
        *write_lock(&self.shared.options, "replacing form options")? = options;
        Ok(())
    }

    pub fn update_options(&self, update: impl FnOnce(&mut FormOptions<K>)) -> FormResult<()> {
        update(&mut *write_lock(&self.shared.options, "updating form options")?);
        Ok(())
    }

    /// Freshest state, ahead of the synchronized snapshot.
    pub fn instant_state(&self) -> FormResult<FormState<K>> {
        Ok(read_lock(&self.shared.state, "reading instant state")?.clone())
    }

    /// Render-safe snapshot as of the last synchronization.
    pub fn form_state(&self) -> FormState<K> {
        self.shared.slot.get()
    }

    pub fn values(&self) -> FormResult<FormValues<K>> {
        Ok(read_lock(&self.shared.state, "reading form values")?
            .form_values
            .clone())
    }

    pub fn field_state(&self, name: &K) -> FormResult<FieldState> {
        Ok(read_lock(&self.shared.state, "reading field state")?.field_state(name))
    }

    pub fn snapshot_field_state(&self, name: &K) -> FieldState {
        self.shared.slot.get().field_state(name)
    }

    /// Snapshot read that waits out a synchronization already in progress.
    pub async fn published_field_state(&self, name: &K) -> FormResult<FieldState> {
        let _guard = lock(&self.shared.sync_guard, "reading published field state")?;
        Ok(self.shared.slot.get().field_state(name))
    }

    pub fn registered_names(&self) -> FormResult<Vec<K>> {
        let fields = read_lock(&self.shared.fields, "listing registered fields")?;
        let mut ordered = fields.values().collect::<Vec<_>>();
        ordered.sort_by(|left, right| {
            left.ordinal
                .cmp(&right.ordinal)
                .then_with(|| left.name.cmp(&right.name))
        });
        Ok(ordered.into_iter().map(|field| field.name.clone()).collect())
    }

    pub fn is_registered(&self, name: &K) -> FormResult<bool> {
        Ok(read_lock(&self.shared.fields, "checking field registration")?.contains_key(name))
    }

    pub async fn set_value<V>(&self, name: K, value: V, options: SetValueOptions) -> FormResult<()>
    where
        V: Any + PartialEq + Debug + Send + Sync,
    {
        self.set_field_value(name, FieldValue::new(value), options)
            .await
    }

    pub async fn set_field_value(
        &self,
        name: K,
        value: FieldValue,
        options: SetValueOptions,
    ) -> FormResult<()> {
        self.write_field_value(&name, value, options.should_mark_dirty)?;

        if options.should_validate {
            self.trigger([name], false).await?;
        } else {
            self.sync_state()?;
        }
        Ok(())
    }

    /// Re-evaluates dirtiness on every write: the field is dirty when
    /// `mark_dirty` is set or the value differs from the stored default, and
    /// clean otherwise. A plain write of the default therefore clears an
    /// earlier forced flag.
    pub(super) fn write_field_value(
        &self,
        name: &K,
        value: FieldValue,
        mark_dirty: bool,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.shared.state, "writing field value")?;
        let differs = state.default_values.get(name) != Some(&value);
        state.form_values.insert(name.clone(), value);
        if mark_dirty || differs {
            state.dirty_fields.insert(name.clone());
        } else {
            state.dirty_fields.remove(name);
        }
        Ok(())
    }

    pub async fn reset(&self, default_values: FormValues<K>, options: ResetOptions) -> FormResult<()> {
        debug!(fields = default_values.len(), ?options, "resetting form");
        {
            let mut state = write_lock(&self.shared.state, "resetting form")?;
            for (name, default) in default_values {
                if !options.keep_values {
                    state.form_values.insert(name.clone(), default.clone());
                }
                if !options.keep_dirty {
                    state.dirty_fields.remove(&name);
                }
                if !options.keep_errors {
                    state.errors.remove_messages_only(&name);
                }
                if !options.keep_default_values {
                    state.default_values.insert(name, default);
                }
            }
            if !options.keep_is_valid {
                state.is_valid = true;
            }
            if !options.keep_is_submitted {
                state.submission_state = SubmissionState::NotSubmitted;
                state.is_submit_successful = false;
            }
            if !options.keep_submit_count {
                state.submit_count = 0;
            }
        }

        if !options.keep_errors {
            self.recompute_validity().await?;
        }
        self.sync_state()
    }

    pub async fn reset_field(&self, name: K, options: ResetFieldOptions) -> FormResult<()> {
        debug!(field = ?name, "resetting field");
        {
            let fields = read_lock(&self.shared.fields, "reading field for reset")?;
            let mut state = write_lock(&self.shared.state, "resetting field")?;
            if let Some(default) = options.default_value {
                state.default_values.insert(name.clone(), default);
            }
            let default = state
                .default_values
                .get(&name)
                .cloned()
                .or_else(|| fields.get(&name).map(|field| field.default_value.clone()));
            if let Some(default) = default {
                state.form_values.insert(name.clone(), default);
            }
            if !options.keep_dirty {
                state.dirty_fields.remove(&name);
            }
            if !options.keep_error {
                state.errors.remove(&name);
            }
        }

        if !options.keep_error {
            self.recompute_validity().await?;
        }
        self.sync_state()
    }

    /// Clears messages and the invalid flag of every listed field, or of
    /// every field when `names` is empty.
    pub fn clear_errors<I>(&self, names: I) -> FormResult<()>
    where
        I: IntoIterator<Item = K>,
    {
        {
            let mut state = write_lock(&self.shared.state, "clearing errors")?;
            let mut names = names.into_iter().peekable();
            if names.peek().is_none() {
                state.errors = FieldErrors::new();
            } else {
                for name in names {
                    state.errors.remove(&name);
                }
            }
        }
        self.sync_state()
    }

    pub fn clear_field_errors(&self, name: K) -> FormResult<()> {
        self.clear_errors([name])
    }

    pub async fn handle_submit<F, Fut, E>(&self, on_valid: F) -> Result<(), E>
    where
        F: FnOnce(FormValues<K>, FieldErrors<K>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<FormError>,
    {
        self.handle_submit_with(on_valid, |_, _| ready(Ok(())))
            .await
    }

    /// Validates per the configured modes, then runs `on_valid` or
    /// `on_invalid`. Submission bookkeeping happens whatever the callback
    /// returns; a callback failure is handed back afterwards.
    pub async fn handle_submit_with<F, Fut, G, GFut, E>(
        &self,
        on_valid: F,
        on_invalid: G,
    ) -> Result<(), E>
    where
        F: FnOnce(FormValues<K>, FieldErrors<K>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        G: FnOnce(FormValues<K>, FieldErrors<K>) -> GFut,
        GFut: Future<Output = Result<(), E>>,
        E: From<FormError>,
    {
        write_lock(&self.shared.state, "starting submit")?.submission_state =
            SubmissionState::Submitting;
        self.sync_state()?;

        let options = self.options()?;
        let round = if options.validate_mode.contains(ValidationMode::OnSubmit) {
            let names = self.registered_names()?;
            Some(self.run_validation(&names, options.validate_first_error_only).await?)
        } else if options.revalidate_mode.contains(ValidationMode::OnSubmit) {
            let names = self.error_field_names()?;
            Some(self.run_validation(&names, options.validate_first_error_only).await?)
        } else {
            None
        };

        let (is_valid, values, errors) = {
            let mut state = write_lock(&self.shared.state, "recording submit validation")?;
            if let Some(round) = &round {
                state.is_valid = round.is_valid;
                if let Some(values) = &round.values {
                    state.form_values.extend(values.clone());
                }
            }
            let mut errors = state.errors.clone();
            if let Some(round) = &round {
                round.apply_to(&mut errors);
            }
            (state.is_valid, state.form_values.clone(), errors)
        };

        debug!(is_valid, "invoking submit handler");
        let outcome = if is_valid {
            on_valid(values, errors.clone()).await
        } else {
            on_invalid(values, errors.clone()).await
        };

        {
            let mut state = write_lock(&self.shared.state, "completing submit")?;
            state.submission_state = SubmissionState::Submitted;
            state.is_submit_successful = outcome.is_ok() && errors.is_empty();
            state.submit_count = state.submit_count.saturating_add(1);
        }
        self.display_errors(round, FocusRequest::FirstError).await?;
        outcome
    }

    pub fn focused_field(&self) -> FormResult<Option<K>> {
        Ok(read_lock(&self.shared.focused_field, "reading focused field")?.clone())
    }

    /// Records which field the UI currently has focused.
    pub fn set_focused_field(&self, name: Option<K>) -> FormResult<()> {
        *write_lock(&self.shared.focused_field, "recording focused field")? = name;
        Ok(())
    }

    pub fn request_focus(&self, name: &K) -> FormResult<()> {
        *write_lock(&self.shared.focused_field, "moving focus")? = Some(name.clone());
        let handler = read_lock(&self.shared.options, "reading focus handler")?
            .on_focus_field
            .clone();
        if let Some(handler) = handler {
            handler(name);
        }
        Ok(())
    }

    /// Focuses the invalid field registered first (lowest ordinal). Does
    /// nothing unless `should_focus_error` is enabled.
    pub fn focus_error(&self) -> FormResult<Option<K>> {
        if !self.options()?.should_focus_error {
            return Ok(None);
        }
        let target = {
            let fields = read_lock(&self.shared.fields, "reading fields for error focus")?;
            let state = read_lock(&self.shared.state, "reading errors for error focus")?;
            fields
                .values()
                .filter(|field| state.errors.is_invalid(&field.name))
                .min_by(|left, right| {
                    left.ordinal
                        .cmp(&right.ordinal)
                        .then_with(|| left.name.cmp(&right.name))
                })
                .map(|field| field.name.clone())
        };
        if let Some(name) = &target {
            self.request_focus(name)?;
        }
        Ok(target)
    }

    /// Drops a delayed error display that has not been applied yet.
    pub fn cancel_pending_errors(&self) -> FormResult<()> {
        if let Some(handle) = lock(&self.shared.pending_errors, "cancelling pending errors")?.take()
        {
            handle.abort();
        }
        Ok(())
    }

    pub(super) fn error_field_names(&self) -> FormResult<Vec<K>> {
        let names = self.registered_names()?;
        let state = read_lock(&self.shared.state, "reading error fields")?;
        Ok(names
            .into_iter()
            .filter(|name| state.errors.is_invalid(name))
            .collect())
    }

    /// Copies the instant state into the slot unless the slot already holds
    /// an equal state.
    pub(super) fn sync_state(&self) -> FormResult<()> {
        let _guard = lock(&self.shared.sync_guard, "synchronizing form state")?;
        let state = self.instant_state()?;
        if self.shared.slot.get() == state {
            trace!("form state unchanged, skipping sync");
            return Ok(());
        }
        self.shared.slot.set(state);
        Ok(())
    }

    pub(super) fn apply_round(&self, round: &ValidationRound<K>) -> FormResult<()> {
        let mut state = write_lock(&self.shared.state, "applying validation errors")?;
        round.apply_to(&mut state.errors);
        Ok(())
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    context: &'static str,
) -> FormResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| FormError::StatePoisoned(context))
}
