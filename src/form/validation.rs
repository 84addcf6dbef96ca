use std::collections::BTreeSet;

use futures::StreamExt;
use futures::future::{AbortHandle, Abortable};
use futures::stream::FuturesUnordered;
use futures_timer::Delay;
use tracing::debug;

use super::controller::{FormControl, FormResult, lock, read_lock, write_lock};
use super::state::FieldErrors;
use super::value::{FieldName, FormValues};

/// Outcome of one validation pass before it is applied to the form.
pub(super) struct ValidationRound<K: FieldName> {
    pub(super) is_valid: bool,
    pub(super) errors: FieldErrors<K>,
    /// Names whose verdict is known; a validator round replaces their stored
    /// errors.
    pub(super) validated: BTreeSet<K>,
    /// Values returned by a successful resolver.
    pub(super) values: Option<FormValues<K>>,
    /// Resolver rounds only add errors; they never clear stored ones.
    pub(super) is_resolved: bool,
}

impl<K: FieldName> ValidationRound<K> {
    pub(super) fn apply_to(&self, errors: &mut FieldErrors<K>) {
        if self.is_resolved {
            errors.merge(self.errors.clone());
        } else {
            errors.rewrite(&self.validated, &self.errors);
        }
    }
}

pub(super) enum FocusRequest<K> {
    None,
    Validated(Vec<K>),
    FirstError,
}

/// Field to focus after validating `validated`, given the resulting errors.
///
/// A single-field pass only focuses that field, and only when no other field
/// holds focus. A multi-field pass focuses the first invalid name in
/// `validated` order.
pub(super) fn focus_target<K: FieldName>(
    validated: &[K],
    errors: &FieldErrors<K>,
    focused: Option<&K>,
) -> Option<K> {
    match validated {
        [single] => (errors.is_invalid(single) && focused.is_none_or(|current| current == single))
            .then(|| single.clone()),
        _ => validated
            .iter()
            .find(|name| errors.is_invalid(name))
            .cloned(),
    }
}

impl<K: FieldName> FormControl<K> {
    /// Validates `names` (every registered field when empty) and returns the
    /// verdict of this pass alone.
    ///
    /// A failing pass marks the form invalid; only a pass over the whole form
    /// marks it valid again.
    pub async fn trigger<I>(&self, names: I, should_focus: bool) -> FormResult<bool>
    where
        I: IntoIterator<Item = K>,
    {
        let requested = names.into_iter().collect::<Vec<_>>();
        let is_full = requested.is_empty();
        let names = if is_full {
            self.registered_names()?
        } else {
            requested
        };

        write_lock(&self.shared.state, "starting validation")?.is_validating = true;
        self.sync_state()?;

        let stop_on_first_error = self.options()?.validate_first_error_only;
        debug!(fields = names.len(), is_full, "validation round started");
        let mut round = self.run_validation(&names, stop_on_first_error).await?;
        let is_valid = round.is_valid;
        {
            let mut state = write_lock(&self.shared.state, "finishing validation")?;
            if !is_valid {
                state.is_valid = false;
            } else if is_full {
                state.is_valid = true;
            }
            state.is_validating = false;
            if let Some(values) = round.values.take() {
                state.form_values.extend(values);
            }
        }
        debug!(is_valid, "validation round finished");

        let focus = if should_focus {
            FocusRequest::Validated(names)
        } else {
            FocusRequest::None
        };
        self.display_errors(Some(round), focus).await?;
        Ok(is_valid)
    }

    pub async fn trigger_field(&self, name: K, should_focus: bool) -> FormResult<bool> {
        self.trigger([name], should_focus).await
    }

    /// Runs the validators of the listed registered fields concurrently.
    ///
    /// Results are gathered in completion order. With
    /// `should_stop_on_first_error` the remaining validators are dropped at
    /// the first failure; fields that had not finished by then have no entry.
    pub async fn validate_fields(
        &self,
        names: &[K],
        should_stop_on_first_error: bool,
    ) -> FormResult<(bool, FieldErrors<K>)> {
        let round = self
            .validate_registered(names, should_stop_on_first_error)
            .await?;
        Ok((round.is_valid, round.errors))
    }

    pub async fn validate_all_fields(
        &self,
        should_stop_on_first_error: bool,
    ) -> FormResult<(bool, FieldErrors<K>)> {
        let names = self.registered_names()?;
        self.validate_fields(&names, should_stop_on_first_error)
            .await
    }

    /// Re-runs only the fields currently marked invalid.
    pub async fn revalidate_error_fields(
        &self,
        should_stop_on_first_error: bool,
    ) -> FormResult<(bool, FieldErrors<K>)> {
        let names = self.error_field_names()?;
        self.validate_fields(&names, should_stop_on_first_error)
            .await
    }

    /// Uses the resolver when one is configured, the field validators
    /// otherwise.
    pub(super) async fn run_validation(
        &self,
        names: &[K],
        should_stop_on_first_error: bool,
    ) -> FormResult<ValidationRound<K>> {
        let (resolver, context) = {
            let options = read_lock(&self.shared.options, "reading resolver")?;
            (options.resolver.clone(), options.context.clone())
        };
        let Some(resolver) = resolver else {
            return self
                .validate_registered(names, should_stop_on_first_error)
                .await;
        };

        let values = self.values()?;
        let validated = names.iter().cloned().collect::<BTreeSet<_>>();
        let round = match resolver.resolve(values, context, names.to_vec()).await {
            Ok(values) => ValidationRound {
                is_valid: true,
                errors: FieldErrors::new(),
                validated,
                values: Some(values),
                is_resolved: true,
            },
            Err(errors) => ValidationRound {
                is_valid: false,
                errors,
                validated,
                values: None,
                is_resolved: true,
            },
        };
        Ok(round)
    }

    async fn validate_registered(
        &self,
        names: &[K],
        should_stop_on_first_error: bool,
    ) -> FormResult<ValidationRound<K>> {
        let jobs = {
            let fields = read_lock(&self.shared.fields, "collecting field validators")?;
            let state = read_lock(&self.shared.state, "collecting field values")?;
            names
                .iter()
                .filter_map(|name| {
                    let field = fields.get(name)?;
                    let value = state
                        .form_values
                        .get(name)
                        .unwrap_or(&field.default_value)
                        .clone();
                    Some((name.clone(), field.validator.clone(), value))
                })
                .collect::<Vec<_>>()
        };

        let mut pending = jobs
            .into_iter()
            .map(|(name, validator, value)| async move { (name, validator(value).await) })
            .collect::<FuturesUnordered<_>>();
        let mut round = ValidationRound {
            is_valid: true,
            errors: FieldErrors::new(),
            validated: BTreeSet::new(),
            values: None,
            is_resolved: false,
        };
        while let Some((name, verdict)) = pending.next().await {
            round.validated.insert(name.clone());
            if verdict.is_valid {
                continue;
            }
            round.is_valid = false;
            round
                .errors
                .set_messages(name, Some(verdict.messages), false);
            if should_stop_on_first_error {
                break;
            }
        }
        Ok(round)
    }

    /// Re-derives `is_valid` from a full pass without touching the stored
    /// errors.
    pub(super) async fn recompute_validity(&self) -> FormResult<()> {
        let names = self.registered_names()?;
        let stop_on_first_error = self.options()?.validate_first_error_only;
        let round = self.run_validation(&names, stop_on_first_error).await?;
        write_lock(&self.shared.state, "recomputing validity")?.is_valid = round.is_valid;
        Ok(())
    }

    /// Applies the round's errors, immediately or after the configured delay,
    /// then moves focus. A newer round cancels a delayed display still
    /// waiting.
    pub(super) async fn display_errors(
        &self,
        round: Option<ValidationRound<K>>,
        focus: FocusRequest<K>,
    ) -> FormResult<()> {
        let Some(round) = round else {
            self.sync_state()?;
            return self.apply_focus(focus);
        };

        self.cancel_pending_errors()?;
        let delay = self.options()?.error_display_delay;
        if delay.is_zero() || round.is_valid {
            self.apply_round(&round)?;
            self.sync_state()?;
            return self.apply_focus(focus);
        }

        self.sync_state()?;
        let (handle, registration) = AbortHandle::new_pair();
        *lock(&self.shared.pending_errors, "scheduling error display")? = Some(handle);
        if Abortable::new(Delay::new(delay), registration)
            .await
            .is_err()
        {
            debug!("delayed error display superseded");
            return Ok(());
        }
        self.apply_round(&round)?;
        self.sync_state()?;
        self.apply_focus(focus)
    }

    fn apply_focus(&self, focus: FocusRequest<K>) -> FormResult<()> {
        match focus {
            FocusRequest::None => Ok(()),
            FocusRequest::FirstError => self.focus_error().map(|_| ()),
            FocusRequest::Validated(names) => {
                let target = {
                    let focused = read_lock(&self.shared.focused_field, "reading focus")?;
                    let state = read_lock(&self.shared.state, "reading errors for focus")?;
                    focus_target(&names, &state.errors, focused.as_ref())
                };
                match target {
                    Some(name) => self.request_focus(&name),
                    None => Ok(()),
                }
            }
        }
    }
}
