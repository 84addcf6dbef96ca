use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

pub type BoxedValidationFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Asynchronous check of a single value.
///
/// `validate` produces an arbitrary `Output`; `is_valid` and
/// `generate_message` interpret it. Most validators use `bool` or
/// [`Verdict`] as output.
pub trait Validator<V>: Send + Sync + 'static
where
    V: Send + Sync + 'static,
{
    type Output: Send;

    fn validate<'a>(&'a self, value: &'a V) -> BoxedValidationFuture<'a, Self::Output>;
    fn is_valid(&self, output: &Self::Output) -> bool;
    fn generate_message(&self, output: &Self::Output) -> Vec<String>;
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Verdict {
    pub is_valid: bool,
    pub messages: Vec<String>,
}

impl Verdict {
    pub fn valid(messages: Vec<String>) -> Self {
        Self {
            is_valid: true,
            messages,
        }
    }

    pub fn invalid(messages: Vec<String>) -> Self {
        Self {
            is_valid: false,
            messages,
        }
    }
}

/// Object-safe view of a [`Validator`] with its output already interpreted.
pub trait DynValidator<V>: Send + Sync {
    fn evaluate<'a>(&'a self, value: &'a V) -> BoxedValidationFuture<'a, Verdict>;
}

impl<V, T> DynValidator<V> for T
where
    V: Send + Sync + 'static,
    T: Validator<V>,
{
    fn evaluate<'a>(&'a self, value: &'a V) -> BoxedValidationFuture<'a, Verdict> {
        Box::pin(async move {
            let output = self.validate(value).await;
            Verdict {
                is_valid: self.is_valid(&output),
                messages: self.generate_message(&output),
            }
        })
    }
}

pub type BoxedValidator<V> = Arc<dyn DynValidator<V>>;

impl<V> Validator<V> for BoxedValidator<V>
where
    V: Send + Sync + 'static,
{
    type Output = Verdict;

    fn validate<'a>(&'a self, value: &'a V) -> BoxedValidationFuture<'a, Verdict> {
        self.as_ref().evaluate(value)
    }

    fn is_valid(&self, output: &Verdict) -> bool {
        output.is_valid
    }

    fn generate_message(&self, output: &Verdict) -> Vec<String> {
        output.messages.clone()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Combinator {
    And,
    Or,
}

/// Runs its children concurrently and folds their verdicts with AND or OR.
///
/// By default evaluation stops at the deciding verdict (first failure for
/// AND, first success for OR) and the outstanding children are dropped;
/// messages are those of the children that completed up to that point, in
/// completion order. With `get_all_messages(true)` every child runs to
/// completion and all messages are kept.
pub struct CompoundValidator<V> {
    combinator: Combinator,
    validators: Vec<BoxedValidator<V>>,
    should_get_all_messages: bool,
}

impl<V> CompoundValidator<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(combinator: Combinator, validators: Vec<BoxedValidator<V>>) -> Self {
        Self {
            combinator,
            validators,
            should_get_all_messages: false,
        }
    }

    pub fn get_all_messages(mut self, should_get_all_messages: bool) -> Self {
        self.should_get_all_messages = should_get_all_messages;
        self
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    fn deciding(&self, verdict: &Verdict) -> bool {
        match self.combinator {
            Combinator::And => !verdict.is_valid,
            Combinator::Or => verdict.is_valid,
        }
    }
}

impl<V> Validator<V> for CompoundValidator<V>
where
    V: Send + Sync + 'static,
{
    type Output = Verdict;

    fn validate<'a>(&'a self, value: &'a V) -> BoxedValidationFuture<'a, Verdict> {
        Box::pin(async move {
            let mut pending = self
                .validators
                .iter()
                .map(|validator| validator.evaluate(value))
                .collect::<FuturesUnordered<_>>();
            let mut messages = Vec::new();
            let mut passed = 0_usize;
            let mut failed = 0_usize;

            while let Some(verdict) = pending.next().await {
                let deciding = self.deciding(&verdict);
                if verdict.is_valid {
                    passed += 1;
                } else {
                    failed += 1;
                }
                messages.extend(verdict.messages);
                if deciding && !self.should_get_all_messages {
                    return Verdict {
                        is_valid: self.combinator == Combinator::Or,
                        messages,
                    };
                }
            }

            let is_valid = match self.combinator {
                Combinator::And => failed == 0,
                Combinator::Or => passed > 0,
            };
            Verdict { is_valid, messages }
        })
    }

    fn is_valid(&self, output: &Verdict) -> bool {
        output.is_valid
    }

    fn generate_message(&self, output: &Verdict) -> Vec<String> {
        output.messages.clone()
    }
}

/// Adapts a validator over `Fut::Output` into one over `U` by transforming
/// the input before delegating.
pub struct PreMap<Inner, F, Fut> {
    inner: Inner,
    transform: F,
    _transform: PhantomData<fn() -> Fut>,
}

impl<U, Inner, F, Fut> Validator<U> for PreMap<Inner, F, Fut>
where
    U: Send + Sync + 'static,
    Inner: Validator<Fut::Output>,
    F: Fn(&U) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + Sync + 'static,
{
    type Output = Inner::Output;

    fn validate<'a>(&'a self, value: &'a U) -> BoxedValidationFuture<'a, Self::Output> {
        Box::pin(async move {
            let mapped = (self.transform)(value).await;
            self.inner.validate(&mapped).await
        })
    }

    fn is_valid(&self, output: &Self::Output) -> bool {
        self.inner.is_valid(output)
    }

    fn generate_message(&self, output: &Self::Output) -> Vec<String> {
        self.inner.generate_message(output)
    }
}

pub trait ValidatorExt<V>: Validator<V> + Sized
where
    V: Send + Sync + 'static,
{
    fn boxed(self) -> BoxedValidator<V> {
        Arc::new(self)
    }

    fn and<I>(self, others: I) -> CompoundValidator<V>
    where
        I: IntoIterator<Item = BoxedValidator<V>>,
    {
        CompoundValidator::new(Combinator::And, chain(self.boxed(), others))
    }

    fn or<I>(self, others: I) -> CompoundValidator<V>
    where
        I: IntoIterator<Item = BoxedValidator<V>>,
    {
        CompoundValidator::new(Combinator::Or, chain(self.boxed(), others))
    }

    fn pre_map<U, F, Fut>(self, transform: F) -> PreMap<Self, F, Fut>
    where
        U: Send + Sync + 'static,
        F: Fn(&U) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = V> + Send + 'static,
    {
        PreMap {
            inner: self,
            transform,
            _transform: PhantomData,
        }
    }
}

impl<V, T> ValidatorExt<V> for T
where
    V: Send + Sync + 'static,
    T: Validator<V>,
{
}

fn chain<V, I>(first: BoxedValidator<V>, others: I) -> Vec<BoxedValidator<V>>
where
    I: IntoIterator<Item = BoxedValidator<V>>,
{
    std::iter::once(first).chain(others).collect()
}
