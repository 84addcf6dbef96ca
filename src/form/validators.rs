use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::future::{Future, ready};
use std::marker::PhantomData;
use std::ops::RangeInclusive;
use std::sync::Arc;

use regex::Regex;

use super::controller::{FormError, FormResult};
use super::validator::{BoxedValidationFuture, Validator, Verdict};

pub type MessageGenerator = Arc<dyn Fn(bool) -> Vec<String> + Send + Sync>;

fn silent() -> MessageGenerator {
    Arc::new(|_| Vec::new())
}

macro_rules! message_builders {
    ($($ty:ident $(<$param:ident>)?),+ $(,)?) => {
        $(
            impl$(<$param>)? $ty$(<$param>)? {
                pub fn message_generator(
                    mut self,
                    generator: impl Fn(bool) -> Vec<String> + Send + Sync + 'static,
                ) -> Self {
                    self.messages = Arc::new(generator);
                    self
                }

                pub fn error_message(self, message: impl Into<String>) -> Self {
                    let message = message.into();
                    self.message_generator(move |is_valid| {
                        if is_valid { Vec::new() } else { vec![message.clone()] }
                    })
                }
            }
        )+
    };
}

/// Something with an element count.
pub trait Collection {
    fn count(&self) -> usize;
}

impl Collection for String {
    fn count(&self) -> usize {
        self.chars().count()
    }
}

impl<T> Collection for Vec<T> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<T> Collection for VecDeque<T> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<T> Collection for BTreeSet<T> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<T, S> Collection for HashSet<T, S> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<K, V> Collection for BTreeMap<K, V> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<K, V, S> Collection for HashMap<K, V, S> {
    fn count(&self) -> usize {
        self.len()
    }
}

#[derive(Clone)]
pub struct NoopValidator {
    messages: MessageGenerator,
}

impl NoopValidator {
    pub fn new() -> Self {
        Self { messages: silent() }
    }
}

impl Default for NoopValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Validator<V> for NoopValidator
where
    V: Send + Sync + 'static,
{
    type Output = bool;

    fn validate<'a>(&'a self, _value: &'a V) -> BoxedValidationFuture<'a, bool> {
        Box::pin(ready(true))
    }

    fn is_valid(&self, output: &bool) -> bool {
        *output
    }

    fn generate_message(&self, output: &bool) -> Vec<String> {
        (self.messages)(*output)
    }
}

#[derive(Clone)]
pub struct NotEmptyValidator {
    messages: MessageGenerator,
}

impl NotEmptyValidator {
    pub fn new() -> Self {
        Self { messages: silent() }
    }
}

impl Default for NotEmptyValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Validator<V> for NotEmptyValidator
where
    V: Collection + Send + Sync + 'static,
{
    type Output = bool;

    fn validate<'a>(&'a self, value: &'a V) -> BoxedValidationFuture<'a, bool> {
        Box::pin(ready(value.count() > 0))
    }

    fn is_valid(&self, output: &bool) -> bool {
        *output
    }

    fn generate_message(&self, output: &bool) -> Vec<String> {
        (self.messages)(*output)
    }
}

#[derive(Clone)]
pub struct NotNilValidator {
    messages: MessageGenerator,
}

impl NotNilValidator {
    pub fn new() -> Self {
        Self { messages: silent() }
    }
}

impl Default for NotNilValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Validator<Option<T>> for NotNilValidator
where
    T: Send + Sync + 'static,
{
    type Output = bool;

    fn validate<'a>(&'a self, value: &'a Option<T>) -> BoxedValidationFuture<'a, bool> {
        Box::pin(ready(value.is_some()))
    }

    fn is_valid(&self, output: &bool) -> bool {
        *output
    }

    fn generate_message(&self, output: &bool) -> Vec<String> {
        (self.messages)(*output)
    }
}

/// Inclusive bounds check on a comparable value.
#[derive(Clone)]
pub struct RangeValidator<T> {
    bounds: RangeInclusive<T>,
    messages: MessageGenerator,
}

impl<T> RangeValidator<T> {
    pub fn new(bounds: RangeInclusive<T>) -> Self {
        Self {
            bounds,
            messages: silent(),
        }
    }
}

impl<T> Validator<T> for RangeValidator<T>
where
    T: PartialOrd + Send + Sync + 'static,
{
    type Output = bool;

    fn validate<'a>(&'a self, value: &'a T) -> BoxedValidationFuture<'a, bool> {
        Box::pin(ready(self.bounds.contains(value)))
    }

    fn is_valid(&self, output: &bool) -> bool {
        *output
    }

    fn generate_message(&self, output: &bool) -> Vec<String> {
        (self.messages)(*output)
    }
}

/// Inclusive bounds check on a collection's element count.
#[derive(Clone)]
pub struct LengthRangeValidator {
    bounds: RangeInclusive<usize>,
    messages: MessageGenerator,
}

impl LengthRangeValidator {
    pub fn new(bounds: RangeInclusive<usize>) -> Self {
        Self {
            bounds,
            messages: silent(),
        }
    }
}

impl<V> Validator<V> for LengthRangeValidator
where
    V: Collection + Send + Sync + 'static,
{
    type Output = bool;

    fn validate<'a>(&'a self, value: &'a V) -> BoxedValidationFuture<'a, bool> {
        Box::pin(ready(self.bounds.contains(&value.count())))
    }

    fn is_valid(&self, output: &bool) -> bool {
        *output
    }

    fn generate_message(&self, output: &bool) -> Vec<String> {
        (self.messages)(*output)
    }
}

/// Requires the whole string to match the pattern.
#[derive(Clone)]
pub struct PatternValidator {
    regex: Regex,
    messages: MessageGenerator,
}

impl PatternValidator {
    pub fn new(pattern: &str) -> FormResult<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(FormError::InvalidPattern)?;
        Ok(Self {
            regex,
            messages: silent(),
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Validator<String> for PatternValidator {
    type Output = bool;

    fn validate<'a>(&'a self, value: &'a String) -> BoxedValidationFuture<'a, bool> {
        Box::pin(ready(self.regex.is_match(value)))
    }

    fn is_valid(&self, output: &bool) -> bool {
        *output
    }

    fn generate_message(&self, output: &bool) -> Vec<String> {
        (self.messages)(*output)
    }
}

message_builders!(
    NoopValidator,
    NotEmptyValidator,
    NotNilValidator,
    RangeValidator<T>,
    LengthRangeValidator,
    PatternValidator,
);

/// Validator backed by a closure producing a [`Verdict`].
pub struct FnValidator<F, Fut> {
    validate: F,
    _future: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnValidator<F, Fut> {
    pub fn new<V>(validate: F) -> Self
    where
        F: Fn(&V) -> Fut,
        Fut: Future<Output = Verdict>,
    {
        Self {
            validate,
            _future: PhantomData,
        }
    }
}

impl<V, F, Fut> Validator<V> for FnValidator<F, Fut>
where
    V: Send + Sync + 'static,
    F: Fn(&V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Verdict> + Send + 'static,
{
    type Output = Verdict;

    fn validate<'a>(&'a self, value: &'a V) -> BoxedValidationFuture<'a, Verdict> {
        Box::pin((self.validate)(value))
    }

    fn is_valid(&self, output: &Verdict) -> bool {
        output.is_valid
    }

    fn generate_message(&self, output: &Verdict) -> Vec<String> {
        output.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use rust_decimal::Decimal;

    use super::*;
    use crate::form::validator::DynValidator;

    fn verdict<V, T>(validator: &T, value: V) -> Verdict
    where
        V: Send + Sync + 'static,
        T: Validator<V>,
    {
        block_on(validator.evaluate(&value))
    }

    #[test]
    fn not_empty_counts_collection_elements() {
        let validator = NotEmptyValidator::new().error_message("required");
        assert_eq!(
            verdict(&validator, String::new()),
            Verdict::invalid(vec!["required".into()])
        );
        assert_eq!(verdict(&validator, vec![1_u8]), Verdict::valid(Vec::new()));
        assert!(!verdict(&validator, BTreeMap::<String, u8>::new()).is_valid);
    }

    #[test]
    fn not_nil_checks_presence() {
        let validator = NotNilValidator::new();
        assert!(verdict(&validator, Some(3_u8)).is_valid);
        assert!(!verdict(&validator, None::<u8>).is_valid);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let validator = RangeValidator::new(Decimal::new(100, 2)..=Decimal::new(5000, 2))
            .message_generator(|is_valid| {
                if is_valid {
                    vec!["amount ok".into()]
                } else {
                    vec!["amount out of range".into()]
                }
            });
        assert!(verdict(&validator, Decimal::new(100, 2)).is_valid);
        assert!(verdict(&validator, Decimal::new(5000, 2)).is_valid);
        assert_eq!(
            verdict(&validator, Decimal::new(5001, 2)).messages,
            vec!["amount out of range".to_string()]
        );
        assert_eq!(
            verdict(&validator, Decimal::new(1200, 2)).messages,
            vec!["amount ok".to_string()]
        );
    }

    #[test]
    fn length_range_counts_chars() {
        let validator = LengthRangeValidator::new(2..=3);
        assert!(verdict(&validator, "åß".to_string()).is_valid);
        assert!(!verdict(&validator, "a".to_string()).is_valid);
        assert!(!verdict(&validator, vec![0_u8; 4]).is_valid);
    }

    #[test]
    fn pattern_requires_whole_string_match() {
        let validator = PatternValidator::new(r"[a-z]+@[a-z]+\.[a-z]{2,}")
            .expect("valid pattern")
            .error_message("invalid email");
        assert!(verdict(&validator, "user@calm.ui".to_string()).is_valid);
        assert!(!verdict(&validator, "prefix user@calm.ui".to_string()).is_valid);
        assert!(!verdict(&validator, "a|ab".to_string()).is_valid);

        let alternation = PatternValidator::new("a|ab").expect("valid pattern");
        assert!(verdict(&alternation, "ab".to_string()).is_valid);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(matches!(
            PatternValidator::new("("),
            Err(FormError::InvalidPattern(_))
        ));
    }

    #[test]
    fn noop_always_passes() {
        assert!(verdict(&NoopValidator::new(), 42_i32).is_valid);
    }
}
