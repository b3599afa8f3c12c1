//! Range checks for config sections
//!
//! Each section reports its problems into a shared [`Checks`] collector, which
//! prefixes field names with the section's TOML table name.

pub use crate::error::ValidationError;
use std::fmt::Display;
use std::ops::RangeInclusive;

/// A top-level TOML table that can check its own values
pub trait ConfigSection {
    /// Table name used as the field prefix in errors
    const NAME: &'static str;

    fn check(&self, checks: &mut Checks);

    /// Checks this section on its own
    fn validate(&self) -> Result<(), Vec<ValidationError>>
    where
        Self: Sized,
    {
        let mut checks = Checks::default();
        checks.section(self);
        checks.into_result()
    }
}

/// Collects validation errors across sections
#[derive(Debug, Default)]
pub struct Checks {
    prefix: &'static str,
    errors: Vec<ValidationError>,
}

impl Checks {
    /// Runs `section`'s checks under its table name
    pub fn section<S: ConfigSection>(&mut self, section: &S) -> &mut Self {
        let outer = std::mem::replace(&mut self.prefix, S::NAME);
        section.check(self);
        self.prefix = outer;
        self
    }

    pub fn range<T>(&mut self, field: &str, value: T, range: RangeInclusive<T>) -> &mut Self
    where
        T: PartialOrd + Display,
    {
        if !range.contains(&value) {
            let message = format!(
                "must be between {} and {}, got {}",
                range.start(),
                range.end(),
                value
            );
            self.push(field, message);
        }
        self
    }

    /// Like [`range`](Self::range) but skips unset values
    pub fn optional_range<T>(
        &mut self,
        field: &str,
        value: Option<T>,
        range: RangeInclusive<T>,
    ) -> &mut Self
    where
        T: PartialOrd + Display,
    {
        if let Some(value) = value {
            self.range(field, value, range);
        }
        self
    }

    /// Requires `value` to be at least the value of `floor_field`
    pub fn at_least<T>(&mut self, field: &str, value: T, floor_field: &str, floor: T) -> &mut Self
    where
        T: PartialOrd + Display,
    {
        if value < floor {
            let message = format!("must be at least {} ({}), got {}", floor_field, floor, value);
            self.push(field, message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn push(&mut self, field: &str, message: String) {
        let field = if self.prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", self.prefix, field)
        };
        self.errors.push(ValidationError::new(field, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Window {
        low: u64,
        high: u64,
    }

    impl ConfigSection for Window {
        const NAME: &'static str = "window";

        fn check(&self, checks: &mut Checks) {
            checks
                .range("low", self.low, 0..=100)
                .at_least("high", self.high, "low", self.low);
        }
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let mut checks = Checks::default();
        checks.range("a", 1, 1..=10).range("b", 10, 1..=10);
        assert!(checks.is_empty());

        checks.range("c", 11, 1..=10);
        let errors = checks.into_result().unwrap_err();
        assert_eq!(errors[0].to_string(), "c must be between 1 and 10, got 11");
    }

    #[test]
    fn test_optional_range_skips_unset() {
        let mut checks = Checks::default();
        checks
            .optional_range::<u32>("a", None, 1..=10)
            .optional_range("b", Some(0), 1..=10);
        assert_eq!(checks.into_result().unwrap_err().len(), 1);
    }

    #[test]
    fn test_section_prefixes_fields() {
        let errors = Window { low: 200, high: 50 }.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["window.low", "window.high"]);
        assert_eq!(
            errors[1].message,
            "must be at least low (200), got 50"
        );
    }

    #[test]
    fn test_prefix_restored_after_section() {
        let mut checks = Checks::default();
        checks.section(&Window { low: 1, high: 0 }).range("top", 5, 0..=1);

        let errors = checks.into_result().unwrap_err();
        assert_eq!(errors[0].field, "window.high");
        assert_eq!(errors[1].field, "top");
    }
}
