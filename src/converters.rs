//! Typed value conversions keyed by `(source type, target type)`.
//!
//! A [`ConverterRegistry`] is a plain value: build one at startup, register
//! the conversions the application needs and share it (for example behind an
//! `Arc`) with the handlers that use it. There is no process-global registry.
//!
//! ```rust
//! use routeport::converters::{ConvertError, ConverterRegistry};
//!
//! struct Celsius(f64);
//!
//! let mut registry = ConverterRegistry::new();
//! registry.register(|c: &Celsius| format!("{:.1}°C", c.0));
//! assert_eq!(registry.convert::<Celsius, String>(&Celsius(21.5)).unwrap(), "21.5°C");
//!
//! registry.remove::<Celsius, String>();
//! let err = registry.convert::<Celsius, String>(&Celsius(0.0)).unwrap_err();
//! assert_eq!(err.to_string(), "No converter for Celsius -> String");
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("No converter for {from} -> {to}")]
    NoConverter { from: String, to: String },
}

type Converter = Box<dyn Fn(&dyn Any) -> Option<Box<dyn Any>> + Send + Sync>;

#[derive(Default)]
pub struct ConverterRegistry {
    converters: HashMap<(TypeId, TypeId), Converter>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .finish()
    }
}

impl ConverterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the conversion `S -> T`, replacing any previous one.
    pub fn register<S, T, F>(&mut self, convert: F)
    where
        S: 'static,
        T: 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let converter: Converter = Box::new(move |value: &dyn Any| {
            value
                .downcast_ref::<S>()
                .map(|s| Box::new(convert(s)) as Box<dyn Any>)
        });
        self.converters
            .insert((TypeId::of::<S>(), TypeId::of::<T>()), converter);
    }

    /// Drop the conversion `S -> T`. Removing an absent conversion is a no-op;
    /// the return value tells whether one was registered.
    pub fn remove<S: 'static, T: 'static>(&mut self) -> bool {
        self.converters
            .remove(&(TypeId::of::<S>(), TypeId::of::<T>()))
            .is_some()
    }

    #[must_use]
    pub fn contains<S: 'static, T: 'static>(&self) -> bool {
        self.converters
            .contains_key(&(TypeId::of::<S>(), TypeId::of::<T>()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Convert `value` with the registered `S -> T` conversion.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::NoConverter`] when nothing is registered for
    /// the pair.
    pub fn convert<S: 'static, T: 'static>(&self, value: &S) -> Result<T, ConvertError> {
        self.converters
            .get(&(TypeId::of::<S>(), TypeId::of::<T>()))
            .and_then(|convert| convert(value as &dyn Any))
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
            .ok_or_else(|| ConvertError::NoConverter {
                from: short_type_name(type_name::<S>()),
                to: short_type_name(type_name::<T>()),
            })
    }
}

/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut path = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            path.push(c);
        } else {
            out.push_str(path.rsplit("::").next().unwrap_or_default());
            path.clear();
            out.push(c);
        }
    }
    out.push_str(path.rsplit("::").next().unwrap_or_default());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        given_name: String,
        family_name: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Company {
        id: String,
        people: Vec<Person>,
    }

    #[test]
    fn test_register_convert_remove() {
        let mut registry = ConverterRegistry::new();
        registry.register(|n: &u32| n.to_string());
        assert_eq!(registry.convert::<u32, String>(&42).unwrap(), "42");
        assert!(registry.contains::<u32, String>());

        assert!(registry.remove::<u32, String>());
        assert_eq!(
            registry.convert::<u32, String>(&42).unwrap_err(),
            ConvertError::NoConverter {
                from: "u32".into(),
                to: "String".into()
            }
        );
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = ConverterRegistry::new();
        assert!(!registry.remove::<i32, std::time::Duration>());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_nested_conversion() {
        let mut registry = ConverterRegistry::new();
        registry.register(|p: &Person| {
            BTreeMap::from([
                ("givenName".to_string(), p.given_name.clone()),
                ("familyName".to_string(), p.family_name.clone()),
            ])
        });
        let people = registry.convert::<Person, BTreeMap<String, String>>(&Person {
            given_name: "John".into(),
            family_name: "Smith".into(),
        });
        assert_eq!(people.unwrap()["givenName"], "John");

        let company = Company {
            id: "1".into(),
            people: vec![Person {
                given_name: "Ada".into(),
                family_name: "Lovelace".into(),
            }],
        };
        let converted: Vec<BTreeMap<String, String>> = company
            .people
            .iter()
            .map(|p| registry.convert::<Person, BTreeMap<String, String>>(p))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(company.id, "1");
        assert_eq!(converted[0]["familyName"], "Lovelace");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(
            short_type_name("alloc::vec::Vec<alloc::string::String>"),
            "Vec<String>"
        );
        assert_eq!(short_type_name("u8"), "u8");
        assert_eq!(
            short_type_name("std::collections::HashMap<u8, core::time::Duration>"),
            "HashMap<u8, Duration>"
        );
    }
}
