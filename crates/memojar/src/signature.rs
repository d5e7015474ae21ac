//! Call signatures and argument binding
//!
//! A [`Signature`] describes the parameters of a wrapped function. Binding a
//! [`CallArgs`] against it yields a [`BoundCall`]: every parameter that was
//! supplied positionally, by name or through a default ends up under its name,
//! so equivalent calls written in different styles normalize to the same value.

use crate::value::{ArgValue, FromArg};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// How a parameter may be supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Positionally or by name
    PositionalOrKeyword,
    /// By name only
    KeywordOnly,
    /// Collects every remaining positional argument
    VarPositional,
}

/// One declared parameter
#[derive(Debug, Clone)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// How the parameter may be supplied
    pub kind: ParamKind,
    /// Declared default value
    pub default: Option<ArgValue>,
}

/// Declared parameter list of a wrapped function
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// Empty signature
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required positional-or-keyword parameter
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            default: None,
        });
        self
    }

    /// Add a positional-or-keyword parameter with a default
    #[must_use]
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        default: impl Into<ArgValue>,
    ) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            default: Some(default.into()),
        });
        self
    }

    /// Add a variadic positional parameter
    #[must_use]
    pub fn var_args(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::VarPositional,
            default: None,
        });
        self
    }

    /// Add a keyword-only parameter, optionally with a default
    #[must_use]
    pub fn keyword_only(mut self, name: impl Into<String>, default: Option<ArgValue>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: ParamKind::KeywordOnly,
            default,
        });
        self
    }

    /// Declared parameters in order
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Bind call arguments against this signature.
    ///
    /// Positional values are assigned to parameters in declaration order until
    /// the first variadic or keyword-only parameter; the remainder is kept,
    /// unnamed, in [`BoundCall::rest`]. Defaults fill every parameter the caller
    /// left out.
    pub fn bind(&self, function: &str, call: &CallArgs) -> Result<BoundCall> {
        let mut named = BTreeMap::new();
        let mut positional = call.args.iter();
        let mut bound_positionally = Vec::new();

        for param in &self.params {
            if param.kind != ParamKind::PositionalOrKeyword {
                break;
            }
            let Some(value) = positional.next() else {
                break;
            };
            bound_positionally.push(param.name.as_str());
            named.insert(param.name.clone(), value.clone());
        }
        let rest: Vec<ArgValue> = positional.cloned().collect();

        let overlapping: Vec<String> = bound_positionally
            .iter()
            .filter(|name| call.kwargs.contains_key(**name))
            .map(|name| (*name).to_string())
            .collect();
        if !overlapping.is_empty() {
            return Err(Error::overlapping(function, overlapping));
        }

        for (name, value) in &call.kwargs {
            named.insert(name.clone(), value.clone());
        }

        for param in &self.params {
            if let Some(default) = &param.default
                && !named.contains_key(&param.name)
            {
                named.insert(param.name.clone(), default.clone());
            }
        }

        Ok(BoundCall { named, rest })
    }
}

/// Arguments of one call as written by the caller
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    args: Vec<ArgValue>,
    kwargs: BTreeMap<String, ArgValue>,
}

impl CallArgs {
    /// No arguments
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    #[must_use]
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a named argument
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Positional arguments
    #[must_use]
    pub fn args(&self) -> &[ArgValue] {
        &self.args
    }

    /// Named arguments
    #[must_use]
    pub fn kwargs(&self) -> &BTreeMap<String, ArgValue> {
        &self.kwargs
    }
}

/// A call normalized against its signature
#[derive(Debug, Clone, Default)]
pub struct BoundCall {
    named: BTreeMap<String, ArgValue>,
    rest: Vec<ArgValue>,
}

impl BoundCall {
    /// Value bound to `name`, if any
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&ArgValue> {
        self.named.get(name)
    }

    /// Typed value bound to `name`
    pub fn get<T: FromArg>(&self, name: &str) -> Result<T> {
        let value = self
            .named
            .get(name)
            .ok_or_else(|| Error::missing_argument(name))?;
        T::extract(name, value)
    }

    /// Named values in ascending name order
    #[must_use]
    pub fn named(&self) -> &BTreeMap<String, ArgValue> {
        &self.named
    }

    /// Positional values that were not bound to a name
    #[must_use]
    pub fn rest(&self) -> &[ArgValue] {
        &self.rest
    }
}
