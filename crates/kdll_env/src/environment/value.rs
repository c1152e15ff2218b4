//! Typed environment variable descriptors.
//!
//! [`TypedEnvVar`] pairs an [`EnvVar`] with parse/format callbacks so callers
//! read and write strongly typed values instead of raw strings. Scoped guards
//! restore whatever the process environment held before.
//!
//! ```
//! use kdll_env::MAX_COMBINED_KERNELS;
//!
//! let guard = MAX_COMBINED_KERNELS.set_guard(32).expect("set max kernels");
//! assert_eq!(*guard, 32);
//! assert_eq!(MAX_COMBINED_KERNELS.get().unwrap(), Some(32));
//! ```

use std::{fmt, marker::PhantomData, ops::Deref};

use super::{EnvVar, Environment, guard::EnvVarGuard};

/// Errors emitted when interacting with typed environment variables.
#[derive(Debug, thiserror::Error)]
pub enum EnvVarError {
    /// The environment value could not be parsed into the desired type.
    #[error("failed to parse environment variable {name} from '{value}': {source}")]
    Parse {
        name: &'static str,
        value: String,
        source: EnvVarParseError,
    },
    /// The provided value could not be formatted for storage.
    #[error("failed to format environment variable {name}: {source}")]
    Format { name: &'static str, source: EnvVarFormatError },
}

macro_rules! callback_error {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            pub fn new(message: impl Into<String>) -> Self {
                Self(message.into())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::error::Error for $name {}
    };
}

callback_error!(
    /// Raised by a [`TypedEnvVar`] parse callback.
    EnvVarParseError
);
callback_error!(
    /// Raised by a [`TypedEnvVar`] format callback.
    EnvVarFormatError
);

/// Callback used to parse an environment string into a concrete value.
pub type ParseFn<T> = fn(&str) -> Result<T, EnvVarParseError>;
/// Callback used to format a typed value before storing it in the environment.
pub type FormatFn<T> = fn(&T) -> Result<String, EnvVarFormatError>;

/// Descriptor for a strongly-typed environment variable.
#[derive(Clone, Copy)]
pub struct TypedEnvVar<T> {
    var: EnvVar,
    parse: ParseFn<T>,
    format: FormatFn<T>,
    _marker: PhantomData<T>,
}

impl<T> TypedEnvVar<T> {
    pub const fn new(var: EnvVar, parse: ParseFn<T>, format: FormatFn<T>) -> Self {
        Self {
            var,
            parse,
            format,
            _marker: PhantomData,
        }
    }

    fn format_value(&self, value: &T) -> Result<String, EnvVarError> {
        (self.format)(value).map_err(|source| EnvVarError::Format { name: self.key(), source })
    }

    /// Canonical environment variable key.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.var.key()
    }

    /// Read the environment variable and parse it into the typed value.
    pub fn get(&self) -> Result<Option<T>, EnvVarError> {
        match Environment::get(self.var) {
            Some(raw) => (self.parse)(raw.trim()).map(Some).map_err(|source| EnvVarError::Parse {
                name: self.key(),
                value: raw,
                source,
            }),
            None => Ok(None),
        }
    }

    /// Read the variable, falling back to `default` when it is absent.
    ///
    /// A present but malformed value is still reported as an error.
    pub fn get_or(&self, default: T) -> Result<T, EnvVarError> {
        Ok(self.get()?.unwrap_or(default))
    }

    /// Store `value` until the returned guard drops.
    pub fn set_guard(&self, value: T) -> Result<TypedEnvVarGuard<T>, EnvVarError> {
        let formatted = self.format_value(&value)?;
        Ok(TypedEnvVarGuard {
            restore: EnvVarGuard::set(self.var, &formatted),
            value,
        })
    }

    /// Remove the variable until the returned guard drops.
    pub fn unset_guard(&self) -> EnvVarGuard {
        EnvVarGuard::unset(self.var)
    }
}

/// Typed override; derefs to the value that was stored.
#[must_use = "the override is undone as soon as the guard is dropped"]
pub struct TypedEnvVarGuard<T> {
    restore: EnvVarGuard,
    value: T,
}

impl<T> TypedEnvVarGuard<T> {
    /// Keep the override alive but give back the stored value.
    pub fn into_parts(self) -> (T, EnvVarGuard) {
        (self.value, self.restore)
    }
}

impl<T> Deref for TypedEnvVarGuard<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

pub(crate) fn parse_bool(value: &str) -> Result<bool, EnvVarParseError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EnvVarParseError::new("value is not a recognised boolean")),
    }
}

pub(crate) fn format_display<T: fmt::Display>(value: &T) -> Result<String, EnvVarFormatError> {
    Ok(value.to_string())
}

pub(crate) fn parse_usize(value: &str) -> Result<usize, EnvVarParseError> {
    parse_unsigned(value).and_then(|v| usize::try_from(v).map_err(|_| EnvVarParseError::new("value does not fit in usize")))
}

pub(crate) fn parse_u32(value: &str) -> Result<u32, EnvVarParseError> {
    parse_unsigned(value).and_then(|v| u32::try_from(v).map_err(|_| EnvVarParseError::new("value does not fit in u32")))
}

/// Accepts decimal or `0x`-prefixed hexadecimal, with optional `_` separators.
fn parse_unsigned(value: &str) -> Result<u64, EnvVarParseError> {
    let cleaned: String = value.chars().filter(|c| *c != '_').collect();
    let parsed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse::<u64>(),
    };
    parsed.map_err(|err| EnvVarParseError::new(format!("invalid unsigned integer: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unsigned_accepts_hex_and_separators() {
        assert_eq!(parse_u32("0xffff_0000").unwrap(), 0xffff_0000);
        assert_eq!(parse_u32("0X10").unwrap(), 16);
        assert_eq!(parse_usize("131_072").unwrap(), 131_072);
        assert!(parse_u32("0x1_0000_0000").is_err());
        assert!(parse_usize("-4").is_err());
    }

    #[test]
    fn parse_bool_is_case_insensitive() {
        assert!(parse_bool("YES").unwrap());
        assert!(!parse_bool("Off").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
