//! Every environment variable the kernel cache crates read, grouped by owner.

pub mod cache;
pub mod guard;
pub mod instrument;
pub mod value;

use std::sync::{Mutex, MutexGuard};

use cache::CacheEnvVar;
use instrument::InstrumentEnvVar;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvVar {
    Instrument(InstrumentEnvVar),
    Cache(CacheEnvVar),
}

macro_rules! env_group {
    ($variant:ident, $group:ty) => {
        impl From<$group> for EnvVar {
            fn from(value: $group) -> Self {
                Self::$variant(value)
            }
        }
    };
}

env_group!(Instrument, InstrumentEnvVar);
env_group!(Cache, CacheEnvVar);

impl EnvVar {
    /// The `KDLL_*` name looked up in the process environment.
    pub const fn key(self) -> &'static str {
        match self {
            EnvVar::Instrument(var) => var.key(),
            EnvVar::Cache(var) => var.key(),
        }
    }
}

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Entry point for reading and overriding variables.
///
/// Reads go straight to the process environment. Writes are only reachable
/// through [`guard::EnvVarGuard`] and always happen while [`Environment::lock`]
/// is held.
pub struct Environment;

impl Environment {
    /// Serialises environment writes; a poisoned lock is recovered.
    pub fn lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(var: impl Into<EnvVar>) -> Option<String> {
        std::env::var(var.into().key()).ok()
    }

    pub(crate) fn set_locked(var: EnvVar, value: &str, _held: &mut MutexGuard<'static, ()>) {
        // SAFETY: `_held` is the process-wide environment lock.
        unsafe { std::env::set_var(var.key(), value) };
    }

    pub(crate) fn remove_locked(var: EnvVar, _held: &mut MutexGuard<'static, ()>) {
        // SAFETY: as for `set_locked`.
        unsafe { std::env::remove_var(var.key()) };
    }
}
