//! Scoped overrides of process environment variables.

use super::{EnvVar, Environment};

/// Value a variable held before the guard touched it.
struct Snapshot {
    var: EnvVar,
    previous: Option<String>,
}

/// Overrides one or more variables and puts them back when dropped.
///
/// Overrides can be chained with [`EnvVarGuard::and_set`] and
/// [`EnvVarGuard::and_unset`]; they are undone in reverse order under a single
/// acquisition of the [`Environment`] mutex, so touching the same variable
/// twice still restores its original value.
#[must_use = "the override is undone as soon as the guard is dropped"]
pub struct EnvVarGuard {
    snapshots: Vec<Snapshot>,
}

impl EnvVarGuard {
    /// Set `var` to `value` until the guard drops.
    pub fn set(var: impl Into<EnvVar>, value: &str) -> Self {
        Self { snapshots: Vec::new() }.and_set(var, value)
    }

    /// Remove `var` until the guard drops.
    pub fn unset(var: impl Into<EnvVar>) -> Self {
        Self { snapshots: Vec::new() }.and_unset(var)
    }

    pub fn and_set(self, var: impl Into<EnvVar>, value: &str) -> Self {
        self.apply(var.into(), Some(value))
    }

    pub fn and_unset(self, var: impl Into<EnvVar>) -> Self {
        self.apply(var.into(), None)
    }

    /// Number of overrides held.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn apply(mut self, var: EnvVar, value: Option<&str>) -> Self {
        let mut lock = Environment::lock();
        let previous = Environment::get(var);
        match value {
            Some(value) => Environment::set_locked(var, value, &mut lock),
            None => Environment::remove_locked(var, &mut lock),
        }
        self.snapshots.push(Snapshot { var, previous });
        self
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        let mut lock = Environment::lock();
        while let Some(Snapshot { var, previous }) = self.snapshots.pop() {
            match previous {
                Some(previous) => Environment::set_locked(var, &previous, &mut lock),
                None => Environment::remove_locked(var, &mut lock),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheEnvVar;

    #[test]
    fn chained_overrides_restore_in_reverse() {
        let var = CacheEnvVar::RefreshRebaseOffset;
        let _baseline = EnvVarGuard::set(var, "7");
        {
            let guard = EnvVarGuard::set(var, "8").and_unset(var).and_set(var, "9");
            assert_eq!(guard.len(), 3);
            assert_eq!(Environment::get(var).as_deref(), Some("9"));
        }
        assert_eq!(Environment::get(var).as_deref(), Some("7"));
    }
}
