use kdll_env::{
    CACHE_BLOCK_SIZE, CacheEnvVar, EnvVarError, EnvVarGuard, Environment, LOG_LEVEL, MAX_COMBINED_KERNELS, NEW_COMBINED_KERNELS, REFRESH_REBASE_OFFSET
};
use serial_test::serial;

#[test]
#[serial]
fn typed_guard_restores_previous_value() {
    let _outer = EnvVarGuard::set(CacheEnvVar::MaxCombinedKernels, "16");
    {
        let guard = MAX_COMBINED_KERNELS.set_guard(48).expect("set guard");
        assert_eq!(*guard, 48);
        assert_eq!(MAX_COMBINED_KERNELS.get().unwrap(), Some(48));
    }
    assert_eq!(MAX_COMBINED_KERNELS.get().unwrap(), Some(16));

    let _unset = MAX_COMBINED_KERNELS.unset_guard();
    assert_eq!(MAX_COMBINED_KERNELS.get().unwrap(), None);
    assert_eq!(MAX_COMBINED_KERNELS.get_or(64).unwrap(), 64);
}

#[test]
#[serial]
fn one_guard_covers_the_whole_cache_group() {
    let _before = EnvVarGuard::unset(CacheEnvVar::CacheBlockSize).and_set(CacheEnvVar::NewCombinedKernels, "2");
    {
        let _group = EnvVarGuard::set(CacheEnvVar::CacheBlockSize, "0x2000")
            .and_set(CacheEnvVar::NewCombinedKernels, "4")
            .and_unset(CacheEnvVar::RefreshRebaseOffset);
        assert_eq!(CACHE_BLOCK_SIZE.get().unwrap(), Some(0x2000));
        assert_eq!(NEW_COMBINED_KERNELS.get().unwrap(), Some(4));
        assert_eq!(REFRESH_REBASE_OFFSET.get().unwrap(), None);
    }
    assert_eq!(Environment::get(CacheEnvVar::CacheBlockSize), None);
    assert_eq!(NEW_COMBINED_KERNELS.get().unwrap(), Some(2));
}

#[test]
#[serial]
fn typed_guard_can_hand_back_its_value() {
    let _clear = MAX_COMBINED_KERNELS.unset_guard();
    let (value, restore) = MAX_COMBINED_KERNELS.set_guard(24).expect("set guard").into_parts();
    assert_eq!(value, 24);
    assert_eq!(MAX_COMBINED_KERNELS.get().unwrap(), Some(24));
    drop(restore);
    assert_eq!(MAX_COMBINED_KERNELS.get().unwrap(), None);
}

#[test]
#[serial]
fn malformed_values_report_the_variable() {
    let _bad = EnvVarGuard::set(CacheEnvVar::RefreshRebaseOffset, "lots");
    match REFRESH_REBASE_OFFSET.get() {
        Err(EnvVarError::Parse { name, value, .. }) => {
            assert_eq!(name, "KDLL_REFRESH_REBASE_OFFSET");
            assert_eq!(value, "lots");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(REFRESH_REBASE_OFFSET.get_or(1).is_err(), "a malformed value is not replaced by the default");

    let _hex = EnvVarGuard::set(CacheEnvVar::RefreshRebaseOffset, "0x8000_0000");
    assert_eq!(REFRESH_REBASE_OFFSET.get().unwrap(), Some(0x8000_0000));
}

#[test]
#[serial]
fn log_level_round_trips_through_the_environment() {
    let _guard = LOG_LEVEL.set_guard(tracing::Level::DEBUG).expect("set log level");
    assert_eq!(LOG_LEVEL.get().unwrap(), Some(tracing::Level::DEBUG));
}
