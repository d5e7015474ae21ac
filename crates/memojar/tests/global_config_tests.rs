//! Global default cache directory
//!
//! Kept in its own test binary: the default is fixed once per process.

use memojar::{
    BoundCall, CallArgs, Error, Memo, MemoContext, Signature, default_cache_dir, function_id,
    set_default_cache_dir,
};
use tempfile::TempDir;

#[test]
fn default_dir_is_fixed_once_and_used_by_new_wrappers() {
    let tmp = TempDir::new().unwrap();
    set_default_cache_dir(tmp.path()).unwrap();
    assert_eq!(default_cache_dir(), Some(tmp.path()));

    let err = set_default_cache_dir("/somewhere/else").unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration { .. }));
    assert_eq!(MemoContext::global().cache_dir(), Some(tmp.path()));

    let square = Memo::builder(function_id!(square), Signature::new().param("n"))
        .wrap(|call: &BoundCall| call.get::<i64>("n").unwrap().pow(2))
        .unwrap();
    assert_eq!(square.memo().root(), tmp.path());
    assert_eq!(square.call(&CallArgs::new().arg(12)).unwrap(), 144);
    assert!(
        tmp.path()
            .join("global_config_tests/square/_n-12_.json")
            .is_file()
    );

    // An explicit directory still wins over the default
    let other = TempDir::new().unwrap();
    let cube = Memo::builder(function_id!("cube"), Signature::new().param("n"))
        .cache_dir(other.path())
        .wrap(|call: &BoundCall| call.get::<i64>("n").unwrap().pow(3))
        .unwrap();
    assert_eq!(cube.memo().root(), other.path());
}
