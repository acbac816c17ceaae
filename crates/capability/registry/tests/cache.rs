//! ID 缓存文件读写测试。

use sensornet_registry::IdCache;

#[test]
fn missing_cache_file_reads_as_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = IdCache::new(dir.path().join("given_ids.json"));
    assert!(cache.load().expect("load").is_empty());
}

#[test]
fn store_then_load_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = IdCache::new(dir.path().join("given_ids.json"));
    cache.store(&[1, 4, 7]).expect("store");
    assert_eq!(cache.load().expect("load"), vec![1, 4, 7]);

    // 整体重写，不追加
    cache.store(&[2]).expect("store");
    assert_eq!(cache.load().expect("load"), vec![2]);
}

#[test]
fn corrupt_cache_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("given_ids.json");
    std::fs::write(&path, "not json").expect("write");
    assert!(IdCache::new(path).load().is_err());
}
