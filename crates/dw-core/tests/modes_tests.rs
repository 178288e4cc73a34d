//! Modes 1, 3 and 4 through the `DualWriter` front

use dw_core::{method, DualWriterMode};
use dw_store::{
    Context, CreateOptions, DeleteOptions, GetOptions, ListOptions, ReplaceObject, Storage,
    StoreError, UpdateOptions,
};
use dw_test_utils::{memory_pair, playlist, seed, writer, FakeRecorder, ProbeStorage};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn mode1_reads_legacy_only() {
    let (legacy, target) = memory_pair();
    seed(&*legacy, [playlist("a")]).await.unwrap();
    let probe = ProbeStorage::wrap(target);
    let recorder = FakeRecorder::new();
    let dw = writer(DualWriterMode::Mode1, legacy, probe.clone(), recorder.clone());
    let ctx = Context::new();

    assert_eq!(dw.get(&ctx, "a", &GetOptions::default()).await.unwrap().name(), "a");
    assert_eq!(dw.list(&ctx, &ListOptions::default()).await.unwrap().len(), 1);
    assert_eq!(probe.calls("get"), 0);
    assert_eq!(probe.calls("list"), 0);
    assert!(recorder.outcomes(method::GET).is_empty());
}

#[tokio::test]
async fn mode1_returns_legacy_result_and_shadows_target() {
    let (legacy, target) = memory_pair();
    let recorder = FakeRecorder::new();
    let dw = writer(DualWriterMode::Mode1, legacy.clone(), target.clone(), recorder.clone());
    let ctx = Context::new();

    let created = dw
        .create(&ctx, playlist("a"), None, &CreateOptions::default())
        .await
        .unwrap();

    assert_eq!(created, legacy.get(&ctx, "a", &GetOptions::default()).await.unwrap());
    let shadow = target.get(&ctx, "a", &GetOptions::default()).await.unwrap();
    assert_eq!(shadow.uid(), created.uid());
    assert_eq!(recorder.outcomes(method::CREATE), vec![("a".to_string(), true)]);
}

#[tokio::test]
async fn mode1_target_failures_are_not_propagated() {
    let (legacy, target) = memory_pair();
    let probe = ProbeStorage::wrap(target);
    for method in ["create", "get", "update", "delete"] {
        probe.fail_on(method, StoreError::Unavailable("target down".into()));
    }
    let recorder = FakeRecorder::new();
    let dw = writer(DualWriterMode::Mode1, legacy.clone(), probe, recorder.clone());
    let ctx = Context::new();

    dw.create(&ctx, playlist("a"), None, &CreateOptions::default())
        .await
        .unwrap();
    let current = legacy.get(&ctx, "a", &GetOptions::default()).await.unwrap();
    dw.update(
        &ctx,
        "a",
        &ReplaceObject(current.with_spec(json!({"interval": "1m"}))),
        None,
        None,
        false,
        &UpdateOptions::default(),
    )
    .await
    .unwrap();
    dw.delete(&ctx, "a", None, &DeleteOptions::default())
        .await
        .unwrap();

    assert!(legacy.is_empty());
    assert_eq!(recorder.storage_durations(method::CREATE), vec![true]);
    assert!(recorder.outcomes(method::CREATE).is_empty());
}

#[tokio::test]
async fn mode1_legacy_delete_not_found_is_an_error() {
    let (legacy, target) = memory_pair();
    seed(&*target, [playlist("a")]).await.unwrap();
    let dw = writer(DualWriterMode::Mode1, legacy, target.clone(), FakeRecorder::new());

    let err = dw
        .delete(&Context::new(), "a", None, &DeleteOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(target.len(), 1);
}

#[tokio::test]
async fn mode1_introspection_uses_legacy() {
    let legacy = std::sync::Arc::new(dw_store::MemoryStorage::new("Playlist", "legacy-playlist"));
    let (_, target) = memory_pair();
    let dw = writer(DualWriterMode::Mode1, legacy, target, FakeRecorder::new());
    assert_eq!(dw.singular_name(), "legacy-playlist");
}

#[tokio::test]
async fn mode3_writes_both_reads_target() {
    let (legacy, target) = memory_pair();
    let legacy_probe = ProbeStorage::wrap(legacy.clone());
    let recorder = FakeRecorder::new();
    let dw = writer(DualWriterMode::Mode3, legacy_probe.clone(), target.clone(), recorder.clone());
    let ctx = Context::new();

    let created = dw
        .create(&ctx, playlist("a"), None, &CreateOptions::default())
        .await
        .unwrap();
    assert_eq!(legacy.len(), 1);
    assert_eq!(created, target.get(&ctx, "a", &GetOptions::default()).await.unwrap());

    dw.get(&ctx, "a", &GetOptions::default()).await.unwrap();
    dw.list(&ctx, &ListOptions::default()).await.unwrap();
    assert_eq!(legacy_probe.calls("get"), 0);
    assert_eq!(legacy_probe.calls("list"), 0);
    assert!(recorder.outcomes(method::GET).is_empty());
    assert!(recorder.outcomes(method::LIST).is_empty());
}

#[tokio::test]
async fn mode3_get_has_no_fallback() {
    let (legacy, target) = memory_pair();
    seed(&*legacy, [playlist("a")]).await.unwrap();
    let dw = writer(DualWriterMode::Mode3, legacy, target, FakeRecorder::new());

    let err = dw
        .get(&Context::new(), "a", &GetOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn mode3_delete_tolerates_legacy_not_found() {
    let (legacy, target) = memory_pair();
    seed(&*target, [playlist("a")]).await.unwrap();
    let dw = writer(DualWriterMode::Mode3, legacy, target.clone(), FakeRecorder::new());

    dw.delete(&Context::new(), "a", None, &DeleteOptions::default())
        .await
        .unwrap();
    assert!(target.is_empty());
}

#[tokio::test]
async fn mode4_never_touches_legacy() {
    let (legacy, target) = memory_pair();
    seed(&*legacy, [playlist("old")]).await.unwrap();
    let legacy_probe = ProbeStorage::wrap(legacy.clone());
    let recorder = FakeRecorder::new();
    let dw = writer(DualWriterMode::Mode4, legacy_probe.clone(), target.clone(), recorder.clone());
    let ctx = Context::new();

    dw.create(&ctx, playlist("a"), None, &CreateOptions::default())
        .await
        .unwrap();
    let list = dw.list(&ctx, &ListOptions::default()).await.unwrap();
    dw.delete_collection(&ctx, None, &DeleteOptions::default(), &ListOptions::default())
        .await
        .unwrap();

    assert_eq!(list.names().collect::<Vec<_>>(), vec!["a"]);
    assert!(target.is_empty());
    assert_eq!(legacy.len(), 1);
    for method in ["create", "get", "list", "delete", "delete-collection", "update"] {
        assert_eq!(legacy_probe.calls(method), 0, "{method}");
    }
    assert!(recorder.legacy_durations(method::CREATE).is_empty());
    assert_eq!(recorder.storage_durations(method::CREATE), vec![false]);
}

#[tokio::test]
async fn mode4_passes_update_through() {
    let (legacy, target) = memory_pair();
    let dw = writer(DualWriterMode::Mode4, legacy, target.clone(), FakeRecorder::new());

    let (obj, created) = dw
        .update(
            &Context::new(),
            "a",
            &ReplaceObject(playlist("a")),
            None,
            None,
            true,
            &UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert!(created);
    assert_eq!(obj.name(), "a");
    assert_eq!(target.len(), 1);
}
