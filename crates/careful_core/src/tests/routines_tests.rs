use super::*;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::{domain::ProductId, error::ErrorCode};
use storage::{load_json, MemoryStore};

fn step(product_id: i64, order: u32) -> Step {
    Step {
        product_id: ProductId(product_id),
        category: "Serum".into(),
        order,
        instructions: "pat gently".into(),
    }
}

fn four_step_routine(name: &str) -> NewRoutine {
    NewRoutine {
        name: name.into(),
        routine_type: RoutineType::Morning,
        steps: vec![step(1, 1), step(2, 2), step(3, 3), step(4, 4)],
        time: ScheduleTime::default(),
        enabled: true,
    }
}

async fn empty_manager() -> (RoutineStateManager<MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    save_json(&store, ROUTINES_KEY, &RoutineCollections::default())
        .await
        .expect("seed");
    let manager = RoutineStateManager::load(store.clone()).await.expect("load");
    (manager, store)
}

/// Store whose writes can be switched off to exercise rollback.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: Arc<AtomicBool>,
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        self.inner.keys_with_prefix(prefix).await
    }
}

#[tokio::test]
async fn loads_sample_routines_when_nothing_is_stored() {
    let manager = RoutineStateManager::load(MemoryStore::new())
        .await
        .expect("load");
    let morning: Vec<i64> = manager
        .list_routines(RoutineType::Morning)
        .iter()
        .map(|r| r.id.0)
        .collect();
    let evening: Vec<i64> = manager
        .list_routines(RoutineType::Evening)
        .iter()
        .map(|r| r.id.0)
        .collect();
    assert_eq!(morning, vec![1, 3, 4]);
    assert_eq!(evening, vec![2, 5]);
}

#[tokio::test]
async fn unreadable_routines_fall_back_to_samples() {
    let store = MemoryStore::new();
    store.set(ROUTINES_KEY, "{broken").await.expect("set");
    let manager = RoutineStateManager::load(store).await.expect("load");
    assert_eq!(manager.collections(), &sample_routines());
}

#[tokio::test]
async fn create_routine_persists_in_insertion_order() {
    let (mut manager, store) = empty_manager().await;
    let first = manager
        .create_routine(four_step_routine("  Zesty AM  "))
        .await
        .expect("first");
    let second = manager
        .create_routine(four_step_routine("Another AM"))
        .await
        .expect("second");
    assert_ne!(first, second);

    let names: Vec<&str> = manager
        .list_routines(RoutineType::Morning)
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["Zesty AM", "Another AM"]);

    let created = manager.routine(first).expect("routine");
    assert_eq!(created.streak, 0);
    assert_eq!(created.last_used, None);
    assert!(manager.completed_steps(first).is_empty());

    let stored: RoutineCollections = load_json(&store, ROUTINES_KEY)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(stored.morning.len(), 2);
    assert!(stored.evening.is_empty());
}

#[tokio::test]
async fn empty_name_is_rejected_without_persisting() {
    let (mut manager, store) = empty_manager().await;
    let mut input = four_step_routine("");
    input.steps.truncate(1);

    let err = manager.create_routine(input).await.expect_err("invalid");
    assert_eq!(err.code(), ErrorCode::Validation);
    assert!(manager.collections().is_empty());

    let stored: RoutineCollections = load_json(&store, ROUTINES_KEY)
        .await
        .expect("load")
        .expect("present");
    assert!(stored.is_empty());
}

#[tokio::test]
async fn whitespace_name_empty_steps_and_duplicates_are_rejected() {
    let (mut manager, _) = empty_manager().await;

    let err = manager
        .create_routine(four_step_routine("   "))
        .await
        .expect_err("blank name");
    assert!(matches!(err, CoreError::Validation(_)));

    let mut no_steps = four_step_routine("PM");
    no_steps.steps.clear();
    let err = manager.create_routine(no_steps).await.expect_err("no steps");
    assert!(matches!(err, CoreError::Validation(_)));

    let mut duplicated = four_step_routine("PM");
    duplicated.steps.push(step(2, 5));
    let err = manager
        .create_routine(duplicated)
        .await
        .expect_err("duplicate step");
    assert!(matches!(err, CoreError::Validation(_)));

    assert!(manager.collections().is_empty());
}

#[tokio::test]
async fn new_ids_never_reuse_deleted_or_orphaned_ids() {
    let store = MemoryStore::new();
    save_json(&store, ROUTINES_KEY, &sample_routines())
        .await
        .expect("seed");
    save_json(&store, &routine_progress_key(RoutineId(40)), &vec![1])
        .await
        .expect("orphan progress");

    let mut manager = RoutineStateManager::load(store).await.expect("load");
    let first = manager
        .create_routine(four_step_routine("A"))
        .await
        .expect("create");
    assert_eq!(first, RoutineId(41));

    manager.delete_routine(first).await.expect("delete");
    let second = manager
        .create_routine(four_step_routine("B"))
        .await
        .expect("create");
    assert!(second.0 > first.0);
}

#[tokio::test]
async fn toggle_routine_flips_enabled_and_reports_unknown_ids() {
    let (mut manager, store) = empty_manager().await;
    let id = manager
        .create_routine(four_step_routine("AM"))
        .await
        .expect("create");

    assert!(!manager.toggle_routine(id).await.expect("toggle"));
    assert!(manager.toggle_routine(id).await.expect("toggle back"));

    manager.toggle_routine(id).await.expect("toggle");
    let reloaded = RoutineStateManager::load(store).await.expect("reload");
    assert!(!reloaded.routine(id).expect("routine").enabled);

    let err = manager
        .toggle_routine(RoutineId(999))
        .await
        .expect_err("missing");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn deleting_unknown_routine_changes_nothing() {
    let store = MemoryStore::new();
    let mut manager = RoutineStateManager::load(store.clone()).await.expect("load");
    let before = manager.collections().clone();

    let removed = manager.delete_routine(RoutineId(777)).await.expect("delete");
    assert!(!removed);
    assert_eq!(manager.collections(), &before);
    assert_eq!(store.get(ROUTINES_KEY).await.expect("get"), None);
}

#[tokio::test]
async fn delete_removes_routine_from_its_bucket_and_drops_progress() {
    let (mut manager, store) = empty_manager().await;
    let mut evening = four_step_routine("PM");
    evening.routine_type = RoutineType::Evening;
    let id = manager.create_routine(evening).await.expect("create");
    manager
        .toggle_step_completion(id, ProductId(1))
        .await
        .expect("toggle");

    assert!(manager.delete_routine(id).await.expect("delete"));
    assert!(manager.list_routines(RoutineType::Evening).is_empty());
    assert!(manager.completed_steps(id).is_empty());
    assert_eq!(
        store.get(&routine_progress_key(id)).await.expect("get"),
        None
    );
}

#[tokio::test]
async fn progress_walkthrough_for_four_step_routine() {
    let (mut manager, _) = empty_manager().await;
    let id = manager
        .create_routine(four_step_routine("AM"))
        .await
        .expect("create");

    manager
        .toggle_step_completion(id, ProductId(1))
        .await
        .expect("step 1");
    manager
        .toggle_step_completion(id, ProductId(3))
        .await
        .expect("step 3");

    let progress = manager.progress(id).expect("progress");
    assert_eq!(progress.completed_count, 2);
    assert_eq!(progress.percentage, 50.0);
    assert!(!progress.is_completed);

    manager.mark_all_complete(id).await.expect("complete all");
    let progress = manager.progress(id).expect("progress");
    assert_eq!(progress.completed_count, 4);
    assert!(progress.is_completed);
    assert_eq!(progress.rounded_percentage(), 100);

    manager.reset_progress(id).await.expect("reset");
    let progress = manager.progress(id).expect("progress");
    assert_eq!(progress.completed_count, 0);
    assert!(!progress.has_progress());
}

#[tokio::test]
async fn toggling_a_step_twice_restores_prior_state() {
    let (mut manager, _) = empty_manager().await;
    let id = manager
        .create_routine(four_step_routine("AM"))
        .await
        .expect("create");
    manager
        .toggle_step_completion(id, ProductId(2))
        .await
        .expect("seed");
    let before = manager.completed_steps(id).to_vec();

    assert!(manager
        .toggle_step_completion(id, ProductId(4))
        .await
        .expect("on"));
    assert!(!manager
        .toggle_step_completion(id, ProductId(4))
        .await
        .expect("off"));
    assert_eq!(manager.completed_steps(id), before.as_slice());
}

#[tokio::test]
async fn completed_count_never_exceeds_step_count() {
    let (mut manager, _) = empty_manager().await;
    let id = manager
        .create_routine(four_step_routine("AM"))
        .await
        .expect("create");

    let script = [1, 2, 2, 3, 4, 1, 4, 3];
    for (round, product) in script.iter().enumerate() {
        manager
            .toggle_step_completion(id, ProductId(*product))
            .await
            .expect("toggle");
        if round % 3 == 0 {
            manager.mark_all_complete(id).await.expect("complete all");
        }
        let progress = manager.progress(id).expect("progress");
        assert!(progress.completed_count <= progress.step_count);
        assert!(progress.percentage <= 100.0);
    }

    let err = manager
        .toggle_step_completion(id, ProductId(99))
        .await
        .expect_err("foreign step");
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(manager.completed_steps(id).len() <= 4);
}

#[tokio::test]
async fn step_operations_on_unknown_routine_fail_with_not_found() {
    let (mut manager, _) = empty_manager().await;
    let missing = RoutineId(12345);
    for err in [
        manager
            .toggle_step_completion(missing, ProductId(1))
            .await
            .expect_err("toggle"),
        manager.mark_all_complete(missing).await.expect_err("all"),
        manager.reset_progress(missing).await.expect_err("reset"),
    ] {
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
    assert!(manager.progress(missing).is_err());
}

#[tokio::test]
async fn progress_is_persisted_as_ordered_step_ids() {
    let (mut manager, store) = empty_manager().await;
    let id = manager
        .create_routine(four_step_routine("AM"))
        .await
        .expect("create");
    manager
        .toggle_step_completion(id, ProductId(3))
        .await
        .expect("3");
    manager
        .toggle_step_completion(id, ProductId(1))
        .await
        .expect("1");

    let raw = store
        .get(&routine_progress_key(id))
        .await
        .expect("get")
        .expect("present");
    assert_eq!(raw, "[3,1]");

    let reloaded = RoutineStateManager::load(store).await.expect("reload");
    assert_eq!(
        reloaded.completed_steps(id),
        &[ProductId(3), ProductId(1)]
    );
}

#[tokio::test]
async fn stored_progress_for_foreign_steps_is_dropped_on_load() {
    let store = MemoryStore::new();
    save_json(&store, &routine_progress_key(RoutineId(1)), &vec![1, 1, 42, 5])
        .await
        .expect("seed");
    store
        .set(&routine_progress_key(RoutineId(2)), "nonsense")
        .await
        .expect("seed");

    let manager = RoutineStateManager::load(store).await.expect("load");
    assert_eq!(
        manager.completed_steps(RoutineId(1)),
        &[ProductId(1), ProductId(5)]
    );
    assert!(manager.completed_steps(RoutineId(2)).is_empty());
}

#[test]
fn zero_steps_yield_zero_percent() {
    let progress = ProgressInfo::compute(0, 0);
    assert_eq!(progress.percentage, 0.0);
    assert!(!progress.is_completed);

    let third = ProgressInfo::compute(1, 3);
    assert!((third.percentage - 33.333_333).abs() < 0.001);
    assert_eq!(third.rounded_percentage(), 33);
}

#[tokio::test]
async fn streak_and_last_used_are_tracked() {
    let (mut manager, _) = empty_manager().await;
    let id = manager
        .create_routine(four_step_routine("AM"))
        .await
        .expect("create");
    assert_eq!(manager.increment_streak(id).await.expect("streak"), 1);
    assert_eq!(manager.increment_streak(id).await.expect("streak"), 2);

    let at = Utc::now();
    manager.mark_used(id, at).await.expect("used");
    assert_eq!(manager.routine(id).expect("routine").last_used, Some(at));
}

#[tokio::test]
async fn reset_to_samples_restores_fixture_routines() {
    let (mut manager, _) = empty_manager().await;
    let custom = manager
        .create_routine(four_step_routine("Custom"))
        .await
        .expect("create");

    manager.reset_to_samples().await.expect("reset");
    assert_eq!(manager.collections(), &sample_routines());
    assert!(manager.routine(custom).is_none());

    let next = manager
        .create_routine(four_step_routine("After reset"))
        .await
        .expect("create");
    assert!(next.0 > custom.0);
}

#[tokio::test]
async fn failed_writes_leave_no_partial_state() {
    let store = FlakyStore::default();
    save_json(&store, ROUTINES_KEY, &RoutineCollections::default())
        .await
        .expect("seed");
    let mut manager = RoutineStateManager::load(store.clone()).await.expect("load");
    let id = manager
        .create_routine(four_step_routine("AM"))
        .await
        .expect("create");

    store.fail_writes.store(true, Ordering::SeqCst);

    let err = manager
        .create_routine(four_step_routine("PM"))
        .await
        .expect_err("write fails");
    assert_eq!(err.code(), ErrorCode::Storage);
    assert_eq!(manager.collections().len(), 1);

    manager.toggle_routine(id).await.expect_err("write fails");
    assert!(manager.routine(id).expect("routine").enabled);

    manager
        .toggle_step_completion(id, ProductId(1))
        .await
        .expect_err("write fails");
    assert!(manager.completed_steps(id).is_empty());
}

#[test]
fn candidate_steps_follow_selection_order() {
    let selected = vec![
        CandidateProduct {
            id: ProductId(5),
            name: "SPF".into(),
            category: "Sunscreen".into(),
            conflicts: vec![],
            warning: None,
        },
        CandidateProduct {
            id: ProductId(1),
            name: "Wash".into(),
            category: "Cleanser".into(),
            conflicts: vec![],
            warning: None,
        },
    ];
    let steps = steps_from_candidates(&selected);
    assert_eq!(steps[0].product_id, ProductId(5));
    assert_eq!(steps[0].order, 1);
    assert_eq!(steps[1].category, "Cleanser");
    assert_eq!(steps[1].order, 2);
}

fn stored_routine(id: i64, name: &str, routine_type: RoutineType) -> Routine {
    Routine {
        id: RoutineId(id),
        name: name.into(),
        routine_type,
        steps: vec![step(42, 1)],
        time: ScheduleTime::default(),
        enabled: true,
        streak: 0,
        last_used: None,
    }
}

async fn manager_with(
    routines: RoutineCollections,
) -> (RoutineStateManager<MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    save_json(&store, ROUTINES_KEY, &routines).await.expect("seed");
    let manager = RoutineStateManager::load(store.clone()).await.expect("load");
    (manager, store)
}

#[tokio::test]
async fn created_routines_skip_sample_ids_and_lose_progress_on_reset() {
    let (mut manager, store) = empty_manager().await;
    let custom = manager
        .create_routine(four_step_routine("Custom"))
        .await
        .expect("create");
    assert!(sample_routines().find(custom).is_none());
    manager
        .toggle_step_completion(custom, ProductId(1))
        .await
        .expect("toggle");

    manager.reset_to_samples().await.expect("reset");

    assert!(manager.routine(custom).is_none());
    assert!(manager.completed_steps(custom).is_empty());
    assert_eq!(
        store.get(&routine_progress_key(custom)).await.expect("get"),
        None
    );
    for sample in sample_routines().iter() {
        assert!(manager.completed_steps(sample.id).is_empty());
    }
}

#[tokio::test]
async fn reset_keeps_progress_of_sample_routines_already_present() {
    let store = MemoryStore::new();
    let mut manager = RoutineStateManager::load(store.clone()).await.expect("load");
    manager
        .toggle_step_completion(RoutineId(1), ProductId(3))
        .await
        .expect("toggle");

    manager.reset_to_samples().await.expect("reset");

    assert_eq!(manager.completed_steps(RoutineId(1)), &[ProductId(3)]);
    assert_eq!(
        store
            .get(&routine_progress_key(RoutineId(1)))
            .await
            .expect("get")
            .as_deref(),
        Some("[3]")
    );
}

#[tokio::test]
async fn reset_drops_progress_of_stored_routine_sharing_a_sample_id() {
    let mut routines = RoutineCollections::default();
    routines
        .evening
        .push(stored_routine(1, "Imported", RoutineType::Evening));
    let (mut manager, store) = manager_with(routines).await;
    manager
        .toggle_step_completion(RoutineId(1), ProductId(42))
        .await
        .expect("toggle");

    manager.reset_to_samples().await.expect("reset");

    let restored = manager.routine(RoutineId(1)).expect("sample routine");
    assert_eq!(restored.name, "My Morning Routine");
    assert!(manager.completed_steps(RoutineId(1)).is_empty());
    assert_eq!(
        store
            .get(&routine_progress_key(RoutineId(1)))
            .await
            .expect("get"),
        None
    );
}

#[tokio::test]
async fn last_id_below_the_limit_is_assigned_once() {
    let mut routines = RoutineCollections::default();
    routines
        .morning
        .push(stored_routine(i64::MAX - 1, "Edge", RoutineType::Morning));
    let (mut manager, _) = manager_with(routines).await;

    let id = manager
        .create_routine(four_step_routine("Last"))
        .await
        .expect("create");
    assert_eq!(id, RoutineId(i64::MAX));

    let err = manager
        .create_routine(four_step_routine("One too many"))
        .await
        .expect_err("exhausted");
    assert_eq!(err.code(), ErrorCode::Internal);
    assert_eq!(manager.collections().len(), 2);
}

#[tokio::test]
async fn stored_max_id_loads_but_refuses_new_routines() {
    let mut routines = sample_routines();
    routines
        .evening
        .push(stored_routine(i64::MAX, "Overflow", RoutineType::Evening));
    let (mut manager, store) = manager_with(routines).await;
    assert_eq!(manager.collections().len(), 6);

    let err = manager
        .create_routine(four_step_routine("Fresh"))
        .await
        .expect_err("exhausted");
    assert_eq!(err.code(), ErrorCode::Internal);
    assert_eq!(manager.collections().len(), 6);

    let stored: RoutineCollections = load_json(&store, ROUTINES_KEY)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(stored.len(), 6);
}

#[tokio::test]
async fn progress_key_at_max_id_also_exhausts_ids() {
    let store = MemoryStore::new();
    save_json(&store, &routine_progress_key(RoutineId(i64::MAX)), &vec![1])
        .await
        .expect("orphan progress");
    let mut manager = RoutineStateManager::load(store).await.expect("load");

    let err = manager
        .create_routine(four_step_routine("Fresh"))
        .await
        .expect_err("exhausted");
    assert_eq!(err.code(), ErrorCode::Internal);
}
