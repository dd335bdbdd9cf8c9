//! End-to-end undo/redo scenarios across tracked containers
//!
//! Each test drives containers through a [`Session`] the way a host
//! application would: user actions are grouped into scopes, committed, and
//! then undone or redone through the stack manager.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use undoscope_collections::{
    CollectionChange, CollectionError, ContainerOptions, ObserverError, ObserverResult, TrackedList,
    TrackedMap, TrackedProperty,
};
use undoscope_core::{EngineConfig, ScopeKind, ScopeStackManager, UndoScopeError};
use undoscope_integration_tests::Session;

fn abc(session: &Session) -> TrackedList<&'static str> {
    TrackedList::with_items(Arc::clone(&session.context), vec!["A", "B", "C"])
}

#[tokio::test]
async fn test_add_and_remove_undo_then_redo() {
    let session = Session::new().unwrap();
    let list = abc(&session);

    session.perform("Edit", || {
        list.add("D");
        list.remove_at(0);
    });
    assert_eq!(list.to_snapshot(), vec!["B", "C", "D"]);

    session.manager.undo(None).await.unwrap();
    assert_eq!(list.to_snapshot(), vec!["A", "B", "C"]);
    assert!(session.manager.can_redo());

    session.manager.redo(None).await.unwrap();
    assert_eq!(list.to_snapshot(), vec!["B", "C", "D"]);
    assert!(session.manager.can_undo());
    assert!(!session.manager.can_redo());
}

#[tokio::test]
async fn test_move_lands_at_final_position_and_undoes_exactly() {
    let session = Session::new().unwrap();
    let list = TrackedList::with_items(
        Arc::clone(&session.context),
        vec!["A", "B", "C", "D", "E"],
    );

    session.perform("Move forward", || {
        list.move_item(0, 3);
    });
    assert_eq!(list.to_snapshot(), vec!["B", "C", "D", "A", "E"]);

    session.perform("Move adjacent", || {
        list.move_item(1, 2);
    });
    assert_eq!(list.to_snapshot(), vec!["B", "D", "C", "A", "E"]);

    session.manager.undo(None).await.unwrap();
    assert_eq!(list.to_snapshot(), vec!["B", "C", "D", "A", "E"]);
    session.manager.undo(None).await.unwrap();
    assert_eq!(list.to_snapshot(), vec!["A", "B", "C", "D", "E"]);

    session.manager.redo(None).await.unwrap();
    session.manager.redo(None).await.unwrap();
    assert_eq!(list.to_snapshot(), vec!["B", "D", "C", "A", "E"]);
}

#[tokio::test]
async fn test_nested_operations_flatten_into_one_undo_step() {
    let session = Session::new().unwrap();
    let list = abc(&session);

    let outer = session.context.begin("Outer");
    list.add("D");
    {
        let inner = session.context.enter_or_join("Inner");
        assert!(!inner.owns_close);
        assert!(Arc::ptr_eq(&inner.scope, outer.scope()));
        list.add("E");
        assert!(!inner.scope.close("Inner"));
    }
    list.remove(&"A");
    let scope = outer.finish().unwrap();
    assert_eq!(scope.record_count(), 3);
    session.manager.commit(scope, ScopeKind::Do);

    assert_eq!(session.manager.undo_count(), 1);
    session.manager.undo(None).await.unwrap();
    assert_eq!(list.to_snapshot(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_one_scope_spans_several_containers() {
    let session = Session::new().unwrap();
    let list = abc(&session);
    let map: TrackedMap<String, u32> = TrackedMap::new(Arc::clone(&session.context));
    map.insert("width".to_string(), 10);
    let title = TrackedProperty::new(Arc::clone(&session.context), "Title", "Untitled");

    session.perform("Layout", || {
        list.set_item(1, "b");
        map.insert("width".to_string(), 20);
        map.insert("height".to_string(), 5);
        title.set("Report");
    });

    session.manager.undo(None).await.unwrap();
    assert_eq!(list.to_snapshot(), vec!["A", "B", "C"]);
    assert_eq!(
        map.to_snapshot(),
        HashMap::from([("width".to_string(), 10)])
    );
    assert_eq!(title.get(), "Untitled");

    session.manager.redo(None).await.unwrap();
    assert_eq!(list.to_snapshot(), vec!["A", "b", "C"]);
    assert_eq!(map.get(&"height".to_string()), Some(5));
    assert_eq!(title.get(), "Report");
}

#[tokio::test]
async fn test_undo_to_target_unwinds_everything_above_it() {
    let session = Session::new().unwrap();
    let list: TrackedList<u32> = TrackedList::new(Arc::clone(&session.context));

    let first = session.perform("One", || {
        list.add(1);
    });
    session.perform("Two", || {
        list.add(2);
    });
    session.perform("Three", || {
        list.add(3);
    });

    session.manager.undo(first).await.unwrap();
    assert!(list.is_empty());
    assert_eq!(session.manager.undo_count(), 0);
    assert_eq!(session.manager.redo_count(), 3);

    let names: Vec<String> = session
        .manager
        .redo_history()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(names, vec!["Undo: One", "Undo: Two", "Undo: Three"]);
}

#[tokio::test]
async fn test_new_action_discards_redo() {
    let session = Session::new().unwrap();
    let list: TrackedList<u32> = TrackedList::new(Arc::clone(&session.context));

    session.perform("One", || {
        list.add(1);
    });
    session.manager.undo(None).await.unwrap();
    assert!(session.manager.can_redo());

    session.perform("Two", || {
        list.add(2);
    });
    assert!(!session.manager.can_redo());
    assert!(matches!(
        session.manager.redo(None).await,
        Err(UndoScopeError::NoMoreRedos)
    ));
}

#[tokio::test]
async fn test_empty_stacks_report_errors() {
    let session = Session::new().unwrap();
    assert!(matches!(
        session.manager.undo(None).await,
        Err(UndoScopeError::NoMoreUndos)
    ));
    assert!(matches!(
        session.manager.redo(None).await,
        Err(UndoScopeError::NoMoreRedos)
    ));
}

#[test]
fn test_empty_container_access_fails() {
    let session = Session::new().unwrap();
    let list: TrackedList<u32> = TrackedList::new(Arc::clone(&session.context));

    assert_eq!(list.queue().dequeue(), Err(CollectionError::EmptyContainer));
    assert_eq!(list.stack().pop(), Err(CollectionError::EmptyContainer));
    assert_eq!(
        list.get(0),
        Err(CollectionError::IndexOutOfRange { index: 0, len: 0 })
    );
    assert_eq!(list.queue().try_dequeue(), None);
    assert_eq!(list.stack().try_pop(), None);
}

#[tokio::test]
async fn test_observer_failure_does_not_abort_mutation() {
    let session = Session::new().unwrap();
    let list = abc(&session);
    let delivered = Arc::new(AtomicUsize::new(0));

    list.subscribe(|_: &CollectionChange<&'static str>| Err(ObserverError::new("render failed")));
    list.subscribe(|_: &CollectionChange<&'static str>| -> ObserverResult {
        panic!("observer bug")
    });
    let d = Arc::clone(&delivered);
    list.subscribe(move |_: &CollectionChange<&'static str>| {
        d.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    session.perform("Add", || {
        list.add("D");
    });
    assert_eq!(list.to_snapshot(), vec!["A", "B", "C", "D"]);

    session.manager.undo(None).await.unwrap();
    assert_eq!(list.to_snapshot(), vec!["A", "B", "C"]);
    assert_eq!(delivered.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_suspended_notifications_collapse_across_undo() {
    let session = Session::new().unwrap();
    let list = abc(&session);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    list.subscribe(move |change: &CollectionChange<&'static str>| {
        s.lock().push(change.clone());
        Ok(())
    });

    session.perform("Bulk", || {
        list.set_notifications_suspended(true);
        list.add("D");
        list.add("E");
        list.remove_at(0);
        list.set_notifications_suspended(false);
    });
    assert_eq!(*seen.lock(), vec![CollectionChange::Reset]);

    session.manager.undo(None).await.unwrap();
    assert_eq!(seen.lock().len(), 4);
    assert_eq!(list.to_snapshot(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_configured_depth_and_tracking_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "max_undo_depth = 2").unwrap();
    writeln!(file, "track_by_default = false").unwrap();

    let config = EngineConfig::load_from(&path).unwrap();
    assert_eq!(config.max_undo_depth, 2);

    let session = Session::new().unwrap();
    let manager = ScopeStackManager::with_config(Arc::clone(&session.context), &config).unwrap();
    let tracked: TrackedList<u32> = TrackedList::new(Arc::clone(&session.context));
    let untracked: TrackedList<u32> = TrackedList::with_options(
        Arc::clone(&session.context),
        Vec::new(),
        ContainerOptions::from_config(&config),
    );
    assert!(!untracked.is_tracking_enabled());

    for value in 0..3 {
        let guard = session.context.begin(format!("Add {}", value));
        tracked.add(value);
        untracked.add(value);
        manager.commit(guard.finish().unwrap(), ScopeKind::Do);
    }
    assert_eq!(manager.undo_count(), 2);

    manager.undo(None).await.unwrap();
    manager.undo(None).await.unwrap();
    assert_eq!(tracked.to_snapshot(), vec![0]);
    assert_eq!(untracked.to_snapshot(), vec![0, 1, 2]);
    assert!(!manager.can_undo());
}

#[tokio::test]
async fn test_availability_follows_stacks() {
    let session = Session::new().unwrap();
    let list: TrackedList<u32> = TrackedList::new(Arc::clone(&session.context));
    let availability = session.manager.availability();

    session.perform("Add", || {
        list.add(7);
    });
    assert!(availability.borrow().can_undo);
    assert!(!availability.borrow().can_redo);

    session.manager.undo(None).await.unwrap();
    assert!(!availability.borrow().can_undo);
    assert!(availability.borrow().can_redo);

    session.manager.clear();
    assert!(!availability.borrow().can_redo);
}

#[tokio::test]
async fn test_failed_undo_leaves_session_usable() {
    let session = Session::new().unwrap();
    let list: TrackedList<u32> = TrackedList::new(Arc::clone(&session.context));

    session.perform("Bad", || {
        session
            .context
            .record(undoscope_core::ChangeRecord::from_fn("boom", || panic!("inverse bug")));
        list.add(1);
    });

    let result = session.manager.undo(None).await;
    assert!(matches!(result, Err(UndoScopeError::ReplayFailed(_))));
    assert!(session.context.current().is_none());
    assert!(list.is_empty());

    let later = session.perform("Later", || {
        list.add(2);
    });
    assert!(later.is_some());
    assert_eq!(session.manager.undo_history()[0].name, "Later");
}
