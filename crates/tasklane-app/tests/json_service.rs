//! Service and coordinator over the file-backed store.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use anyhow::Result;
use tasklane_app::{RecordingNotifier, ReorderCoordinator, ReorderOutcome, TaskList, TaskService};
use tasklane_core::ordering::is_dense;
use tasklane_core::{DropTarget, FixedClock, GroupKey, TaskFields, UserId};
use tasklane_store::{JsonStore, StaticSession};
use tempfile::tempdir;
use time::macros::{datetime, offset};

fn fields(title: &str) -> TaskFields {
    TaskFields {
        title: title.into(),
        ..TaskFields::default()
    }
}

#[tokio::test]
async fn created_and_reordered_tasks_survive_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tasks.json");
    let user = UserId::new();
    let clock = Arc::new(FixedClock::new(datetime!(2024-05-01 8:00 +2), offset!(+2)));
    let list = TaskList::new();
    let service = TaskService::new(
        JsonStore::open(&path)?,
        StaticSession::signed_in(user),
        Arc::clone(&clock),
        list.clone(),
    );

    let work = service.create_category("Work", None).await?;
    let a = service.create_task(fields("a")).await?;
    let b = service.create_task(fields("b")).await?;
    let x = service
        .create_task(TaskFields {
            category_id: Some(work.id),
            ..fields("x")
        })
        .await?;

    let coordinator = ReorderCoordinator::new(
        JsonStore::open(&path)?,
        StaticSession::signed_in(user),
        list.clone(),
        RecordingNotifier::default(),
    );
    let outcome = coordinator.move_task(a.id, DropTarget::Task(x.id)).await?;
    assert!(matches!(outcome, ReorderOutcome::Saved { .. }));

    let reopened = JsonStore::open(&path)?.list_tasks(user)?;
    assert_eq!(reopened.len(), 3);
    assert!(is_dense(&reopened, GroupKey::Uncategorized));
    assert!(is_dense(&reopened, GroupKey::Category(work.id)));
    let moved = reopened.iter().find(|task| task.id == a.id).unwrap();
    assert_eq!((moved.category_id, moved.sort_order), (Some(work.id), 0));
    let left = reopened.iter().find(|task| task.id == b.id).unwrap();
    assert_eq!(left.sort_order, 0);
    Ok(())
}

#[tokio::test]
async fn load_requires_a_session() -> Result<()> {
    let dir = tempdir()?;
    let service = TaskService::new(
        JsonStore::open(dir.path().join("tasks.json"))?,
        StaticSession::signed_out(),
        Arc::new(FixedClock::new(datetime!(2024-05-01 8:00 UTC), offset!(UTC))),
        TaskList::new(),
    );
    assert!(matches!(
        service.load().await,
        Err(tasklane_app::ServiceError::NotAuthenticated)
    ));
    Ok(())
}
