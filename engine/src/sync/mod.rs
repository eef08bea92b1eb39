//! Reconciliation engine
//!
//! Keeps the mirror store's task set for each tracked course consistent
//! with the provider's current coursework. One pass is fetch → diff →
//! apply: every fetched assignment is upserted with fresh content, and a
//! continuous pass additionally deletes mirrored ids the provider no
//! longer reports. Passes are stateless between runs; the store itself is
//! the only carried state, so any interleaving of passes converges on the
//! next run.

use crate::classroom::{Assignment, ClassroomError, Course, CourseProvider};
use crate::db::{TaskRecord, TaskStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub mod scheduler;

pub use scheduler::SchedulerHandle;

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can abort a pass
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Provider(#[from] ClassroomError),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Counts of the mutations one pass applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Ids newly mirrored this pass
    pub added: usize,
    /// Mirrored ids deleted because the provider dropped them
    pub removed: usize,
    /// Already-mirrored ids whose content was rewritten from provider truth
    pub refreshed: usize,
}

impl SyncReport {
    /// Every id written this pass
    pub fn total_upserted(&self) -> usize {
        self.added + self.refreshed
    }

    /// True when the pass changed mirror membership in no way
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }

    fn absorb(&mut self, other: SyncReport) {
        self.added += other.added;
        self.removed += other.removed;
        self.refreshed += other.refreshed;
    }
}

/// The diff-and-patch engine between provider and mirror
///
/// Stateless: a `Reconciler` can be shared behind an `Arc` and invoked
/// concurrently from the background scheduler and the sync endpoint.
pub struct Reconciler {
    provider: Arc<dyn CourseProvider>,
    store: TaskStore,
}

impl Reconciler {
    pub fn new(provider: Arc<dyn CourseProvider>, store: TaskStore) -> Self {
        Self { provider, store }
    }

    /// Triggered pass for one course: upsert every fetched assignment,
    /// never delete. Errors propagate to the caller.
    pub async fn sync_course(&self, course_id: &str) -> Result<SyncReport> {
        let (course, coursework) = self.fetch(course_id).await?;
        let mirrored = self.store.ids_for_course(course_id).await?;

        let mut report = SyncReport::default();
        for assignment in &coursework {
            if mirrored.contains(&assignment.id) {
                report.refreshed += 1;
            } else {
                report.added += 1;
            }
            self.store
                .upsert(&record_for(course_id, &course, assignment))
                .await?;
        }

        info!(
            "Synced {} tasks from '{}'",
            report.total_upserted(),
            course.name
        );
        Ok(report)
    }

    /// Continuous pass for one course: upsert every fetched assignment and
    /// delete mirrored ids the provider no longer reports.
    ///
    /// A fetch failure aborts before any mutation; the next scheduled pass
    /// is an independent attempt.
    pub async fn reconcile_course(&self, course_id: &str) -> Result<SyncReport> {
        let (course, coursework) = self.fetch(course_id).await?;

        let provider_ids: HashSet<&str> = coursework.iter().map(|a| a.id.as_str()).collect();
        let mirrored = self.store.ids_for_course(course_id).await?;

        let mut report = SyncReport::default();

        for assignment in &coursework {
            if mirrored.contains(&assignment.id) {
                report.refreshed += 1;
            } else {
                report.added += 1;
            }
            self.store
                .upsert(&record_for(course_id, &course, assignment))
                .await?;
        }

        for stale in mirrored.iter().filter(|id| !provider_ids.contains(id.as_str())) {
            self.store.delete(stale).await?;
            report.removed += 1;
        }

        if !report.is_noop() {
            info!(
                "Reconciled '{}': +{} -{}",
                course.name, report.added, report.removed
            );
        }

        Ok(report)
    }

    /// Triggered pass over every tracked course
    pub async fn sync_all(&self, course_ids: &[String]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for course_id in course_ids {
            report.absorb(self.sync_course(course_id).await?);
        }
        Ok(report)
    }

    /// Continuous pass over every tracked course
    ///
    /// Never raises: a failing course is logged and the remaining courses
    /// still get their pass. The background loop calls this every tick.
    pub async fn reconcile_all(&self, course_ids: &[String]) -> SyncReport {
        let mut report = SyncReport::default();
        for course_id in course_ids {
            match self.reconcile_course(course_id).await {
                Ok(course_report) => report.absorb(course_report),
                Err(e) => warn!("Reconciliation of course {} failed: {}", course_id, e),
            }
        }
        report
    }

    /// Fetch course metadata and coursework; any failure aborts the pass
    /// before the store is touched.
    async fn fetch(&self, course_id: &str) -> Result<(Course, Vec<Assignment>)> {
        let course = self.provider.get_course(course_id).await?;
        let coursework = self.provider.list_coursework(course_id).await?;
        Ok((course, coursework))
    }
}

fn record_for(course_id: &str, course: &Course, assignment: &Assignment) -> TaskRecord {
    TaskRecord {
        id: assignment.id.clone(),
        title: assignment.title.clone(),
        description: assignment.description.clone().unwrap_or_default(),
        course_name: Some(course.name.clone()),
        course_id: Some(course_id.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{assignment, FakeProvider};
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    async fn fixture(dir: &TempDir) -> (Arc<FakeProvider>, TaskStore, Reconciler) {
        let db = Database::new(&dir.path().join("test.db")).await.unwrap();
        let store = db.tasks();
        let provider = Arc::new(FakeProvider::new());
        let reconciler = Reconciler::new(provider.clone(), store.clone());
        (provider, store, reconciler)
    }

    #[tokio::test]
    async fn test_pass_mirrors_new_assignment() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;
        provider.set_course("c-1", "Historia", vec![assignment("1", "Essay")]);

        let report = reconciler.reconcile_course("c-1").await.unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.removed, 0);

        let record = store.get("1").await.unwrap().unwrap();
        assert_eq!(record.title, "Essay");
        assert_eq!(record.description, "");
        assert_eq!(record.course_name.as_deref(), Some("Historia"));
        assert_eq!(record.course_id.as_deref(), Some("c-1"));
    }

    #[tokio::test]
    async fn test_pass_removes_dropped_assignments() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;

        provider.set_course(
            "c-1",
            "Historia",
            vec![assignment("1", "Essay"), assignment("2", "Lab")],
        );
        reconciler.reconcile_course("c-1").await.unwrap();

        provider.set_course("c-1", "Historia", vec![assignment("1", "Essay")]);
        let report = reconciler.reconcile_course("c-1").await.unwrap();

        assert_eq!(report.removed, 1);
        assert!(store.get("2").await.unwrap().is_none());
        assert!(store.get("1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_pass_with_unchanged_provider_is_noop() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;
        provider.set_course(
            "c-1",
            "Historia",
            vec![assignment("1", "Essay"), assignment("2", "Lab")],
        );

        reconciler.reconcile_course("c-1").await.unwrap();
        let before = store.list().await.unwrap();

        let report = reconciler.reconcile_course("c-1").await.unwrap();

        assert!(report.is_noop());
        assert_eq!(store.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_pass_converges_from_any_mirror_state() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;

        // Stale mirrored entries plus a manual task
        for id in ["stale-a", "stale-b"] {
            store
                .upsert(&TaskRecord {
                    id: id.to_string(),
                    title: "old".to_string(),
                    description: String::new(),
                    course_name: Some("Historia".to_string()),
                    course_id: Some("c-1".to_string()),
                })
                .await
                .unwrap();
        }
        let manual_id = store.add_generated("Comprar cuaderno", "").await.unwrap();

        provider.set_course("c-1", "Historia", vec![assignment("1", "Essay")]);
        reconciler.reconcile_course("c-1").await.unwrap();

        let scope = store.ids_for_course("c-1").await.unwrap();
        assert_eq!(scope, ["1".to_string()].into_iter().collect());

        // Manual tasks are outside the tracked scope and survive every pass
        assert!(store.get(&manual_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pass_refreshes_content_of_existing_ids() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;

        provider.set_course("c-1", "Historia", vec![assignment("1", "Essay")]);
        reconciler.reconcile_course("c-1").await.unwrap();

        let mut updated = assignment("1", "Essay (rev. 2)");
        updated.description = Some("Bring sources".to_string());
        provider.set_course("c-1", "Historia", vec![updated]);

        let report = reconciler.reconcile_course("c-1").await.unwrap();
        assert_eq!(report.refreshed, 1);

        let record = store.get("1").await.unwrap().unwrap();
        assert_eq!(record.title, "Essay (rev. 2)");
        assert_eq!(record.description, "Bring sources");
    }

    #[tokio::test]
    async fn test_triggered_pass_never_deletes() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;

        provider.set_course(
            "c-1",
            "Historia",
            vec![assignment("1", "Essay"), assignment("2", "Lab")],
        );
        reconciler.sync_course("c-1").await.unwrap();

        provider.set_course("c-1", "Historia", vec![assignment("1", "Essay")]);
        let report = reconciler.sync_course("c-1").await.unwrap();

        assert_eq!(report.removed, 0);
        assert!(store.get("2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;

        provider.set_course("c-1", "Historia", vec![assignment("1", "Essay")]);
        reconciler.reconcile_course("c-1").await.unwrap();
        let before = store.list().await.unwrap();

        provider.set_available(false);
        let err = reconciler.reconcile_course("c-1").await.unwrap_err();
        assert!(matches!(err, SyncError::Provider(_)));
        assert_eq!(store.list().await.unwrap(), before);

        // The next pass is an independent, equally-likely attempt
        provider.set_available(true);
        provider.set_course("c-1", "Historia", vec![]);
        reconciler.reconcile_course("c-1").await.unwrap();
        assert!(store.ids_for_course("c-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_all_continues_past_failing_course() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;

        provider.set_course("c-2", "Física", vec![assignment("9", "Informe")]);

        // c-1 is unknown to the provider; c-2 must still reconcile
        let courses = vec!["c-1".to_string(), "c-2".to_string()];
        let report = reconciler.reconcile_all(&courses).await;

        assert_eq!(report.added, 1);
        assert!(store.get("9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_courses_are_scoped_independently() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;

        provider.set_course("c-1", "Historia", vec![assignment("1", "Essay")]);
        provider.set_course("c-2", "Física", vec![assignment("9", "Informe")]);

        let courses = vec!["c-1".to_string(), "c-2".to_string()];
        reconciler.reconcile_all(&courses).await;

        // Dropping c-1's coursework must not disturb c-2's mirror
        provider.set_course("c-1", "Historia", vec![]);
        reconciler.reconcile_all(&courses).await;

        assert!(store.get("1").await.unwrap().is_none());
        assert!(store.get("9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_passes_and_writes_keep_store_consistent() {
        let dir = TempDir::new().unwrap();
        let (provider, store, reconciler) = fixture(&dir).await;
        provider.set_course(
            "c-1",
            "Historia",
            vec![assignment("1", "Essay"), assignment("2", "Lab")],
        );

        let reconciler = Arc::new(reconciler);
        let mut joins = Vec::new();

        for i in 0..4 {
            let reconciler = Arc::clone(&reconciler);
            joins.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    reconciler.reconcile_course("c-1").await.map(|_| ())
                } else {
                    reconciler.sync_course("c-1").await.map(|_| ())
                }
            }));
        }
        for i in 0..4 {
            let store = store.clone();
            joins.push(tokio::spawn(async move {
                store
                    .add_generated(&format!("manual-{}", i), "")
                    .await
                    .map(|_| ())
                    .map_err(SyncError::Store)
            }));
        }

        for join in joins {
            join.await.unwrap().unwrap();
        }

        // One more pass restores provider truth regardless of interleaving
        reconciler.reconcile_course("c-1").await.unwrap();

        let scope = store.ids_for_course("c-1").await.unwrap();
        assert_eq!(
            scope,
            ["1".to_string(), "2".to_string()].into_iter().collect()
        );
        // 2 mirrored + 4 manual records, all still queryable
        assert_eq!(store.count().await.unwrap(), 6);
    }
}
