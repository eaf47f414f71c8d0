/// Due-date reminders.
///
/// `plan` diffs two snapshots into schedule/cancel changes; the scheduler
/// turns those into one tokio timer per task and broadcasts `ReminderFired`
/// when a timer elapses. A timer is retired as soon as its task's due date
/// changes or the task disappears.
use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

use crate::types::Board;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderChange {
    Schedule { task_id: String, due: DateTime<Utc> },
    Cancel { task_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderFired {
    pub task_id: String,
    pub due: DateTime<Utc>,
}

/// Reminder changes needed to go from `prev` to `next`.
pub fn plan(prev: &Board, next: &Board) -> Vec<ReminderChange> {
    let mut changes = Vec::new();
    for task in prev.tasks() {
        let still_due = next.task(&task.id).and_then(|t| t.due_date);
        if task.due_date.is_some() && still_due.is_none() {
            changes.push(ReminderChange::Cancel {
                task_id: task.id.clone(),
            });
        }
    }
    for task in next.tasks() {
        let Some(due) = task.due_date else { continue };
        if prev.task(&task.id).and_then(|t| t.due_date) != Some(due) {
            changes.push(ReminderChange::Schedule {
                task_id: task.id.clone(),
                due,
            });
        }
    }
    changes
}

/// Owns the pending reminder timers. Must be used inside a tokio runtime.
pub struct ReminderScheduler {
    timers: HashMap<String, AbortHandle>,
    lead: Duration,
    tx: broadcast::Sender<ReminderFired>,
}

impl ReminderScheduler {
    pub fn new(lead: Duration) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            timers: HashMap::new(),
            lead,
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReminderFired> {
        self.tx.subscribe()
    }

    pub fn sync(&mut self, prev: &Board, next: &Board, now: DateTime<Utc>) {
        let changes = plan(prev, next);
        self.apply(&changes, now);
    }

    pub fn apply(&mut self, changes: &[ReminderChange], now: DateTime<Utc>) {
        for change in changes {
            match change {
                ReminderChange::Schedule { task_id, due } => self.schedule(task_id, *due, now),
                ReminderChange::Cancel { task_id } => self.cancel(task_id),
            }
        }
    }

    /// Number of timers that have not fired yet.
    pub fn pending(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }

    pub fn is_pending(&self, task_id: &str) -> bool {
        self.timers
            .get(task_id)
            .is_some_and(|h| !h.is_finished())
    }

    fn schedule(&mut self, task_id: &str, due: DateTime<Utc>, now: DateTime<Utc>) {
        self.cancel(task_id);
        self.timers.retain(|_, h| !h.is_finished());
        // A lead reaching past the representable range fires right away.
        let delay = due
            .checked_sub_signed(self.lead)
            .and_then(|at| at.signed_duration_since(now).to_std().ok())
            .unwrap_or(StdDuration::ZERO);
        let tx = self.tx.clone();
        let fired = ReminderFired {
            task_id: task_id.to_string(),
            due,
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            log::info!("[taskboard.reminders] Task {} due at {}", fired.task_id, fired.due);
            if tx.send(fired).is_err() {
                log::debug!("[taskboard.reminders] No subscribers");
            }
        });
        log::debug!("[taskboard.reminders] Scheduled {} in {:?}", task_id, delay);
        self.timers.insert(task_id.to_string(), handle.abort_handle());
    }

    fn cancel(&mut self, task_id: &str) {
        if let Some(handle) = self.timers.remove(task_id) {
            handle.abort();
            log::debug!("[taskboard.reminders] Retired {}", task_id);
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        for handle in self.timers.values() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeZone;

    use crate::engine;
    use crate::types::TaskPatch;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn with_due(board: &Arc<Board>, task_id: &str, due: Option<DateTime<Utc>>) -> Arc<Board> {
        let patch = TaskPatch {
            due_date: Some(due),
            ..TaskPatch::default()
        };
        engine::update_task(board, task_id, &patch, t0()).unwrap()
    }

    #[test]
    fn test_plan_schedules_new_and_changed_due_dates() {
        let base = Arc::new(Board::starter(t0()));
        let due = t0() + Duration::hours(2);
        let next = with_due(&base, "task-1", Some(due));
        assert_eq!(
            plan(&base, &next),
            vec![ReminderChange::Schedule {
                task_id: "task-1".into(),
                due
            }]
        );
        assert!(plan(&next, &next).is_empty());

        let moved = with_due(&next, "task-1", Some(due + Duration::hours(1)));
        assert_eq!(plan(&next, &moved).len(), 1);
    }

    #[test]
    fn test_plan_cancels_cleared_and_deleted() {
        let base = Arc::new(Board::starter(t0()));
        let due = t0() + Duration::hours(2);
        let with_two = with_due(&with_due(&base, "task-1", Some(due)), "task-3", Some(due));

        let cleared = with_due(&with_two, "task-1", None);
        assert_eq!(
            plan(&with_two, &cleared),
            vec![ReminderChange::Cancel {
                task_id: "task-1".into()
            }]
        );

        let deleted = engine::delete_column(&with_two, "column-2").unwrap();
        assert_eq!(
            plan(&with_two, &deleted),
            vec![ReminderChange::Cancel {
                task_id: "task-3".into()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_lead_before_due() {
        let mut scheduler = ReminderScheduler::new(Duration::seconds(30));
        let mut rx = scheduler.subscribe();
        let due = t0() + Duration::seconds(90);
        let start = tokio::time::Instant::now();
        scheduler.apply(
            &[ReminderChange::Schedule {
                task_id: "a".into(),
                due,
            }],
            t0(),
        );
        assert!(scheduler.is_pending("a"));

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, ReminderFired { task_id: "a".into(), due });
        assert!(start.elapsed() >= StdDuration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let mut scheduler = ReminderScheduler::new(Duration::zero());
        let mut rx = scheduler.subscribe();
        let due = t0() + Duration::seconds(60);
        scheduler.apply(
            &[
                ReminderChange::Schedule {
                    task_id: "a".into(),
                    due,
                },
                ReminderChange::Cancel {
                    task_id: "a".into(),
                },
            ],
            t0(),
        );
        assert_eq!(scheduler.pending(), 0);
        let res = tokio::time::timeout(StdDuration::from_secs(3600), rx.recv()).await;
        assert!(res.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_timer() {
        let mut scheduler = ReminderScheduler::new(Duration::zero());
        let mut rx = scheduler.subscribe();
        let first = t0() + Duration::seconds(60);
        let second = t0() + Duration::seconds(120);
        for due in [first, second] {
            scheduler.apply(
                &[ReminderChange::Schedule {
                    task_id: "a".into(),
                    due,
                }],
                t0(),
            );
        }
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.due, second);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_due_fires_immediately() {
        let mut scheduler = ReminderScheduler::new(Duration::zero());
        let mut rx = scheduler.subscribe();
        let due = t0() - Duration::hours(1);
        scheduler.apply(
            &[ReminderChange::Schedule {
                task_id: "late".into(),
                due,
            }],
            t0(),
        );
        let fired = tokio::time::timeout(StdDuration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.task_id, "late");
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_lead_fires_immediately() {
        let lead = Duration::try_seconds(10_000_000_000_000).unwrap();
        let mut scheduler = ReminderScheduler::new(lead);
        let mut rx = scheduler.subscribe();
        let due = t0() + Duration::days(1);
        scheduler.apply(
            &[ReminderChange::Schedule {
                task_id: "a".into(),
                due,
            }],
            t0(),
        );
        let fired = tokio::time::timeout(StdDuration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired, ReminderFired { task_id: "a".into(), due });
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_timers_are_dropped_on_next_schedule() {
        let mut scheduler = ReminderScheduler::new(Duration::zero());
        let mut rx = scheduler.subscribe();
        let schedule = |task_id: &str, due| ReminderChange::Schedule {
            task_id: task_id.into(),
            due,
        };
        scheduler.apply(&[schedule("a", t0() + Duration::seconds(10))], t0());
        rx.recv().await.unwrap();
        tokio::task::yield_now().await;

        scheduler.apply(&[schedule("b", t0() + Duration::hours(1))], t0());
        assert!(!scheduler.timers.contains_key("a"));
        assert!(scheduler.is_pending("b"));
        assert_eq!(scheduler.timers.len(), 1);
    }
}
