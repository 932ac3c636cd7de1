//! Derived, read-only metrics over tasks and projects.
//!
//! Everything here is a pure fold over values the caller already loaded;
//! nothing queries storage. Set-level aggregates tolerate empty input and
//! return zero rather than an error.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::project::Project;
use crate::task::Task;
use crate::types::{DbId, Timestamp};
use crate::workflow::TaskStatus;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Relative estimate deviation (percent) above which a task is flagged.
pub const DEFAULT_VARIANCE_THRESHOLD_PCT: f64 = 20.0;

/// Default look-ahead window for "due soon".
pub const DEFAULT_DUE_SOON_DAYS: i64 = 3;

/// Default window for completion trends.
pub const DEFAULT_TREND_DAYS: i64 = 7;

/// Upper bound on any day window; longer windows are clamped.
pub const MAX_WINDOW_DAYS: i64 = 365;

// ---------------------------------------------------------------------------
// Per-task classification
// ---------------------------------------------------------------------------

/// Past its due date and still open.
pub fn is_overdue(task: &Task, now: Timestamp) -> bool {
    !task.status.is_terminal() && task.due_date.is_some_and(|due| due < now)
}

/// Due on the same UTC calendar day as `now`.
pub fn is_due_today(task: &Task, now: Timestamp) -> bool {
    task.due_date
        .is_some_and(|due| due.date_naive() == now.date_naive())
}

/// Open, not yet overdue, and due within the next `days` days.
pub fn is_due_soon(task: &Task, now: Timestamp, days: i64) -> bool {
    let horizon = Duration::try_days(days.max(0))
        .and_then(|window| now.checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    !task.status.is_terminal()
        && task
            .due_date
            .is_some_and(|due| due >= now && due <= horizon)
}

/// Coarse progress proxy from status alone.
pub fn progress_percent(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::Todo => 0,
        TaskStatus::InProgress => 50,
        TaskStatus::Review => 75,
        TaskStatus::Done => 100,
        TaskStatus::Blocked | TaskStatus::Cancelled => 25,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubtaskProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

/// Completion over direct subtasks only.
pub fn subtask_progress(task: &Task) -> SubtaskProgress {
    let total = task.subtasks.len();
    let completed = task
        .subtasks
        .iter()
        .filter(|s| s.status == TaskStatus::Done)
        .count();
    SubtaskProgress {
        completed,
        total,
        percentage: percent_of(completed, total),
    }
}

/// `round((1 - |actual - estimated| / estimated) * 100)`.
///
/// `None` when either value is missing or the estimate is zero.
pub fn estimate_accuracy(task: &Task) -> Option<i64> {
    let deviation = relative_deviation(task)?;
    Some(((1.0 - deviation) * 100.0).round() as i64)
}

/// Whether actual effort deviates from the estimate by more than
/// `threshold_pct` percent.
pub fn has_estimate_variance(task: &Task, threshold_pct: f64) -> bool {
    relative_deviation(task).is_some_and(|d| d * 100.0 > threshold_pct)
}

pub fn time_spent_minutes(task: &Task) -> i64 {
    task.total_logged_minutes()
}

fn relative_deviation(task: &Task) -> Option<f64> {
    let estimated = task.estimated_hours.filter(|e| *e > 0.0)?;
    let actual = task.actual_hours?;
    Some((actual - estimated).abs() / estimated)
}

// ---------------------------------------------------------------------------
// Set aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub completed: usize,
}

/// Tasks completed per UTC day over the `days` days ending today, oldest
/// first. `days` is clamped to [`MAX_WINDOW_DAYS`]; days before the
/// earliest representable date are skipped.
pub fn completion_trend(tasks: &[Task], now: Timestamp, days: i64) -> Vec<TrendPoint> {
    let today = now.date_naive();
    (0..days.clamp(0, MAX_WINDOW_DAYS))
        .rev()
        .filter_map(|offset| {
            let date = today.checked_sub_signed(Duration::try_days(offset)?)?;
            let completed = tasks
                .iter()
                .filter(|t| t.completed_at.is_some_and(|c| c.date_naive() == date))
                .count();
            Some(TrendPoint { date, completed })
        })
        .collect()
}

/// Mean hours from start (or creation) to completion across done tasks.
pub fn average_completion_hours(tasks: &[Task]) -> f64 {
    let durations: Vec<f64> = tasks
        .iter()
        .filter_map(|t| {
            let completed = t.completed_at?;
            let started = t.start_date.unwrap_or(t.created_at);
            Some((completed - started).num_minutes() as f64 / 60.0)
        })
        .collect();
    round2(mean(&durations))
}

/// Percentage of completed tasks with a due date that finished on time.
pub fn on_time_completion_rate(tasks: &[Task]) -> f64 {
    let mut with_due = 0usize;
    let mut on_time = 0usize;
    for t in tasks {
        if let (Some(completed), Some(due)) = (t.completed_at, t.due_date) {
            with_due += 1;
            if completed <= due {
                on_time += 1;
            }
        }
    }
    if with_due == 0 {
        return 0.0;
    }
    round2(on_time as f64 * 100.0 / with_due as f64)
}

/// Mean of [`estimate_accuracy`] over tasks where it is defined.
pub fn average_estimate_accuracy(tasks: &[Task]) -> f64 {
    let values: Vec<f64> = tasks
        .iter()
        .filter_map(estimate_accuracy)
        .map(|a| a as f64)
        .collect();
    round2(mean(&values))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivityMetrics {
    pub completed: usize,
    pub average_completion_hours: f64,
    pub on_time_completion_rate: f64,
    pub average_estimate_accuracy: f64,
    pub trend: Vec<TrendPoint>,
}

pub fn productivity(tasks: &[Task], now: Timestamp, trend_days: i64) -> ProductivityMetrics {
    ProductivityMetrics {
        completed: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count(),
        average_completion_hours: average_completion_hours(tasks),
        on_time_completion_rate: on_time_completion_rate(tasks),
        average_estimate_accuracy: average_estimate_accuracy(tasks),
        trend: completion_trend(tasks, now, trend_days),
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStatistics {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub review: usize,
    pub done: usize,
    pub blocked: usize,
    pub cancelled: usize,
    pub overdue: usize,
    /// Done over all non-cancelled tasks.
    pub completion_percentage: u8,
    pub estimated_hours: f64,
    pub actual_hours: f64,
}

/// Status breakdown over non-archived tasks.
pub fn task_statistics(tasks: &[Task], now: Timestamp) -> TaskStatistics {
    let mut stats = TaskStatistics::default();
    for t in tasks.iter().filter(|t| !t.is_archived) {
        stats.total += 1;
        match t.status {
            TaskStatus::Todo => stats.todo += 1,
            TaskStatus::InProgress => stats.in_progress += 1,
            TaskStatus::Review => stats.review += 1,
            TaskStatus::Done => stats.done += 1,
            TaskStatus::Blocked => stats.blocked += 1,
            TaskStatus::Cancelled => stats.cancelled += 1,
        }
        if is_overdue(t, now) {
            stats.overdue += 1;
        }
        stats.estimated_hours += t.estimated_hours.unwrap_or(0.0);
        stats.actual_hours += t.actual_hours.unwrap_or(0.0);
    }
    stats.completion_percentage = percent_of(stats.done, stats.total - stats.cancelled);
    stats.estimated_hours = round2(stats.estimated_hours);
    stats.actual_hours = round2(stats.actual_hours);
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStatistics {
    pub project_id: DbId,
    pub tasks: TaskStatistics,
    /// Active members plus the owner.
    pub member_count: usize,
    /// Negative once the deadline has passed.
    pub days_until_deadline: Option<i64>,
}

/// Completion percentage of a project's loaded tasks.
pub fn project_progress(project: &Project, now: Timestamp) -> u8 {
    task_statistics(&project.tasks, now).completion_percentage
}

pub fn project_statistics(project: &Project, now: Timestamp) -> ProjectStatistics {
    let owner_listed = project
        .active_members()
        .any(|m| m.user_id == project.owner_id);
    let member_count = project.active_members().count() + usize::from(!owner_listed);

    ProjectStatistics {
        project_id: project.id,
        tasks: task_statistics(&project.tasks, now),
        member_count,
        days_until_deadline: project
            .deadline
            .map(|d| (d.date_naive() - now.date_naive()).num_days()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDashboard {
    pub user_id: DbId,
    pub assigned: usize,
    pub in_progress: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub due_soon: usize,
    pub productivity: ProductivityMetrics,
}

/// Per-user summary over the tasks assigned to `user_id`.
pub fn user_dashboard(
    user_id: DbId,
    tasks: &[Task],
    now: Timestamp,
    due_soon_days: i64,
    trend_days: i64,
) -> UserDashboard {
    let mine: Vec<Task> = tasks
        .iter()
        .filter(|t| t.is_assignee(user_id) && !t.is_archived)
        .cloned()
        .collect();
    let open = || mine.iter().filter(|t| !t.status.is_terminal());

    UserDashboard {
        user_id,
        assigned: open().count(),
        in_progress: open()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count(),
        overdue: open().filter(|t| is_overdue(t, now)).count(),
        due_today: open().filter(|t| is_due_today(t, now)).count(),
        due_soon: open()
            .filter(|t| is_due_soon(t, now, due_soon_days))
            .count(),
        productivity: productivity(&mine, now, trend_days),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn percent_of(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round() as u8
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Actor;
    use crate::project::tests::{project, OWNER};
    use crate::roles::{Role, TeamRole};
    use crate::task::tests::{t0, task, ASSIGNEE, CREATOR};
    use crate::task::TaskPatch;

    fn creator() -> Actor {
        Actor::new(CREATOR, Role::User)
    }

    fn due(t: Task, at: Timestamp) -> Task {
        t.update_details(
            TaskPatch {
                due_date: Some(at),
                ..Default::default()
            },
            t0(),
        )
        .unwrap()
    }

    fn estimated(t: Task, estimated: f64, actual: f64) -> Task {
        Task {
            estimated_hours: Some(estimated),
            actual_hours: Some(actual),
            ..t
        }
    }

    // -- classification -----------------------------------------------------

    #[test]
    fn overdue_requires_open_status() {
        let now = t0() + Duration::days(2);
        let t = due(task(1), t0() + Duration::days(1));
        assert!(is_overdue(&t, now));
        let done = t.complete(&creator(), now).unwrap();
        assert!(!is_overdue(&done, now));
    }

    #[test]
    fn no_due_date_is_never_overdue() {
        assert!(!is_overdue(&task(1), t0() + Duration::days(365)));
    }

    #[test]
    fn due_today_matches_calendar_day() {
        let t = due(task(1), t0() + Duration::hours(10));
        assert!(is_due_today(&t, t0()));
        assert!(!is_due_today(&t, t0() + Duration::days(1)));
    }

    #[test]
    fn due_soon_window() {
        let t = due(task(1), t0() + Duration::days(2));
        assert!(is_due_soon(&t, t0(), 3));
        assert!(!is_due_soon(&t, t0(), 1));
        assert!(!is_due_soon(&t, t0() + Duration::days(3), 3));
    }

    #[test]
    fn due_soon_with_huge_window_does_not_overflow() {
        let t = due(task(1), t0() + Duration::days(400));
        assert!(is_due_soon(&t, t0(), i64::MAX));
        assert!(is_due_soon(&t, t0(), 1_000_000_000));
        assert!(!is_due_soon(&t, t0(), -5));
    }

    #[test]
    fn progress_mapping() {
        assert_eq!(progress_percent(TaskStatus::Todo), 0);
        assert_eq!(progress_percent(TaskStatus::InProgress), 50);
        assert_eq!(progress_percent(TaskStatus::Review), 75);
        assert_eq!(progress_percent(TaskStatus::Done), 100);
        assert_eq!(progress_percent(TaskStatus::Blocked), 25);
    }

    #[test]
    fn subtask_progress_counts_direct_children() {
        let done = task(2).complete(&creator(), t0()).unwrap();
        let parent = task(1).with_relations(vec![], vec![], vec![], vec![done, task(3), task(4)]);
        let p = subtask_progress(&parent);
        assert_eq!(p.completed, 1);
        assert_eq!(p.total, 3);
        assert_eq!(p.percentage, 33);
    }

    #[test]
    fn subtask_progress_empty() {
        let p = subtask_progress(&task(1));
        assert_eq!((p.completed, p.total, p.percentage), (0, 0, 0));
    }

    // -- estimates ----------------------------------------------------------

    #[test]
    fn estimate_accuracy_ten_vs_thirteen() {
        let t = estimated(task(1), 10.0, 13.0);
        assert_eq!(estimate_accuracy(&t), Some(70));
        assert!(has_estimate_variance(&t, DEFAULT_VARIANCE_THRESHOLD_PCT));
    }

    #[test]
    fn small_deviation_not_flagged() {
        let t = estimated(task(1), 10.0, 11.0);
        assert_eq!(estimate_accuracy(&t), Some(90));
        assert!(!has_estimate_variance(&t, DEFAULT_VARIANCE_THRESHOLD_PCT));
    }

    #[test]
    fn estimate_accuracy_undefined_without_values() {
        assert_eq!(estimate_accuracy(&task(1)), None);
        let t = Task {
            estimated_hours: Some(0.0),
            actual_hours: Some(3.0),
            ..task(1)
        };
        assert_eq!(estimate_accuracy(&t), None);
        assert!(!has_estimate_variance(&t, DEFAULT_VARIANCE_THRESHOLD_PCT));
    }

    #[test]
    fn time_spent_sums_logs() {
        let t = task(1)
            .log_time(1, CREATOR, 30, None, t0(), t0())
            .unwrap()
            .log_time(2, CREATOR, 45, None, t0(), t0())
            .unwrap();
        assert_eq!(time_spent_minutes(&t), 75);
    }

    // -- aggregates ---------------------------------------------------------

    #[test]
    fn aggregates_tolerate_empty_input() {
        assert_eq!(average_completion_hours(&[]), 0.0);
        assert_eq!(on_time_completion_rate(&[]), 0.0);
        assert_eq!(average_estimate_accuracy(&[]), 0.0);
        let trend = completion_trend(&[], t0(), 7);
        assert_eq!(trend.len(), 7);
        assert!(trend.iter().all(|p| p.completed == 0));
        assert_eq!(task_statistics(&[], t0()), TaskStatistics::default());
    }

    #[test]
    fn trend_buckets_by_day_oldest_first() {
        let now = t0() + Duration::days(3);
        let a = task(1).complete(&creator(), t0() + Duration::days(1)).unwrap();
        let b = task(2).complete(&creator(), t0() + Duration::days(3)).unwrap();
        let c = task(3).complete(&creator(), t0() + Duration::days(3)).unwrap();
        let trend = completion_trend(&[a, b, c], now, 3);
        let counts: Vec<usize> = trend.iter().map(|p| p.completed).collect();
        assert_eq!(counts, vec![1, 0, 2]);
        assert_eq!(trend[2].date, now.date_naive());
    }

    #[test]
    fn trend_window_is_clamped() {
        let trend = completion_trend(&[], t0(), 1_000_000_000);
        assert_eq!(trend.len() as i64, MAX_WINDOW_DAYS);
        assert_eq!(trend.last().map(|p| p.date), Some(t0().date_naive()));
        assert!(completion_trend(&[], t0(), -3).is_empty());
    }

    #[test]
    fn average_completion_uses_start_date() {
        let started = task(1).start(&creator(), t0()).unwrap();
        let done = started
            .complete(&creator(), t0() + Duration::hours(6))
            .unwrap();
        assert_eq!(average_completion_hours(&[done, task(2)]), 6.0);
    }

    #[test]
    fn on_time_rate() {
        let deadline = t0() + Duration::days(1);
        let early = due(task(1), deadline).complete(&creator(), t0()).unwrap();
        let late = due(task(2), deadline)
            .complete(&creator(), deadline + Duration::hours(1))
            .unwrap();
        let no_due = task(3).complete(&creator(), t0()).unwrap();
        assert_eq!(on_time_completion_rate(&[early, late, no_due]), 50.0);
    }

    #[test]
    fn average_accuracy_skips_undefined() {
        let tasks = [
            estimated(task(1), 10.0, 13.0),
            estimated(task(2), 10.0, 10.0),
            task(3),
        ];
        assert_eq!(average_estimate_accuracy(&tasks), 85.0);
    }

    // -- statistics ---------------------------------------------------------

    #[test]
    fn statistics_exclude_archived_and_cancelled_from_completion() {
        let done = task(1).complete(&creator(), t0()).unwrap();
        let cancelled = task(2).cancel(t0()).unwrap();
        let open = task(3);
        let archived = task(4).archive(t0());
        let stats = task_statistics(&[done, cancelled, open, archived], t0());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.completion_percentage, 50);
    }

    #[test]
    fn project_statistics_counts_owner_once() {
        let p = project()
            .add_member(5, TeamRole::Developer, t0())
            .unwrap()
            .with_tasks(vec![task(1).complete(&creator(), t0()).unwrap(), task(2)]);
        let stats = project_statistics(&p, t0());
        assert_eq!(stats.member_count, 2);
        assert_eq!(stats.tasks.total, 2);
        assert_eq!(project_progress(&p, t0()), 50);
        assert!(stats.days_until_deadline.is_none());

        let moved = p.transfer_ownership(5, t0()).unwrap();
        assert_eq!(project_statistics(&moved, t0()).member_count, 2);
        assert!(moved.is_member(OWNER));
    }

    #[test]
    fn dashboard_counts_assigned_open_tasks() {
        let now = t0();
        let mine = |id| task(id).assign(Some(ASSIGNEE), now);
        let tasks = vec![
            mine(1).start(&Actor::new(ASSIGNEE, Role::User), now).unwrap(),
            due(mine(2), now - Duration::days(1)),
            due(mine(3), now + Duration::hours(2)),
            mine(4).complete(&creator(), now).unwrap(),
            task(5),
        ];
        let d = user_dashboard(ASSIGNEE, &tasks, now, 3, 7);
        assert_eq!(d.assigned, 3);
        assert_eq!(d.in_progress, 1);
        assert_eq!(d.overdue, 1);
        assert_eq!(d.due_today, 1);
        assert_eq!(d.due_soon, 1);
        assert_eq!(d.productivity.completed, 1);
    }
}
