//! Client-side task filtering for the board

use std::collections::HashMap;

use crate::models::{Employee, Label, Priority, Task, TaskStatus};
use crate::permissions::Permissions;

/// Board filter bar state; empty fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub search_term: String,
    pub selected_assignee_ids: Vec<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub selected_labels: Vec<Label>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.search_term.is_empty()
            && self.selected_assignee_ids.is_empty()
            && self.status.is_none()
            && self.priority.is_none()
            && self.selected_labels.is_empty()
    }

    pub fn matches(&self, task: &Task, employees: &[Employee]) -> bool {
        self.matches_text(task, employees)
            && self.matches_assignees(task)
            && self.status.is_none_or(|status| task.status == status)
            && self.priority.is_none_or(|priority| task.priority == Some(priority))
            && self.matches_labels(task)
    }

    // Title, description, or the name of any assignee.
    fn matches_text(&self, task: &Task, employees: &[Employee]) -> bool {
        let term = self.search_term.to_lowercase();
        if term.is_empty() {
            return true;
        }

        if task.title.to_lowercase().contains(&term)
            || task.description.to_lowercase().contains(&term)
        {
            return true;
        }

        employees
            .iter()
            .filter(|e| task.is_assigned_to(&e.id))
            .any(|e| e.name.to_lowercase().contains(&term))
    }

    fn matches_assignees(&self, task: &Task) -> bool {
        self.selected_assignee_ids.is_empty()
            || task
                .assignee_ids
                .iter()
                .any(|id| self.selected_assignee_ids.contains(id))
    }

    // A label matches by id or by display name, so two labels sharing a
    // name are interchangeable here.
    fn matches_labels(&self, task: &Task) -> bool {
        self.selected_labels.is_empty()
            || self.selected_labels.iter().any(|selected| {
                task.labels
                    .iter()
                    .any(|l| l.id == selected.id || l.name == selected.name)
            })
    }
}

/// Tasks matching `filter`, in their original order
pub fn filter_tasks(tasks: &[Task], filter: &TaskFilter, employees: &[Employee]) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| filter.matches(task, employees))
        .cloned()
        .collect()
}

/// Tasks the user is allowed to see
pub fn visible_tasks<'a>(
    tasks: &'a [Task],
    permissions: &Permissions,
    user_id: &str,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| permissions.can_view_task(task, user_id))
        .collect()
}

/// Bucket tasks into board columns, keeping order within each column
pub fn group_by_status(tasks: &[Task]) -> HashMap<TaskStatus, Vec<&Task>> {
    let mut columns: HashMap<TaskStatus, Vec<&Task>> = TaskStatus::BOARD_COLUMNS
        .iter()
        .map(|status| (*status, Vec::new()))
        .collect();
    for task in tasks {
        columns.entry(task.status).or_default().push(task);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{custom_label, label};
    use crate::models::{LabelCategory, Role};

    fn task(id: &str, title: &str, assignees: &[&str]) -> Task {
        Task {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            assignee_ids: assignees.iter().map(|s| s.to_string()).collect(),
            priority: None,
            due_date: None,
            labels: vec![],
            custom_color: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn empty_filter_is_identity() {
        let tasks = vec![task("1", "a", &[]), task("2", "b", &["u1"]), task("3", "c", &["u2"])];
        let filter = TaskFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter_tasks(&tasks, &filter, &[]), tasks);
    }

    #[test]
    fn search_is_case_insensitive_over_title_description_and_assignee() {
        let mut with_desc = task("2", "Other", &[]);
        with_desc.description = "Fix the LOGIN page".into();
        let tasks = vec![task("1", "Login flow", &[]), with_desc, task("3", "Payroll", &["e1"])];
        let employees = vec![Employee {
            id: "e1".into(),
            name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
            role: Role::Employee,
        }];

        let filter = TaskFilter {
            search_term: "login".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &filter, &employees)), vec!["1", "2"]);

        let filter = TaskFilter {
            search_term: "HOPPER".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &filter, &employees)), vec!["3"]);
    }

    #[test]
    fn search_term_whitespace_is_significant() {
        let tasks = vec![task("1", "Login flow", &[]), task("2", "Payroll", &[])];

        let filter = TaskFilter {
            search_term: " ".into(),
            ..Default::default()
        };
        assert!(!filter.is_empty());
        assert_eq!(ids(&filter_tasks(&tasks, &filter, &[])), vec!["1"]);

        let filter = TaskFilter {
            search_term: "login ".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &filter, &[])), vec!["1"]);

        let filter = TaskFilter {
            search_term: " payroll".into(),
            ..Default::default()
        };
        assert!(filter_tasks(&tasks, &filter, &[]).is_empty());
    }

    #[test]
    fn assignee_selection_uses_or_semantics() {
        let tasks = vec![
            task("1", "a", &["u1"]),
            task("2", "b", &["u2", "u3"]),
            task("3", "c", &["u4"]),
            task("4", "d", &[]),
        ];
        let filter = TaskFilter {
            selected_assignee_ids: vec!["u1".into(), "u3".into()],
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &filter, &[])), vec!["1", "2"]);
    }

    #[test]
    fn status_and_priority_exact_match() {
        let mut done = task("2", "b", &[]);
        done.status = TaskStatus::Done;
        done.priority = Some(Priority::High);
        let tasks = vec![task("1", "a", &[]), done];

        let filter = TaskFilter {
            status: Some(TaskStatus::Done),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &filter, &[])), vec!["2"]);

        let filter = TaskFilter {
            priority: Some(Priority::Low),
            ..Default::default()
        };
        assert!(filter_tasks(&tasks, &filter, &[]).is_empty());
    }

    #[test]
    fn labels_with_same_name_are_interchangeable() {
        let team_a = label("urgent-a", "Urgent", "#ff0000", LabelCategory::Custom);
        let team_b = label("urgent-b", "Urgent", "#00ff00", LabelCategory::Custom);

        let mut tagged_b = task("1", "a", &[]);
        tagged_b.labels = vec![team_b];
        let mut untagged = task("2", "b", &[]);
        untagged.labels = vec![custom_label("ops")];

        let filter = TaskFilter {
            selected_labels: vec![team_a],
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&[tagged_b, untagged], &filter, &[])), vec!["1"]);
    }

    #[test]
    fn visibility_and_grouping() {
        let mut done = task("3", "c", &["u1"]);
        done.status = TaskStatus::Done;
        let tasks = vec![task("1", "a", &["u1"]), task("2", "b", &["u2"]), done];

        let employee = Permissions::for_role(Role::Employee);
        let visible: Vec<_> = visible_tasks(&tasks, &employee, "u1")
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(visible, vec!["1", "3"]);

        let columns = group_by_status(&tasks);
        assert_eq!(columns[&TaskStatus::Pending].len(), 2);
        assert_eq!(columns[&TaskStatus::Done][0].id, "3");
        assert!(columns[&TaskStatus::InReview].is_empty());
    }
}
