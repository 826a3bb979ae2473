//! CLI command implementations

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;

use crate::board::Board;
use crate::cli::{AuditCommand, EmployeeCommand, EmployeeFields, TaskCommand, TaskFields};
use crate::config::Config;
use crate::db::Database;
use crate::filter::{self, TaskFilter};
use crate::gateway::Gateway;
use crate::labels;
use crate::migrate::StoredTask;
use crate::models::{EmployeeDraft, Label, Priority, Role, Task, TaskDraft, TaskStatus};
use crate::retry::RetryPolicy;
use crate::storage::LocalStore;

pub fn open_board(config: &Config) -> Result<Board<Gateway>> {
    let gateway = Gateway::new(&config.api.base_url, config.api.timeout())
        .context("Failed to build HTTP client")?;
    let store = LocalStore::open(&config.storage.path).context("Failed to open local store")?;

    Ok(Board::open(
        gateway,
        Arc::new(store),
        config.audit.max_entries,
        RetryPolicy::from(&config.retry),
    ))
}

pub fn whoami(board: &Board<Gateway>) {
    let session = board.session();
    match &session.current_user {
        Some(user) => println!("{} ({}) acting as {}", user.name, user.id, session.role),
        None => println!("Not signed in. Run 'taskboard login <employee-id>'."),
    }

    let p = board.permissions();
    let flags = [
        ("view all tasks", p.can_view_all_tasks),
        ("create tasks", p.can_create_task),
        ("edit tasks", p.can_edit_task),
        ("delete tasks", p.can_delete_task),
        ("change status", p.can_change_status),
        ("assign tasks", p.can_assign_task),
        ("change colors", p.can_change_color),
        ("create employees", p.can_create_employee),
        ("edit employees", p.can_edit_employee),
        ("delete employees", p.can_delete_employee),
        ("view audit log", p.can_view_audit_log),
        ("restore from audit log", p.can_restore_from_audit_log),
    ];
    for (name, allowed) in flags {
        println!("  [{}] {}", if allowed { "x" } else { " " }, name);
    }
}

pub async fn tasks(board: &mut Board<Gateway>, command: TaskCommand) -> Result<()> {
    match command {
        TaskCommand::List(args) => {
            let filter = TaskFilter {
                search_term: args.search,
                selected_assignee_ids: args.assignees,
                status: args.status,
                priority: args.priority,
                selected_labels: args
                    .labels
                    .iter()
                    .map(|l| resolve_label(board.tasks(), l))
                    .collect(),
            };
            let visible = board.visible_tasks(&filter);
            print_board(board, &visible);
        }

        TaskCommand::Create(fields) => {
            let draft = task_draft(board.tasks(), fields);
            let task = board.handle_create_task(draft).await?;
            println!("Created {} \"{}\"", task.id, task.title);
        }

        TaskCommand::Edit { id, fields } => {
            let draft = task_draft(board.tasks(), fields);
            let task = board.handle_edit_task(&id, draft).await?;
            println!("Updated {} \"{}\"", task.id, task.title);
        }

        TaskCommand::Move { id, status } => {
            let task = board.handle_task_status_change(&id, status).await?;
            println!("\"{}\" is now {}", task.title, task.status.title());
        }

        TaskCommand::Drag { id, over, drop } => {
            let mut session = board.begin_drag(&id)?;
            for column in over {
                if session.drag_over(column) {
                    println!("  hovering {}", column.title());
                }
            }
            let outcome = board.handle_drag_end(session, drop).await?;
            println!("{:?}", outcome);
        }

        TaskCommand::Assign { id, assignee_ids } => {
            let task = board.handle_assign_task(&id, assignee_ids).await?;
            println!(
                "\"{}\" assigned to [{}]",
                task.title,
                assignee_names(board, &task).join(", ")
            );
        }

        TaskCommand::Color { id, color } => {
            let task = board.handle_color_change(&id, color).await?;
            match &task.custom_color {
                Some(color) => println!("\"{}\" colored {}", task.title, color),
                None => println!("\"{}\" color cleared", task.title),
            }
        }

        TaskCommand::Delete { id } => {
            board.handle_delete_task(&id).await?;
            println!("Deleted {}", id);
        }

        TaskCommand::Labels => {
            let custom: Vec<Label> = board
                .tasks()
                .iter()
                .flat_map(|t| t.labels.iter().cloned())
                .collect();
            for label in labels::merge_labels(&custom) {
                println!(
                    "{:<16} {:<16} {:?} {} on {}",
                    label.id, label.name, label.category, label.text_color, label.bg_color
                );
            }
        }
    }
    Ok(())
}

pub async fn employees(board: &mut Board<Gateway>, command: EmployeeCommand) -> Result<()> {
    match command {
        EmployeeCommand::List => {
            for e in board.employees() {
                println!("{:<38} {:<24} {:<28} {}", e.id, e.name, e.email, e.role);
            }
        }

        EmployeeCommand::Add(fields) => {
            let employee = board.handle_create_employee(employee_draft(fields)).await?;
            println!("Added {} ({})", employee.name, employee.id);
        }

        EmployeeCommand::Update { id, fields } => {
            let employee = board
                .handle_update_employee(&id, employee_draft(fields))
                .await?;
            println!("Updated {} ({})", employee.name, employee.id);
        }

        EmployeeCommand::Remove { id } => {
            board.handle_delete_employee(&id).await?;
            println!("Removed {}", id);
        }
    }
    Ok(())
}

pub async fn audit(board: &mut Board<Gateway>, command: AuditCommand) -> Result<()> {
    match command {
        AuditCommand::List {
            entity,
            action,
            id,
            limit,
        } => {
            let log = board.audit_log()?;
            let entries = log
                .get_logs()
                .iter()
                .filter(|e| entity.is_none_or(|t| e.entity_type == t))
                .filter(|e| action.is_none_or(|a| e.action_type == a))
                .filter(|e| id.as_deref().is_none_or(|id| e.entity_id == id))
                .take(limit);

            for e in entries {
                let change = match (&e.previous_value, &e.new_value) {
                    (Some(p), Some(n)) => format!(" [{} -> {}]", p, n),
                    _ => String::new(),
                };
                println!(
                    "{} {} {:?} {} \"{}\" by {}: {}{}",
                    e.timestamp,
                    e.id,
                    e.action_type,
                    e.entity_id,
                    e.entity_name,
                    e.user_role,
                    e.details,
                    change
                );
            }
        }

        AuditCommand::Export { output } => {
            let json = board.audit_log()?.export_logs()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).context("Failed to write export")?;
                    println!("Exported audit log to {}", path.display());
                }
                None => println!("{}", json),
            }
        }

        AuditCommand::Import { input } => {
            let json = std::fs::read_to_string(&input).context("Failed to read import file")?;
            let count = board.import_audit_log(&json)?;
            println!("Imported {} entries", count);
        }

        AuditCommand::Restore { entry_id } => {
            let task = board.restore_status_change(&entry_id).await?;
            println!("\"{}\" restored to {}", task.title, task.status.title());
        }

        AuditCommand::Clear => {
            board.clear_audit_log()?;
            println!("Audit log cleared");
        }
    }
    Ok(())
}

fn print_board(board: &Board<Gateway>, tasks: &[Task]) {
    let today = Utc::now().date_naive();
    let columns = filter::group_by_status(tasks);

    for status in TaskStatus::BOARD_COLUMNS {
        let cards = columns.get(&status).map(Vec::as_slice).unwrap_or_default();
        println!("== {} ({})", status.title(), cards.len());

        for task in cards {
            let mut line = format!("  {}  {}", task.id, task.title);
            let names = assignee_names(board, task);
            if !names.is_empty() {
                line.push_str(&format!("  [{}]", names.join(", ")));
            }
            if let Some(priority) = task.priority {
                line.push_str(&format!("  {:?}", priority));
            }
            if let Some(due) = &task.due_date {
                line.push_str(&format!("  due {}", labels::format_date(due)));
                if labels::is_overdue(task, today) {
                    line.push_str(" (overdue)");
                }
            }
            for label in &task.labels {
                line.push_str(&format!("  #{}", label.name));
            }
            println!("{}", line);
        }
    }
}

fn assignee_names(board: &Board<Gateway>, task: &Task) -> Vec<String> {
    task.assignee_ids
        .iter()
        .map(|id| {
            board
                .employees()
                .iter()
                .find(|e| &e.id == id)
                .map_or_else(|| id.clone(), |e| e.name.clone())
        })
        .collect()
}

// Catalog first, then labels already used on the board, else a new custom label.
fn resolve_label(tasks: &[Task], key: &str) -> Label {
    let used: Vec<Label> = tasks.iter().flat_map(|t| t.labels.iter().cloned()).collect();
    labels::merge_labels(&used)
        .into_iter()
        .find(|l| l.id == key || l.name.eq_ignore_ascii_case(key))
        .unwrap_or_else(|| labels::custom_label(key))
}

fn task_draft(tasks: &[Task], fields: TaskFields) -> TaskDraft {
    TaskDraft {
        title: fields.title,
        description: fields.description,
        status: fields.status,
        assignee_ids: fields.assignees,
        priority: fields.priority,
        due_date: fields.due,
        labels: fields
            .labels
            .iter()
            .map(|l| resolve_label(tasks, l))
            .collect(),
        custom_color: fields.color,
    }
}

fn employee_draft(fields: EmployeeFields) -> EmployeeDraft {
    EmployeeDraft {
        name: fields.name,
        email: fields.email,
        role: fields.role,
    }
}

/// Demo roster and board, including one record in the legacy single-assignee shape
pub fn seed_demo(db: &Database) -> Result<(usize, usize)> {
    let roster = [
        ("Alex Admin", "alex@example.com", Role::Admin),
        ("Morgan Manager", "morgan@example.com", Role::Manager),
        ("Sam Employee", "sam@example.com", Role::Employee),
        ("Riley Employee", "riley@example.com", Role::Employee),
    ];
    let mut ids = Vec::new();
    for (name, email, role) in roster {
        let employee = db.create_employee(EmployeeDraft {
            name: name.to_string(),
            email: email.to_string(),
            role,
        })?;
        ids.push(employee.id);
    }

    let catalog = labels::catalog();
    let pick = |id: &str| catalog.iter().filter(|l| l.id == id).cloned().collect::<Vec<_>>();

    let drafts = vec![
        TaskDraft {
            title: "Set up CI pipeline".into(),
            description: "Build, lint and test on every push".into(),
            status: TaskStatus::InProgress,
            assignee_ids: vec![ids[1].clone(), ids[2].clone()],
            priority: Some(Priority::High),
            labels: pick("backend"),
            ..Default::default()
        },
        TaskDraft {
            title: "Fix login redirect".into(),
            description: "Users land on a blank page after signing in".into(),
            status: TaskStatus::Pending,
            assignee_ids: vec![ids[2].clone()],
            priority: Some(Priority::Urgent),
            due_date: Some(Utc::now().date_naive().to_string()),
            labels: pick("bug"),
            ..Default::default()
        },
        TaskDraft {
            title: "Refresh onboarding copy".into(),
            status: TaskStatus::InReview,
            assignee_ids: vec![ids[3].clone()],
            priority: Some(Priority::Low),
            labels: pick("documentation"),
            ..Default::default()
        },
    ];
    let mut count = 0;
    for draft in drafts {
        db.create_task(draft)?;
        count += 1;
    }

    let legacy: StoredTask = serde_json::from_value(serde_json::json!({
        "id": "legacy-1",
        "title": "Archive old reports",
        "status": "planning",
        "assigneeId": ids[3].clone(),
        "label": "ops"
    }))?;
    db.insert_stored(&legacy)?;
    count += 1;

    tracing::info!(employees = ids.len(), tasks = count, "Demo data seeded");
    Ok((ids.len(), count))
}
