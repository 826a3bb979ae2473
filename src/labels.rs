//! Label catalog and display helpers

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{Label, LabelCategory, Task, TaskStatus};

const DEFAULT_CUSTOM_COLOR: &str = "#6b7280";

/// Built-in labels offered by the label picker
pub fn catalog() -> Vec<Label> {
    [
        ("bug", "Bug", "#dc2626", LabelCategory::Type),
        ("feature", "Feature", "#2563eb", LabelCategory::Type),
        ("improvement", "Improvement", "#7c3aed", LabelCategory::Type),
        ("documentation", "Documentation", "#0891b2", LabelCategory::Type),
        ("critical", "Critical", "#b91c1c", LabelCategory::Priority),
        ("blocked", "Blocked", "#ea580c", LabelCategory::Priority),
        ("quick-win", "Quick Win", "#16a34a", LabelCategory::Priority),
        ("frontend", "Frontend", "#db2777", LabelCategory::Area),
        ("backend", "Backend", "#4f46e5", LabelCategory::Area),
        ("design", "Design", "#facc15", LabelCategory::Area),
    ]
    .into_iter()
    .map(|(id, name, color, category)| label(id, name, color, category))
    .collect()
}

/// Build a label with background tint and readable text color derived from `color`
pub fn label(id: &str, name: &str, color: &str, category: LabelCategory) -> Label {
    Label {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
        category,
        bg_color: color.to_string(),
        text_color: contrast_text_color(color).to_string(),
    }
}

/// A user-created label with the default gray
pub fn custom_label(name: &str) -> Label {
    label(name, name, DEFAULT_CUSTOM_COLOR, LabelCategory::Custom)
}

/// Catalog followed by user labels; a user label whose id is already taken is dropped
pub fn merge_labels(custom: &[Label]) -> Vec<Label> {
    let mut merged = catalog();
    for candidate in custom {
        if !merged.iter().any(|l| l.id == candidate.id) {
            merged.push(candidate.clone());
        }
    }
    merged
}

/// Pick black or white text for a `#rrggbb` (or `#rgb`) background
pub fn contrast_text_color(hex: &str) -> &'static str {
    match parse_hex(hex) {
        Some((r, g, b)) if relative_luminance(r, g, b) > 0.179 => "#000000",
        Some(_) => "#ffffff",
        None => "#000000",
    }
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.is_ascii() {
        return None;
    }
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

// WCAG relative luminance.
fn relative_luminance(r: u8, g: u8, b: u8) -> f64 {
    let linear = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(r) + 0.7152 * linear(g) + 0.0722 * linear(b)
}

/// Render an ISO date or timestamp as `Jan 5, 2026`; unparsable input is returned as-is
pub fn format_date(value: &str) -> String {
    match parse_date(value) {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => value.to_string(),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Past its due date and not finished
pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    if matches!(task.status, TaskStatus::Done | TaskStatus::Failed) {
        return false;
    }
    task.due_date
        .as_deref()
        .and_then(parse_date)
        .is_some_and(|due| due < today)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contrast_picks_readable_text() {
        assert_eq!(contrast_text_color("#ffffff"), "#000000");
        assert_eq!(contrast_text_color("#000"), "#ffffff");
        assert_eq!(contrast_text_color("#facc15"), "#000000");
        assert_eq!(contrast_text_color("#1e3a8a"), "#ffffff");
        assert_eq!(contrast_text_color("not-a-color"), "#000000");
    }

    #[test]
    fn non_ascii_colors_fall_back_without_panicking() {
        assert_eq!(contrast_text_color("#a€bc"), "#000000");
        assert_eq!(contrast_text_color("#€"), "#000000");
        assert_eq!(contrast_text_color("#ééé"), "#000000");
    }

    #[test]
    fn merge_skips_id_collisions() {
        let mut clash = custom_label("bug");
        clash.name = "My Bug".into();
        let merged = merge_labels(&[clash, custom_label("ops")]);

        assert_eq!(merged.len(), catalog().len() + 1);
        assert_eq!(merged.iter().find(|l| l.id == "bug").unwrap().name, "Bug");
        assert_eq!(merged.last().unwrap().id, "ops");
    }

    #[test]
    fn dates_format_and_overdue() {
        assert_eq!(format_date("2026-01-05"), "Jan 5, 2026");
        assert_eq!(format_date("2026-03-10T12:00:00Z"), "Mar 10, 2026");
        assert_eq!(format_date("soon"), "soon");

        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let mut task = Task {
            id: "t".into(),
            title: "Late".into(),
            description: String::new(),
            status: TaskStatus::Pending,
            assignee_ids: vec![],
            priority: None,
            due_date: Some("2026-01-31".into()),
            labels: vec![],
            custom_color: None,
            created_at: None,
            updated_at: None,
        };
        assert!(is_overdue(&task, today));
        task.status = TaskStatus::Done;
        assert!(!is_overdue(&task, today));
    }
}
