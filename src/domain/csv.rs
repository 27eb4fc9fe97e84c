//! Task list CSV export and import.
//!
//! Every field is quoted on export; embedded quotes are doubled. Import
//! skips the header row and needs at least six columns per line.

use todolist_api_types::{TaskInput, TaskView};

pub const HEADERS: [&str; 7] = [
    "Name",
    "Description",
    "Deadline",
    "Priority",
    "Tags",
    "Completed",
    "Created",
];

const TAG_SEPARATOR: &str = "; ";

pub fn export_tasks(tasks: &[TaskView]) -> String {
    let mut lines = Vec::with_capacity(tasks.len() + 1);
    lines.push(row(HEADERS.iter().map(|header| header.to_string())));

    for task in tasks {
        let deadline = task.deadline.map(|date| date.to_string()).unwrap_or_default();
        let created = task
            .created_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        lines.push(row([
            task.name.clone(),
            task.description.clone().unwrap_or_default(),
            deadline,
            task.priority.as_str().to_string(),
            task.tags.join(TAG_SEPARATOR),
            if task.completed { "Yes" } else { "No" }.to_string(),
            created,
        ]));
    }

    lines.join("\n")
}

fn row(fields: impl IntoIterator<Item = String>) -> String {
    fields
        .into_iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse exported CSV back into task inputs. Lines with fewer than six
/// columns are skipped.
pub fn import_tasks(text: &str) -> Vec<TaskInput> {
    text.lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(split_line)
        .filter(|values| values.len() >= 6)
        .map(|values| {
            let field = |idx: usize| {
                values
                    .get(idx)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            };
            TaskInput {
                name: field(0),
                description: field(1),
                deadline: field(2),
                priority: field(3),
                tags: Some(
                    field(4)
                        .map(|tags| {
                            tags.split(';')
                                .map(|tag| tag.trim().to_string())
                                .filter(|tag| !tag.is_empty())
                                .collect()
                        })
                        .unwrap_or_default(),
                ),
                completed: Some(field(5).is_some_and(|value| {
                    value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("true")
                })),
                created_at: field(6),
            }
        })
        .collect()
}

fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}
