use crate::task::Task;

pub const CSV_HEADER: &str = "ID,Task,DueDate,Priority,Completed";

/// Renders the whole, unfiltered list as CSV. Read-only.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn to_csv(tasks: &[Task]) -> String {
    let mut out = String::with_capacity(64 * (tasks.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');

    for task in tasks {
        let due = task
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let row = [
            task.id.to_string(),
            csv_field(&task.text),
            due,
            task.priority.to_string(),
            task.completed.to_string(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
