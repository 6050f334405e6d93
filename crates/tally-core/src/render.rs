use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::today_in;
use crate::filter::FilterMode;
use crate::task::{Priority, Task};
use crate::theme::Theme;

/// ANSI codes per theme: dark terminals get the bright variants.
#[derive(Debug, Clone, Copy)]
struct Palette {
    position: &'static str,
    overdue: &'static str,
    high: &'static str,
    low: &'static str,
    done: &'static str,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                position: "34",
                overdue: "31",
                high: "31;1",
                low: "90",
                done: "32",
            },
            Theme::Dark => Self {
                position: "96",
                overdue: "91",
                high: "91;1",
                low: "37",
                done: "92",
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    palette: Palette,
}

impl Renderer {
    pub fn new(cfg: &Config, theme: Theme) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            palette: Palette::for_theme(theme),
        })
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.palette = Palette::for_theme(theme);
    }

    /// Prints `rows` as (full-list index, task) pairs so the `#` column can
    /// be fed straight back into `swap`, `done`, `edit` and `delete`.
    #[tracing::instrument(skip(self, rows, now, tz))]
    pub fn print_task_table(
        &mut self,
        rows: &[(usize, &Task)],
        filter: FilterMode,
        total: usize,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if rows.is_empty() {
            writeln!(out, "{}", empty_message(filter))?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "ID".to_string(),
            "Due".to_string(),
            "Pri".to_string(),
            "Done".to_string(),
            "Task".to_string(),
        ];
        let today = today_in(tz, now);

        let table = rows
            .iter()
            .map(|(idx, task)| {
                let position = self.paint(&(idx + 1).to_string(), self.palette.position);
                let due = match task.due_date {
                    Some(date) => {
                        let text = date.format("%Y-%m-%d").to_string();
                        if !task.completed && date < today {
                            self.paint(&text, self.palette.overdue)
                        } else {
                            text
                        }
                    }
                    None => String::new(),
                };
                let priority = match task.priority {
                    Priority::High => self.paint("H", self.palette.high),
                    Priority::Medium => "M".to_string(),
                    Priority::Low => self.paint("L", self.palette.low),
                };
                let done = if task.completed {
                    self.paint("x", self.palette.done)
                } else {
                    String::new()
                };
                vec![position, task.id.to_string(), due, priority, done, task.text.clone()]
            })
            .collect();

        write_table(&mut out, headers, table)?;
        writeln!(out)?;
        writeln!(
            out,
            "{} of {} task(s) shown (filter: {filter})",
            rows.len(),
            total
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "text      {}", task.text)?;
        writeln!(
            out,
            "due       {}",
            task.due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        )?;
        writeln!(out, "priority  {}", task.priority)?;
        writeln!(out, "completed {}", task.completed)?;
        writeln!(out, "notified  {}", task.notified)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn empty_message(filter: FilterMode) -> &'static str {
    match filter {
        FilterMode::All => "No tasks.",
        FilterMode::Completed => "No completed tasks.",
        FilterMode::Pending => "No pending tasks.",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
