use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::month_label;
use crate::progress::MonthProgress;
use crate::views::TaskRow;

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, rows))]
    pub fn print_task_table(&mut self, title: &str, rows: &[TaskRow<'_>]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{title}")?;
        if rows.is_empty() {
            writeln!(out, "  (none)")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Due".to_string(),
            "Left".to_string(),
            "Title".to_string(),
            "Color".to_string(),
            "Assigned".to_string(),
        ];

        let table: Vec<Vec<String>> = rows.iter().map(|row| self.table_row(row)).collect();
        write_table(&mut out, headers, table)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, row))]
    pub fn print_task_info(&mut self, row: &TaskRow<'_>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let task = row.task;

        writeln!(out, "id         {}", task.id())?;
        writeln!(out, "title      {}", task.title())?;
        writeln!(out, "due        {}", task.due_date().format("%Y-%m-%d"))?;
        writeln!(out, "left       {} day(s)", row.urgency.days_remaining)?;
        writeln!(out, "urgent     {}", if row.urgency.urgent { "yes" } else { "no" })?;
        writeln!(out, "color      {}", task.color().map(|c| c.name()).unwrap_or("-"))?;
        writeln!(out, "assigned   {}", task.assigned_email().unwrap_or("-"))?;
        match task.completed_at() {
            Some(at) => writeln!(out, "completed  {}", at.to_rfc3339())?,
            None => writeln!(out, "completed  no")?,
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, progress), fields(month = progress.month, year = progress.year))]
    pub fn print_progress(&mut self, progress: &MonthProgress, dense: bool) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(
            out,
            "Total tasks due in {} {}: {}",
            month_label(progress.month),
            progress.year,
            progress.due_count
        )?;
        writeln!(out, "Total tasks complete: {}", progress.completed_count)?;

        let bars: Vec<(u32, usize)> = if dense {
            progress.dense()
        } else {
            progress.histogram.iter().map(|(d, n)| (*d, *n)).collect()
        };
        if bars.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        for (day, count) in bars {
            let bar = self.paint(&"#".repeat(count), "34");
            writeln!(out, "{day:>2} | {bar} {count}")?;
        }
        Ok(())
    }

    fn table_row(&self, row: &TaskRow<'_>) -> Vec<String> {
        let task = row.task;
        let id: String = task.id().as_str().chars().take(SHORT_ID_LEN).collect();
        let due = task.due_date().format("%Y-%m-%d").to_string();
        let left = if task.is_completed() {
            "done".to_string()
        } else {
            format!("{}d", row.urgency.days_remaining)
        };
        let left = if row.urgency.urgent && !task.is_completed() {
            self.paint(&left, "31")
        } else {
            left
        };

        vec![
            self.paint(&id, "33"),
            due,
            left,
            task.title().to_string(),
            task.color().map(|c| c.name().to_string()).unwrap_or_default(),
            task.assigned_email().unwrap_or_default().to_string(),
        ]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|h| UnicodeWidthStr::width(h.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{h:width$}", width = *w))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
            line.push(' ');
        }
        writeln!(writer, "{}", line.trim_end())?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_by_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Title".to_string()],
            vec![
                vec!["\x1b[33mab\x1b[0m".to_string(), "Café".to_string()],
                vec!["abcd".to_string(), "x".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID   Title");
        assert_eq!(lines[1], "---- -----");
        assert_eq!(strip_ansi(lines[2]), "ab   Café");
        assert_eq!(lines[3], "abcd x");
    }
}
