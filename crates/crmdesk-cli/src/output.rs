//! Terminal output formatting.

use std::time::Duration;

use colored::{ColoredString, Colorize};
use crmdesk_core::board::{ColumnKey, PipelineColumn};
use crmdesk_core::search::{EmptyReason, SearchOutcome};
use crmdesk_core::wizard::{StepDef, Wizard, WizardDraft, WizardSchema};
use crmdesk_core::{EntityKind, FieldErrors, FieldValue, Record};
use indicatif::{ProgressBar, ProgressStyle};
use unicode_width::UnicodeWidthStr;

/// Steady spinner for network calls.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.into());
    pb
}

/// Get terminal width, defaulting to 80.
fn term_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Truncate a string respecting visual width.
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("..");
    result
}

/// Compact money-ish figure: 1.2M, 45.0k, 950.
fn format_amount(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1}k", value / 1_000.0)
    } else {
        format!("{:.0}", value)
    }
}

/// `firstName` → `First name`.
pub fn field_label(field: &str) -> String {
    let mut label = String::with_capacity(field.len() + 4);
    for (i, ch) in field.chars().enumerate() {
        if i == 0 {
            label.extend(ch.to_uppercase());
        } else if ch.is_uppercase() {
            label.push(' ');
            label.extend(ch.to_lowercase());
        } else {
            label.push(ch);
        }
    }
    label
}

fn colorize_column(label: String, key: ColumnKey<'_>) -> ColoredString {
    match key {
        ColumnKey::Unassigned => label.red().bold(),
        ColumnKey::Stage(stage) => match stage.probability {
            Some(100) => label.green().bold(),
            Some(0) => label.dimmed(),
            Some(p) if p >= 50 => label.yellow().bold(),
            _ => label.cyan().bold(),
        },
    }
}

fn column_header_plain(column: &PipelineColumn<'_>, max_width: usize) -> String {
    let full = format!("{} {}", column.name().to_uppercase(), column.len());
    truncate_visual(&full, max_width)
}

/// Print the stage board.
pub fn print_board(kind: EntityKind, columns: &[PipelineColumn<'_>]) {
    let total: usize = columns.iter().map(PipelineColumn::len).sum();
    if total == 0 {
        println!("{}", format!("No {} found.", kind.resource()).dimmed());
        return;
    }

    let width = term_width();
    if width < 60 {
        print_board_compact(kind, columns);
    } else {
        print_board_wide(kind, columns, width);
    }
}

/// Columns side by side.
fn print_board_wide(kind: EntityKind, columns: &[PipelineColumn<'_>], term_w: usize) {
    let num_cols = columns.len();
    let available = if term_w > num_cols + 1 { term_w - num_cols - 1 } else { num_cols * 10 };
    let col_width = (available / num_cols).clamp(12, 30);
    let field = kind.value_field();

    let rule = |left: &str, mid: &str, right: &str| {
        let inner: Vec<String> = (0..num_cols).map(|_| "─".repeat(col_width)).collect();
        println!("{}", format!("{}{}{}", left, inner.join(mid), right).dimmed());
    };

    rule("┌", "┬", "┐");

    print!("{}", "│".dimmed());
    for (i, col) in columns.iter().enumerate() {
        let plain = column_header_plain(col, col_width);
        let padding = col_width.saturating_sub(UnicodeWidthStr::width(plain.as_str()));
        let left_pad = padding / 2;
        print!(
            "{}{}{}",
            " ".repeat(left_pad),
            colorize_column(plain, col.key),
            " ".repeat(padding - left_pad)
        );
        if i < num_cols - 1 {
            print!("{}", "│".dimmed());
        }
    }
    println!("{}", "│".dimmed());

    print!("{}", "│".dimmed());
    for (i, col) in columns.iter().enumerate() {
        let total = truncate_visual(&format_amount(col.total(field)), col_width);
        print!("{}", pad_right(&total, col_width).dimmed());
        if i < num_cols - 1 {
            print!("{}", "│".dimmed());
        }
    }
    println!("{}", "│".dimmed());

    rule("├", "┼", "┤");

    let max_rows = columns.iter().map(PipelineColumn::len).max().unwrap_or(0);
    for row in 0..max_rows {
        print!("{}", "│".dimmed());
        for (i, col) in columns.iter().enumerate() {
            match col.records.get(row) {
                Some(record) => print!("{}", format_card(record, col_width)),
                None => print!("{}", " ".repeat(col_width)),
            }
            if i < num_cols - 1 {
                print!("{}", "│".dimmed());
            }
        }
        println!("{}", "│".dimmed());
    }

    rule("└", "┴", "┘");

    let total: usize = columns.iter().map(PipelineColumn::len).sum();
    let value: f64 = columns.iter().map(|c| c.total(field)).sum();
    println!(
        " {} {} {} {} {}",
        "■".cyan(),
        total.to_string().bold(),
        kind.resource(),
        "·".dimmed(),
        format!("{} {}", format_amount(value), field).green()
    );
}

/// Vertical layout for narrow terminals.
fn print_board_compact(kind: EntityKind, columns: &[PipelineColumn<'_>]) {
    println!("{}", format!(" {} PIPELINE ", kind.as_str().to_uppercase()).on_blue().white().bold());
    println!();

    let field = kind.value_field();
    for col in columns.iter().filter(|c| !c.is_empty()) {
        let header = colorize_column(column_header_plain(col, 30), col.key);
        println!(" {} {} {}", "▸".dimmed(), header, format_amount(col.total(field)).dimmed());
        for record in &col.records {
            let id_short = record.id.get(..6).unwrap_or(&record.id);
            println!("   {} {}", record.display_name(), id_short.dimmed());
        }
        println!();
    }
}

fn format_card(record: &Record, width: usize) -> String {
    let title = truncate_visual(&record.display_name(), width.saturating_sub(1).max(1));
    format!(" {}", pad_right(&title, width.saturating_sub(1)))
}

/// Print a composed search result.
pub fn print_search(kind: EntityKind, outcome: &SearchOutcome<'_>, limit: usize) {
    if let Some(reason) = outcome.empty_reason {
        let message = match reason {
            EmptyReason::NoRecords => format!("No {} yet.", kind.resource()),
            EmptyReason::NoSearchMatches => "Nothing matches that search.".to_string(),
            EmptyReason::FilteredOut => "Matches exist, but the filters exclude them all.".to_string(),
        };
        println!("{}", message.dimmed());
        return;
    }

    let field = kind.value_field();
    println!(
        "{:<10} {:<30} {:<14} {:>10}",
        "ID", "Name", "Stage", field_label(field)
    );
    println!("{}", "─".repeat(67));

    for record in outcome.records.iter().take(limit) {
        let id_short = record.id.get(..8).unwrap_or(&record.id);
        let value = record.number(field).map(format_amount).unwrap_or_default();
        println!(
            "{:<10} {} {:<14} {:>10}",
            id_short,
            pad_right(&truncate_visual(&record.display_name(), 30), 30),
            truncate_visual(&record.stage, 14).cyan(),
            value
        );
    }

    println!();
    if outcome.records.len() > limit {
        println!("{} of {} result(s) shown", limit, outcome.records.len());
    } else {
        println!("{} result(s)", outcome.records.len());
    }
}

/// Wizard step banner with progress.
pub fn print_step_header(wizard: &Wizard, step: &StepDef) {
    let schema = wizard.schema();
    println!();
    println!(
        "{} {} {}",
        format!("[{}/{}]", wizard.current_step() + 1, schema.step_count()).dimmed(),
        step.title.cyan().bold(),
        format!("{}%", wizard.progress()).dimmed()
    );
    if !step.description.is_empty() {
        println!("{}", step.description.dimmed());
    }
}

pub fn print_field_errors(errors: &FieldErrors) {
    for (field, message) in errors.iter() {
        println!("  {} {}: {}", "✗".red().bold(), field_label(field), message.red());
    }
}

/// Print a stored draft, grouped by step when the schema is known.
pub fn print_draft(key: &str, draft: &WizardDraft, schema: Option<&WizardSchema>) {
    println!("{} {}", "Draft".cyan().bold(), format!("({})", key).dimmed());
    println!("{}: {}", "Step".bold(), draft.current_step + 1);

    let value_of = |field: &str| draft.field(field).filter(|v| v.has_content()).map(FieldValue::display);

    match schema {
        Some(schema) => {
            for step in &schema.steps {
                let values: Vec<(&str, String)> = step
                    .fields
                    .iter()
                    .filter_map(|f| value_of(f.as_str()).map(|v| (f.as_str(), v)))
                    .collect();
                if values.is_empty() {
                    continue;
                }
                println!();
                println!("{}", step.title.bold());
                for (field, value) in values {
                    println!("  {:<18} {}", field_label(field), value);
                }
            }
        }
        None => {
            println!();
            for (field, value) in &draft.fields {
                println!("  {:<18} {}", field_label(field), value.display());
            }
        }
    }

    if !draft.tags.is_empty() {
        println!();
        println!("{}: {}", "Tags".bold(), draft.tags.join(", "));
    }
    if !draft.custom_fields.is_empty() {
        println!();
        println!("{}", "Custom fields".bold());
        for (name, value) in &draft.custom_fields {
            println!("  {} {} = {}", "•".dimmed(), name, value);
        }
    }
    if !draft.errors.is_empty() {
        println!();
        print_field_errors(&draft.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_label() {
        assert_eq!(field_label("firstName"), "First name");
        assert_eq!(field_label("estimatedValue"), "Estimated value");
        assert_eq!(field_label("email"), "Email");
    }

    #[test]
    fn test_truncate_visual() {
        assert_eq!(truncate_visual("short", 10), "short");
        assert_eq!(truncate_visual("a much longer title", 8), "a much..");
        assert_eq!(truncate_visual("abcdef", 3), "...");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(950.0), "950");
        assert_eq!(format_amount(45_000.0), "45.0k");
        assert_eq!(format_amount(1_300_000.0), "1.3M");
    }
}
