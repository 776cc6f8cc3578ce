use crate::app::{format_duration, truncate, AppState, Run, RunStatus};
use crate::tui::spinner;
use chrono::Utc;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let narrow = area.width < crate::app::NARROW_WIDTH_THRESHOLD;
    let inner_width = area.width as usize;

    if state.runs.is_empty() {
        let msg = if state.is_loading() || state.last_poll.is_none() {
            format!("{} Loading runs…", spinner::frame(state.spinner_frame))
        } else if let Some(job) = &state.config.job_filter {
            format!("No runs for job {job}")
        } else {
            "No runs found".to_string()
        };
        let para = Paragraph::new(msg)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::NONE));
        f.render_widget(para, area);
        return;
    }

    let visible_height = area.height as usize;
    let scroll_offset = if state.cursor >= visible_height {
        state.cursor - visible_height + 1
    } else {
        0
    };

    let lines: Vec<Line> = state
        .runs
        .iter()
        .enumerate()
        .skip(scroll_offset)
        .take(visible_height)
        .map(|(i, run)| {
            render_run_line(
                run,
                i == state.cursor,
                state.selection.contains(&run.run_id),
                narrow,
                inner_width,
            )
        })
        .collect();

    let list = Paragraph::new(lines).block(Block::default().borders(Borders::NONE));
    f.render_widget(list, area);
}

pub fn status_icon(status: RunStatus) -> (&'static str, Color) {
    match status {
        RunStatus::Success => ("✓", Color::Green),
        RunStatus::Failure => ("✗", Color::Red),
        RunStatus::Canceled => ("⊘", Color::Yellow),
        RunStatus::Canceling => ("⊘", Color::Magenta),
        RunStatus::Started | RunStatus::Starting => ("⟳", Color::Yellow),
        RunStatus::Queued | RunStatus::NotStarted | RunStatus::Managed => ("·", Color::Cyan),
        RunStatus::Unknown => ("?", Color::DarkGray),
    }
}

pub fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Queued => "queued",
        RunStatus::NotStarted => "not started",
        RunStatus::Managed => "managed",
        RunStatus::Starting => "starting",
        RunStatus::Started => "started",
        RunStatus::Success => "success",
        RunStatus::Failure => "failure",
        RunStatus::Canceling => "canceling",
        RunStatus::Canceled => "canceled",
        RunStatus::Unknown => "unknown",
    }
}

fn render_run_line(
    run: &Run,
    is_cursor: bool,
    is_selected: bool,
    narrow: bool,
    max_width: usize,
) -> Line<'static> {
    let (icon, icon_color) = status_icon(run.status);
    let marker = if is_selected { "[x]" } else { "[ ]" };
    let short_id = run.run_id.short().to_string();
    let label = status_label(run.status);
    let age = format_duration(
        Utc::now()
            .signed_duration_since(run.created_at)
            .num_seconds(),
    );

    // marker, icon, id and separators
    let prefix_width = marker.len() + 3 + short_id.len() + 1;
    let suffix_width = if narrow {
        0
    } else {
        label.len() + age.len() + 3
    };
    let name_max = max_width.saturating_sub(prefix_width + suffix_width);
    let name = truncate(&run.job_name, name_max);

    let cursor_style = if is_cursor {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };
    let marker_style = if is_selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let mut spans = vec![
        Span::styled(marker, marker_style),
        Span::styled(format!(" {icon} "), Style::default().fg(icon_color)),
        Span::styled(format!("{short_id} "), Style::default().fg(Color::DarkGray)),
        Span::styled(name, cursor_style),
    ];

    if !narrow {
        spans.push(Span::styled(
            format!(" {label}"),
            Style::default().fg(icon_color),
        ));
        spans.push(Span::styled(
            format!(" {age}"),
            Style::default().fg(Color::DarkGray),
        ));
    }

    Line::from(spans)
}
