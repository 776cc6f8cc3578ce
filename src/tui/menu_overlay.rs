use crate::app::{AppState, MenuEntry, MenuState, Resource};
use crate::tui::{centered_rect, spinner};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

pub fn render(f: &mut Frame, state: &AppState) {
    let (title, status, entries) = match &state.menu {
        MenuState::Closed => return,
        MenuState::Run(id) => {
            let Some(run) = state.run(id) else {
                return;
            };
            let status = match state.run_config(id) {
                Some(Resource::Loading) | None => Line::from(Span::styled(
                    format!("{} loading run config…", spinner::frame(state.spinner_frame)),
                    Style::default().fg(Color::Yellow),
                )),
                Some(Resource::Failed(e)) => Line::from(Span::styled(
                    format!("config unavailable: {e}"),
                    Style::default().fg(Color::Red),
                )),
                Some(Resource::Ready(_)) => Line::from(Span::styled(
                    "config loaded",
                    Style::default().fg(Color::DarkGray),
                )),
            };
            (
                format!(" {} · {} ", run.run_id.short(), run.job_name),
                status,
                state.run_menu_entries(run),
            )
        }
        MenuState::Bulk => (
            format!(" {} selected runs ", state.selection.len()),
            Line::from(""),
            state.bulk_menu_entries(),
        ),
    };

    let mut lines = vec![status, Line::from("")];
    if entries.is_empty() {
        lines.push(Line::from(Span::styled(
            " no action applies to the selected runs",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.extend(entries.iter().map(entry_line));

    let area = f.area();
    let width = (area.width * 7 / 10).clamp(40.min(area.width), 80);
    let height = (lines.len() as u16 + 2).min(area.height);
    let overlay_area = centered_rect(area, width, height);
    f.render_widget(Clear, overlay_area);

    let block = Block::default()
        .title(title)
        .title_bottom(Line::from(" q close ").centered())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .style(Style::default().bg(Color::Black));

    f.render_widget(Paragraph::new(lines).block(block), overlay_area);
}

fn entry_line(entry: &MenuEntry) -> Line<'static> {
    match &entry.disabled {
        None => Line::from(vec![
            Span::styled(
                format!(" {:<2}", entry.key),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(entry.label.clone(), Style::default().fg(Color::White)),
        ]),
        Some(reason) => Line::from(vec![
            Span::styled(
                format!(" {:<2}", entry.key),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(entry.label.clone(), Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("  ({reason})"),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ),
        ]),
    }
}
