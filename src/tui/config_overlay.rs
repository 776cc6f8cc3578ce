use crate::app::{AppState, Resource};
use crate::dialog::ActionSession;
use crate::tui::{centered_rect, spinner};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

fn overlay_area(area: Rect) -> Rect {
    // ~90% width, ~80% height
    let width = (area.width * 9 / 10).max(area.width.min(20));
    let height = (area.height * 8 / 10).max(6);
    centered_rect(area, width, height)
}

/// Number of config lines visible inside the overlay for a terminal of `area`.
pub fn visible_height(area: Rect) -> usize {
    overlay_area(area).height.saturating_sub(2) as usize
}

pub fn render(f: &mut Frame, state: &AppState) {
    let ActionSession::Config(view) = state.dialogs.session() else {
        return;
    };
    let area = overlay_area(f.area());
    f.render_widget(Clear, area);
    let inner_height = area.height.saturating_sub(2) as usize;

    let (lines, scroll_info, mode): (Vec<Line>, String, Option<&str>) =
        match state.run_config(&view.run_id) {
            Some(Resource::Ready(config)) => {
                let total = config.yaml.lines().count();
                let info = if total > inner_height {
                    format!(
                        " [{}-{}/{}] ",
                        view.scroll + 1,
                        (view.scroll + inner_height).min(total),
                        total
                    )
                } else {
                    String::new()
                };
                let lines = config
                    .yaml
                    .lines()
                    .skip(view.scroll)
                    .take(inner_height)
                    .map(|l| Line::from(Span::raw(l)))
                    .collect();
                (lines, info, config.mode.as_deref())
            }
            Some(Resource::Failed(e)) => (
                vec![Line::from(Span::styled(
                    format!("Failed to load config: {e}"),
                    Style::default().fg(Color::Red),
                ))],
                String::new(),
                None,
            ),
            Some(Resource::Loading) | None => (
                vec![Line::from(Span::styled(
                    format!("{} loading…", spinner::frame(state.spinner_frame)),
                    Style::default().fg(Color::Yellow),
                ))],
                String::new(),
                None,
            ),
        };

    let mut title = format!(" Run config {}", view.run_id.short());
    if let Some(mode) = mode {
        title.push_str(&format!(" · mode {mode}"));
    }
    title.push(' ');
    title.push_str(&scroll_info);

    let block = Block::default()
        .title(title)
        .title_bottom(Line::from(" j/k scroll | y copy | q close ").centered())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));

    f.render_widget(Paragraph::new(lines).block(block), area);
}
