use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{AppState, MenuState};
use crate::dialog::{ActionSession, DialogPhase};

fn hints(state: &AppState, narrow: bool) -> &'static [(&'static str, &'static str)] {
    match state.dialogs.session() {
        ActionSession::Config(_) => return &[("j/k", "scroll"), ("y", "copy"), ("q", "close")],
        ActionSession::Terminate(d) if d.phase != DialogPhase::Pending => {
            return &[("y", "confirm"), ("f", "force"), ("n", "cancel")];
        }
        ActionSession::None => {}
        _ if state.dialogs.is_pending() => return &[("n", "close")],
        _ => return &[("y", "confirm"), ("n", "cancel")],
    }
    match state.menu {
        MenuState::Run(_) => {
            return &[
                ("t", "terminate"),
                ("d", "delete"),
                ("R", "re-execute"),
                ("F", "from failure"),
                ("c", "config"),
                ("q", "close"),
            ];
        }
        MenuState::Bulk => {
            return &[
                ("t", "terminate"),
                ("d", "delete"),
                ("R", "re-execute"),
                ("F", "from failure"),
                ("q", "close"),
            ];
        }
        MenuState::Closed => {}
    }
    if narrow {
        &[
            ("j/k", "nav"),
            ("spc", "sel"),
            ("m", "menu"),
            ("b", "bulk"),
            ("r", "refresh"),
            ("q", "quit"),
        ]
    } else {
        &[
            ("↑↓/jk", "navigate"),
            ("space", "select"),
            ("a", "all"),
            ("x", "clear"),
            ("Enter/m", "actions"),
            ("b", "bulk actions"),
            ("r", "refresh"),
            ("q", "quit"),
        ]
    }
}

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let narrow = area.width < crate::app::NARROW_WIDTH_THRESHOLD;

    let line = if let Some(notif) = state.notifications.last() {
        Line::from(vec![
            Span::styled("★ ", Style::default().fg(Color::Yellow)),
            Span::styled(&notif.message, Style::default().fg(Color::Yellow)),
        ])
    } else {
        let mut spans: Vec<Span> = Vec::new();
        for (i, (key, desc)) in hints(state, narrow).iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(*key, Style::default().fg(Color::Cyan)));
            spans.push(Span::styled(
                format!(" {desc}"),
                Style::default().fg(Color::DarkGray),
            ));
        }
        Line::from(spans)
    };

    let footer = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(footer, area);
}
