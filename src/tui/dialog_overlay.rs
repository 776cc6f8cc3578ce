use crate::app::{AppState, RunId};
use crate::dialog::{
    ActionReport, ActionSession, DialogPhase, OutcomeStatus, SessionScope, TerminationPolicy,
};
use crate::tui::{centered_rect, spinner};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

/// Most failed runs listed before collapsing the rest into a count.
const MAX_FAILURE_LINES: usize = 8;

pub fn render(f: &mut Frame, state: &AppState) {
    let session = state.dialogs.session();
    let (Some(kind), Some(phase), Some(scope)) = (session.kind(), session.phase(), session.scope())
    else {
        return;
    };

    let mut lines = vec![Line::from("")];
    lines.push(Line::from(Span::styled(
        prompt(state, session, scope),
        Style::default().fg(Color::White),
    )));

    if let ActionSession::Terminate(d) = session {
        let policy = match d.policy {
            TerminationPolicy::SafeTerminate => "safe terminate",
            TerminationPolicy::MarkAsCanceledImmediately => "force: mark canceled immediately",
        };
        lines.push(Line::from(vec![
            Span::styled("policy: ", Style::default().fg(Color::DarkGray)),
            Span::styled(policy, Style::default().fg(Color::Yellow)),
        ]));
        let unsafe_count = d.targets.targets.values().filter(|ok| !**ok).count();
        if d.policy == TerminationPolicy::SafeTerminate && unsafe_count > 0 {
            lines.push(Line::from(Span::styled(
                format!("{unsafe_count} run(s) cannot be stopped safely and will be skipped"),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let (hints, border) = match phase {
        DialogPhase::Confirming => {
            let hints = if matches!(session, ActionSession::Terminate(_)) {
                confirm_hints(&[("y", "confirm"), ("f", "force"), ("n", "cancel")])
            } else {
                confirm_hints(&[("y", "confirm"), ("n", "cancel")])
            };
            (hints, Color::Yellow)
        }
        DialogPhase::Pending => {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("{} working…", spinner::frame(state.spinner_frame)),
                Style::default().fg(Color::Yellow),
            )));
            (confirm_hints(&[("n", "close")]), Color::Yellow)
        }
        DialogPhase::Failed(report) => {
            lines.push(Line::from(""));
            lines.extend(failure_lines(report));
            (
                confirm_hints(&[("y", "retry failed"), ("n", "close")]),
                Color::Red,
            )
        }
    };

    let area = f.area();
    let width = (area.width * 7 / 10).clamp(44.min(area.width), 90);
    let height = (lines.len() as u16 + 3).min(area.height);
    let overlay_area = centered_rect(area, width, height);
    f.render_widget(Clear, overlay_area);

    let block = Block::default()
        .title(format!(" {} ", kind.title()))
        .title_bottom(hints.centered())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(Color::Black));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, overlay_area);
}

fn describe_run(state: &AppState, id: &RunId) -> String {
    match state.run(id) {
        Some(run) => format!("run {} ({})", id.short(), run.job_name),
        None => format!("run {}", id.short()),
    }
}

fn prompt(state: &AppState, session: &ActionSession, scope: &SessionScope) -> String {
    let count = match session {
        ActionSession::Terminate(d) => d.targets.len(),
        ActionSession::Delete(d) => d.targets.len(),
        ActionSession::Reexecute(d) | ActionSession::ReexecuteFromFailure(d) => d.requests.len(),
        ActionSession::None | ActionSession::Config(_) => 0,
    };
    let subject = match scope {
        SessionScope::Single(id) => describe_run(state, id),
        SessionScope::Bulk if count == 1 => "1 run".to_string(),
        SessionScope::Bulk => format!("{count} runs"),
    };
    match session {
        ActionSession::Terminate(_) => format!("Terminate {subject}?"),
        ActionSession::Delete(_) => format!("Delete {subject}? This cannot be undone."),
        ActionSession::Reexecute(d) | ActionSession::ReexecuteFromFailure(d) => {
            format!("Re-execute {subject} ({})?", d.strategy.label())
        }
        ActionSession::None | ActionSession::Config(_) => String::new(),
    }
}

fn failure_lines(report: &ActionReport) -> Vec<Line<'static>> {
    let failed: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|o| match &o.status {
            OutcomeStatus::Failed(msg) => Some((o.run_id.short().to_string(), msg.clone())),
            OutcomeStatus::Succeeded { .. } => None,
        })
        .collect();

    let mut lines = vec![Line::from(Span::styled(
        format!(
            "{} of {} failed:",
            failed.len(),
            report.outcomes.len()
        ),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))];
    for (id, msg) in failed.iter().take(MAX_FAILURE_LINES) {
        lines.push(Line::from(vec![
            Span::styled(format!("✗ {id} "), Style::default().fg(Color::Red)),
            Span::styled(msg.clone(), Style::default().fg(Color::White)),
        ]));
    }
    if failed.len() > MAX_FAILURE_LINES {
        lines.push(Line::from(Span::styled(
            format!("… and {} more", failed.len() - MAX_FAILURE_LINES),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn confirm_hints(keys: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (key, desc) in keys {
        spans.push(Span::styled(
            *key,
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!(" {desc}  "),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}
