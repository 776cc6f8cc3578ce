use crate::dialog::ActionKind;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    DismissError,
    MoveUp,
    MoveDown,
    ToggleSelect,
    SelectAll,
    ClearSelection,
    OpenRunMenu,
    OpenBulkMenu,
    Refresh,
    /// Activate a menu item.
    Activate(ActionKind),
    CloseMenu,
    Confirm,
    ToggleForce,
    CloseDialog,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    ScrollToTop,
    ScrollToBottom,
    CopyToClipboard,
    None,
}

/// Which overlay (if any) is currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayMode {
    #[default]
    None,
    RunMenu,
    BulkMenu,
    Dialog,
    Config,
}

/// Captures the UI state needed to interpret a key press.
#[derive(Debug, Clone, Default)]
pub struct InputContext {
    pub has_error: bool,
    pub is_loading: bool,
    pub has_selection: bool,
    pub overlay: OverlayMode,
}

pub fn map_key(key: KeyEvent, ctx: &InputContext) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }

    // Ctrl+C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    match ctx.overlay {
        OverlayMode::RunMenu | OverlayMode::BulkMenu => {
            let bulk = ctx.overlay == OverlayMode::BulkMenu;
            match key.code {
                KeyCode::Char('t') => Action::Activate(ActionKind::Terminate),
                KeyCode::Char('d') => Action::Activate(ActionKind::Delete),
                KeyCode::Char('R') => Action::Activate(ActionKind::Reexecute),
                KeyCode::Char('F') => Action::Activate(ActionKind::ReexecuteFromFailure),
                KeyCode::Char('c') if !bulk => Action::Activate(ActionKind::Config),
                KeyCode::Char('q') | KeyCode::Esc => Action::CloseMenu,
                _ => Action::None,
            }
        }
        OverlayMode::Dialog => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Action::Confirm,
            KeyCode::Char('f') => Action::ToggleForce,
            KeyCode::Char('n' | 'q') | KeyCode::Esc => Action::CloseDialog,
            _ => Action::None,
        },
        OverlayMode::Config => match key.code {
            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::PageDown => Action::PageDown,
            KeyCode::PageUp => Action::PageUp,
            KeyCode::Char('g') => Action::ScrollToTop,
            KeyCode::Char('G') => Action::ScrollToBottom,
            KeyCode::Char('y') => Action::CopyToClipboard,
            KeyCode::Char('q') | KeyCode::Esc => Action::CloseDialog,
            _ => Action::None,
        },
        OverlayMode::None => match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Esc => {
                if ctx.has_error {
                    Action::DismissError
                } else {
                    Action::Quit
                }
            }
            KeyCode::Up | KeyCode::Char('k') => Action::MoveUp,
            KeyCode::Down | KeyCode::Char('j') => Action::MoveDown,
            KeyCode::Char(' ') => Action::ToggleSelect,
            KeyCode::Char('a') => Action::SelectAll,
            KeyCode::Char('x') => Action::ClearSelection,
            KeyCode::Enter | KeyCode::Char('m') => Action::OpenRunMenu,
            KeyCode::Char('b') if ctx.has_selection => Action::OpenBulkMenu,
            KeyCode::Char('r') if !ctx.is_loading => Action::Refresh,
            _ => Action::None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn release(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        }
    }

    fn ctx() -> InputContext {
        InputContext::default()
    }

    fn ctx_with(overlay: OverlayMode) -> InputContext {
        InputContext {
            overlay,
            ..Default::default()
        }
    }

    #[test]
    fn quit_on_q() {
        assert_eq!(map_key(press(KeyCode::Char('q')), &ctx()), Action::Quit);
    }

    #[test]
    fn esc_dismisses_error_when_present() {
        let ctx = InputContext {
            has_error: true,
            ..Default::default()
        };
        assert_eq!(map_key(press(KeyCode::Esc), &ctx), Action::DismissError);
        assert_eq!(map_key(press(KeyCode::Esc), &InputContext::default()), Action::Quit);
    }

    #[test]
    fn ctrl_c_quits_everywhere() {
        let key = KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        };
        for overlay in [
            OverlayMode::None,
            OverlayMode::RunMenu,
            OverlayMode::Dialog,
            OverlayMode::Config,
        ] {
            assert_eq!(map_key(key, &ctx_with(overlay)), Action::Quit);
        }
    }

    #[test]
    fn list_navigation_and_selection() {
        assert_eq!(map_key(press(KeyCode::Char('j')), &ctx()), Action::MoveDown);
        assert_eq!(map_key(press(KeyCode::Up), &ctx()), Action::MoveUp);
        assert_eq!(map_key(press(KeyCode::Char(' ')), &ctx()), Action::ToggleSelect);
        assert_eq!(map_key(press(KeyCode::Char('a')), &ctx()), Action::SelectAll);
        assert_eq!(map_key(press(KeyCode::Char('x')), &ctx()), Action::ClearSelection);
    }

    #[test]
    fn enter_and_m_open_run_menu() {
        assert_eq!(map_key(press(KeyCode::Enter), &ctx()), Action::OpenRunMenu);
        assert_eq!(map_key(press(KeyCode::Char('m')), &ctx()), Action::OpenRunMenu);
    }

    #[test]
    fn bulk_menu_needs_selection() {
        assert_eq!(map_key(press(KeyCode::Char('b')), &ctx()), Action::None);
        let ctx = InputContext {
            has_selection: true,
            ..Default::default()
        };
        assert_eq!(map_key(press(KeyCode::Char('b')), &ctx), Action::OpenBulkMenu);
    }

    #[test]
    fn refresh_blocked_while_loading() {
        assert_eq!(map_key(press(KeyCode::Char('r')), &ctx()), Action::Refresh);
        let ctx = InputContext {
            is_loading: true,
            ..Default::default()
        };
        assert_eq!(map_key(press(KeyCode::Char('r')), &ctx), Action::None);
    }

    #[test]
    fn run_menu_keys() {
        let ctx = ctx_with(OverlayMode::RunMenu);
        assert_eq!(
            map_key(press(KeyCode::Char('t')), &ctx),
            Action::Activate(ActionKind::Terminate)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('d')), &ctx),
            Action::Activate(ActionKind::Delete)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('R')), &ctx),
            Action::Activate(ActionKind::Reexecute)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('F')), &ctx),
            Action::Activate(ActionKind::ReexecuteFromFailure)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('c')), &ctx),
            Action::Activate(ActionKind::Config)
        );
        assert_eq!(map_key(press(KeyCode::Esc), &ctx), Action::CloseMenu);
    }

    #[test]
    fn bulk_menu_has_no_config() {
        let ctx = ctx_with(OverlayMode::BulkMenu);
        assert_eq!(map_key(press(KeyCode::Char('c')), &ctx), Action::None);
        assert_eq!(
            map_key(press(KeyCode::Char('t')), &ctx),
            Action::Activate(ActionKind::Terminate)
        );
    }

    #[test]
    fn menu_swallows_list_keys() {
        let ctx = ctx_with(OverlayMode::RunMenu);
        assert_eq!(map_key(press(KeyCode::Char('j')), &ctx), Action::None);
        assert_eq!(map_key(press(KeyCode::Char('q')), &ctx), Action::CloseMenu);
    }

    #[test]
    fn dialog_keys() {
        let ctx = ctx_with(OverlayMode::Dialog);
        assert_eq!(map_key(press(KeyCode::Char('y')), &ctx), Action::Confirm);
        assert_eq!(map_key(press(KeyCode::Char('f')), &ctx), Action::ToggleForce);
        assert_eq!(map_key(press(KeyCode::Char('n')), &ctx), Action::CloseDialog);
        assert_eq!(map_key(press(KeyCode::Esc), &ctx), Action::CloseDialog);
        assert_eq!(map_key(press(KeyCode::Char('d')), &ctx), Action::None);
    }

    #[test]
    fn config_view_keys() {
        let ctx = ctx_with(OverlayMode::Config);
        assert_eq!(map_key(press(KeyCode::Char('j')), &ctx), Action::ScrollDown);
        assert_eq!(map_key(press(KeyCode::Char('k')), &ctx), Action::ScrollUp);
        assert_eq!(map_key(press(KeyCode::Char('G')), &ctx), Action::ScrollToBottom);
        assert_eq!(map_key(press(KeyCode::Char('y')), &ctx), Action::CopyToClipboard);
        assert_eq!(map_key(press(KeyCode::Char('q')), &ctx), Action::CloseDialog);
    }

    #[test]
    fn non_press_event_filtered() {
        assert_eq!(map_key(release(KeyCode::Char('q')), &ctx()), Action::None);
    }
}
