use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

use crate::app::{ActiveModal, App, FocusPanel};

/// Poll for input events and process them against app state.
/// Returns true if the app should continue running.
pub fn handle_events(app: &mut App) -> anyhow::Result<bool> {
    if event::poll(Duration::from_millis(100))? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                handle_key(app, key);
            }
        }
    }
    Ok(app.running)
}

pub fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
        app.running = false;
        return;
    }

    // If a modal is open, route to modal handler
    if app.modal != ActiveModal::None {
        handle_modal_input(app, key);
        return;
    }

    if app.filter_editing {
        handle_filter_input(app, key);
        return;
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') if key.modifiers.is_empty() => {
            app.running = false;
            return;
        }
        KeyCode::Char('?') => {
            app.modal = ActiveModal::Help;
            return;
        }
        KeyCode::Char('c') if key.modifiers.is_empty() => {
            app.open_connection_list();
            return;
        }
        KeyCode::Char('L') => {
            app.open_logs();
            return;
        }
        KeyCode::Char('r') | KeyCode::F(5) => {
            app.request(crate::app::Action::RefreshQueues);
            return;
        }
        KeyCode::Char('R') => {
            app.reload_messages();
            return;
        }
        KeyCode::Char('/') => {
            app.filter_editing = true;
            return;
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.focus = match app.focus {
                FocusPanel::Queues => FocusPanel::Messages,
                FocusPanel::Messages => FocusPanel::Queues,
            };
            return;
        }
        _ => {}
    }

    // Panel-specific keys
    match app.focus {
        FocusPanel::Queues => handle_queue_input(app, key),
        FocusPanel::Messages => handle_message_input(app, key),
    }
}

fn handle_queue_input(app: &mut App, key: KeyEvent) {
    let len = app.visible_queues().len();
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.queue_selected = app.queue_selected.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.queue_selected + 1 < len {
                app.queue_selected += 1;
            }
        }
        KeyCode::Home | KeyCode::Char('g') => app.queue_selected = 0,
        KeyCode::End | KeyCode::Char('G') => app.queue_selected = len.saturating_sub(1),
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => app.open_selected_queue(),
        _ => {}
    }
}

fn handle_message_input(app: &mut App, key: KeyEvent) {
    let len = app.visible_messages().len();
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.message_selected = app.message_selected.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.message_selected + 1 < len {
                app.message_selected += 1;
            }
        }
        KeyCode::Home | KeyCode::Char('g') => app.message_selected = 0,
        KeyCode::End | KeyCode::Char('G') => app.message_selected = len.saturating_sub(1),
        KeyCode::Enter => {
            if app.current_message().is_some() {
                app.detail_scroll = 0;
                app.modal = ActiveModal::MessageDetail;
            }
        }
        KeyCode::Char(' ') => {
            app.toggle_current();
            if app.message_selected + 1 < len {
                app.message_selected += 1;
            }
        }
        KeyCode::Char('A') => app.select_all_visible(),
        KeyCode::Char('u') => app.clear_selection(),
        KeyCode::Char('m') => app.open_move_modal(),
        KeyCode::Char('x') | KeyCode::Delete => app.open_confirm_delete(),
        KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => app.focus = FocusPanel::Queues,
        _ => {}
    }
}

/// Live-edit the filter of the focused panel.
fn handle_filter_input(app: &mut App, key: KeyEvent) {
    let mut query = match app.focus {
        FocusPanel::Queues => app.queue_filter.clone(),
        FocusPanel::Messages => app.browser.query().to_string(),
    };
    match key.code {
        KeyCode::Enter => {
            app.filter_editing = false;
            return;
        }
        KeyCode::Esc => {
            app.filter_editing = false;
            query.clear();
        }
        KeyCode::Backspace => {
            query.pop();
        }
        KeyCode::Char(c) => query.push(c),
        _ => return,
    }
    match app.focus {
        FocusPanel::Queues => {
            app.queue_filter = query;
            app.queue_selected = 0;
        }
        FocusPanel::Messages => {
            app.browser.set_query(query);
            app.message_selected = 0;
        }
    }
    app.clamp_cursors();
}

fn handle_modal_input(app: &mut App, key: KeyEvent) {
    match app.modal.clone() {
        ActiveModal::Help => app.modal = ActiveModal::None,
        ActiveModal::ConnectionList => handle_connection_list_input(app, key),
        ActiveModal::ConnectionForm { .. } => handle_form_input(app, key),
        ActiveModal::MoveTarget { .. } => handle_move_input(app, key),
        ActiveModal::ConfirmDelete { .. } => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.modal = ActiveModal::None;
            }
            _ => {}
        },
        ActiveModal::MessageDetail => match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => app.modal = ActiveModal::None,
            KeyCode::Up | KeyCode::Char('k') => {
                app.detail_scroll = app.detail_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.detail_scroll = app.detail_scroll.saturating_add(1);
            }
            KeyCode::PageUp => app.detail_scroll = app.detail_scroll.saturating_sub(10),
            KeyCode::PageDown => app.detail_scroll = app.detail_scroll.saturating_add(10),
            _ => {}
        },
        ActiveModal::Logs => match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('L') => app.modal = ActiveModal::None,
            KeyCode::Char('r') => app.open_logs(),
            KeyCode::Up | KeyCode::Char('k') => app.log_scroll = app.log_scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => app.log_scroll = app.log_scroll.saturating_add(1),
            KeyCode::PageUp => app.log_scroll = app.log_scroll.saturating_sub(20),
            KeyCode::PageDown => app.log_scroll = app.log_scroll.saturating_add(20),
            KeyCode::Home | KeyCode::Char('g') => app.log_scroll = 0,
            KeyCode::End | KeyCode::Char('G') => app.log_scroll = usize::MAX,
            _ => {}
        },
        ActiveModal::None => {}
    }
}

fn handle_connection_list_input(app: &mut App, key: KeyEvent) {
    let len = app.config.connections.len();
    match key.code {
        KeyCode::Esc => {
            app.modal = ActiveModal::None;
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.connection_selected = app.connection_selected.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.connection_selected + 1 < len {
                app.connection_selected += 1;
            }
        }
        KeyCode::Enter => {
            if let Some(name) = app.selected_connection_name() {
                app.switch_connection(&name);
            }
        }
        KeyCode::Char('a') | KeyCode::Char('n') => app.open_connection_form(None),
        KeyCode::Char('e') => {
            if let Some(name) = app.selected_connection_name() {
                app.open_connection_form(Some(name));
            }
        }
        KeyCode::Char('d') => app.delete_selected_connection(),
        KeyCode::Char('*') => app.set_selected_default(),
        _ => {}
    }
}

fn handle_form_input(app: &mut App, key: KeyEvent) {
    let field_count = app.input_fields.len();
    if field_count == 0 {
        app.modal = ActiveModal::ConnectionList;
        return;
    }
    match key.code {
        KeyCode::Esc => {
            app.modal = ActiveModal::ConnectionList;
        }
        KeyCode::Enter | KeyCode::F(2) => app.submit_connection_form(),
        KeyCode::Tab | KeyCode::Down => {
            app.input_field_index = (app.input_field_index + 1) % field_count;
            app.form_cursor = app.input_fields[app.input_field_index].1.len();
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.input_field_index = (app.input_field_index + field_count - 1) % field_count;
            app.form_cursor = app.input_fields[app.input_field_index].1.len();
        }
        KeyCode::Left => {
            let value = &app.input_fields[app.input_field_index].1;
            app.form_cursor = prev_boundary(value, app.form_cursor);
        }
        KeyCode::Right => {
            let value = &app.input_fields[app.input_field_index].1;
            app.form_cursor = next_boundary(value, app.form_cursor);
        }
        KeyCode::Home => app.form_cursor = 0,
        KeyCode::End => app.form_cursor = app.input_fields[app.input_field_index].1.len(),
        KeyCode::Backspace => {
            let cursor = app.form_cursor;
            let value = &mut app.input_fields[app.input_field_index].1;
            if cursor > 0 {
                let start = prev_boundary(value, cursor);
                value.replace_range(start..cursor, "");
                app.form_cursor = start;
            }
        }
        KeyCode::Delete => {
            let cursor = app.form_cursor;
            let value = &mut app.input_fields[app.input_field_index].1;
            if cursor < value.len() {
                let end = next_boundary(value, cursor);
                value.replace_range(cursor..end, "");
            }
        }
        KeyCode::Char(c) => {
            let value = &mut app.input_fields[app.input_field_index].1;
            let cursor = app.form_cursor.min(value.len());
            value.insert(cursor, c);
            app.form_cursor = cursor + c.len_utf8();
        }
        _ => {}
    }
}

fn handle_move_input(app: &mut App, key: KeyEvent) {
    let len = app.move_suggestions.len();
    match key.code {
        KeyCode::Esc => {
            app.modal = ActiveModal::None;
        }
        KeyCode::Enter => app.confirm_move(),
        KeyCode::Down => {
            if len > 0 {
                app.suggestion_index = Some(match app.suggestion_index {
                    Some(i) if i + 1 < len => i + 1,
                    Some(i) => i,
                    None => 0,
                });
            }
        }
        KeyCode::Up => {
            app.suggestion_index = match app.suggestion_index {
                Some(0) | None => None,
                Some(i) => Some(i - 1),
            };
        }
        KeyCode::Tab => {
            let pick = app.suggestion_index.unwrap_or(0);
            if let Some(name) = app.move_suggestions.get(pick).cloned() {
                app.input_buffer = name;
                app.update_suggestions();
            }
        }
        KeyCode::Backspace => {
            app.input_buffer.pop();
            app.update_suggestions();
        }
        KeyCode::Char(c) => {
            app.input_buffer.push(c);
            app.update_suggestions();
        }
        _ => {}
    }
}

fn prev_boundary(s: &str, cursor: usize) -> usize {
    s[..cursor.min(s.len())]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn next_boundary(s: &str, cursor: usize) -> usize {
    s[cursor.min(s.len())..]
        .chars()
        .next()
        .map(|c| cursor + c.len_utf8())
        .unwrap_or(s.len())
}
