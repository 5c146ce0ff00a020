use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::Frame;

use crate::app::{ActiveModal, App};

use super::detail::render_message_detail;
use super::help::render_help;
use super::logs::render_logs;
use super::sanitize::sanitize_for_terminal;
use super::{centered_rect, centered_rect_abs_height};

const PASSWORD_LABEL: &str = "Password";

pub fn render_modal(frame: &mut Frame, app: &mut App) {
    match app.modal.clone() {
        ActiveModal::None => {}
        ActiveModal::ConnectionList => render_connection_list(frame, app),
        ActiveModal::ConnectionForm { editing } => {
            let title = match editing {
                Some(name) => format!("Edit Connection '{}'", sanitize_for_terminal(&name, false)),
                None => "New Connection".to_string(),
            };
            render_form_flat(frame, app, &title, "Enter/F2 save");
        }
        ActiveModal::MoveTarget { count } => render_move_target(frame, app, count),
        ActiveModal::ConfirmDelete { count } => {
            let queue = app.browser.queue().unwrap_or_default().to_string();
            render_confirm_bulk(
                frame,
                "Confirm Delete",
                &format!(
                    "Delete {} message(s) from '{}'?\nThis cannot be undone.",
                    count,
                    sanitize_for_terminal(&queue, false)
                ),
                Color::Red,
            );
        }
        ActiveModal::MessageDetail => render_message_detail(frame, app),
        ActiveModal::Logs => render_logs(frame, app),
        ActiveModal::Help => render_help(frame),
    }
}

// ────────── Connections ──────────

fn render_connection_list(frame: &mut Frame, app: &mut App) {
    let area = centered_rect(65, 50, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Connections (Enter=connect a=add e=edit d=delete *=default Esc=close) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.config.connections.is_empty() {
        frame.render_widget(
            Paragraph::new("No saved connections. Press 'a' to add one.")
                .style(Style::default().fg(Color::DarkGray)),
            inner,
        );
        return;
    }

    let active = app.session.active().map(|p| p.name.clone());
    let items: Vec<ListItem> = app
        .config
        .connections
        .iter()
        .map(|conn| {
            let marker = if conn.is_default { "* " } else { "  " };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(Color::Yellow)),
                Span::raw(sanitize_for_terminal(&conn.name, false)),
                Span::styled(
                    format!("  {}", sanitize_for_terminal(&conn.address(), false)),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if active.as_deref() == Some(conn.name.as_str()) {
                spans.push(Span::styled(" (connected)", Style::default().fg(Color::Green)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White).bold());
    app.connection_list_state.select(Some(app.connection_selected));
    frame.render_stateful_widget(list, inner, &mut app.connection_list_state);
}

fn render_form_flat(frame: &mut Frame, app: &App, title: &str, hint: &str) {
    let field_count = app.input_fields.len();
    // Each field needs 2 rows (label + value), plus hint line, block borders (2), layout margin (2)
    let rows_needed = (field_count as u16) * 2 + 1 + 2 + 2;
    let area = centered_rect_abs_height(70, rows_needed, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut constraints: Vec<Constraint> = app
        .input_fields
        .iter()
        .flat_map(|_| [Constraint::Length(1), Constraint::Length(1)])
        .collect();
    constraints.push(Constraint::Length(1)); // hint line
    constraints.push(Constraint::Min(0));

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(inner);

    for (idx, (label, value)) in app.input_fields.iter().enumerate() {
        let label_idx = idx * 2;
        let value_idx = idx * 2 + 1;
        if value_idx >= layout.len() {
            break;
        }

        let is_active = idx == app.input_field_index;
        let label_style = if is_active {
            Style::default().fg(Color::Cyan).bold()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        frame.render_widget(
            Paragraph::new(format!("{}:", label)).style(label_style),
            layout[label_idx],
        );

        let value_style = if is_active {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::Gray)
        };
        let display_val = form_value(
            value,
            label == PASSWORD_LABEL,
            is_active.then_some(app.form_cursor),
        );
        frame.render_widget(
            Paragraph::new(display_val).style(value_style),
            layout[value_idx],
        );
    }

    let hint_idx = field_count * 2;
    if hint_idx < layout.len() {
        frame.render_widget(
            Paragraph::new(format!(
                "Tab/↑↓ navigate · ←→/Home/End cursor · {} · Esc cancel",
                hint
            ))
            .style(Style::default().fg(Color::DarkGray)),
            layout[hint_idx],
        );
    }
}

/// Form field text with an optional cursor marker at a byte offset.
fn form_value(value: &str, secret: bool, cursor: Option<usize>) -> String {
    let shown = |s: &str| {
        if secret {
            "*".repeat(s.chars().count())
        } else {
            sanitize_for_terminal(s, false)
        }
    };
    match cursor {
        Some(cursor) => {
            let mut cursor = cursor.min(value.len());
            while !value.is_char_boundary(cursor) {
                cursor -= 1;
            }
            let (before, after) = value.split_at(cursor);
            format!("{}▏{}", shown(before), shown(after))
        }
        None => shown(value),
    }
}

// ────────── Move / Delete ──────────

fn render_move_target(frame: &mut Frame, app: &App, count: usize) {
    let list_rows = app.move_suggestions.len().max(1) as u16;
    // input (3) + suggestions + hint + borders
    let area = centered_rect_abs_height(60, 3 + list_rows + 2 + 1 + 2, frame.area());
    frame.render_widget(Clear, area);

    let source = app.browser.queue().unwrap_or_default();
    let block = Block::default()
        .title(format!(
            " Move {} message(s) from '{}' ",
            count,
            sanitize_for_terminal(source, false)
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let input = Paragraph::new(format!(
        "{}▏",
        sanitize_for_terminal(&app.input_buffer, false)
    ))
    .block(
        Block::default()
            .title(" Target queue ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(input, layout[0]);

    if app.move_suggestions.is_empty() {
        frame.render_widget(
            Paragraph::new("No matching queue; Enter moves to the typed name.")
                .style(Style::default().fg(Color::DarkGray)),
            layout[1],
        );
    } else {
        let items: Vec<ListItem> = app
            .move_suggestions
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let style = if Some(idx) == app.suggestion_index {
                    Style::default().bg(Color::DarkGray).fg(Color::White).bold()
                } else {
                    Style::default()
                };
                ListItem::new(Span::styled(
                    format!("  {}", sanitize_for_terminal(name, false)),
                    style,
                ))
            })
            .collect();
        frame.render_widget(List::new(items), layout[1]);
    }

    frame.render_widget(
        Paragraph::new("↑↓ pick, Tab complete, Enter move, Esc cancel")
            .style(Style::default().fg(Color::DarkGray)),
        layout[2],
    );
}

fn render_confirm_bulk(frame: &mut Frame, title: &str, message: &str, color: Color) {
    let area = centered_rect(55, 25, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![Line::from("")];
    for line in message.lines() {
        lines.push(Line::from(Span::styled(
            line.to_string(),
            Style::default().fg(color).bold(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press 'y' to confirm, 'n' or Esc to cancel",
        Style::default().fg(Color::DarkGray),
    )));

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}
