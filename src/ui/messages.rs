use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::Frame;

use crate::app::{App, FocusPanel};

use super::sanitize::sanitize_for_terminal;
use super::{panel_border, render_filter_line, split_filter};

pub fn render_messages(frame: &mut Frame, app: &mut App, area: Rect) {
    let is_focused = app.focus == FocusPanel::Messages;

    let total = app.browser.snapshot(&app.session).len();
    let shown = app.visible_messages().len();
    let selected = app.browser.selection().len();
    let title = match app.browser.queue() {
        Some(queue) => {
            let mut t = format!(" Messages: {} (", sanitize_for_terminal(queue, false));
            if shown == total {
                t.push_str(&total.to_string());
            } else {
                t.push_str(&format!("{}/{}", shown, total));
            }
            if selected > 0 {
                t.push_str(&format!(", {} selected", selected));
            }
            if app.browser.is_loading() {
                t.push_str(", loading...");
            }
            t.push_str(") ");
            t
        }
        None => " Messages ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(panel_border(is_focused));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let editing = is_focused && app.filter_editing;
    let query = app.browser.query().to_string();
    let (filter_area, rest) = split_filter(inner, editing || !query.is_empty());
    if let Some(filter_area) = filter_area {
        render_filter_line(frame, filter_area, &query, editing);
    }

    let visible = app.visible_messages();
    if visible.is_empty() {
        let text = if app.browser.queue().is_none() {
            "No queue open. Select a queue and press Enter to browse its messages."
        } else if app.browser.is_loading() {
            "Loading messages..."
        } else if total > 0 {
            "No message matches the filter."
        } else {
            "No messages."
        };
        frame.render_widget(
            Paragraph::new(text)
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true }),
            rest,
        );
        return;
    }

    let header = Row::new(vec!["", "Message ID", "Timestamp", "Type", "Pri", "Redel"])
        .style(Style::default().fg(Color::Yellow).bold())
        .bottom_margin(1);

    let rows: Vec<Row> = visible
        .iter()
        .enumerate()
        .map(|(idx, msg)| {
            let marked = app.browser.is_selected(&msg.id);
            let style = if idx == app.message_selected && is_focused {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else if marked {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };

            Row::new(vec![
                if marked { "[x]" } else { "[ ]" }.to_string(),
                sanitize_for_terminal(&msg.id, false),
                sanitize_for_terminal(&msg.timestamp_display(), false),
                sanitize_for_terminal(&msg.message_type, false),
                msg.priority
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                if msg.redelivered { "yes" } else { "no" }.to_string(),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Percentage(40),
            Constraint::Length(24),
            Constraint::Percentage(20),
            Constraint::Length(3),
            Constraint::Length(5),
        ],
    )
    .header(header)
    .column_spacing(1);

    // Layout: table + hint bar
    let msg_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(rest);

    let hint = Paragraph::new(
        "Space=Select  A=All  u=Clear  m=Move  x=Delete  Enter=View  R=Reload  /=Filter",
    )
    .style(Style::default().fg(Color::DarkGray));

    // Persist scroll offset across frames for natural scrolling
    app.message_table_state.select(Some(app.message_selected));
    frame.render_stateful_widget(table, msg_layout[0], &mut app.message_table_state);
    frame.render_widget(hint, msg_layout[1]);
}
