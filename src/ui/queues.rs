use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::Frame;

use crate::advisor;
use crate::app::{App, FocusPanel};

use super::sanitize::sanitize_for_terminal;
use super::{panel_border, render_filter_line, split_filter};

pub fn render_queues(frame: &mut Frame, app: &mut App, area: Rect) {
    let is_focused = app.focus == FocusPanel::Queues;
    let refreshing = app.directory.is_refreshing(&app.session);
    let total = app.directory.snapshot(&app.session).len();

    let title = if refreshing {
        format!(" Queues ({}) refreshing... ", total)
    } else {
        format!(" Queues ({}) ", total)
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(panel_border(is_focused));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let editing = is_focused && app.filter_editing;
    let (filter_area, table_area) = split_filter(inner, editing || !app.queue_filter.is_empty());
    if let Some(filter_area) = filter_area {
        render_filter_line(frame, filter_area, &app.queue_filter, editing);
    }

    let visible = app.visible_queues();
    if visible.is_empty() {
        let text = if app.session.active().is_none() {
            "No connection. Press 'c' to connect."
        } else if refreshing {
            "Loading queues..."
        } else if total > 0 {
            "No queue matches the filter."
        } else {
            "No queues. Press 'r' to refresh."
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
            table_area,
        );
        return;
    }

    let open_queue = app.browser.queue().map(str::to_string);
    let header = Row::new(vec!["Name", "Pending", "Cons", "Enq", "Deq"])
        .style(Style::default().fg(Color::Yellow).bold())
        .bottom_margin(1);

    let rows: Vec<Row> = visible
        .iter()
        .enumerate()
        .map(|(idx, q)| {
            let style = if idx == app.queue_selected && is_focused {
                Style::default().bg(Color::DarkGray).fg(Color::White).bold()
            } else if idx == app.queue_selected {
                Style::default().fg(Color::Yellow)
            } else if advisor::original_queue(&q.name).is_some() && q.pending_count > 0 {
                Style::default().fg(Color::Red)
            } else if open_queue.as_deref() == Some(q.name.as_str()) {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            Row::new(vec![
                sanitize_for_terminal(&q.name, false),
                q.pending_count.to_string(),
                q.consumer_count.to_string(),
                q.enqueued_count.to_string(),
                q.dequeued_count.to_string(),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(12),
            Constraint::Length(8),
            Constraint::Length(5),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .column_spacing(1);

    // Persist scroll offset across frames for natural scrolling
    app.queue_table_state.select(Some(app.queue_selected));
    frame.render_stateful_widget(table, table_area, &mut app.queue_table_state);
}
