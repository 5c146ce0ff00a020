use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::Frame;

use crate::app::App;
use crate::client::models::QueueMessage;

use super::centered_rect;
use super::sanitize::sanitize_for_terminal;

/// Full view of the highlighted message: headers, properties and body.
pub fn render_message_detail(frame: &mut Frame, app: &App) {
    let Some(msg) = app.current_message() else {
        return;
    };

    let area = centered_rect(85, 85, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Message (j/k scroll, Esc close) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = property_rows(msg);
    let props_height = (rows.len() as u16 + 2).min(inner.height / 2).max(4);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(props_height), Constraint::Min(3)])
        .split(inner);

    let props_table = Table::new(rows, [Constraint::Length(20), Constraint::Min(20)])
        .block(
            Block::default()
                .title(" Properties ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .column_spacing(1);
    frame.render_widget(props_table, layout[0]);

    let body = Paragraph::new(sanitize_for_terminal(&pretty_print_body(&msg.body), true))
        .block(
            Block::default()
                .title(" Body ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));
    frame.render_widget(body, layout[1]);
}

fn property_rows(msg: &QueueMessage) -> Vec<Row<'static>> {
    let mut rows = vec![
        make_row("Message ID", &msg.id),
        make_row("Timestamp", &msg.timestamp_display()),
        make_row("Type", &msg.message_type),
        make_row(
            "Priority",
            &msg.priority.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
        ),
        make_row("Redelivered", if msg.redelivered { "yes" } else { "no" }),
    ];
    for (k, v) in &msg.properties {
        rows.push(make_row(k, v));
    }
    rows
}

fn make_row(label: &str, value: &str) -> Row<'static> {
    Row::new(vec![
        Cell::from(sanitize_for_terminal(label, false)).style(Style::default().fg(Color::Cyan)),
        Cell::from(sanitize_for_terminal(value, false)),
    ])
}

/// JSON bodies are shown indented; anything else as-is.
pub fn pretty_print_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(val) => serde_json::to_string_pretty(&val).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}
