use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::Frame;

use super::centered_rect;

fn section(title: &str) -> Line<'_> {
    Line::from(Span::styled(
        format!("  {}", title),
        Style::default().fg(Color::Cyan).bold(),
    ))
}

pub fn render_help(frame: &mut Frame) {
    let area = centered_rect(60, 80, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Keyboard Shortcuts (press any key to close) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let help_text = vec![
        Line::from(""),
        section("Navigation"),
        Line::from("  ↑/k, ↓/j       Move up/down"),
        Line::from("  g/G            First/Last item"),
        Line::from("  Tab/Shift+Tab  Switch panels"),
        Line::from("  Enter / →      Open queue"),
        Line::from("  Esc / ←        Back to queues"),
        Line::from("  /              Filter the focused panel"),
        Line::from(""),
        section("Connection"),
        Line::from("  c              Connections (connect, add, edit, delete)"),
        Line::from("  r / F5         Refresh queues"),
        Line::from(""),
        section("Messages"),
        Line::from("  R (shift)      Reload messages of the open queue"),
        Line::from("  Enter          View message detail"),
        Line::from("  Space          Select/unselect message"),
        Line::from("  A (shift)      Select all visible messages"),
        Line::from("  u              Clear selection"),
        Line::from("  m              Move selected to another queue"),
        Line::from("  x / Del        Delete selected"),
        Line::from(Span::styled(
            "                 (without a selection: the highlighted message)",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        section("General"),
        Line::from("  L (shift)      Show log file"),
        Line::from("  ?              This help"),
        Line::from("  q / Ctrl+C     Quit"),
    ];

    let paragraph = Paragraph::new(help_text).block(block);
    frame.render_widget(paragraph, area);
}
