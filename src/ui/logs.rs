use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::Frame;

use crate::app::App;

use super::centered_rect;
use super::sanitize::sanitize_for_terminal;

/// Tail of the log file. `app.log_scroll` is clamped here since only the
/// frame knows how many lines fit.
pub fn render_logs(frame: &mut Frame, app: &mut App) {
    let area = centered_rect(90, 85, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(
            " Logs: {} (r=reload j/k=scroll Esc=close) ",
            app.log_path.display()
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let height = inner.height as usize;
    let max_scroll = app.log_lines.len().saturating_sub(height);
    app.log_scroll = app.log_scroll.min(max_scroll);

    let lines: Vec<Line> = app
        .log_lines
        .iter()
        .skip(app.log_scroll)
        .take(height)
        .map(|l| {
            let style = if l.contains(" ERROR ") {
                Style::default().fg(Color::Red)
            } else if l.contains(" WARN ") {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            Line::from(Span::styled(sanitize_for_terminal(l, false), style))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}
