pub mod detail;
pub mod help;
pub mod layout;
pub mod logs;
pub mod messages;
pub mod modals;
pub mod queues;
pub mod sanitize;
pub mod status_bar;

use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::Frame;

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Like `centered_rect` but with an absolute height in rows.
fn centered_rect_abs_height(percent_x: u16, height: u16, area: Rect) -> Rect {
    let h = height.min(area.height);
    let top = area.height.saturating_sub(h) / 2;
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(top),
            Constraint::Length(h),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// One-line "/ query" prompt above a panel's table.
fn render_filter_line(frame: &mut Frame, area: Rect, query: &str, editing: bool) {
    let line = if editing {
        Line::from(vec![
            Span::styled("/", Style::default().fg(Color::Yellow).bold()),
            Span::raw(sanitize::sanitize_for_terminal(query, false)),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
        ])
    } else {
        Line::from(vec![
            Span::styled("filter: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                sanitize::sanitize_for_terminal(query, false),
                Style::default().fg(Color::Yellow),
            ),
        ])
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Split a panel into an optional filter line and the rest.
fn split_filter(inner: Rect, show_filter: bool) -> (Option<Rect>, Rect) {
    if !show_filter {
        return (None, inner);
    }
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);
    (Some(parts[0]), parts[1])
}

fn panel_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}
