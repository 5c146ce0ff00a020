use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::Frame;

use crate::app::{App, FocusPanel};

use super::sanitize::sanitize_for_terminal;

pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let style = if app.status_is_error {
        Style::default().bg(Color::Red).fg(Color::White)
    } else {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    };

    let left_text = format!(" {} ", sanitize_for_terminal(&app.status_message, false));

    let focus = match app.focus {
        FocusPanel::Queues => "Queues",
        FocusPanel::Messages => "Messages",
    };
    let selected = app.browser.selection().len();
    let right_text = if app.batch_running {
        format!(" {} | working... | ? Help ", focus)
    } else if selected > 0 {
        format!(" {} | {} selected | ? Help ", focus, selected)
    } else {
        format!(" {} | ? Help ", focus)
    };

    // The last batch outcome outlives status updates from the reloads it triggers.
    let batch = app
        .last_batch
        .as_ref()
        .filter(|report| report.summary != app.status_message)
        .map(|report| {
            let fg = if report.failed { Color::LightRed } else { Color::LightGreen };
            Span::styled(
                format!("| {} ", sanitize_for_terminal(&report.summary, false)),
                Style::default().bg(Color::DarkGray).fg(fg),
            )
        });

    let used = left_text.chars().count()
        + right_text.chars().count()
        + batch.as_ref().map_or(0, |span| span.content.chars().count());
    let mut spans = vec![Span::styled(left_text, style)];
    spans.extend(batch);
    spans.push(Span::styled(
        " ".repeat((area.width as usize).saturating_sub(used)),
        Style::default().bg(Color::DarkGray),
    ));
    spans.push(Span::styled(
        right_text,
        Style::default().bg(Color::DarkGray).fg(Color::Gray),
    ));
    let bar = Line::from(spans);

    frame.render_widget(Paragraph::new(bar), area);
}
