use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::Frame;

use crate::app::{ActiveModal, App};

use super::messages::render_messages;
use super::modals::render_modal;
use super::queues::render_queues;
use super::status_bar::render_status_bar;

pub fn render(frame: &mut Frame, app: &mut App) {
    let size = frame.area();

    // Main layout: [title bar] [body] [status bar]
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // title bar
            Constraint::Min(10),   // body
            Constraint::Length(1), // status bar
        ])
        .split(size);

    let title = match app.session.active() {
        Some(profile) => format!(
            " ActiveMQ Explorer - {} ({}) ",
            profile.name,
            profile.address()
        ),
        None => " ActiveMQ Explorer - Not Connected ".to_string(),
    };
    let title_bar =
        Paragraph::new(title).style(Style::default().bg(Color::Blue).fg(Color::White).bold());
    frame.render_widget(title_bar, outer[0]);

    // Body: [queues | messages]
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(outer[1]);

    render_queues(frame, app, body[0]);
    render_messages(frame, app, body[1]);
    render_status_bar(frame, app, outer[2]);

    if app.modal != ActiveModal::None {
        render_modal(frame, app);
    }
}
