use logrelay_core::Destination;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, AppState, LoginFocus};

use super::styles;

/// Visible width of the login form's text fields
const FIELD_WIDTH: usize = 28;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(5),    // Page content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);

    if app.hidden {
        render_hidden(frame, chunks[1]);
    } else {
        match app.page {
            Destination::ViewLogs => render_logs(frame, app, chunks[1]),
            Destination::Login => render_login(frame, app, chunks[1]),
        }
    }

    render_status_bar(frame, app, chunks[2]);

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  logrelay";
    let location = format!("{}{}", app.server_url.trim_end_matches('/'), app.page.path());

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + location.len() + 2),
        )),
        Span::styled(location, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

/// Shown while the page waits for its auth check
fn render_hidden(frame: &mut Frame, area: Rect) {
    let area = centered_rect_fixed(30, 3, area);
    let paragraph = Paragraph::new(Line::from(Span::styled(
        "Checking sign-in...",
        styles::muted_style(),
    )))
    .centered();
    frame.render_widget(paragraph, area);
}

fn render_logs(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(Span::styled(" Server log ", styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let inner_height = area.height.saturating_sub(2);
    let scroll = if app.follow_tail {
        app.log_line_count().saturating_sub(inner_height)
    } else {
        app.log_scroll
    };

    let lines: Vec<Line> = if app.log_text.is_empty() {
        vec![Line::from(Span::styled("Waiting for logs...", styles::muted_style()))]
    } else {
        app.log_text
            .lines()
            .map(|line| Line::from(Span::styled(line, styles::text_style())))
            .collect()
    };

    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_login(frame: &mut Frame, app: &App, area: Rect) {
    let height = if app.login_error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(50, height, area);

    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];

    let email_focused = app.login_focus == LoginFocus::Email;
    lines.push(field_line(
        "   Email:    [",
        &app.login_email,
        email_focused,
    ));

    let password_focused = app.login_focus == LoginFocus::Password;
    let masked = "*".repeat(app.login_password.chars().count());
    lines.push(field_line("   Password: [", &masked, password_focused));

    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::text_style()
    };
    let label = if button_focused { " ▶ Sign in ◀ " } else { "   Sign in   " };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("                ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("   {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .title(Span::styled(" Sign in ", styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line<'a>(label: &'a str, value: &str, focused: bool) -> Line<'a> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::text_style()
    };
    // Keep the tail visible once the value outgrows the field
    let shown: String = {
        let count = value.chars().count();
        value.chars().skip(count.saturating_sub(FIELD_WIDTH)).collect()
    };
    let cursor = if focused { "▌" } else { " " };

    Line::from(vec![
        Span::styled(label, styles::muted_style()),
        Span::styled(format!("{:<width$}{}", shown, cursor, width = FIELD_WIDTH), style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match (app.page, app.hidden) {
        (_, true) => "[q]uit",
        (Destination::ViewLogs, false) => "[↑/↓] scroll | [End] follow | [o] sign out | [q]uit",
        (Destination::Login, false) => "[Tab] next | [Enter] submit | [Esc] quit",
    };
    let right_text = format!(" {} ", shortcuts);

    let left = match app.toasts.back() {
        Some(toast) => Span::styled(
            format!(" {} ", toast.message),
            styles::notice_style(toast.kind),
        ),
        None => Span::styled(" ", styles::muted_style()),
    };

    let padding_len = (area.width as usize)
        .saturating_sub(left.content.chars().count())
        .saturating_sub(right_text.chars().count());

    let status_line = Line::from(vec![
        left,
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 7, frame.area());

    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
