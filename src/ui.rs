use std::io;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyEventKind};
use futures::StreamExt;
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};

use crate::app::{App, FormField, Intent, TaskForm};
use crate::gate::PendingDeletion;
use crate::notification::Notification;

const HELP: &str = "↑/↓ select  a add  e edit  space toggle  d delete  r reload  q quit";

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App, tick: Duration) -> io::Result<()> {
    let _ = app.dispatch(Intent::Load);
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(tick);

    loop {
        terminal.draw(|f| draw(f, &app))?;
        if app.should_quit() {
            return Ok(());
        }

        tokio::select! {
            _ = ticker.tick() => {}
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(intent) = app.handle_key(key) {
                        let _ = app.dispatch(intent);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err),
                None => return Ok(()),
            },
        }
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    f.render_widget(
        Paragraph::new(Span::styled(
            "My Task List",
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        chunks[0],
    );

    draw_tasks(f, app, chunks[1]);
    draw_status(f, app.store().active_notification(), chunks[2]);

    if let Some(form) = app.form() {
        draw_form(f, form);
    }
    if let Some(pending) = app.pending_deletion() {
        draw_confirmation(f, &pending);
    }
}

fn draw_tasks(f: &mut Frame, app: &App, area: Rect) {
    let store = app.store();
    let tasks = store.sorted_tasks();
    let title = if store.is_loading() { "Tasks (loading...)" } else { "Tasks" };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if tasks.is_empty() {
        let message = if store.is_loading() {
            "Loading tasks..."
        } else {
            "No tasks created yet"
        };
        let empty = Paragraph::new(Span::styled(message, Style::default().fg(Color::DarkGray)))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec!["Created", "Title", "Description", "Done"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows: Vec<Row> = tasks
        .iter()
        .map(|t| {
            let checkbox = if t.completed.is_done() { "[x]" } else { "[ ]" };
            let title_style = if t.completed.is_done() {
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(Color::White)
            };
            Row::new(vec![
                Cell::from(t.created_on()),
                Cell::from(Span::styled(t.title.clone(), title_style)),
                Cell::from(t.description_text().to_string()),
                Cell::from(checkbox),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Length(4),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED))
    .highlight_symbol("> ");

    let mut state = TableState::default().with_selected(app.selected_index(tasks.len()));
    f.render_stateful_widget(table, area, &mut state);
}

fn draw_status(f: &mut Frame, notification: Option<Notification>, area: Rect) {
    let line = match notification {
        Some(n) => {
            let color = if n.is_error() { Color::Red } else { Color::Green };
            Line::from(Span::styled(n.message, Style::default().fg(color)))
        }
        None => Line::from(Span::styled(HELP, Style::default().fg(Color::DarkGray))),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_form(f: &mut Frame, form: &TaskForm) {
    let area = centered_rect(60, 9, f.area());
    let field = |label: &str, value: &str, focused: bool| {
        let style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let cursor = if focused { "_" } else { "" };
        Line::from(vec![
            Span::styled(format!("{label:<13}"), style.add_modifier(Modifier::BOLD)),
            Span::styled(format!("{value}{cursor}"), style),
        ])
    };

    let mut lines = vec![
        field("Title:", &form.title, form.focus == FormField::Title),
        field("Description:", &form.description, form.focus == FormField::Description),
        Line::default(),
    ];
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }
    lines.push(Line::from(Span::styled(
        "Tab switch field  Enter save  Esc cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let popup = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(form.heading())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn draw_confirmation(f: &mut Frame, pending: &PendingDeletion) {
    let area = centered_rect(50, 6, f.area());
    let prompt = Paragraph::new(vec![
        Line::from(format!("Delete task \"{}\"?", pending.title)),
        Line::default(),
        Line::from(Span::styled("y confirm  n cancel", Style::default().fg(Color::DarkGray))),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .title("Confirm deletion")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(Clear, area);
    f.render_widget(prompt, area);
}

/// A rectangle `percent_x` wide and `height` rows tall, centered in `area`.
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gate::ConfirmationGate;
    use crate::store::TaskStore;
    use crate::task::{Completion, Task};
    use crate::testutil::{task, FakeRepository};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;

    async fn app_with(tasks: Vec<Task>) -> App {
        let repo = Arc::new(FakeRepository::with_tasks(tasks));
        let store = Arc::new(TaskStore::new(repo, Duration::from_secs(60)));
        store.initialize().await.unwrap();
        let gate = Arc::new(ConfirmationGate::new(Arc::clone(&store)));
        App::new(store, gate)
    }

    fn render(app: &App) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect())
            .collect()
    }

    fn line_of(lines: &[String], needle: &str) -> usize {
        lines
            .iter()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("{needle:?} not rendered"))
    }

    #[tokio::test]
    async fn empty_list_shows_placeholder() {
        let app = app_with(vec![]).await;
        let lines = render(&app);
        let _ = line_of(&lines, "No tasks created yet");
        let _ = line_of(&lines, "a add");
    }

    #[tokio::test]
    async fn rows_render_newest_first_with_dates_and_checkboxes() {
        let app = app_with(vec![
            task(1, "Oldest", Completion::Done, 1),
            task(3, "Newest", Completion::Pending, 3),
            task(2, "Middle", Completion::Pending, 2),
        ])
        .await;
        let lines = render(&app);
        let newest = line_of(&lines, "Newest");
        let middle = line_of(&lines, "Middle");
        let oldest = line_of(&lines, "Oldest");
        assert!(newest < middle && middle < oldest);
        assert!(lines[newest].contains("29/11/2024"));
        assert!(lines[oldest].contains("[x]"));
        assert!(lines[newest].contains("[ ]"));
    }

    #[tokio::test]
    async fn confirmation_prompt_shows_captured_title() {
        let mut app = app_with(vec![task(5, "Buy milk", Completion::Pending, 5)]).await;
        let _ = app.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE));
        let lines = render(&app);
        let _ = line_of(&lines, "Delete task \"Buy milk\"?");
    }

    #[tokio::test]
    async fn notification_replaces_help_line() {
        let app = app_with(vec![task(5, "Buy milk", Completion::Pending, 5)]).await;
        app.store().apply_toggle(5).await.unwrap();
        let lines = render(&app);
        let _ = line_of(&lines, "Task status updated");
    }

    #[tokio::test]
    async fn form_popup_renders_heading_and_fields() {
        let mut app = app_with(vec![]).await;
        let _ = app.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
        let _ = app.handle_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE));
        let lines = render(&app);
        let _ = line_of(&lines, "New task");
        let _ = line_of(&lines, "Title:");
        let _ = line_of(&lines, "Description:");
    }
}
