use crate::app::App;
use crate::theme;
use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};

pub const COLUMNS: [&str; 5] = ["Host", "Slot", "File", "Phase", "PID"];

pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.size();
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, app, sections[0]);
    if app.show_help {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(sections[1]);
        render_jobs(f, app, body[0]);
        render_help(f, body[1]);
    } else {
        render_jobs(f, app, sections[1]);
    }
    render_footer(f, app, sections[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let (label, color) = if app.polling {
        ("polling", Color::Rgb(184, 187, 38))
    } else if app.paused {
        ("paused", theme::WARN)
    } else {
        ("stopped", theme::MUTED)
    };
    let updated = if app.snapshot.sequence == 0 {
        "never".to_string()
    } else {
        app.snapshot
            .taken_at
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    };
    let line = Line::from(vec![
        Span::styled(" distcc ", theme::HEADER_STYLE),
        Span::styled(format!("[{label}]"), Style::default().fg(color)),
        Span::raw(format!("  {}", app.state_dir.display())),
        Span::styled(format!("  updated {updated}"), Style::default().fg(theme::MUTED)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn render_jobs(f: &mut Frame, app: &mut App, area: Rect) {
    let title = format!("Jobs ({})", app.snapshot.len());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));

    if app.snapshot.is_empty() {
        let inner = block.inner(area);
        f.render_widget(block, area);
        let message = match &app.status_note {
            Some(note) => Line::from(Span::styled(note.clone(), theme::WARN)),
            None => Line::from(Span::styled("No active distcc jobs", theme::MUTED)),
        };
        let text = vec![message, Line::from(""), Line::from("Press ? for help, q to quit.")];
        f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
        return;
    }

    let rows: Vec<Row> = app
        .snapshot
        .records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            Row::new(vec![
                Cell::from(Span::styled(
                    record.host.clone(),
                    theme::host_style(&record.host),
                )),
                Cell::from(record.slot.to_string()),
                Cell::from(record.filename.clone()),
                Cell::from(Span::styled(
                    record.phase.as_str(),
                    theme::phase_color(record.phase),
                )),
                Cell::from(record.process_id.to_string()),
            ])
            .style(theme::stripe_style(idx))
        })
        .collect();

    let widths = [
        Constraint::Length(24),
        Constraint::Length(6),
        Constraint::Min(20),
        Constraint::Length(12),
        Constraint::Length(10),
    ];
    let table = Table::new(rows, widths)
        .header(Row::new(COLUMNS.to_vec()).style(theme::HEADER_STYLE))
        .block(block)
        .highlight_style(theme::SELECTED_STYLE);

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let stats = app.snapshot.stats;
    let text = format!(
        " files {}  live {}  stale {}  invalid {}  unreadable {}   p pause/resume  ? help  q quit",
        stats.candidates, stats.live, stats.stale, stats.invalid, stats.decode_failures
    );
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(theme::MUTED),
        ))),
        area,
    );
}

fn render_help(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("j / Down", Color::Cyan),
            Span::raw("   Next job"),
        ]),
        Line::from(vec![
            Span::styled("k / Up", Color::Cyan),
            Span::raw("     Previous job"),
        ]),
        Line::from(vec![
            Span::styled("p", Color::Cyan),
            Span::raw("          Pause/resume polling"),
        ]),
        Line::from(vec![
            Span::styled("?", Color::Cyan),
            Span::raw("          Toggle help"),
        ]),
        Line::from(vec![
            Span::styled("q", Color::Cyan),
            Span::raw("          Quit"),
        ]),
    ];
    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}
