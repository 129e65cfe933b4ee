use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};
use std::io;

use crate::lib::output::QuotaReport;

const HEADERS: [&str; 6] = ["", "Region", "Ready", "Score", "Issues", "Warnings"];

/// Table cells for each assessed region, best region marked with `*`
pub fn assessment_rows(report: &QuotaReport) -> Vec<[String; 6]> {
    report
        .assessments
        .iter()
        .map(|a| {
            let best = report.best_region.as_deref() == Some(a.region.as_str());
            [
                if best { "*".to_string() } else { String::new() },
                a.region.clone(),
                if a.ready { "yes".to_string() } else { "no".to_string() },
                a.score.to_string(),
                a.critical_issues.len().to_string(),
                a.warnings.len().to_string(),
            ]
        })
        .collect()
}

pub fn display_assessments_table(report: &QuotaReport) -> io::Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, report);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("Table view failed: {err}");
    }

    Ok(())
}

fn detail_lines(report: &QuotaReport, selected: Option<usize>) -> Vec<Line<'static>> {
    let Some(assessment) = selected.and_then(|i| report.assessments.get(i)) else {
        return vec![Line::from("No region could be assessed.")];
    };

    let mut lines = Vec::new();
    for issue in &assessment.critical_issues {
        lines.push(Line::styled(format!("critical: {issue}"), Style::default().fg(Color::Red)));
    }
    for warning in &assessment.warnings {
        lines.push(Line::styled(
            format!("warning:  {warning}"),
            Style::default().fg(Color::Yellow),
        ));
    }
    for ok in &assessment.recommendations {
        lines.push(Line::styled(
            format!("ok:       {ok}"),
            Style::default().fg(Color::Green),
        ));
    }
    if lines.is_empty() {
        lines.push(Line::from("No tracked quota metrics reported for this region."));
    }
    lines
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    report: &QuotaReport,
) -> io::Result<()> {
    let rows_data = assessment_rows(report);
    let mut state = TableState::default();
    if !rows_data.is_empty() {
        state.select(Some(0));
    }

    let title = match (&report.best_region, report.best_score) {
        (Some(region), Some(score)) => {
            format!(" Region quotas, best: {region} (score {score}) (Press 'q' to quit) ")
        }
        _ => " Region quotas, no suitable region (Press 'q' to quit) ".to_string(),
    };

    loop {
        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(f.area());

            let header_cells = HEADERS.iter().map(|h| {
                Cell::from(*h).style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
            });
            let header = Row::new(header_cells)
                .style(Style::default().bg(Color::DarkGray))
                .height(1);

            let rows = rows_data.iter().map(|cells| {
                Row::new(cells.iter().map(|c| Cell::from(c.clone()))).height(1)
            });

            let table = Table::new(
                rows,
                [
                    Constraint::Length(2),
                    Constraint::Percentage(30),
                    Constraint::Percentage(15),
                    Constraint::Percentage(15),
                    Constraint::Percentage(15),
                    Constraint::Percentage(15),
                ],
            )
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title.clone()))
            .row_highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

            f.render_stateful_widget(table, chunks[0], &mut state);

            let details = Paragraph::new(detail_lines(report, state.selected()))
                .block(Block::default().borders(Borders::ALL).title(" Details "))
                .wrap(Wrap { trim: false });
            f.render_widget(details, chunks[1]);
        })?;

        // Handle input
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                let len = rows_data.len();
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Down | KeyCode::Char('j') if len > 0 => {
                        let i = match state.selected() {
                            Some(i) if i + 1 < len => i + 1,
                            _ => 0,
                        };
                        state.select(Some(i));
                    }
                    KeyCode::Up | KeyCode::Char('k') if len > 0 => {
                        let i = match state.selected() {
                            Some(0) | None => len - 1,
                            Some(i) => i - 1,
                        };
                        state.select(Some(i));
                    }
                    _ => {}
                }
            }
        }
    }
}
