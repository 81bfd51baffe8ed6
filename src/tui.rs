use std::collections::HashSet;
use std::io::stdout;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use tokio::runtime::Handle;

use crate::diagnostics::{DiagnosticEntry, DiagnosticsLog, Severity};
use crate::fetch::Fetcher;
use crate::models::{JobRecord, ListContext};
use crate::source::JobSource;
use crate::store::FeedStore;

const REDRAW_INTERVAL: Duration = Duration::from_millis(200);
const DEBUG_PANEL_ROWS: u16 = 12;

struct AppState<S: JobSource + 'static> {
    store: Arc<Mutex<FeedStore>>,
    diagnostics: Arc<Mutex<DiagnosticsLog>>,
    fetcher: Arc<Fetcher<S>>,
    runtime: Handle,
    page: ListContext,
    cursor: usize,
    show_debug: bool,
    status_line: Option<String>,
}

// Everything one frame needs, cloned out of the shared state so no lock is
// held while drawing.
struct FrameView {
    jobs: Vec<JobRecord>,
    bookmarked: HashSet<String>,
    expanded: Option<String>,
    is_loading: bool,
    error: Option<String>,
    saved_count: usize,
    debug: Vec<DiagnosticEntry>,
}

impl<S: JobSource + 'static> AppState<S> {
    fn view(&mut self) -> FrameView {
        let store = self.store.lock().expect("feed store lock poisoned");
        let jobs = match self.page {
            ListContext::AllJobs => store.sorted_jobs(),
            ListContext::Saved => store.bookmarked_jobs(),
        };
        let bookmarked = store.bookmarks().clone();
        let expanded = store.expanded(self.page).map(str::to_string);
        let is_loading = store.is_loading();
        let error = store.error_message().map(str::to_string);
        let saved_count = store.bookmark_count();
        drop(store);

        let debug = if self.show_debug {
            self.diagnostics
                .lock()
                .expect("diagnostics lock poisoned")
                .entries()
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        // The feed can shrink between frames while polling.
        self.cursor = self.cursor.min(jobs.len().saturating_sub(1));

        FrameView {
            jobs,
            bookmarked,
            expanded,
            is_loading,
            error,
            saved_count,
            debug,
        }
    }
}

pub fn run<S: JobSource + 'static>(
    store: Arc<Mutex<FeedStore>>,
    diagnostics: Arc<Mutex<DiagnosticsLog>>,
    fetcher: Arc<Fetcher<S>>,
    runtime: Handle,
) -> Result<()> {
    let mut state = AppState {
        store,
        diagnostics,
        fetcher,
        runtime,
        page: ListContext::AllJobs,
        cursor: 0,
        show_debug: false,
        status_line: None,
    };

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop<S: JobSource + 'static>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState<S>,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        let view = state.view();
        if view.jobs.is_empty() {
            list_state.select(None);
        } else {
            list_state.select(Some(state.cursor));
        }
        terminal.draw(|frame| draw(frame, state, &view, &mut list_state))?;

        // Keep redrawing while idle so poll results show up unprompted.
        if !event::poll(REDRAW_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        state.status_line = None;
        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Esc => {
                if state.page == ListContext::Saved {
                    state.page = ListContext::AllJobs;
                    state.cursor = 0;
                } else {
                    break;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if !view.jobs.is_empty() && state.cursor < view.jobs.len() - 1 {
                    state.cursor += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.cursor = state.cursor.saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(job) = view.jobs.get(state.cursor) {
                    state
                        .store
                        .lock()
                        .expect("feed store lock poisoned")
                        .toggle_expanded(state.page, &job.id);
                }
            }
            KeyCode::Char('b') => {
                if let Some(job) = view.jobs.get(state.cursor) {
                    let mut store = state.store.lock().expect("feed store lock poisoned");
                    store.toggle_bookmark(&job.id);
                    state.status_line = Some(if store.is_bookmarked(&job.id) {
                        format!("Saved {}.", job.title)
                    } else {
                        format!("Removed {} from saved jobs.", job.title)
                    });
                }
            }
            KeyCode::Char('a') => {
                if let Some(job) = view.jobs.get(state.cursor) {
                    state.status_line =
                        Some(format!("Application started. You are applying for {}.", job.title));
                }
            }
            KeyCode::Char('r') => {
                // Manual retry; overlap with a scheduled cycle is a no-op.
                let fetcher = Arc::clone(&state.fetcher);
                state.runtime.spawn(async move {
                    fetcher.run_cycle().await;
                });
            }
            KeyCode::Char('d') => state.show_debug = !state.show_debug,
            KeyCode::Tab => {
                state.page = match state.page {
                    ListContext::AllJobs => ListContext::Saved,
                    ListContext::Saved => ListContext::AllJobs,
                };
                state.cursor = 0;
            }
            _ => {}
        }
    }
    Ok(())
}

fn draw<S: JobSource + 'static>(
    frame: &mut Frame,
    state: &AppState<S>,
    view: &FrameView,
    list_state: &mut ListState,
) {
    let mut constraints = vec![Constraint::Min(0)];
    if state.show_debug {
        constraints.push(Constraint::Length(DEBUG_PANEL_ROWS));
    }
    constraints.push(Constraint::Length(1));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    draw_jobs(frame, chunks[0], state, view, list_state);
    if state.show_debug {
        draw_debug(frame, chunks[1], &view.debug);
    }
    let footer = chunks[if state.show_debug { 2 } else { 1 }];
    draw_footer(frame, footer, state);
}

fn draw_jobs<S: JobSource + 'static>(
    frame: &mut Frame,
    area: Rect,
    state: &AppState<S>,
    view: &FrameView,
    list_state: &mut ListState,
) {
    let title = match state.page {
        ListContext::AllJobs => format!(
            " Top Job Matches ({} jobs, {} saved) ",
            view.jobs.len(),
            view.saved_count
        ),
        ListContext::Saved => format!(" Saved Jobs ({} saved) ", view.jobs.len()),
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    if view.jobs.is_empty() {
        let message = empty_state_text(state.page, view);
        frame.render_widget(
            Paragraph::new(message).block(block).wrap(Wrap { trim: false }),
            area,
        );
        return;
    }

    let text_width = usize::from(area.width).saturating_sub(10).max(20);
    let items: Vec<ListItem> = view
        .jobs
        .iter()
        .map(|job| {
            let expanded = view.expanded.as_deref() == Some(job.id.as_str());
            let bookmarked = view.bookmarked.contains(&job.id);
            ListItem::new(card_text(job, bookmarked, expanded, text_width))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_symbol("> ")
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));

    frame.render_stateful_widget(list, area, list_state);
}

fn empty_state_text(page: ListContext, view: &FrameView) -> Text<'static> {
    match page {
        ListContext::Saved => Text::from(vec![
            Line::from(Span::styled(
                "No saved jobs yet",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("Press b on a job to save it here."),
        ]),
        ListContext::AllJobs => {
            if view.is_loading {
                Text::from("Loading jobs from API...")
            } else if let Some(error) = &view.error {
                Text::from(vec![
                    Line::from(Span::styled(
                        "Could not load jobs",
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(error.clone()),
                    Line::from(""),
                    Line::from(Span::styled(
                        "Press r to retry.",
                        Style::default().fg(Color::Cyan),
                    )),
                ])
            } else {
                Text::from("No jobs available right now.")
            }
        }
    }
}

fn card_text(job: &JobRecord, bookmarked: bool, expanded: bool, width: usize) -> Text<'static> {
    let star = if bookmarked { "*" } else { " " };
    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("[{star}] "), Style::default().fg(Color::Yellow)),
            Span::styled(
                job.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  posted {}", format_posted(job.posted_days_ago)),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(format!("    {}", job.company)),
        Line::from(Span::styled(
            format!("    {}", job.salary),
            Style::default().fg(Color::Green),
        )),
        Line::from(Span::styled(
            format!("    Deadline: {}", job.deadline),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    if expanded {
        lines.push(Line::from(""));
        let description = textwrap::fill(&job.description, width);
        for wrapped in description.lines() {
            lines.push(Line::from(format!("    {wrapped}")));
        }
        lines.push(Line::from(""));
        lines.push(meta_line(job));
        lines.push(section_heading("Responsibilities"));
        for item in &job.responsibilities {
            push_bullet(&mut lines, item, width);
        }
        lines.push(section_heading("Requirements"));
        for item in &job.requirements {
            push_bullet(&mut lines, item, width);
        }
        lines.push(Line::from(Span::styled(
            "    enter: collapse",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        let preview = textwrap::fill(&job.description, width);
        for wrapped in preview.lines().take(2) {
            lines.push(Line::from(Span::styled(
                format!("    {wrapped}"),
                Style::default().fg(Color::DarkGray),
            )));
        }
        lines.push(meta_line(job));
    }

    lines.push(Line::from(""));
    Text::from(lines)
}

fn meta_line(job: &JobRecord) -> Line<'static> {
    Line::from(Span::styled(
        format!(
            "    {} | {} | {}",
            job.location, job.level, job.employment_type
        ),
        Style::default().fg(Color::DarkGray),
    ))
}

fn section_heading(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("    {title}"),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn push_bullet(lines: &mut Vec<Line<'static>>, item: &str, width: usize) {
    let filled = textwrap::fill(item, width.saturating_sub(2));
    let mut first = true;
    for wrapped in filled.lines() {
        if first {
            lines.push(Line::from(format!("      - {wrapped}")));
            first = false;
        } else {
            lines.push(Line::from(format!("        {wrapped}")));
        }
    }
}

fn format_posted(days: u32) -> String {
    if days == 1 {
        "1 day ago".to_string()
    } else {
        format!("{days} days ago")
    }
}

fn draw_debug(frame: &mut Frame, area: Rect, entries: &[DiagnosticEntry]) {
    let visible = usize::from(area.height.saturating_sub(2));
    let start = entries.len().saturating_sub(visible);
    let lines: Vec<Line> = entries[start..]
        .iter()
        .map(|entry| {
            let (mark, style) = match entry.severity {
                Severity::Error => ("x", Style::default().fg(Color::Red)),
                Severity::Success => ("+", Style::default().fg(Color::Green)),
                Severity::Info => (".", Style::default().fg(Color::DarkGray)),
            };
            Line::from(Span::styled(
                format!(
                    "{mark} [{}] {}",
                    entry.timestamp.with_timezone(&Local).format("%H:%M:%S"),
                    entry.message
                ),
                style,
            ))
        })
        .collect();

    let panel = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Live Debug Checklist "),
    );
    frame.render_widget(panel, area);
}

fn draw_footer<S: JobSource + 'static>(frame: &mut Frame, area: Rect, state: &AppState<S>) {
    let line = if let Some(status) = &state.status_line {
        Line::from(Span::styled(
            format!(" {status}"),
            Style::default().fg(Color::Cyan),
        ))
    } else {
        Line::from(Span::styled(
            " j/k:navigate  enter:expand  b:save  a:apply  r:retry  d:debug  tab:saved  q:quit",
            Style::default().fg(Color::DarkGray),
        ))
    };
    frame.render_widget(Paragraph::new(line), area);
}
