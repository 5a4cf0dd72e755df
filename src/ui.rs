use crate::{
    app::{App, LogEntry, LogLevel, ToastLevel},
    config::EntrySource,
    gate::GateState,
    progress::ProgressInfo,
};
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Clear, Gauge, List, ListItem, ListState, Padding, Paragraph,
        Wrap,
    },
};
use std::{
    io,
    time::{Duration, Instant},
};

const SIDE_PANEL_WIDTH: u16 = 36;
const LOG_HEIGHT: u16 = 8;
const LOG_PAGE: usize = 5;

#[derive(Clone)]
struct Theme {
    accent: Color,
    border: Color,
    text: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    header_bg: Color,
    log_bg: Color,
}

impl Theme {
    fn new() -> Self {
        Self {
            accent: Color::Rgb(120, 190, 255),
            border: Color::Rgb(65, 75, 90),
            text: Color::Rgb(220, 230, 240),
            muted: Color::Rgb(135, 145, 155),
            success: Color::Rgb(120, 220, 140),
            warning: Color::Rgb(230, 200, 120),
            error: Color::Rgb(235, 100, 95),
            header_bg: Color::Rgb(22, 28, 36),
            log_bg: Color::Rgb(16, 20, 26),
        }
    }

    fn block(&self, title: &'static str) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.border))
            .title(Span::styled(
                title,
                Style::default()
                    .fg(self.accent)
                    .add_modifier(Modifier::BOLD),
            ))
    }

    fn panel(&self, title: &'static str) -> Block<'static> {
        self.block(title).padding(Padding {
            left: 1,
            right: 1,
            top: 1,
            bottom: 0,
        })
    }
}

pub fn run(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        app.poll_backend();
        app.clamp_cursor();
        terminal.draw(|frame| draw(frame, app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(200))? {
            match event::read()? {
                Event::Key(key) => handle_key(app, key),
                Event::Paste(text) => handle_paste(app, &text),
                _ => {}
            }
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.close();
        return;
    }

    if app.import_form.is_open() {
        handle_import_mode(app, key);
    } else {
        handle_normal_mode(app, key);
    }
}

fn handle_import_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.hide_import(),
        KeyCode::Enter => app.submit_import(),
        KeyCode::Backspace => app.import_form.pop(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.import_form.push(c);
        }
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.close(),
        KeyCode::Char('m') | KeyCode::Char('M') => app.toggle_side_panel(),
        KeyCode::Char('i') | KeyCode::Char('I') => app.open_import(),
        KeyCode::Char('p') | KeyCode::Char('P') => app.play(),
        KeyCode::Char('c') | KeyCode::Char('C') => app.copy_log_tail_to_clipboard(),
        KeyCode::Up | KeyCode::Char('k') => app.move_cursor_up(),
        KeyCode::Down | KeyCode::Char('j') => app.move_cursor_down(),
        KeyCode::Enter | KeyCode::Char(' ') => app.select_under_cursor(),
        KeyCode::PageUp => app.scroll_log_up(LOG_PAGE),
        KeyCode::PageDown => app.scroll_log_down(LOG_PAGE),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if !app.import_form.is_open() {
        return;
    }
    text.chars()
        .filter(|c| !c.is_control())
        .for_each(|c| app.import_form.push(c));
}

fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.size();
    let theme = Theme::new();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(9),
            Constraint::Length(3),
            Constraint::Length(LOG_HEIGHT),
        ])
        .split(area);

    draw_header(frame, app, &theme, chunks[0]);

    let body = chunks[1];
    let main_area = if app.config.side_panel_open {
        let body_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDE_PANEL_WIDTH), Constraint::Min(20)])
            .split(body);
        draw_side_panel(frame, app, &theme, body_chunks[0]);
        body_chunks[1]
    } else {
        body
    };
    draw_main(frame, app, &theme, main_area);

    let status_block = theme.block("Status");
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(theme.text))
        .block(status_block);
    frame.render_widget(status, chunks[2]);

    let log_block = theme.panel("Log").style(Style::default().bg(theme.log_bg));
    let log_inner = log_block.inner(chunks[3]);
    let log_lines = build_log_lines(app, &theme, log_inner.height as usize);
    let log = Paragraph::new(log_lines)
        .style(Style::default().fg(theme.text).bg(theme.log_bg))
        .block(log_block);
    frame.render_widget(log, chunks[3]);

    if app.import_form.is_open() {
        draw_import_modal(frame, app, &theme);
    }
    draw_toast(frame, app, &theme, body);
}

fn draw_header(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let menu_label = if app.config.side_panel_open {
        "m hide menu"
    } else {
        "m menu"
    };
    let header = Paragraph::new(vec![Line::from(vec![
        Span::styled(
            "PlayDeck",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(menu_label, Style::default().fg(theme.muted)),
        Span::raw("  "),
        Span::styled("i import", Style::default().fg(theme.muted)),
        Span::raw("  "),
        Span::styled("p play", Style::default().fg(theme.muted)),
        Span::raw("  "),
        Span::styled("c copy log", Style::default().fg(theme.muted)),
        Span::raw("  "),
        Span::styled("q close", Style::default().fg(theme.muted)),
    ])])
    .style(Style::default().bg(theme.header_bg))
    .alignment(Alignment::Center)
    .block(Block::default().padding(Padding {
        left: 0,
        right: 0,
        top: 1,
        bottom: 0,
    }));
    frame.render_widget(header, area);
}

fn draw_side_panel(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let title = match app.config.entry_source {
        EntrySource::Profiles => "Profiles",
        EntrySource::Games => "Games",
    };
    let block = theme.block(title);
    let entries = app.visible_entries();

    if entries.is_empty() {
        let placeholder = if app.is_loading() {
            "Loading..."
        } else {
            "Nothing here yet. Press i to import."
        };
        let paragraph = Paragraph::new(Span::styled(placeholder, Style::default().fg(theme.muted)))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let selected_key = app.selection.current().map(|entry| entry.key().to_string());
    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| {
            let is_selected = selected_key.as_deref() == Some(entry.key());
            let marker = if is_selected { "● " } else { "  " };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(theme.success)),
                Span::styled(entry.display_name().to_string(), Style::default().fg(theme.text)),
            ];
            if let Some(version) = entry.version() {
                spans.push(Span::styled(
                    format!("  {version}"),
                    Style::default().fg(theme.muted),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.cursor.min(entries.len() - 1)));
    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        );
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_main(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let progress = app
        .progress_snapshot()
        .filter(|info| info.is_active);
    let mut constraints = vec![Constraint::Min(4), Constraint::Length(3)];
    if progress.is_some() {
        constraints.push(Constraint::Length(3));
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let details = build_detail_lines(app, theme);
    let details = Paragraph::new(details)
        .wrap(Wrap { trim: true })
        .block(theme.panel("Details"));
    frame.render_widget(details, chunks[0]);

    draw_play_button(frame, app, theme, chunks[1]);

    if let Some(info) = progress {
        draw_progress(frame, theme, chunks[2], &info);
    }
}

fn build_detail_lines(app: &App, theme: &Theme) -> Vec<Line<'static>> {
    let Some(entry) = app.selection.current() else {
        return vec![Line::from(Span::styled(
            "Select an entry to play.",
            Style::default().fg(theme.muted),
        ))];
    };

    let mut lines = vec![Line::from(Span::styled(
        entry.display_name().to_string(),
        Style::default()
            .fg(theme.text)
            .add_modifier(Modifier::BOLD),
    ))];
    lines.push(Line::from(vec![
        Span::styled("Kind: ", Style::default().fg(theme.muted)),
        Span::styled(entry.kind_label(), Style::default().fg(theme.text)),
    ]));
    if let Some(game) = entry.game_ref() {
        lines.push(Line::from(vec![
            Span::styled("Game: ", Style::default().fg(theme.muted)),
            Span::styled(game.to_string(), Style::default().fg(theme.text)),
        ]));
    }
    if let Some(version) = entry.version() {
        lines.push(Line::from(vec![
            Span::styled("Version: ", Style::default().fg(theme.muted)),
            Span::styled(version.to_string(), Style::default().fg(theme.text)),
        ]));
    }
    lines
}

fn draw_play_button(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let (label, style, border) = match app.gate.state() {
        GateState::IdleSelected => (
            " Play ",
            Style::default()
                .fg(Color::Black)
                .bg(theme.success)
                .add_modifier(Modifier::BOLD),
            theme.success,
        ),
        GateState::Launching => (
            " Launching... ",
            Style::default()
                .fg(Color::Black)
                .bg(theme.warning)
                .add_modifier(Modifier::BOLD),
            theme.warning,
        ),
        GateState::IdleNoSelection => (" Play ", Style::default().fg(theme.muted), theme.border),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border));
    let button = Paragraph::new(Span::styled(label, style))
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(button, area);
}

fn draw_progress(frame: &mut Frame<'_>, theme: &Theme, area: Rect, info: &ProgressInfo) {
    let gauge = Gauge::default()
        .block(theme.block("Download"))
        .gauge_style(Style::default().fg(theme.accent).bg(theme.log_bg))
        .ratio(info.ratio())
        .label(info.status_text.clone());
    frame.render_widget(gauge, area);
}

fn draw_import_modal(frame: &mut Frame<'_>, app: &App, theme: &Theme) {
    let area = frame.size();
    let height = 8u16.min(area.height.saturating_sub(2));
    let width = area.width.saturating_mul(2) / 3;
    let width = width.clamp(34, area.width.saturating_sub(2).max(34));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let modal_area = Rect::new(x, y, width.min(area.width), height);

    let mut lines = vec![
        Line::from(Span::styled("Profile name", Style::default().fg(theme.muted))),
        Line::from(vec![
            Span::styled(
                app.import_form.buffer().to_string(),
                Style::default().fg(theme.text),
            ),
            Span::styled("_", Style::default().fg(theme.accent)),
        ]),
        Line::from(""),
    ];
    if app.import_active() {
        lines.push(Line::from(Span::styled(
            "Waiting for backend...",
            Style::default().fg(theme.warning),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Enter import | Esc hide",
            Style::default().fg(theme.muted),
        )));
    }

    frame.render_widget(Clear, modal_area);
    let block = theme
        .panel("Import Profile")
        .border_style(Style::default().fg(theme.accent))
        .style(Style::default().bg(theme.header_bg));
    let modal = Paragraph::new(lines).block(block);
    frame.render_widget(modal, modal_area);
}

fn build_log_lines(app: &App, theme: &Theme, height: usize) -> Vec<Line<'static>> {
    if height == 0 {
        return Vec::new();
    }
    if app.logs.is_empty() {
        return vec![Line::from(Span::styled(
            "No recent events.",
            Style::default().fg(theme.muted),
        ))];
    }

    let scroll = app.log_scroll.min(app.logs.len().saturating_sub(height));
    let mut lines: Vec<Line<'static>> = app
        .logs
        .iter()
        .rev()
        .skip(scroll)
        .take(height)
        .map(|entry| log_line(entry, theme))
        .collect();
    lines.reverse();
    lines
}

fn log_line(entry: &LogEntry, theme: &Theme) -> Line<'static> {
    let (marker, color) = match entry.level {
        LogLevel::Info => ("[i]", theme.accent),
        LogLevel::Warn => ("[!]", theme.warning),
        LogLevel::Error => ("[x]", theme.error),
    };
    Line::from(vec![
        Span::styled(marker, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(entry.message.clone(), Style::default().fg(theme.text)),
    ])
}

fn draw_toast(frame: &mut Frame<'_>, app: &App, theme: &Theme, body_area: Rect) {
    let Some(toast) = app.toast.as_ref() else {
        return;
    };
    if toast.expires_at <= Instant::now() {
        return;
    }

    let max_width = body_area.width.saturating_sub(4).max(24);
    let message = fit_width(&toast.message, max_width.saturating_sub(4) as usize);
    let text_width = u16::try_from(message.chars().count()).unwrap_or(u16::MAX);
    let width = text_width.saturating_add(4).clamp(24, max_width);
    let x = body_area.x + (body_area.width.saturating_sub(width)) / 2;
    let toast_area = Rect::new(x, body_area.y + 1, width.min(body_area.width), 3);

    let border = match toast.level {
        ToastLevel::Info => theme.accent,
        ToastLevel::Warn => theme.warning,
        ToastLevel::Error => theme.error,
    };

    frame.render_widget(Clear, toast_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(theme.header_bg));
    let content = Paragraph::new(message)
        .block(block)
        .style(Style::default().fg(theme.text))
        .alignment(Alignment::Center);
    frame.render_widget(content, toast_area);
}

/// Shortens `text` to at most `max` characters, marking the cut with "...".
fn fit_width(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut fitted: String = text.chars().take(max.saturating_sub(3)).collect();
    fitted.push_str("...");
    fitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::OfflineBackend,
        config::AppConfig,
        registry::{Entry, Profile},
    };
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn offline_app(dir: &tempfile::TempDir) -> App {
        let config = AppConfig::load_or_create_in(dir.path()).expect("config");
        App::with_backend(config, Arc::new(OfflineBackend::new("not started")))
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("terminal");
        terminal.draw(|frame| draw(frame, app)).expect("draw");
        let buffer = terminal.backend().buffer();
        let mut screen = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                screen.push_str(buffer.get(x, y).symbol());
            }
            screen.push('\n');
        }
        screen
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_with_profiles(dir: &tempfile::TempDir) -> App {
        let mut app = offline_app(dir);
        for name in ["Alpha", "Beta", "Alpha"] {
            app.registry
                .append(Entry::Profile(Profile::new("ultracraft", name, "0.1.0")));
        }
        app
    }

    #[test]
    fn side_panel_lists_each_name_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with_profiles(&dir);
        let screen = render(&app);

        assert_eq!(screen.matches("Alpha").count(), 1);
        assert!(screen.contains("Beta"));
        assert!(screen.contains("Select an entry to play."));
    }

    #[test]
    fn hidden_side_panel_is_not_drawn() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app_with_profiles(&dir);
        app.config.side_panel_open = false;

        assert!(!render(&app).contains("Beta"));
    }

    #[test]
    fn gauge_follows_active_flag_and_shows_status_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = offline_app(&dir);
        app.progress.publish(ProgressInfo {
            downloaded_bytes: 50,
            total_bytes: 100,
            percent: 50,
            is_active: true,
            status_text: "Downloading: jdk-17.tar.gz".to_string(),
        });
        assert!(render(&app).contains("Downloading: jdk-17.tar.gz"));

        app.progress.publish(ProgressInfo {
            is_active: false,
            status_text: "Done".to_string(),
            ..ProgressInfo::default()
        });
        let screen = render(&app);
        assert!(!screen.contains("Download"));
        assert!(!screen.contains("Done"));
    }

    #[test]
    fn play_button_reflects_gate_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app_with_profiles(&dir);
        assert!(!render(&app).contains("Launching..."));

        app.select("Beta");
        assert!(app.gate.begin_launch(app.selection.is_some()));
        assert!(render(&app).contains("Launching..."));
    }

    #[test]
    fn import_modal_edits_buffer_and_escape_keeps_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = offline_app(&dir);

        handle_key(&mut app, key(KeyCode::Char('i')));
        for c in "Survivall".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        handle_key(&mut app, key(KeyCode::Backspace));
        assert!(render(&app).contains("Import Profile"));
        assert_eq!(app.import_form.buffer(), "Survival");

        handle_key(&mut app, key(KeyCode::Esc));
        assert!(!app.import_form.is_open());
        assert!(!render(&app).contains("Import Profile"));

        handle_key(&mut app, key(KeyCode::Char('i')));
        assert_eq!(app.import_form.buffer(), "Survival");
    }

    #[test]
    fn paste_only_lands_in_open_modal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = offline_app(&dir);

        handle_paste(&mut app, "ignored");
        app.open_import();
        handle_paste(&mut app, "Hard\ncore");
        assert_eq!(app.import_form.buffer(), "Hardcore");
    }

    #[test]
    fn cursor_keys_then_enter_select_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = app_with_profiles(&dir);

        handle_key(&mut app, key(KeyCode::Down));
        handle_key(&mut app, key(KeyCode::Enter));

        assert_eq!(app.selection.current().map(Entry::key), Some("Beta"));
        assert!(app.gate.is_enabled());
        assert!(render(&app).contains("Version: 0.1.0"));
    }

    #[test]
    fn long_non_ascii_toast_is_cut_on_a_char_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = offline_app(&dir);
        let name = format!("x{}", "é".repeat(120));
        app.set_toast(
            &format!("Import failed: {name}"),
            ToastLevel::Error,
            Duration::from_secs(30),
        );

        let screen = render(&app);
        assert!(screen.contains("Import failed: xéé"));
        assert!(screen.contains("..."));
    }

    #[test]
    fn fit_width_counts_characters() {
        assert_eq!(fit_width("short", 10), "short");
        assert_eq!(fit_width("ééééééé", 6), "ééé...");
        assert_eq!(fit_width("abc", 2), "...");
    }

    #[test]
    fn scrolled_log_panel_shows_older_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = offline_app(&dir);
        for index in 0..20 {
            app.log_info(format!("event {index}"));
        }
        assert!(render(&app).contains("event 19"));

        app.scroll_log_up(5);
        let screen = render(&app);
        assert!(screen.contains("event 14"));
        assert!(!screen.contains("event 19"));

        app.log_info("event 20".to_string());
        assert!(!render(&app).contains("event 20"));
    }

    #[test]
    fn log_panel_shows_newest_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut app = offline_app(&dir);
        assert!(render(&app).contains("No recent events."));

        app.log_error("Launch failed: sdk missing".to_string());
        assert!(render(&app).contains("[x] Launch failed: sdk missing"));
    }
}
