//! Terminal chat host
//!
//! Features:
//! - API key prompting
//! - Conversation view with greeting
//! - Retry/error advisories from the running call
//! - Reset and model switch

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

use pyeonan::completion::{Advisory, RetryingClient, Severity};
use pyeonan::config::Config;
use pyeonan::error::CallFailure;
use pyeonan::history::{HistoryWindow, Role};
use pyeonan::models::SupportedModel;
use pyeonan::session::{ChatSession, PendingTurn, Recorded};
use pyeonan::GeminiClient;

const TITLE: &str = "🧠 멘탈 헬스 코치: 편안함";

// ═══════════════════════════════════════════════════════════════
// API KEY PROMPT
// ═══════════════════════════════════════════════════════════════

/// Prompt user for API key (masked input)
pub fn prompt_api_key() -> Result<String> {
    print!("Gemini API 키를 입력하세요: ");
    io::stdout().flush()?;

    // Read with echo disabled
    enable_raw_mode()?;
    let mut key = String::new();

    loop {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(k) = event::read()? {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match k.code {
                    KeyCode::Enter => break,
                    KeyCode::Char(c) => {
                        key.push(c);
                        print!("*");
                        io::stdout().flush()?;
                    }
                    KeyCode::Backspace => {
                        if key.pop().is_some() {
                            print!("\x08 \x08");
                            io::stdout().flush()?;
                        }
                    }
                    KeyCode::Esc => {
                        disable_raw_mode()?;
                        println!();
                        anyhow::bail!("Cancelled");
                    }
                    _ => {}
                }
            }
        }
    }

    disable_raw_mode()?;
    println!();

    if key.is_empty() {
        anyhow::bail!("No API key entered");
    }

    Ok(key)
}

// ═══════════════════════════════════════════════════════════════
// MAIN TUI
// ═══════════════════════════════════════════════════════════════

type Finished = (PendingTurn<GeminiClient>, Result<String, CallFailure>);

/// Main TUI state
struct TuiState {
    input: String,
    pending_prompt: Option<String>,
    advisory: Option<(Severity, String)>,
    info: Option<String>,
    tick: usize,
}

impl TuiState {
    fn new() -> Self {
        Self {
            input: String::new(),
            pending_prompt: None,
            advisory: None,
            info: None,
            tick: 0,
        }
    }

    fn advise(&mut self, advisory: &Advisory) {
        self.advisory = Some((advisory.severity(), advisory.message()));
    }
}

/// Builds clients for (re-)initialization
struct ClientFactory {
    api_key: Option<String>,
    cfg: Config,
}

impl ClientFactory {
    fn build(&self) -> Option<RetryingClient<GeminiClient>> {
        self.api_key.as_deref().map(|key| {
            RetryingClient::new(
                GeminiClient::with_base_url(key, &self.cfg.api_base_url),
                self.cfg.retry_policy(),
            )
        })
    }
}

/// Run the main TUI
pub async fn run_tui(api_key: Option<String>, cfg: Config, model: SupportedModel) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_tui_loop(&mut terminal, api_key, cfg, model).await;
    restore_terminal(terminal)?;
    result
}

async fn run_tui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    api_key: Option<String>,
    cfg: Config,
    model: SupportedModel,
) -> Result<()> {
    let window = HistoryWindow::new(cfg.history_window);
    let factory = ClientFactory { api_key, cfg };

    let mut state = TuiState::new();
    let mut session: ChatSession<GeminiClient> = ChatSession::new(model, window);

    match factory.build() {
        Some(client) => {
            session.attach(client, model);
            state.info = Some("API 키 확인 및 챗봇 준비 완료".into());
        }
        None => {
            state.advisory = Some((Severity::Warning, "API 키를 입력하거나 설정해 주세요.".into()));
        }
    }

    let (adv_tx, mut adv_rx) = mpsc::unbounded_channel::<Advisory>();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Finished>();

    loop {
        state.tick += 1;

        // Drain advisories and finished calls
        while let Ok(advisory) = adv_rx.try_recv() {
            state.advise(&advisory);
        }
        while let Ok((pending, outcome)) = done_rx.try_recv() {
            if let Recorded::Dropped = session.record(pending, &outcome) {
                tracing::debug!("exchange not added to the conversation");
            }
            state.pending_prompt = None;
            if outcome.is_ok() {
                state.advisory = None;
            }
        }

        // Render
        terminal.draw(|f| render_tui(f, &state, &session))?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match key.code {
                    KeyCode::Esc => break,
                    // Reset and model switch wait for the running call to finish
                    KeyCode::Char('r')
                        if key.modifiers.contains(KeyModifiers::CONTROL) && !session.is_busy() =>
                    {
                        session.reset();
                        if let Some(client) = factory.build() {
                            let model = session.model();
                            session.attach(client, model);
                        }
                        state.advisory = None;
                        state.info = Some("대화를 초기화했습니다.".into());
                    }
                    KeyCode::F(2) if !session.is_busy() => {
                        let next = session.model().next();
                        if session.select_model(next) {
                            state.advisory = None;
                            state.info = Some(format!("모델 변경: {}", next.display_name()));
                        }
                    }
                    KeyCode::Enter if !session.is_busy() => {
                        let prompt = state.input.trim().to_string();
                        match session.prepare(&prompt) {
                            Ok(pending) => {
                                state.input.clear();
                                state.info = None;
                                state.pending_prompt = Some(prompt);

                                let adv_tx = adv_tx.clone();
                                let done_tx = done_tx.clone();
                                tokio::spawn(async move {
                                    let outcome = pending.execute(&adv_tx).await;
                                    let _ = done_tx.send((pending, outcome));
                                });
                            }
                            Err(e) => tracing::debug!(error = %e, "prompt not sent"),
                        }
                    }
                    KeyCode::Char(_) if !session.is_busy() => {
                        if let Some(c) = typed_char(&key) {
                            state.input.push(c);
                        }
                    }
                    KeyCode::Backspace if !session.is_busy() => {
                        state.input.pop();
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

/// Character to insert for `key`; Ctrl/Alt chords are not text
fn typed_char(key: &KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            Some(c)
        }
        _ => None,
    }
}

fn render_tui(f: &mut Frame, state: &TuiState, session: &ChatSession<GeminiClient>) {
    let area = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Conversation
            Constraint::Length(1), // Advisory
            Constraint::Length(3), // Input
            Constraint::Length(1), // Help
        ])
        .split(area);

    let header = Paragraph::new(format!(
        "현재 모델: {} | 세션 ID: {}",
        session.model().display_name(),
        session.id()
    ))
    .block(Block::default().borders(Borders::ALL).title(TITLE));
    f.render_widget(header, chunks[0]);

    render_conversation(f, state, session, chunks[1]);

    let (style, text) = match (&state.advisory, &state.info) {
        (Some((Severity::Error, msg)), _) => (Style::default().fg(Color::Red), msg.clone()),
        (Some((Severity::Warning, msg)), _) => (Style::default().fg(Color::Yellow), msg.clone()),
        (None, Some(info)) => (Style::default().fg(Color::Green), info.clone()),
        (None, None) => (Style::default(), String::new()),
    };
    f.render_widget(Paragraph::new(format!(" {}", text)).style(style), chunks[2]);

    let busy = session.is_busy();
    let input_style = if busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    let input_title = if busy {
        format!("{} 코치가 당신의 이야기에 귀 기울이고 있습니다...", spinner_char(state.tick))
    } else {
        "당신의 감정을 이야기해주세요... (Enter 전송)".into()
    };
    let input = Paragraph::new(state.input.as_str())
        .style(input_style)
        .block(Block::default().borders(Borders::ALL).title(input_title));
    f.render_widget(input, chunks[3]);

    let help = Paragraph::new(" Enter:전송  Ctrl-R:대화 초기화  F2:모델 변경  Esc:종료")
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[4]);
}

fn render_conversation(
    f: &mut Frame,
    state: &TuiState,
    session: &ChatSession<GeminiClient>,
    area: Rect,
) {
    let mut lines: Vec<String> = Vec::new();
    for turn in session.conversation().turns() {
        let label = match turn.role {
            Role::Assistant => "코치",
            Role::User => "나",
        };
        lines.push(format!("[{}]", label));
        lines.extend(turn.text.lines().map(|l| format!("  {}", l)));
        lines.push(String::new());
    }
    if let Some(prompt) = &state.pending_prompt {
        lines.push("[나]".into());
        lines.extend(prompt.lines().map(|l| format!("  {}", l)));
    }

    // Keep the newest lines in view
    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let wrapped: usize = lines
        .iter()
        .map(|l| (l.width().max(1) + inner_width - 1) / inner_width)
        .sum();
    let scroll = wrapped.saturating_sub(inner_height).min(u16::MAX as usize) as u16;

    let para = Paragraph::new(lines.join("\n"))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(Block::default().borders(Borders::ALL).title("대화"));
    f.render_widget(para, area);
}

fn spinner_char(tick: usize) -> char {
    const SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
    SPINNER[tick % SPINNER.len()]
}

// ═══════════════════════════════════════════════════════════════
// TERMINAL SETUP
// ═══════════════════════════════════════════════════════════════

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
