use std::path::PathBuf;

use crossterm::event::KeyCode;
use oi_screener::config::{threshold_bounds, Config};
use oi_screener::error::{AppError, Result};
use oi_screener::export::{export_report, ExportPaths};
use oi_screener::types::{ScreenerParams, ScreenerReport, Thresholds, TradeDate};

pub const FETCH_ERROR_MESSAGE: &str = "Error fetching data. Check date or NSE availability.";
pub const EXPORT_ERROR_MESSAGE: &str = "Could not write the export files.";

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

/// Sidebar control that receives key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Date,
    Gain,
    Loss,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Idle,
    Running,
    Done,
    Error { message: String, detail: String },
}

/// What the event loop must do after a key press. Everything else is applied to the state directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Quit,
    Run,
    Export,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub date_input: String,
    pub gain: f64,
    pub loss: f64,
    pub focus: Focus,
    pub status: RunStatus,
    pub report: Option<ScreenerReport>,
    /// Highlighted row of the report table.
    pub selected_row: Option<usize>,
    /// Last export result shown under the tables.
    pub notice: Option<String>,
    pub export_dir: PathBuf,
}

impl AppState {
    pub fn new(cfg: &Config) -> Self {
        use threshold_bounds::*;
        Self {
            date_input: cfg.date.clone(),
            gain: cfg.gain_threshold.clamp(GAIN_MIN, GAIN_MAX),
            loss: cfg.loss_threshold.clamp(LOSS_MIN, LOSS_MAX),
            focus: Focus::Date,
            status: RunStatus::Idle,
            report: None,
            selected_row: None,
            notice: None,
            export_dir: PathBuf::from(&cfg.export_dir),
        }
    }

    /// Key dispatch. Scroll keys come before text entry so j/k never land in the date field.
    pub fn handle_key(&mut self, code: KeyCode) -> KeyAction {
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return KeyAction::Quit,
            KeyCode::Enter => return KeyAction::Run,
            KeyCode::Char('d') | KeyCode::Char('D') => return KeyAction::Export,
            KeyCode::Tab => self.focus_next(),
            KeyCode::BackTab => self.focus_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(),
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(),
            KeyCode::Left | KeyCode::Char('-') if self.focus != Focus::Date => self.adjust(-1),
            KeyCode::Right | KeyCode::Char('+') if self.focus != Focus::Date => self.adjust(1),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c) if self.focus == Focus::Date => self.push_char(c),
            _ => {}
        }
        KeyAction::None
    }

    pub fn scroll_down(&mut self) {
        let Some(rows) = self.report.as_ref().map(|r| r.report.len()) else { return };
        if rows == 0 {
            return;
        }
        self.selected_row = Some(self.selected_row.map_or(0, |i| (i + 1).min(rows - 1)));
    }

    pub fn scroll_up(&mut self) {
        if self.report.as_ref().is_some_and(|r| !r.report.is_empty()) {
            self.selected_row = Some(self.selected_row.map_or(0, |i| i.saturating_sub(1)));
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = match self.focus {
            Focus::Date => Focus::Gain,
            Focus::Gain => Focus::Loss,
            Focus::Loss => Focus::Date,
        };
    }

    pub fn focus_prev(&mut self) {
        self.focus = match self.focus {
            Focus::Date => Focus::Loss,
            Focus::Gain => Focus::Date,
            Focus::Loss => Focus::Gain,
        };
    }

    /// Typed character for the date field. Only digits and '-' are accepted.
    pub fn push_char(&mut self, c: char) {
        if self.focus == Focus::Date && (c.is_ascii_digit() || c == '-') && self.date_input.len() < 10 {
            self.date_input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.focus == Focus::Date {
            self.date_input.pop();
        }
    }

    /// Move the focused slider one step; no-op on the date field.
    pub fn adjust(&mut self, steps: i32) {
        use threshold_bounds::*;
        let delta = STEP * steps as f64;
        match self.focus {
            Focus::Gain => self.gain = (self.gain + delta).clamp(GAIN_MIN, GAIN_MAX),
            Focus::Loss => self.loss = (self.loss + delta).clamp(LOSS_MIN, LOSS_MAX),
            Focus::Date => {}
        }
    }

    pub fn params(&self) -> Result<ScreenerParams> {
        Ok(ScreenerParams {
            date: TradeDate::parse(&self.date_input)?,
            thresholds: Thresholds::new(self.gain, self.loss)?,
        })
    }

    /// The previous report is dropped so a re-run never shows stale tables.
    pub fn start_run(&mut self) {
        self.status = RunStatus::Running;
        self.report = None;
        self.selected_row = None;
        self.notice = None;
    }

    pub fn finish_run(&mut self, result: Result<ScreenerReport>) {
        match result {
            Ok(report) => {
                self.report = Some(report);
                self.status = RunStatus::Done;
            }
            Err(e) => self.fail(FETCH_ERROR_MESSAGE, &e),
        }
    }

    fn fail(&mut self, message: &str, e: &AppError) {
        self.report = None;
        self.selected_row = None;
        self.status = RunStatus::Error {
            message: message.to_string(),
            detail: e.to_string(),
        };
    }

    /// Write the last report to the export directory. Returns None when nothing has run yet.
    pub fn export(&mut self) -> Option<ExportPaths> {
        let report = self.report.as_ref()?;
        match export_report(&self.export_dir, report) {
            Ok(paths) => {
                self.notice = Some(format!(
                    "Saved {} and {}",
                    paths.report.display(),
                    paths.movers.display()
                ));
                Some(paths)
            }
            Err(e) => {
                self.notice = Some(format!("{EXPORT_ERROR_MESSAGE} {e}"));
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_pct(v: f64) -> String {
    format!("{:+.2}%", v)
}

/// Integer with thousands separators: 1234567 -> "1,234,567".
pub fn format_count(v: i64) -> String {
    let digits = v.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if v < 0 {
        format!("-{out}")
    } else {
        out
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
