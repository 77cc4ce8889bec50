//! Password gate run before the client opens any connection.
//!
//! Reads a masked line from the terminal in raw mode and checks it against
//! the configured secret. The check is local only.

use crossterm::{
    cursor::MoveToColumn,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use std::io::{self, Write};
use thiserror::Error;

const PASSWORD_PROMPT: &str = "Enter password: ";

/// Reasons the gate refuses entry.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password prompt requires a TTY terminal.")]
    NotATerminal,
    #[error("Incorrect password.")]
    Mismatch,
    #[error("Password entry cancelled.")]
    Cancelled,
    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
    #[error("password prompt task failed: {0}")]
    Prompt(#[from] tokio::task::JoinError),
}

/// What a key press did to the masked input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskedStep {
    /// Keep reading.
    Continue,
    /// The buffer changed; redraw the mask.
    Redraw,
    /// Enter was pressed.
    Submit,
    /// Ctrl+C was pressed.
    Cancel,
}

/// Key-by-key password buffer.
#[derive(Debug, Default)]
pub struct MaskedInput {
    buffer: String,
}

impl MaskedInput {
    pub fn handle_key(&mut self, key: KeyEvent) -> MaskedStep {
        if key.kind != KeyEventKind::Press {
            return MaskedStep::Continue;
        }

        match key.code {
            KeyCode::Enter => MaskedStep::Submit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => MaskedStep::Cancel,
            KeyCode::Backspace => {
                if self.buffer.pop().is_some() {
                    MaskedStep::Redraw
                } else {
                    MaskedStep::Continue
                }
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                MaskedStep::Redraw
            }
            _ => MaskedStep::Continue,
        }
    }

    /// One `*` per character entered.
    pub fn mask(&self) -> String {
        "*".repeat(self.buffer.chars().count())
    }

    /// The entered text, trimmed.
    pub fn into_secret(self) -> String {
        self.buffer.trim().to_string()
    }
}

/// Compare an entry to the configured secret, byte for byte after trimming
/// the entry.
pub fn verify(entered: &str, secret: &str) -> Result<(), AuthError> {
    if entered.trim().as_bytes() == secret.as_bytes() {
        Ok(())
    } else {
        Err(AuthError::Mismatch)
    }
}

/// Prompt for the password on the terminal and check it.
pub async fn authenticate(secret: String) -> Result<(), AuthError> {
    authenticate_with(secret, read_password).await
}

/// Run a blocking password reader on the blocking pool and check its result,
/// keeping the terminal loop off the runtime's worker threads.
async fn authenticate_with<R>(secret: String, read: R) -> Result<(), AuthError>
where
    R: FnOnce() -> Result<String, AuthError> + Send + 'static,
{
    let entered = tokio::task::spawn_blocking(read).await??;
    verify(&entered, &secret)
}

/// Read a masked password from the controlling terminal.
pub fn read_password() -> Result<String, AuthError> {
    if !atty::is(atty::Stream::Stdin) {
        return Err(AuthError::NotATerminal);
    }

    let mut stdout = io::stdout();
    writeln!(stdout, "{}", PASSWORD_PROMPT)?;

    enable_raw_mode()?;
    let result = read_masked(&mut stdout);
    disable_raw_mode()?;
    writeln!(stdout)?;

    result
}

fn read_masked<W: Write>(out: &mut W) -> Result<String, AuthError> {
    let mut input = MaskedInput::default();

    loop {
        if let Event::Key(key) = event::read()? {
            match input.handle_key(key) {
                MaskedStep::Continue => {}
                MaskedStep::Redraw => {
                    execute!(
                        out,
                        MoveToColumn(0),
                        Clear(ClearType::CurrentLine),
                        Print(PASSWORD_PROMPT),
                        Print(input.mask())
                    )?;
                }
                MaskedStep::Submit => return Ok(input.into_secret()),
                MaskedStep::Cancel => return Err(AuthError::Cancelled),
            }
        }
    }
}
