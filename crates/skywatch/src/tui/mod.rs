//! Terminal surface for the Skywatch dashboard.
//!
//! Owns raw mode and the alternate screen for as long as a [`Tui`] lives and
//! turns the keyboard into the stop signal.

use std::io::{self, Stdout};

use crossterm::{
    cursor::{Hide, Show},
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::watch;

use crate::error::StationError;
use crate::station::{DisplayFrame, Surface};

pub mod ui;

/// Full-screen terminal, restored on drop
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl Tui {
    /// Switch the terminal to raw mode on the alternate screen
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self {
            terminal,
            active: true,
        })
    }

    /// Leave the alternate screen; safe to call more than once
    pub fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen, Show)?;
        Ok(())
    }

    /// Replace the dashboard with a fatal error message
    pub fn show_fatal(&mut self, message: &str) -> io::Result<()> {
        self.terminal.draw(|f| ui::render_fatal(f, message))?;
        Ok(())
    }
}

impl Surface for Tui {
    fn present(&mut self, frame: &DisplayFrame) -> Result<(), StationError> {
        self.terminal
            .draw(|f| ui::render(f, frame))
            .map(|_| ())
            .map_err(|e| StationError::Render(e.to_string()))
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            log::error!("Failed to restore terminal: {}", e);
        }
    }
}

/// Ctrl+C or `q`; raw mode turns Ctrl+C into a key event instead of SIGINT
pub fn is_interrupt(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Char('Q') => true,
        _ => false,
    }
}

/// Flip `shutdown` to true on the first interrupt key. Runs until then or
/// until the terminal's event stream ends.
pub async fn watch_keys(shutdown: watch::Sender<bool>) {
    let mut events = EventStream::new();
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Key(key)) if is_interrupt(&key) => {
                log::info!("Interrupt key pressed");
                let _ = shutdown.send(true);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("Terminal event stream failed: {}", e);
                return;
            }
        }
    }
}

/// Block until any key is pressed
pub async fn wait_for_keypress() -> io::Result<()> {
    let mut events = EventStream::new();
    while let Some(event) = events.next().await {
        if let Event::Key(key) = event? {
            if key.kind == KeyEventKind::Press {
                return Ok(());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_interrupt_keys() {
        assert!(is_interrupt(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(is_interrupt(&key(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(!is_interrupt(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_interrupt(&key(KeyCode::Enter, KeyModifiers::NONE)));
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut release = key(KeyCode::Char('q'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(!is_interrupt(&release));
    }
}
