use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, ClearType},
    tty::IsTty,
};

/// `true` while the line editor holds the terminal in raw mode.
///
/// The termination notifier reads it to pick `\r\n` line endings.
pub static EDITOR_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Enables raw mode on construction and restores the terminal on drop.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        EDITOR_ACTIVE.store(true, Ordering::Relaxed);
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        EDITOR_ACTIVE.store(false, Ordering::Relaxed);
    }
}

const MAX_HISTORY_SIZE: usize = 1_000;

enum KeyAction {
    Continue,
    Submit(String),
    Eof,
}

/// Reads command lines: a small raw-mode editor with in-memory history on a
/// terminal, plain `read_line` otherwise.
#[derive(Default)]
pub struct LineEditor {
    buffer: Vec<char>,
    cursor: usize,
    history: Vec<String>,
    /// Equals `history.len()` when not browsing history.
    history_idx: usize,
    /// The in-progress line, restored when Down walks past the newest entry.
    saved_buffer: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one line. `Ok(None)` means end of input.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        if !io::stdin().is_tty() {
            return read_line_fallback(prompt);
        }

        self.buffer.clear();
        self.cursor = 0;
        self.history_idx = self.history.len();
        self.saved_buffer.clear();

        let _guard = RawModeGuard::enter()?;
        print!("{prompt}");
        io::stdout().flush()?;

        loop {
            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if key.kind != KeyEventKind::Press && key.kind != KeyEventKind::Repeat {
                continue;
            }
            match self.handle_key(key, prompt)? {
                KeyAction::Submit(line) => return Ok(Some(line)),
                KeyAction::Eof => return Ok(None),
                KeyAction::Continue => {}
            }
        }
    }

    /// Remember a submitted line; blanks and repeats of the last entry are skipped.
    pub fn add_to_history(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || self.history.last().map(String::as_str) == Some(trimmed) {
            return;
        }
        self.history.push(trimmed.to_string());
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.remove(0);
        }
    }

    fn handle_key(&mut self, key: KeyEvent, prompt: &str) -> io::Result<KeyAction> {
        use KeyCode::*;
        use KeyModifiers as Mod;

        match (key.code, key.modifiers) {
            (Enter, _) => {
                print!("\r\n");
                io::stdout().flush()?;
                return Ok(KeyAction::Submit(self.buffer.iter().collect()));
            }
            (Char('d'), Mod::CONTROL) if self.buffer.is_empty() => {
                print!("\r\n");
                io::stdout().flush()?;
                return Ok(KeyAction::Eof);
            }
            // ISIG is off in raw mode, so Ctrl-C arrives here as a key.
            (Char('c'), Mod::CONTROL) => {
                print!("^C\r\n{prompt}");
                io::stdout().flush()?;
                self.buffer.clear();
                self.cursor = 0;
                self.history_idx = self.history.len();
            }
            (Char('a'), Mod::CONTROL) | (Home, _) => self.cursor = 0,
            (Char('e'), Mod::CONTROL) | (End, _) => self.cursor = self.buffer.len(),
            (Char('u'), Mod::CONTROL) => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
            }
            (Left, _) => self.cursor = self.cursor.saturating_sub(1),
            (Right, _) => self.cursor = (self.cursor + 1).min(self.buffer.len()),
            (Up, _) => self.history_prev(),
            (Down, _) => self.history_next(),
            (Backspace, _) if self.cursor > 0 => {
                self.cursor -= 1;
                self.buffer.remove(self.cursor);
            }
            (Delete, _) | (Char('d'), Mod::CONTROL) if self.cursor < self.buffer.len() => {
                self.buffer.remove(self.cursor);
            }
            (Char(c), Mod::NONE) | (Char(c), Mod::SHIFT) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
            }
            _ => return Ok(KeyAction::Continue),
        }

        self.redraw(prompt)?;
        Ok(KeyAction::Continue)
    }

    fn redraw(&self, prompt: &str) -> io::Result<()> {
        let line: String = self.buffer.iter().collect();
        let col = (prompt.chars().count() + self.cursor) as u16;
        execute!(
            io::stdout(),
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
        )?;
        print!("{prompt}{line}");
        io::stdout().flush()?;
        execute!(io::stdout(), cursor::MoveToColumn(col))?;
        Ok(())
    }

    fn history_prev(&mut self) {
        if self.history_idx == 0 {
            return;
        }
        if self.history_idx == self.history.len() {
            self.saved_buffer = self.buffer.iter().collect();
        }
        self.history_idx -= 1;
        self.buffer = self.history[self.history_idx].chars().collect();
        self.cursor = self.buffer.len();
    }

    fn history_next(&mut self) {
        if self.history_idx >= self.history.len() {
            return;
        }
        self.history_idx += 1;
        let line = if self.history_idx == self.history.len() {
            &self.saved_buffer
        } else {
            &self.history[self.history_idx]
        };
        self.buffer = line.chars().collect();
        self.cursor = self.buffer.len();
    }
}

/// Non-terminal input: print the prompt and read a plain line.
fn read_line_fallback(prompt: &str) -> io::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor_with(lines: &[&str]) -> LineEditor {
        let mut editor = LineEditor::new();
        for line in lines {
            editor.add_to_history(line);
        }
        editor
    }

    #[test]
    fn history_skips_blank_and_repeated_lines() {
        let editor = editor_with(&["ls", "  ", "ls", "pwd", ""]);
        assert_eq!(editor.history, vec!["ls", "pwd"]);
    }

    #[test]
    fn history_is_bounded() {
        let mut editor = LineEditor::new();
        for i in 0..MAX_HISTORY_SIZE + 5 {
            editor.add_to_history(&format!("cmd {i}"));
        }
        assert_eq!(editor.history.len(), MAX_HISTORY_SIZE);
        assert_eq!(editor.history[0], "cmd 5");
    }

    #[test]
    fn browsing_restores_the_in_progress_line() {
        let mut editor = editor_with(&["first", "second"]);
        editor.history_idx = editor.history.len();
        editor.buffer = "draft".chars().collect();

        editor.history_prev();
        assert_eq!(editor.buffer.iter().collect::<String>(), "second");
        editor.history_prev();
        editor.history_prev();
        assert_eq!(editor.buffer.iter().collect::<String>(), "first");

        editor.history_next();
        editor.history_next();
        assert_eq!(editor.buffer.iter().collect::<String>(), "draft");
        assert_eq!(editor.cursor, 5);
    }
}
