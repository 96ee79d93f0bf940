use std::fmt::{Debug, Formatter};
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use vt100::Parser;

use crate::TermLike;

/// A fixed-size virtual screen that interprets what bars write to it.
///
/// Clones share the same screen, so one clone can be handed to a bar as
/// its output while another inspects the result.
#[derive(Debug, Clone)]
pub struct InMemoryTerm {
    state: Arc<Mutex<InMemoryTermState>>,
}

impl InMemoryTerm {
    /// Creates a screen of `rows` by `cols` cells. Both are raised to at
    /// least one.
    pub fn new(rows: u16, cols: u16) -> InMemoryTerm {
        InMemoryTerm {
            state: Arc::new(Mutex::new(InMemoryTermState::new(rows.max(1), cols.max(1)))),
        }
    }

    /// The visible screen, rows joined with newlines and trailing empty
    /// rows dropped.
    pub fn contents(&self) -> String {
        let state = self.state.lock();

        // `Screen::contents` drops the line structure, so rebuild it from rows
        let mut rows = state
            .parser
            .screen()
            .rows(0, state.width)
            .map(|row| row.trim_end().to_owned())
            .collect::<Vec<_>>();

        while rows.last().map_or(false, |row| row.is_empty()) {
            rows.pop();
        }
        rows.join("\n")
    }

    /// Cursor row and column.
    pub fn cursor_position(&self) -> (u16, u16) {
        self.state.lock().parser.screen().cursor_position()
    }
}

impl TermLike for InMemoryTerm {
    fn width(&self) -> Option<u16> {
        Some(self.state.lock().width)
    }

    fn height(&self) -> Option<u16> {
        Some(self.state.lock().height)
    }

    fn move_cursor_up(&self, n: usize) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.state.lock().write_str(&format!("\x1b[{}A", n))
    }

    fn write_str(&self, s: &str) -> io::Result<()> {
        // vt100 only returns to column 0 on an explicit \r
        let s = s.replace('\n', "\r\n");
        self.state.lock().write_str(&s)
    }

    fn write_line(&self, s: &str) -> io::Result<()> {
        let mut state = self.state.lock();
        state.write_str(&s.replace('\n', "\r\n"))?;
        state.write_str("\r\n")
    }

    fn flush(&self) -> io::Result<()> {
        self.state.lock().parser.flush()
    }
}

struct InMemoryTermState {
    width: u16,
    height: u16,
    parser: vt100::Parser,
}

impl InMemoryTermState {
    fn new(rows: u16, cols: u16) -> InMemoryTermState {
        InMemoryTermState {
            width: cols,
            height: rows,
            parser: Parser::new(rows, cols, 0),
        }
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.parser.write_all(s.as_bytes())
    }
}

impl Debug for InMemoryTermState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTermState").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overlong_text_continues_on_the_next_row() {
        let in_mem = InMemoryTerm::new(3, 4);
        in_mem.write_str("meter").unwrap();
        assert_eq!(in_mem.contents(), "mete\nr");
        assert_eq!(in_mem.cursor_position(), (1, 1));
    }

    #[test]
    fn lines_stack_downwards() {
        let in_mem = InMemoryTerm::new(5, 10);
        for word in ["one", "two", "three"] {
            in_mem.write_line(word).unwrap();
        }
        assert_eq!(in_mem.contents(), "one\ntwo\nthree");
        assert_eq!(in_mem.cursor_position(), (3, 0));
    }

    #[test]
    fn trailing_blank_rows_are_dropped() {
        let in_mem = InMemoryTerm::new(4, 10);
        in_mem.write_str("x   \n\n").unwrap();
        assert_eq!(in_mem.contents(), "x");
    }

    #[test]
    fn newlines_return_to_first_column() {
        let in_mem = InMemoryTerm::new(10, 20);
        in_mem.write_str("first\nsecond").unwrap();
        assert_eq!(in_mem.contents(), "first\nsecond");
        in_mem.move_cursor_up(1).unwrap();
        in_mem.write_str("\rFIRST").unwrap();
        assert_eq!(in_mem.contents(), "FIRST\nsecond");
    }

    #[test]
    fn reports_size() {
        let in_mem = InMemoryTerm::new(4, 30);
        assert_eq!(in_mem.width(), Some(30));
        assert_eq!(in_mem.height(), Some(4));
        assert!(in_mem.is_term());
    }
}
