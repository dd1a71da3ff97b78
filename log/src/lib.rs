use std::io::{self, Write};
use std::sync::Mutex;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Green,
    Red,
    Gold,
    Gray,
}

impl Color {
    /// ANSI escape sequence selecting the color.
    fn escape(self) -> &'static str {
        match self {
            Color::Green => "\x1b[92m",
            Color::Red => "\x1b[91m",
            Color::Gold => "\x1b[33m",
            Color::Gray => "\x1b[37m",
        }
    }
}

#[macro_export]
macro_rules! notify {
    () => {};

    ($($arg:tt)*) => {{
        if let Ok(mut logger) = $crate::LOGGER.lock() {
            logger.append(
                format!(
                    $($arg)*
                ),
                $crate::Color::Green,
            );
        }
    }};
}

#[macro_export]
macro_rules! strong {
    () => {};

    ($($arg:tt)*) => {{
        if let Ok(mut logger) = $crate::LOGGER.lock() {
            logger.append(
                format!(
                    $($arg)*
                ),
                $crate::Color::Red,
            );
        }
    }};
}

#[macro_export]
macro_rules! warn {
    () => {};

    ($($arg:tt)*) => {{
        if let Ok(mut logger) = $crate::LOGGER.lock() {
            logger.append(
                format!(
                    $($arg)*
                ),
                $crate::Color::Gold,
            );
        }
    }};
}

#[macro_export]
macro_rules! trace {
    () => {};

    ($($arg:tt)*) => {{
        if let Ok(mut logger) = $crate::LOGGER.lock() {
            logger.append(
                format!(
                    $($arg)*
                ),
                $crate::Color::Gray,
            );
        }
    }};
}

pub static LOGGER: Lazy<Mutex<Logger<300>>> = Lazy::new(|| Mutex::new(Logger::new()));

/// Ring buffer of the last `N` log lines.
pub struct Logger<const N: usize> {
    lines: [(String, Color); N],
    head: usize,
    len: usize,
}

impl<const N: usize> Logger<N> {
    fn new() -> Self {
        Self {
            lines: std::array::from_fn(|_| (String::new(), Color::Gray)),
            head: 0,
            len: 0,
        }
    }

    pub fn append(&mut self, line: String, color: Color) {
        self.lines[self.head] = (line + "\n", color);
        self.head = (self.head + 1) % N;
        self.len += 1;
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len.min(N)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn lines(&self) -> (&[(String, Color)], &[(String, Color)]) {
        if self.len < N {
            (&self.lines[0..self.len], &[])
        } else {
            // wrapped around, so we need to return two slices
            let (a, b) = self.lines.split_at(self.head);

            (b, a)
        }
    }

    /// Write every buffered line, oldest first, and empty the buffer.
    ///
    /// Lines are colored when `colored` is set.
    pub fn flush(&mut self, out: &mut impl Write, colored: bool) -> io::Result<()> {
        let lines = self.lines();

        for (line, color) in lines.0.iter().chain(lines.1) {
            if colored {
                write!(out, "{}{line}\x1b[0m", color.escape())?;
            } else {
                out.write_all(line.as_bytes())?;
            }
        }

        out.flush()?;
        self.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around() {
        let mut logger = Logger::<2>::new();
        logger.append("a".to_string(), Color::Gray);
        logger.append("b".to_string(), Color::Gray);
        logger.append("c".to_string(), Color::Red);
        assert_eq!(logger.len(), 2);

        let mut out = Vec::new();
        logger.flush(&mut out, false).unwrap();
        assert_eq!(out, b"b\nc\n");
        assert!(logger.is_empty());
    }

    #[test]
    fn colored() {
        let mut logger = Logger::<4>::new();
        logger.append("warning".to_string(), Color::Gold);

        let mut out = Vec::new();
        logger.flush(&mut out, true).unwrap();
        assert_eq!(out, b"\x1b[33mwarning\n\x1b[0m");
    }

    #[test]
    fn macros() {
        warn!("[test] {} failed", "symbol");
        let logger = LOGGER.lock().unwrap();
        assert!(!logger.is_empty());
    }
}
