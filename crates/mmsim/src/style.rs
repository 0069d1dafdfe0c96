//! ANSI colouring for terminal output.

use std::{
    env,
    fmt,
    io::{self, IsTerminal as _},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    DarkGray,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
}

impl Color {
    fn code(self) -> (u8, bool) {
        match self {
            Self::DarkGray => (0, true),
            Self::Red => (1, false),
            Self::Green => (2, false),
            Self::Yellow => (3, false),
            Self::Blue => (4, false),
            Self::Magenta => (5, false),
        }
    }

    fn fg(self) -> u8 {
        let (code, light) = self.code();
        if light { code + 90 } else { code + 30 }
    }
}

/// Displays a value in bold colour, or plain when colouring is off.
pub struct Paint<T> {
    color: Option<Color>,
    value: T,
}

impl<T> Paint<T> {
    pub fn new(color: Color, value: T, enabled: bool) -> Self {
        Self {
            color: enabled.then_some(color),
            value,
        }
    }
}

impl<T> fmt::Display for Paint<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = &self.value;
        match self.color {
            Some(color) => {
                let fg = color.fg();
                write!(f, "\x1B[{fg};1m{value}\x1B[0m")
            }
            None => write!(f, "{value}"),
        }
    }
}

/// Returns `true` if stderr is a terminal and `NO_COLOR` is unset.
pub fn stderr_supports_color() -> bool {
    io::stderr().is_terminal() && env::var_os("NO_COLOR").is_none()
}
