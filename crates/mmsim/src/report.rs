use std::{error::Error, fmt};

use memory_manager::Location;
use snafu::Snafu;

use crate::style::{Color, Paint};

#[derive(Debug, Snafu)]
#[snafu(whatever, display("{message}"))]
pub struct GenericError {
    message: String,
    #[snafu(implicit)]
    location: Location,
    #[snafu(source(from(Box<dyn Error>, Some)))]
    source: Option<Box<dyn Error>>,
}

/// Human-readable rendering of a [`GenericError`] and its causes.
pub struct Report {
    error: GenericError,
    color: bool,
}

impl Report {
    pub fn new(error: GenericError, color: bool) -> Self {
        Self { error, color }
    }
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let color = self.color;
        writeln!(f, "Error: {}", Paint::new(Color::Red, &self.error, color))?;
        writeln!(
            f,
            "  at {}",
            Paint::new(Color::DarkGray, self.error.location, color)
        )?;
        let mut source = self.error.source();
        if source.is_some() {
            writeln!(f)?;
            writeln!(f, "Caused by:")?;
        }
        let mut index = 0;
        while let Some(s) = source {
            writeln!(f, "{index:4}: {}", Paint::new(Color::Red, s, color))?;
            source = s.source();
            index += 1;
        }
        Ok(())
    }
}
