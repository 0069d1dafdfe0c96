//! Operation scripts driven from the command line.

use std::{fmt, io, str::FromStr};

use memory_manager::{BestFit, MemoryManager, PlacementPolicy, WorstFit, view::HoleList};
use snafu::{ResultExt as _, Snafu, whatever};

use crate::{dump, report::GenericError};

#[derive(Debug, Snafu)]
pub enum ParseError {
    #[snafu(display("unknown placement policy `{name}`, expected `best-fit` or `worst-fit`"))]
    UnknownPolicy { name: String },
    #[snafu(display("unknown operation `{op}`"))]
    UnknownOp { op: String },
    #[snafu(display("invalid number in `{op}`"))]
    InvalidNumber {
        op: String,
        source: std::num::ParseIntError,
    },
}

/// Built-in placement policies selectable by name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    #[default]
    BestFit,
    WorstFit,
}

impl FromStr for PolicyKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best-fit" | "best" => Ok(Self::BestFit),
            "worst-fit" | "worst" => Ok(Self::WorstFit),
            _ => UnknownPolicySnafu { name: s }.fail(),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PlacementPolicy for PolicyKind {
    fn select(&self, requested_words: usize, holes: &HoleList) -> Option<usize> {
        match self {
            Self::BestFit => BestFit.select(requested_words, holes),
            Self::WorstFit => WorstFit.select(requested_words, holes),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::BestFit => BestFit.name(),
            Self::WorstFit => WorstFit.name(),
        }
    }
}

/// A single step of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `alloc=<bytes>`
    Alloc(usize),
    /// `free=<n>`: frees the n-th successful allocation, counting from zero.
    Free(usize),
    /// `policy=<name>`
    Policy(PolicyKind),
    /// `holes`
    Holes,
}

impl FromStr for Op {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = |value: &str| value.parse::<usize>().context(InvalidNumberSnafu { op: s });
        match s.split_once('=') {
            Some(("alloc", value)) => Ok(Self::Alloc(number(value)?)),
            Some(("free", value)) => Ok(Self::Free(number(value)?)),
            Some(("policy", value)) => Ok(Self::Policy(value.parse()?)),
            None if s == "holes" => Ok(Self::Holes),
            _ => UnknownOpSnafu { op: s }.fail(),
        }
    }
}

/// Runs operations against a manager, remembering every successful
/// allocation so later `free=<n>` steps can refer to it.
#[derive(Debug)]
pub struct Script<'a> {
    manager: &'a mut MemoryManager,
    allocations: Vec<*mut u8>,
}

impl<'a> Script<'a> {
    pub fn new(manager: &'a mut MemoryManager) -> Self {
        Self {
            manager,
            allocations: Vec::new(),
        }
    }

    /// Executes `op`, writing a one-line result to `out`.
    ///
    /// An allocation that cannot be served is not an error; it is reported as
    /// `no memory`. A failing free aborts the script.
    pub fn run<W>(&mut self, op: Op, out: &mut W) -> Result<(), GenericError>
    where
        W: io::Write,
    {
        let written = match op {
            Op::Alloc(bytes) => match self.manager.allocate(bytes) {
                Some(address) => {
                    let offset = self.offset_of(address);
                    let index = self.allocations.len();
                    self.allocations.push(address);
                    writeln!(out, "alloc {bytes} -> #{index} at word {offset}")
                }
                None => writeln!(out, "alloc {bytes} -> no memory"),
            },
            Op::Free(index) => {
                let Some(&address) = self.allocations.get(index) else {
                    whatever!(
                        "free={index} refers to no allocation ({} made so far)",
                        self.allocations.len()
                    );
                };
                self.manager
                    .free(address)
                    .with_whatever_context(|_| format!("free={index} failed"))?;
                writeln!(out, "free #{index}")
            }
            Op::Policy(policy) => {
                self.manager.set_policy(policy);
                writeln!(out, "policy {policy}")
            }
            Op::Holes => writeln!(
                out,
                "holes {}",
                dump::format_memory_map(&self.manager.hole_list())
            ),
        };
        written.whatever_context("failed to write script output")
    }

    /// Runs every operation in order, stopping at the first failure.
    pub fn run_all<W>(&mut self, ops: &[Op], out: &mut W) -> Result<(), GenericError>
    where
        W: io::Write,
    {
        for &op in ops {
            self.run(op, out)?;
        }
        Ok(())
    }

    fn offset_of(&self, address: *mut u8) -> usize {
        self.manager
            .memory_start()
            .map_or(0, |base| (address.addr() - base.addr()) / self.manager.word_size())
    }
}
