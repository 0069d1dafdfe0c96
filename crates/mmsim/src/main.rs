//! Command-line driver for the memory manager simulator.
//!
//! ```text
//! mmsim --words 20 alloc=16 alloc=32 holes free=0 holes --dump map.txt
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::{io, path::PathBuf, process};

use argh::FromArgs;
use memory_manager::MemoryManager;
use snafu::{ResultExt as _, ensure_whatever};

use self::{
    op::{Op, PolicyKind, Script},
    report::{GenericError, Report},
};

mod dump;
mod logger;
mod op;
mod report;
mod style;

/// Run allocation scripts against a simulated fixed-size heap.
#[derive(Debug, FromArgs)]
struct Args {
    /// size of a word in bytes
    #[argh(option, default = "4")]
    word_size: usize,
    /// number of words in the arena
    #[argh(option, default = "20")]
    words: usize,
    /// initial placement policy (best-fit or worst-fit)
    #[argh(option, default = "PolicyKind::BestFit")]
    policy: PolicyKind,
    /// write the final hole list to this file
    #[argh(option)]
    dump: Option<PathBuf>,
    /// print the final allocation bitmap as hex bytes
    #[argh(switch)]
    bitmap: bool,
    /// increase log verbosity (repeatable)
    #[argh(switch, short = 'v')]
    verbose: u8,
    /// operations: alloc=<bytes>, free=<n>, policy=<name>, holes
    #[argh(positional)]
    ops: Vec<Op>,
}

fn main() {
    let args: Args = argh::from_env();
    let color = style::stderr_supports_color();

    let level = logger::level_for_verbosity(args.verbose);
    if let Err(err) = logger::StderrLogger::new(level, color).init() {
        eprintln!("failed to install logger: {err}");
    }

    if let Err(err) = run(&args) {
        let report = Report::new(err, color);
        eprintln!("{report}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), GenericError> {
    ensure_whatever!(args.word_size > 0, "word size must be at least one byte");

    let mut manager = MemoryManager::new(args.word_size, args.policy);
    manager.initialize(args.words).with_whatever_context(|_| {
        format!(
            "failed to initialize arena of {} words x {} bytes",
            args.words, args.word_size
        )
    })?;
    log::info!(
        "arena of {} words x {} bytes, {} placement",
        args.words,
        args.word_size,
        args.policy
    );

    Script::new(&mut manager).run_all(&args.ops, &mut io::stdout().lock())?;

    if args.bitmap {
        let bytes = manager.bitmap().to_bytes();
        let hex: Vec<_> = bytes.iter().map(|b| format!("{b:02x}")).collect();
        println!("bitmap {}", hex.join(" "));
    }

    if let Some(path) = &args.dump {
        dump::dump_memory_map(path, &manager.hole_list())?;
    }
    Ok(())
}
