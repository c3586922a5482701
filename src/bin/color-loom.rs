use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use color_loom::grid::Grid;
use color_loom::grid_solve::{self, Effort, SolveOptions};
use colored::Colorize;
use indicatif::ProgressBar;
use log::warn;

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input path; use "-" or omit to read stdin. One puzzle per
    /// whitespace-delimited token.
    input_path: Option<PathBuf>,

    /// Explain each productive solver pass on stderr.
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    trace_solve: bool,

    /// Also print the surviving candidates for grids that did not resolve.
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    candidates: bool,

    /// Emit one JSON report line per puzzle instead of the bare solution.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,

    /// Deepest inference family the solver may use.
    #[arg(short, long, value_enum)]
    max_effort: Option<Effort>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut input = String::new();
    match &args.input_path {
        Some(path) if path.as_os_str() != "-" => {
            input = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
        }
        _ => {
            std::io::stdin().read_to_string(&mut input)?;
        }
    }

    let options = SolveOptions {
        trace_solve: args.trace_solve,
        max_effort: args.max_effort.unwrap_or_default(),
    };

    // Seeding the rule store is the expensive part; do it once and clone.
    let base = Grid::new();

    let progress = ProgressBar::new_spinner();
    if args.trace_solve {
        progress.finish_and_clear();
    }

    let start = Instant::now();
    let (mut attempted, mut solved) = (0usize, 0usize);
    let mut failure = None;

    for token in input.split_whitespace() {
        let mut grid = base.clone();
        if let Err(e) = grid.populate(token) {
            warn!("skipping puzzle: {e}");
            continue;
        }
        attempted += 1;
        progress.set_message(format!("puzzle {attempted}"));
        progress.tick();

        let report = match grid_solve::solve(&mut grid, &options) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("{}", format!("solver error: {e:?}").red());
                failure = Some(e);
                break;
            }
        };
        if report.cells_left == 0 {
            solved += 1;
        }
        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}", report.solution);
        }
        if args.candidates && report.cells_left > 0 {
            println!("{}", grid.candidates_string());
        }
    }
    progress.finish_and_clear();

    let total_us = start.elapsed().as_micros();
    let per_grid_us = total_us / attempted.max(1) as u128;
    let percent = 100.0 * solved as f64 / attempted.max(1) as f64;
    let summary = format!(
        "solved {solved} / {attempted} ({percent:.1}%)  {per_grid_us} us per grid, {total_us} us total"
    );
    if solved == attempted {
        eprintln!("{}", summary.green());
    } else {
        eprintln!("{}", summary.yellow());
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
