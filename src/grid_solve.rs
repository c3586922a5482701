use std::fmt;

use anyhow::Result;
use colored::Colorize;
use log::debug;
use serde::Serialize;

use crate::board::CELLS;
use crate::grid::Grid;

/// How far the driver escalates before giving up on a puzzle.
#[derive(Clone, Copy, Debug, clap::ValueEnum, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Effort {
    /// Queue draining and the four rule scans only.
    Scans,
    /// Plus equivalence merging over implication-graph components.
    Components,
    /// Plus the single-hypothesis contradiction sweep.
    Contradictions,
    /// Plus the paired-hypothesis sweep: the full engine.
    #[default]
    CaseSplit,
}

pub struct SolveOptions {
    /// Print a line per productive pass, highlighting fresh placements.
    pub trace_solve: bool,
    pub max_effort: Effort,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            trace_solve: false,
            max_effort: Effort::CaseSplit,
        }
    }
}

/// How often each inference family queued something. Comparing two runs'
/// counts is the cheapest way to notice the engine drifting.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Serialize)]
pub struct PassCounts {
    pub singles: usize,
    pub pair_merges: usize,
    pub doubled: usize,
    pub tautologies: usize,
    pub component_merges: usize,
    pub refutations: usize,
    pub case_splits: usize,
}

impl fmt::Display for PassCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "singles: {: >5}  pairs: {: >4}  doubles: {: >3}  tautologies: {: >3}  \
             components: {: >3}  refutations: {: >3}  splits: {: >2}",
            self.singles,
            self.pair_merges,
            self.doubled,
            self.tautologies,
            self.component_merges,
            self.refutations,
            self.case_splits,
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub passes: PassCounts,
    pub cells_left: usize,
    pub solution: String,
}

impl Grid {
    /// Runs the full engine with default options.
    pub fn plain_solve(&mut self) -> Result<Report> {
        solve(self, &SolveOptions::default())
    }
}

/// Drives the grid to a fixed point: drain and scan until quiet, then
/// escalate through pair merging, component search, and the contradiction
/// sweeps, restarting from the cheap end whenever anything fires. Returns
/// when the board is full or nothing fires at the permitted effort.
pub fn solve(grid: &mut Grid, options: &SolveOptions) -> Result<Report> {
    let mut passes = PassCounts::default();
    let mut shown = vec![false; CELLS];

    loop {
        let singles_before = passes.singles;
        loop {
            grid.drain_truths()?;
            let queued = grid.scan_singles()?;
            passes.singles += queued;
            if queued == 0 {
                break;
            }
        }
        trace_pass(
            grid,
            options,
            "singles",
            passes.singles - singles_before,
            &mut shown,
        );

        if grid.placed() == CELLS {
            break;
        }

        loop {
            let queued = grid.scan_pairs()?;
            passes.pair_merges += queued;
            if queued == 0 {
                break;
            }
            grid.drain_merges()?;
        }

        let queued = grid.scan_doubled_colors()?;
        passes.doubled += queued;
        if queued > 0 {
            trace_pass(grid, options, "doubles", queued, &mut shown);
            continue;
        }

        let queued = grid.scan_tautologies()?;
        passes.tautologies += queued;
        if queued > 0 {
            trace_pass(grid, options, "tautologies", queued, &mut shown);
            continue;
        }

        if options.max_effort < Effort::Components {
            break;
        }
        grid.rebuild_implications();
        let queued = grid.merge_components()?;
        passes.component_merges += queued;
        if queued > 0 {
            trace_pass(grid, options, "components", queued, &mut shown);
            grid.drain_merges()?;
            continue;
        }

        if options.max_effort < Effort::Contradictions {
            break;
        }
        let queued = grid.refute_colors()?;
        passes.refutations += queued;
        if queued > 0 {
            trace_pass(grid, options, "refutations", queued, &mut shown);
            continue;
        }

        if options.max_effort < Effort::CaseSplit {
            break;
        }
        let queued = grid.refute_by_case_split()?;
        passes.case_splits += queued;
        if queued > 0 {
            trace_pass(grid, options, "case split", queued, &mut shown);
            continue;
        }

        break;
    }

    debug!("finished with {} cells left ({passes})", grid.cells_left());
    Ok(Report {
        passes,
        cells_left: grid.cells_left(),
        solution: grid.solution_string(),
    })
}

/// One line per productive pass: the pass name, how much it queued, and the
/// board so far with placements new since the last line highlighted.
fn trace_pass(
    grid: &Grid,
    options: &SolveOptions,
    label: &str,
    queued: usize,
    shown: &mut [bool],
) {
    if !options.trace_solve {
        return;
    }
    let mut line = String::new();
    let mut fresh = 0;
    for (i, ch) in grid.solution_string().chars().enumerate() {
        if ch != '.' && !shown[i] {
            line.push_str(&ch.to_string().green().underline().to_string());
            shown[i] = true;
            fresh += 1;
        } else {
            line.push(ch);
        }
    }
    if queued == 0 && fresh == 0 {
        return;
    }
    eprintln!(
        "{label: >12} {queued: >4} queued  {: >3}/{CELLS} placed  {line}",
        grid.placed()
    );
}
