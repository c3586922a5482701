use anyhow::{Result, bail};
use itertools::Itertools;
use log::{debug, trace};

use crate::board::{self, CELLS, NODES, NodeId, RULE_COUNT, SIDE};
use crate::color::{Color, ColorVecMap, reverse};

/// The whole solver state: the exclusion rules, the color indexes, the two
/// work queues, and the placements made so far. One base grid is built per
/// process and cloned per puzzle; `Clone` is a deep, independent snapshot.
///
/// A color is live while it appears in `color_to_nodes`. Asserting a color
/// true places its nodes and removes it (and its reverse) from every rule;
/// merging rewrites one color into another across every structure. Rules may
/// temporarily hold duplicate colors after merges; the scans rely on seeing
/// them, so rules are never canonicalized to sets.
#[derive(Clone)]
pub struct Grid {
    pub(crate) placements: Vec<Option<NodeId>>,
    pub(crate) placed: usize,
    pub(crate) color_to_nodes: ColorVecMap<NodeId>,
    pub(crate) color_to_rules: ColorVecMap<usize>,
    pub(crate) rules: Vec<Vec<Color>>,
    pub(crate) pending_truths: Vec<Color>,
    pub(crate) pending_merges: Vec<Color>,
    pub(crate) implications: ColorVecMap<Color>,
    #[cfg(feature = "check-grid")]
    unit_counters: UnitCounters,
}

impl Grid {
    pub fn new() -> Grid {
        let mut grid = Grid {
            placements: vec![None; CELLS],
            placed: 0,
            color_to_nodes: ColorVecMap::new(),
            color_to_rules: ColorVecMap::new(),
            rules: vec![Vec::new(); RULE_COUNT],
            pending_truths: Vec::new(),
            pending_merges: Vec::new(),
            implications: ColorVecMap::new(),
            #[cfg(feature = "check-grid")]
            unit_counters: UnitCounters::new(),
        };
        grid.seed();
        grid
    }

    /// Singleton colors plus the four rule blocks: per cell, then
    /// per (column, digit), per (row, digit), per (box, digit).
    fn seed(&mut self) {
        for node in 0..NODES {
            self.color_to_nodes.insert(node as Color + 1, node);
        }

        let color_at = |cell: usize, digit: usize| board::node_at(cell, digit) as Color + 1;
        let mut idx = 0;
        for cell in 0..CELLS {
            for digit in 0..SIDE {
                self.rules[idx].push(color_at(cell, digit));
            }
            idx += 1;
        }
        for digit in 0..SIDE {
            for col in 0..SIDE {
                for row in 0..SIDE {
                    self.rules[idx].push(color_at(row * SIDE + col, digit));
                }
                idx += 1;
            }
        }
        for digit in 0..SIDE {
            for row in 0..SIDE {
                for col in 0..SIDE {
                    self.rules[idx].push(color_at(row * SIDE + col, digit));
                }
                idx += 1;
            }
        }
        for digit in 0..SIDE {
            for cell in 0..CELLS {
                let b = board::box_of(cell);
                self.rules[3 * CELLS + digit * SIDE + b].push(color_at(cell, digit));
            }
        }

        for idx in 0..RULE_COUNT {
            for i in 0..SIDE {
                let color = self.rules[idx][i];
                self.color_to_rules.insert(color, idx);
            }
        }
    }

    /// Queues the clues of a puzzle string for validation. Errors on a wrong
    /// character count, and on 9x9 boards when there are fewer than 17 clues
    /// (no unique solution can exist below that). Returns the clue count.
    pub fn populate(&mut self, puzzle: &str) -> Result<usize> {
        let chars: Vec<char> = puzzle.chars().collect();
        if chars.len() != CELLS {
            bail!("puzzle has {} characters, expected {}", chars.len(), CELLS);
        }
        let mut clues = 0;
        for (cell, ch) in chars.iter().enumerate() {
            if let Some(digit) = board::digit_from_char(*ch) {
                clues += 1;
                self.place_clue(cell, digit)?;
            }
        }
        if board::BOX == 3 && clues < 17 {
            bail!("{clues} clues cannot pin down a unique solution");
        }
        debug!("populated with {clues} clues");
        Ok(clues)
    }

    /// Queues a single given for validation; nothing propagates until the
    /// next drain.
    pub fn place_clue(&mut self, cell: usize, digit: usize) -> Result<()> {
        debug_assert!(cell < CELLS && digit < SIDE);
        self.queue_truth(board::node_at(cell, digit) as Color + 1)?;
        Ok(())
    }

    pub fn placed(&self) -> usize {
        self.placed
    }

    pub fn cells_left(&self) -> usize {
        CELLS.saturating_sub(self.placed)
    }

    /// Queues a color to be asserted true. Returns 1 if newly queued.
    pub(crate) fn queue_truth(&mut self, color: Color) -> Result<usize> {
        if cfg!(feature = "check-grid") && self.pending_truths.contains(&reverse(color)) {
            bail!("{color:+} and its reverse are both queued as true");
        }
        if self.pending_truths.contains(&color) {
            return Ok(0);
        }
        self.pending_truths.push(color);
        Ok(1)
    }

    // Drain order is front-first under check-grid and back-first otherwise;
    // the derived facts are the same either way, the scan order is not
    // something the algebra depends on.
    fn next_pending_truth(&mut self) -> Option<Color> {
        if self.pending_truths.is_empty() {
            None
        } else if cfg!(feature = "check-grid") {
            Some(self.pending_truths.remove(0))
        } else {
            self.pending_truths.pop()
        }
    }

    /// Drains the truth queue; asserting one color typically queues more, and
    /// the drain keeps going until the queue is idle.
    pub(crate) fn drain_truths(&mut self) -> Result<usize> {
        let mut drained = 0;
        while let Some(color) = self.next_pending_truth() {
            self.assert_color_true(color)?;
            drained += 1;
        }
        Ok(drained)
    }

    /// Asserts a color true: places its nodes, queues the reverse of every
    /// rule-mate, clears the rules it satisfied, and strips its reverse from
    /// everything.
    fn assert_color_true(&mut self, color: Color) -> Result<()> {
        debug_assert!(self.pending_merges.is_empty());
        trace!("asserting {color:+}");

        if self.color_to_nodes.contains(color) {
            let nodes = self.color_to_nodes.values(color).to_vec();
            for node in nodes {
                self.place(node)?;
            }
            self.color_to_nodes.erase(color);

            if self.color_to_rules.contains(color) {
                let idxs = self.color_to_rules.values(color).to_vec();
                for idx in idxs {
                    let members = self.rules[idx].clone();
                    for other in members {
                        if other != color {
                            // A duplicated color indexes the rule id once per
                            // occurrence; take them out one at a time.
                            self.color_to_rules.remove_first(other, idx);
                            self.queue_truth(reverse(other))?;
                        }
                    }
                    self.rules[idx].clear();
                }
                self.color_to_rules.erase(color);
            }
        }

        // The reverse is now false: gone from the node map and from every
        // rule it appeared in.
        let color = reverse(color);
        if self.color_to_nodes.contains(color) {
            #[cfg(feature = "check-grid")]
            {
                let nodes = self.color_to_nodes.values(color).to_vec();
                for node in nodes {
                    self.unit_counters.removed(node)?;
                }
            }
            self.color_to_nodes.erase(color);

            if self.color_to_rules.contains(color) {
                let idxs = self.color_to_rules.values(color).to_vec();
                for idx in idxs {
                    self.rules[idx].retain(|&c| c != color);
                }
                self.color_to_rules.erase(color);
            }
        }

        Ok(())
    }

    fn place(&mut self, node: NodeId) -> Result<()> {
        self.placed += 1;
        self.placements[board::cell_of(node)] = Some(node);
        #[cfg(feature = "check-grid")]
        self.unit_counters.placed(node)?;
        Ok(())
    }

    /// Queues a merge of two colors. Same absolute value means they are the
    /// same class already (or, with opposite signs, a contradiction: an
    /// error under `check-grid`, ignored otherwise). A pair is skipped if an
    /// absolute-value match is already queued in either order.
    pub(crate) fn queue_merge(&mut self, a: Color, b: Color) -> Result<usize> {
        if a.abs() == b.abs() {
            if cfg!(feature = "check-grid") && (a < 0) != (b < 0) {
                bail!("merging {a:+} with its own reverse");
            }
            return Ok(0);
        }
        let queued = self.pending_merges.chunks_exact(2).any(|pair| {
            (pair[0].abs() == a.abs() && pair[1].abs() == b.abs())
                || (pair[0].abs() == b.abs() && pair[1].abs() == a.abs())
        });
        if queued {
            return Ok(0);
        }
        self.pending_merges.push(a);
        self.pending_merges.push(b);
        Ok(1)
    }

    pub(crate) fn drain_merges(&mut self) -> Result<()> {
        loop {
            let n = self.pending_merges.len();
            if n == 0 {
                return Ok(());
            }
            let a = self.pending_merges[n - 2];
            let b = self.pending_merges[n - 1];
            self.pending_merges.truncate(n - 2);
            self.merge_pair(a, b)?;
        }
    }

    /// Rewrites color `a` into `b` (and `-a` into `-b`) across the merge
    /// queue, the node map, the rules, and the rule index. Merges can leave
    /// duplicate colors inside a rule; the scans resolve those later.
    fn merge_pair(&mut self, a: Color, b: Color) -> Result<()> {
        debug_assert!(self.pending_truths.is_empty());
        if a.abs() == b.abs() {
            if cfg!(feature = "check-grid") && (a < 0) != (b < 0) {
                bail!("merging {a:+} with its own reverse");
            }
            return Ok(());
        }
        debug!("merging {a:+} into {b:+}");

        let (mut src, mut dst) = (a, b);
        for flip in 0..2 {
            if flip != 0 {
                src = reverse(src);
                dst = reverse(dst);
            }
            // Later queued pairs must see the new name.
            for color in &mut self.pending_merges {
                if *color == src {
                    *color = dst;
                }
            }
            if self.color_to_nodes.contains(src) {
                let nodes = self.color_to_nodes.values(src).to_vec();
                for node in nodes {
                    self.color_to_nodes.insert(dst, node);
                }
                self.color_to_nodes.erase(src);
            }
            if self.color_to_rules.contains(src) {
                let idxs = self.color_to_rules.values(src).to_vec();
                for idx in idxs {
                    for slot in &mut self.rules[idx] {
                        if *slot == src {
                            *slot = dst;
                        }
                    }
                    if !self.color_to_rules.contains(dst)
                        || !self.color_to_rules.values(dst).contains(&idx)
                    {
                        self.color_to_rules.insert(dst, idx);
                    }
                }
                self.color_to_rules.erase(src);
            }
        }
        Ok(())
    }

    /// Deindexes every member of a rule and empties it.
    fn retire_rule(&mut self, idx: usize) {
        let members = self.rules[idx].clone();
        for color in members {
            self.color_to_rules.remove_all(color, idx);
        }
        self.rules[idx].clear();
    }

    /// A rule down to one color: that color is true.
    pub(crate) fn scan_singles(&mut self) -> Result<usize> {
        let mut queued = 0;
        for idx in 0..RULE_COUNT {
            if self.rules[idx].len() == 1 {
                let color = self.rules[idx][0];
                queued += self.queue_truth(color)?;
            }
        }
        Ok(queued)
    }

    /// A rule down to two colors is an exclusive pair: the first is
    /// equivalent to the reverse of the second. The rule has nothing more to
    /// say and is retired.
    pub(crate) fn scan_pairs(&mut self) -> Result<usize> {
        let mut queued = 0;
        for idx in 0..RULE_COUNT {
            if self.rules[idx].len() == 2 {
                let (x, y) = (self.rules[idx][0], self.rules[idx][1]);
                queued += self.queue_merge(x, reverse(y))?;
                self.retire_rule(idx);
            }
        }
        Ok(queued)
    }

    /// The same color twice in one rule: it cannot be the rule's single
    /// truth, so it is false.
    pub(crate) fn scan_doubled_colors(&mut self) -> Result<usize> {
        let mut queued = 0;
        for idx in 0..RULE_COUNT {
            if self.rules[idx].len() <= 2 {
                continue;
            }
            let members = self.rules[idx].clone();
            for (&x, &y) in members.iter().tuple_combinations() {
                if x == y {
                    queued += self.queue_truth(reverse(x))?;
                }
            }
        }
        Ok(queued)
    }

    /// A color and its reverse in one rule: exactly one of those two is true
    /// no matter what, so every other member is false.
    pub(crate) fn scan_tautologies(&mut self) -> Result<usize> {
        let mut queued = 0;
        for idx in 0..RULE_COUNT {
            if self.rules[idx].len() <= 2 {
                continue;
            }
            let members = self.rules[idx].clone();
            let pair = members
                .iter()
                .tuple_combinations()
                .find(|&(&x, &y)| reverse(x) == y);
            if let Some((&x, _)) = pair {
                for &other in &members {
                    if other.abs() != x.abs() {
                        queued += self.queue_truth(reverse(other))?;
                    }
                }
            }
        }
        Ok(queued)
    }

    /// Rebuilds the true-to-false adjacency from rules of size three and up
    /// (smaller rules are the scans' business): within a rule, any member
    /// being true makes every other member false. Symmetric and deduped.
    pub(crate) fn rebuild_implications(&mut self) {
        self.implications.clear();
        let colors = self.color_to_rules.keys().to_vec();
        for color in colors {
            let idxs = self.color_to_rules.values(color).to_vec();
            for idx in idxs {
                if self.rules[idx].len() <= 2 {
                    continue;
                }
                let members = self.rules[idx].clone();
                for other in members {
                    if other == color {
                        continue;
                    }
                    debug_assert!(other != reverse(color));
                    if !self.implications.contains(color)
                        || !self.implications.values(color).contains(&other)
                    {
                        self.implications.insert(color, other);
                    }
                    if !self.implications.contains(other)
                        || !self.implications.values(other).contains(&color)
                    {
                        self.implications.insert(other, color);
                    }
                }
            }
        }
    }

    /// The board as a string: one character per cell, '.' where unresolved.
    pub fn solution_string(&self) -> String {
        self.placements
            .iter()
            .map(|p| match p {
                Some(node) => board::char_from_digit(board::digit_of(*node)),
                None => '.',
            })
            .collect()
    }

    /// One character per (cell, digit) slot: the digit if that candidate is
    /// still alive, '.' if eliminated. Placed cells overwrite their own slot.
    pub fn candidates_string(&mut self) -> String {
        let mut out = vec!['.'; NODES];
        let colors = self.color_to_nodes.keys().to_vec();
        for color in colors {
            for &node in self.color_to_nodes.values(color) {
                out[node] = board::char_from_digit(board::digit_of(node));
            }
        }
        for p in &self.placements {
            if let Some(node) = p {
                out[*node] = board::char_from_digit(board::digit_of(*node));
            }
        }
        out.into_iter().collect()
    }
}

/// Per-unit candidate accounting, only under `check-grid`: placing a node
/// marks its four units satisfied (twice is an error), and eliminating a node
/// counts against its units (all `SIDE` candidates gone is an error).
#[cfg(feature = "check-grid")]
#[derive(Clone)]
struct UnitCounters {
    eliminated: ndarray::Array2<i32>,
}

#[cfg(feature = "check-grid")]
impl UnitCounters {
    const SATISFIED: i32 = CELLS as i32;

    fn new() -> UnitCounters {
        UnitCounters {
            eliminated: ndarray::Array2::zeros((4, CELLS)),
        }
    }

    /// The cell slot, then the (row, digit), (column, digit) and
    /// (box, digit) slots.
    fn unit_slots(node: NodeId) -> [usize; 4] {
        let cell = board::cell_of(node);
        let digit = board::digit_of(node);
        [
            cell,
            board::row_of(cell) * SIDE + digit,
            board::col_of(cell) * SIDE + digit,
            board::box_of(cell) * SIDE + digit,
        ]
    }

    fn placed(&mut self, node: NodeId) -> Result<()> {
        for (kind, slot) in Self::unit_slots(node).into_iter().enumerate() {
            if self.eliminated[(kind, slot)] == Self::SATISFIED {
                bail!("two placements satisfy the same unit");
            }
            self.eliminated[(kind, slot)] = Self::SATISFIED;
        }
        Ok(())
    }

    fn removed(&mut self, node: NodeId) -> Result<()> {
        for (kind, slot) in Self::unit_slots(node).into_iter().enumerate() {
            let count = &mut self.eliminated[(kind, slot)];
            if *count != Self::SATISFIED {
                *count += 1;
                if *count == SIDE as i32 {
                    bail!("every candidate for a unit was eliminated");
                }
            }
        }
        Ok(())
    }
}
