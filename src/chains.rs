//! The graph-side inferences: equivalence merging over the implication
//! graph's strongly connected components, and the two contradiction sweeps.
//!
//! Both walk the doubled vertex space (color, polarity). Every vertex reaches
//! the opposite polarity of its reverse (exactly one of a color and its
//! reverse holds), and a true vertex additionally reaches `(f, false)` for
//! every `f` its color implies false. Depth is bounded by the doubled vertex
//! count, so plain recursion is fine for the supported board sizes.

use anyhow::{Result, bail};
use log::debug;

use crate::board::RULE_COUNT;
use crate::color::{Color, Vertex, VertexMap, reverse};
use crate::grid::Grid;

struct SccScratch {
    next_index: i32,
    indices: VertexMap,
    low_links: VertexMap,
    stack: Vec<Vertex>,
}

impl SccScratch {
    fn new() -> SccScratch {
        SccScratch {
            next_index: 0,
            indices: VertexMap::new(),
            low_links: VertexMap::new(),
            stack: Vec::new(),
        }
    }

    fn on_stack(&self, v: Vertex) -> bool {
        self.stack.contains(&v)
    }
}

impl Grid {
    /// Finds strongly connected components among the doubled vertices and
    /// queues a merge for every component of two or more vertices: its
    /// members are logically equivalent literals. Returns the number of
    /// merges queued.
    pub(crate) fn merge_components(&mut self) -> Result<usize> {
        debug!("searching for equivalent components");
        let mut scratch = SccScratch::new();
        let mut queued = 0;
        let colors = self.color_to_nodes.keys().to_vec();
        for color in colors {
            let v = Vertex::new(color, true);
            if !scratch.indices.contains(v) {
                queued += self.strong_connect(&mut scratch, v)?;
            }
        }
        Ok(queued)
    }

    fn strong_connect(&mut self, scratch: &mut SccScratch, v: Vertex) -> Result<usize> {
        let mut queued = 0;
        scratch.next_index += 1;
        let index = scratch.next_index;
        scratch.indices.set(v, index);
        scratch.low_links.set(v, index);
        scratch.stack.push(v);

        let mut targets = vec![reverse(v.color)];
        if v.truth && self.implications.contains(v.color) {
            targets.extend_from_slice(self.implications.values(v.color));
        }
        for color in targets {
            let w = Vertex::new(color, !v.truth);
            if !scratch.indices.contains(w) {
                queued += self.strong_connect(scratch, w)?;
                if scratch.low_links.get(w) < scratch.low_links.get(v) {
                    let low = scratch.low_links.get(w);
                    scratch.low_links.set(v, low);
                }
            } else if scratch.on_stack(w) {
                if scratch.indices.get(w) < scratch.low_links.get(v) {
                    let low = scratch.indices.get(w);
                    scratch.low_links.set(v, low);
                }
            }
        }

        if scratch.low_links.get(v) == scratch.indices.get(v) {
            // `v` roots a component; everything above it on the stack belongs
            // to it. Merge each member into the first one popped, under its
            // signed reading (a false vertex stands for the reverse color).
            let mut first: Option<Color> = None;
            while let Some(y) = scratch.stack.pop() {
                let signed = if y.truth { y.color } else { reverse(y.color) };
                match first {
                    None => first = Some(signed),
                    Some(root) => queued += self.queue_merge(root, signed)?,
                }
                if y == v {
                    break;
                }
            }
        }
        Ok(queued)
    }

    /// Hypothesizes every live color true in turn; a contradiction proves the
    /// color false and queues its reverse. Returns the number queued.
    pub(crate) fn refute_colors(&mut self) -> Result<usize> {
        debug!("sweeping single hypotheses");
        let baseline = self.rule_arity_baseline();
        let mut remaining = vec![0; RULE_COUNT];
        let mut visited = VertexMap::new();
        let mut queued = 0;

        let colors = self.color_to_nodes.keys().to_vec();
        for color in colors {
            remaining.copy_from_slice(&baseline);
            visited.clear();
            if self.contradicts(&mut visited, &mut remaining, Vertex::new(color, true)) {
                queued += self.queue_truth(reverse(color))?;
            }
        }
        Ok(queued)
    }

    /// The expensive second level: for a hypothesis color, if some other
    /// color contradicts the hypothesis' consequence tree under *both* of its
    /// own polarities, the hypothesis is impossible no matter what: queue
    /// its reverse and stop (one find per sweep is enough).
    ///
    /// A hypothesis already contradictory on its own is a hard error here:
    /// the single-hypothesis sweep ran first and must have eliminated it.
    pub(crate) fn refute_by_case_split(&mut self) -> Result<usize> {
        debug!("sweeping paired hypotheses");
        let baseline = self.rule_arity_baseline();
        let mut remaining = vec![0; RULE_COUNT];
        let mut remaining_snap = vec![0; RULE_COUNT];
        let mut visited = VertexMap::new();
        let mut visited_snap = VertexMap::new();
        let mut queued = 0;

        let colors = self.color_to_nodes.keys().to_vec();
        for &color in &colors {
            remaining.copy_from_slice(&baseline);
            visited.clear();
            if self.contradicts(&mut visited, &mut remaining, Vertex::new(color, true)) {
                bail!("the single-hypothesis sweep left {color:+} refutable");
            }
            visited_snap.copy_from(&visited);
            remaining_snap.copy_from_slice(&remaining);

            for &other in &colors {
                if other.abs() == color.abs() {
                    continue;
                }
                visited.copy_from(&visited_snap);
                remaining.copy_from_slice(&remaining_snap);
                if !self.contradicts(&mut visited, &mut remaining, Vertex::new(other, true)) {
                    continue;
                }
                visited.copy_from(&visited_snap);
                remaining.copy_from_slice(&remaining_snap);
                if self.contradicts(
                    &mut visited,
                    &mut remaining,
                    Vertex::new(reverse(other), true),
                ) {
                    queued += self.queue_truth(reverse(color))?;
                    if queued > 0 {
                        return Ok(queued);
                    }
                }
            }
        }
        Ok(queued)
    }

    fn rule_arity_baseline(&self) -> Vec<i32> {
        self.rules.iter().map(|rule| rule.len() as i32).collect()
    }

    /// Depth-first consequence walk. Falsified colors pay into their rules'
    /// arity counters: a rule hitting 0 has no true member left (the walk
    /// reports the contradiction), and a rule hitting 1 forces its one
    /// not-yet-falsified member true. A color met under both polarities on
    /// one walk is the other contradiction. Counter updates are not rolled
    /// back; callers re-seed `remaining` per hypothesis.
    fn contradicts(&self, visited: &mut VertexMap, remaining: &mut [i32], v: Vertex) -> bool {
        visited.set(v, 1);

        if !v.truth && self.color_to_rules.contains(v.color) {
            let idxs = self.color_to_rules.values(v.color);
            for &idx in idxs {
                remaining[idx] -= 1;
                debug_assert!(remaining[idx] >= 0);
            }
            for &idx in idxs {
                match remaining[idx] {
                    0 => return true,
                    1 => {
                        for &color in &self.rules[idx] {
                            if !visited.contains(Vertex::new(color, false)) {
                                if self.contradicts(visited, remaining, Vertex::new(color, true)) {
                                    return true;
                                }
                                break;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let tautology = [reverse(v.color)];
        let implied: &[Color] = if v.truth && self.implications.contains(v.color) {
            self.implications.values(v.color)
        } else {
            &[]
        };
        for &color in tautology.iter().chain(implied) {
            let w = Vertex::new(color, !v.truth);
            let clash = Vertex::new(color, v.truth);
            if visited.contains(clash) {
                return true;
            }
            if !visited.contains(w) && self.contradicts(visited, remaining, w) {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{NODES, node_at};

    fn color_at(cell: usize, digit: usize) -> Color {
        node_at(cell, digit) as Color + 1
    }

    /// Empties the rule store so a test can hand-build a tiny rule system.
    fn scaffold(rules: &[(usize, Vec<Color>)]) -> Grid {
        let mut grid = Grid::new();
        grid.rules.iter_mut().for_each(Vec::clear);
        grid.color_to_rules.clear();
        for (idx, members) in rules {
            for &color in members {
                grid.color_to_rules.insert(color, *idx);
            }
            grid.rules[*idx] = members.clone();
        }
        grid
    }

    #[test]
    #[cfg(not(feature = "hexadoku"))]
    fn implications_are_symmetric_and_skip_small_rules() {
        let mut grid = Grid::new();
        grid.populate(
            "530070000600195000098000060800060003\
             400803001700020006060000280000419005000080079",
        )
        .unwrap();
        grid.drain_truths().unwrap();
        grid.rebuild_implications();

        let colors = grid.implications.keys().to_vec();
        assert!(!colors.is_empty());
        for &c in &colors {
            for &f in grid.implications.values(c) {
                assert_ne!(f, c);
                assert_ne!(f, reverse(c));
                assert!(
                    grid.implications.values(f).contains(&c),
                    "{c:+} implies {f:+} false but not vice versa"
                );
            }
        }

        let mut pair = scaffold(&[(0, vec![7, 21])]);
        pair.rebuild_implications();
        assert!(pair.implications.keys().is_empty());
    }

    #[test]
    fn component_merge_unifies_equivalent_literals() {
        // Rule {1, 2, x} plus rule {-1, -2, y} force 1 and -2 equivalent:
        // if 1 is false, -1 is true, so -2 must be false, i.e. 2 is true.
        // The first rule already makes 1 and 2 exclusive.
        let mut grid = scaffold(&[
            (0, vec![1, 2, color_at(3, 0)]),
            (1, vec![-1, -2, color_at(4, 0)]),
        ]);
        grid.rebuild_implications();
        let queued = grid.merge_components().unwrap();
        assert!(queued > 0);
        grid.drain_merges().unwrap();

        let class_of = |grid: &mut Grid, node| {
            let colors = grid.color_to_nodes.keys().to_vec();
            colors
                .into_iter()
                .find(|&c| grid.color_to_nodes.values(c).contains(&node))
                .unwrap()
        };
        let one = class_of(&mut grid, node_at(0, 0));
        let two = class_of(&mut grid, node_at(0, 1));
        assert_eq!(one, reverse(two));

        // Nothing lost, nothing duplicated across the whole node map.
        let mut seen = vec![false; NODES];
        let colors = grid.color_to_nodes.keys().to_vec();
        for c in colors {
            for &node in grid.color_to_nodes.values(c) {
                assert!(!seen[node]);
                seen[node] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn single_sweep_refutes_an_impossible_hypothesis() {
        // {1, 2, 3} and {1, 2, -3} cannot both have exactly one true member
        // if 1 is true: 3 and -3 would both end up false.
        let mut grid = scaffold(&[(0, vec![1, 2, 3]), (1, vec![1, 2, -3])]);
        grid.rebuild_implications();
        let queued = grid.refute_colors().unwrap();
        assert!(queued > 0);
        assert!(grid.pending_truths.contains(&-1));
    }

    #[test]
    fn single_sweep_stays_quiet_on_a_consistent_system() {
        let mut grid = scaffold(&[(0, vec![1, 2, 3])]);
        grid.rebuild_implications();
        assert_eq!(grid.refute_colors().unwrap(), 0);
        assert!(grid.pending_truths.is_empty());
    }

    #[test]
    fn case_split_requires_a_clean_single_sweep() {
        // The paired sweep assumes the single sweep ran to quiescence; a
        // still-refutable color is a precondition violation, not a finding.
        let mut grid = scaffold(&[(0, vec![1, 2, 3]), (1, vec![1, 2, -3])]);
        grid.rebuild_implications();
        assert!(grid.refute_by_case_split().is_err());
    }

    #[test]
    fn sweeps_find_nothing_on_a_fresh_board() {
        let mut grid = Grid::new();
        grid.rebuild_implications();
        assert_eq!(grid.merge_components().unwrap(), 0);
        assert_eq!(grid.refute_colors().unwrap(), 0);
        assert!(grid.pending_truths.is_empty());
        assert!(grid.pending_merges.is_empty());
    }
}
