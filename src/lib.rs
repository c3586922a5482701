pub mod board;
mod chains;
pub mod color;
pub mod grid;
pub mod grid_solve;

#[cfg(test)]
mod tests {
    use crate::grid::Grid;

    // The intended usage pattern: seed the rule store once, clone per puzzle.
    #[test]
    #[cfg(not(feature = "hexadoku"))]
    fn one_base_grid_serves_many_puzzles() {
        let base = Grid::new();
        let puzzle =
            "530070000600195000098000060800060003400803001700020006060000280000419005000080079";

        let mut first = base.clone();
        first.populate(puzzle).unwrap();
        let first_report = first.plain_solve().unwrap();

        let mut second = base.clone();
        second.populate(puzzle).unwrap();
        let second_report = second.plain_solve().unwrap();

        assert_eq!(first_report.cells_left, 0);
        assert_eq!(first_report.solution, second_report.solution);
        assert_eq!(first_report.passes, second_report.passes);
        assert_eq!(base.placed(), 0);
    }
}
