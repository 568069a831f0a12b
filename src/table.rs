//! Plain-text table with column alignment

use std::fmt;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, Default)]
struct Column {
    width: usize,
    align: Align,
}

/// Rows of cells padded to the widest cell of each column
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Table with `columns` left-aligned columns
    pub fn new(columns: usize) -> Self {
        Self {
            columns: vec![Column::default(); columns],
            rows: Vec::new(),
        }
    }

    /// Table whose first column (row indices) is right-aligned
    pub fn indexed(columns: usize) -> Self {
        Self::new(columns).align(0, Align::Right)
    }

    /// Set the alignment of `column`
    pub fn align(mut self, column: usize, align: Align) -> Self {
        if let Some(col) = self.columns.get_mut(column) {
            col.align = align;
        }
        self
    }

    /// Add a row; cells beyond the column count are dropped
    pub fn add_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let row: Vec<String> = cells
            .into_iter()
            .take(self.columns.len())
            .map(|c| c.to_string())
            .collect();
        for (cell, col) in row.iter().zip(self.columns.iter_mut()) {
            col.width = col.width.max(cell.chars().count());
        }
        self.rows.push(row);
    }

    /// Whether no rows were added
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Write the aligned rows, one per line
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", self)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            let mut line = String::new();
            for (i, (cell, col)) in row.iter().zip(&self.columns).enumerate() {
                if i > 0 {
                    line.push(' ');
                }
                let pad = " ".repeat(col.width - cell.chars().count());
                match col.align {
                    Align::Left => {
                        line.push_str(cell);
                        line.push_str(&pad);
                    }
                    Align::Right => {
                        line.push_str(&pad);
                        line.push_str(cell);
                    }
                }
            }
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        let mut table = Table::indexed(3);
        table.add_row(["0", "write report", "Active"]);
        table.add_row(["10", "ship", "New"]);
        assert_eq!(
            table.to_string(),
            " 0 write report Active\n10 ship         New\n"
        );
    }

    #[test]
    fn test_extra_cells_dropped() {
        let mut table = Table::new(1);
        table.add_row(["a", "b"]);
        assert_eq!(table.to_string(), "a\n");
        assert_eq!(table.len(), 1);
    }
}
