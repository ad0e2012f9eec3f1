/*
 pbprod
 Copyright 2024-2025 Peter Pearson.
 Licensed under the Apache License, Version 2.0 (the "License");
 You may not use this file except in compliance with the License.
 You may obtain a copy of the License at
 http://www.apache.org/licenses/LICENSE-2.0
 Unless required by applicable law or agreed to in writing, software
 distributed under the License is distributed on an "AS IS" BASIS,
 WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 See the License for the specific language governing permissions and
 limitations under the License.
 ---------
*/

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Alignment {
    Left,
    Right
}

/// Prints rows of strings as space-padded columns, optionally with a title
/// row and an underline.
pub struct ColumnListPrinter {
    num_columns:    usize,
    alignments:     Vec<Alignment>,
    titles:         Option<Vec<String>>,
    rows:           Vec<Vec<String>>,
}

impl ColumnListPrinter {
    pub fn new(num_columns: usize) -> ColumnListPrinter {
        ColumnListPrinter { num_columns, alignments: vec![Alignment::Left; num_columns], titles: None, rows: Vec::new() }
    }

    pub fn set_alignment(mut self, column: usize, alignment: Alignment) -> Self {
        if let Some(align) = self.alignments.get_mut(column) {
            *align = alignment;
        }
        self
    }

    pub fn set_alignment_multiple(mut self, columns: &[usize], alignment: Alignment) -> Self {
        for column in columns {
            self = self.set_alignment(*column, alignment);
        }
        self
    }

    pub fn add_titles<const N: usize>(mut self, titles: [&str; N]) -> Self {
        self.titles = Some(self.fit_row(&titles));
        self
    }

    pub fn add_row_strings(&mut self, row: &[&str]) {
        let row = self.fit_row(row);
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    // pads or truncates to the column count
    fn fit_row(&self, row: &[&str]) -> Vec<String> {
        let mut fitted: Vec<String> = row.iter().take(self.num_columns).map(|s| s.to_string()).collect();
        fitted.resize(self.num_columns, String::new());
        fitted
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0; self.num_columns];
        for row in self.titles.iter().chain(self.rows.iter()) {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }

    fn write_row(&self, f: &mut fmt::Formatter<'_>, row: &[String], widths: &[usize]) -> fmt::Result {
        let mut line = String::new();
        for (index, cell) in row.iter().enumerate() {
            if index > 0 {
                line.push_str("  ");
            }
            let width = widths[index];
            match self.alignments[index] {
                Alignment::Left  => line.push_str(&format!("{:<width$}", cell, width = width)),
                Alignment::Right => line.push_str(&format!("{:>width$}", cell, width = width)),
            }
        }
        writeln!(f, "{}", line.trim_end())
    }
}

impl fmt::Display for ColumnListPrinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();

        if let Some(titles) = &self.titles {
            self.write_row(f, titles, &widths)?;
            let total = widths.iter().sum::<usize>() + 2 * self.num_columns.saturating_sub(1);
            writeln!(f, "{}", "-".repeat(total))?;
        }

        for row in &self.rows {
            self.write_row(f, row, &widths)?;
        }

        Ok(())
    }
}
