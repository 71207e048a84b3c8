use crate::error::{BackfillError, Result};
use crate::utils::constants::{HEADER_ROWS, TABLE_CLASS};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Cell texts of one data row, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Position among the data rows, starting at 1.
    pub index: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new(index: usize, cells: Vec<String>) -> Self {
        Self { index, cells }
    }

    pub fn cell(&self, column: usize) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }
}

/// Locates the observation table in a page and splits it into raw rows.
pub struct TableParser {
    table_selector: Selector,
    row_selector: Selector,
    cell_selector: Selector,
    header_rows: usize,
}

impl TableParser {
    pub fn new() -> Result<Self> {
        Self::with_table_class(TABLE_CLASS)
    }

    pub fn with_table_class(class: &str) -> Result<Self> {
        Ok(Self {
            table_selector: parse_selector(&format!("table.{}", class))?,
            row_selector: parse_selector("tr")?,
            cell_selector: parse_selector("td")?,
            header_rows: HEADER_ROWS,
        })
    }

    pub fn with_header_rows(mut self, header_rows: usize) -> Self {
        self.header_rows = header_rows;
        self
    }

    /// Parse a page.
    ///
    /// Returns `Ok(None)` when the page carries no observation table, which
    /// is normal for months that have not been published.
    pub fn parse(&self, markup: &str) -> Result<Option<Vec<RawRow>>> {
        let document = Html::parse_document(markup);

        let Some(table) = document.select(&self.table_selector).next() else {
            debug!(bytes = markup.len(), "No observation table in page");
            return Ok(None);
        };

        let rows: Vec<RawRow> = table
            .select(&self.row_selector)
            .skip(self.header_rows)
            .enumerate()
            .map(|(i, tr)| RawRow::new(i + 1, self.cells_of(tr)))
            .collect();

        debug!(rows = rows.len(), "Parsed observation table");
        Ok(Some(rows))
    }

    fn cells_of(&self, row: ElementRef<'_>) -> Vec<String> {
        row.select(&self.cell_selector)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect()
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| BackfillError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}
