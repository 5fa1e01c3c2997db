//! AggregateTable - category-by-date values shared by charting and export

use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub category: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// Rows unique per (category, date), ordered by date then category first appearance
///
/// Adding a value for an existing cell sums into it. The first time a
/// category is seen fixes its rank, which breaks ties between rows on the
/// same date.
#[derive(Debug, Clone, Default)]
pub struct AggregateTable {
    rows: Vec<AggregateRow>,
    cells: HashMap<(String, NaiveDate), usize>,
    categories: Vec<String>,
}

impl AggregateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum `value` into the (category, date) cell
    pub fn add(&mut self, category: &str, date: NaiveDate, value: f64) {
        let key = (category.to_string(), date);
        if let Some(&idx) = self.cells.get(&key) {
            self.rows[idx].value += value;
            return;
        }

        if !self.categories.iter().any(|c| c == category) {
            self.categories.push(category.to_string());
        }

        self.cells.insert(key, self.rows.len());
        self.rows.push(AggregateRow {
            category: category.to_string(),
            date,
            value,
        });
        self.reorder_tail();
    }

    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Categories in order of first appearance
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Distinct dates, ascending
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.date).collect();
        dates.dedup();
        dates
    }

    pub fn value(&self, category: &str, date: NaiveDate) -> Option<f64> {
        self.cells
            .get(&(category.to_string(), date))
            .map(|&idx| self.rows[idx].value)
    }

    /// Sum over every row
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.value).sum()
    }

    /// Per-category totals in first-appearance order
    pub fn category_totals(&self) -> Vec<(String, f64)> {
        self.categories
            .iter()
            .map(|category| {
                let total = self
                    .rows
                    .iter()
                    .filter(|r| &r.category == category)
                    .map(|r| r.value)
                    .sum();
                (category.clone(), total)
            })
            .collect()
    }

    fn category_rank(&self, category: &str) -> usize {
        self.categories
            .iter()
            .position(|c| c == category)
            .unwrap_or(usize::MAX)
    }

    /// Bubble the newly pushed row back to its sorted slot
    fn reorder_tail(&mut self) {
        let mut idx = self.rows.len() - 1;
        while idx > 0 {
            let (prev, cur) = (&self.rows[idx - 1], &self.rows[idx]);
            let prev_key = (prev.date, self.category_rank(&prev.category));
            let cur_key = (cur.date, self.category_rank(&cur.category));
            if prev_key <= cur_key {
                break;
            }
            self.rows.swap(idx - 1, idx);
            self.cells
                .insert((self.rows[idx].category.clone(), self.rows[idx].date), idx);
            self.cells.insert(
                (self.rows[idx - 1].category.clone(), self.rows[idx - 1].date),
                idx - 1,
            );
            idx -= 1;
        }
    }
}

impl PartialEq for AggregateTable {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    #[test]
    fn test_duplicate_cells_are_summed() {
        let mut table = AggregateTable::new();
        table.add("productA", date(1), 10.0);
        table.add("productA", date(1), 5.0);

        assert_eq!(table.len(), 1);
        assert_eq!(table.value("productA", date(1)), Some(15.0));
    }

    #[test]
    fn test_rows_ordered_by_date_then_first_appearance() {
        let mut table = AggregateTable::new();
        table.add("laptop", date(2), 1.0);
        table.add("phone", date(1), 2.0);
        table.add("phone", date(2), 3.0);
        table.add("laptop", date(1), 4.0);

        let order: Vec<_> = table
            .rows()
            .iter()
            .map(|r| (r.category.as_str(), r.date))
            .collect();
        assert_eq!(
            order,
            vec![
                ("laptop", date(1)),
                ("phone", date(1)),
                ("laptop", date(2)),
                ("phone", date(2)),
            ]
        );
        assert_eq!(table.categories(), &["laptop".to_string(), "phone".to_string()]);
        assert_eq!(table.dates(), vec![date(1), date(2)]);

        // Lookups survive reordering
        assert_eq!(table.value("laptop", date(1)), Some(4.0));
        table.add("laptop", date(1), 1.0);
        assert_eq!(table.value("laptop", date(1)), Some(5.0));
    }

    #[test]
    fn test_totals() {
        let mut table = AggregateTable::new();
        table.add("a", date(1), 1.5);
        table.add("b", date(1), 2.5);
        table.add("a", date(3), 1.0);

        assert_eq!(table.total(), 5.0);
        assert_eq!(
            table.category_totals(),
            vec![("a".to_string(), 2.5), ("b".to_string(), 2.5)]
        );
    }

    #[test]
    fn test_empty_table() {
        let table = AggregateTable::new();
        assert!(table.is_empty());
        assert!(table.dates().is_empty());
        assert_eq!(table.total(), 0.0);
    }
}
