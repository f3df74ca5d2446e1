//! Tabular data model: named feature matrices and attribution tables.

use crate::error::{Result, XaiError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A table of named feature columns (rows x features).
///
/// Column order is significant: every attribution produced from a matrix
/// lists its features in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(XaiError::invalid_input(format!(
                "{} feature names for {} columns",
                names.len(),
                values.ncols()
            )));
        }
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(XaiError::invalid_input(format!(
                    "duplicate feature name '{}'",
                    name
                )));
            }
        }
        Ok(Self { names, values })
    }

    /// Build a matrix from row-major data.
    pub fn from_rows<S: Into<String>>(names: Vec<S>, rows: &[Vec<f64>]) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let n_cols = names.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(XaiError::invalid_input(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                n_cols
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let values = Array2::from_shape_vec((rows.len(), n_cols), flat)?;
        Self::new(names, values)
    }

    /// Build a matrix from `(name, column)` pairs.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |(_, c)| c.len());
        let mut values = Array2::zeros((n_rows, columns.len()));
        let mut names = Vec::with_capacity(columns.len());
        for (j, (name, column)) in columns.into_iter().enumerate() {
            let name = name.into();
            if column.len() != n_rows {
                return Err(XaiError::invalid_input(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    column.len(),
                    n_rows
                )));
            }
            values.column_mut(j).assign(&Array1::from(column));
            names.push(name);
        }
        Self::new(names, values)
    }

    /// A matrix with the same feature names over different values.
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self> {
        if values.ncols() != self.names.len() {
            return Err(XaiError::invalid_input(format!(
                "expected {} columns, got {}",
                self.names.len(),
                values.ncols()
            )));
        }
        Ok(Self {
            names: self.names.clone(),
            values,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.position(name).map(|j| self.values.column(j))
    }

    /// Whether `other` has exactly the same feature names in the same order.
    pub fn same_schema(&self, other: &FeatureMatrix) -> bool {
        self.names == other.names
    }

    /// Fail unless `data` has this matrix's feature names in this order.
    pub fn ensure_schema(&self, data: &FeatureMatrix) -> Result<()> {
        if self.same_schema(data) {
            return Ok(());
        }
        Err(XaiError::invalid_input(format!(
            "features {:?} do not match the training features {:?}",
            data.names(),
            self.names
        )))
    }
}

/// Feature-indexed attribution table.
///
/// Rows are features, columns are named value columns. A single explainer's
/// global explanation has one column; a merged comparison has one column per
/// explainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionTable {
    features: Vec<String>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl AttributionTable {
    pub fn empty() -> Self {
        Self {
            features: Vec::new(),
            columns: Vec::new(),
            values: Array2::zeros((0, 0)),
        }
    }

    /// Single-column table with one value per feature.
    pub fn single(
        column: impl Into<String>,
        features: Vec<String>,
        values: Array1<f64>,
    ) -> Result<Self> {
        if features.len() != values.len() {
            return Err(XaiError::invalid_input(format!(
                "{} features for {} values",
                features.len(),
                values.len()
            )));
        }
        let n = values.len();
        Ok(Self {
            features,
            columns: vec![column.into()],
            values: values.into_shape_with_order((n, 1))?,
        })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// A table with no value columns, as returned when nothing succeeded.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, feature: &str, column: &str) -> Option<f64> {
        let i = self.features.iter().position(|f| f == feature)?;
        let j = self.columns.iter().position(|c| c == column)?;
        Some(self.values[[i, j]])
    }

    pub fn column(&self, column: &str) -> Option<ArrayView1<'_, f64>> {
        let j = self.columns.iter().position(|c| c == column)?;
        Some(self.values.column(j))
    }

    /// Iterate `(feature, values)` rows in feature order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, ArrayView1<'_, f64>)> {
        self.features
            .iter()
            .map(String::as_str)
            .zip(self.values.rows())
    }

    /// Merge labelled tables side by side, aligning rows by feature name.
    ///
    /// Rows follow `feature_order`; features only some tables know about are
    /// appended in first-seen order. Cells a table doesn't cover are NaN.
    /// Single-column tables take their label as the column name, wider ones
    /// become `label.column`.
    pub fn merge_aligned(feature_order: &[String], parts: &[(String, AttributionTable)]) -> Self {
        if parts.is_empty() {
            return Self::empty();
        }

        let mut features: Vec<String> = feature_order.to_vec();
        let mut known: HashSet<String> = features.iter().cloned().collect();
        for (_, table) in parts {
            for feature in &table.features {
                if known.insert(feature.clone()) {
                    features.push(feature.clone());
                }
            }
        }
        let row_of: HashMap<&str, usize> = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.as_str(), i))
            .collect();

        let mut columns = Vec::new();
        for (label, table) in parts {
            if table.columns.len() == 1 {
                columns.push(label.clone());
            } else {
                columns.extend(table.columns.iter().map(|c| format!("{}.{}", label, c)));
            }
        }

        let mut values = Array2::from_elem((features.len(), columns.len()), f64::NAN);
        let mut offset = 0;
        for (_, table) in parts {
            for (src_row, feature) in table.features.iter().enumerate() {
                let dst_row = row_of[feature.as_str()];
                for j in 0..table.columns.len() {
                    values[[dst_row, offset + j]] = table.values[[src_row, j]];
                }
            }
            offset += table.columns.len();
        }

        Self {
            features,
            columns,
            values,
        }
    }
}

impl fmt::Display for AttributionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let feature_width = self
            .features
            .iter()
            .map(String::len)
            .chain(std::iter::once("feature".len()))
            .max()
            .unwrap_or(7);
        let widths: Vec<usize> = self.columns.iter().map(|c| c.len().max(12)).collect();

        write!(f, "{:<feature_width$}", "feature")?;
        for (column, &width) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>width$}", column)?;
        }
        writeln!(f)?;
        for (feature, row) in self.rows() {
            write!(f, "{:<feature_width$}", feature)?;
            for (value, &width) in row.iter().zip(&widths) {
                write!(f, "  {:>width$.6}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Per-instance attributions (rows x features).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalAttributions {
    features: Vec<String>,
    values: Array2<f64>,
}

impl LocalAttributions {
    pub fn new(features: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if features.len() != values.ncols() {
            return Err(XaiError::invalid_input(format!(
                "{} features for {} attribution columns",
                features.len(),
                values.ncols()
            )));
        }
        Ok(Self { features, values })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Column-wise mean across rows as a single-column table.
    pub fn mean_by_feature(&self, column: &str) -> Result<AttributionTable> {
        let mean = self
            .values
            .mean_axis(Axis(0))
            .ok_or_else(|| XaiError::invalid_input("cannot aggregate zero rows"))?;
        AttributionTable::single(column, self.features.clone(), mean)
    }

    /// Column-wise mean of absolute values across rows.
    pub fn mean_abs_by_feature(&self, column: &str) -> Result<AttributionTable> {
        let mean = self
            .values
            .mapv(f64::abs)
            .mean_axis(Axis(0))
            .ok_or_else(|| XaiError::invalid_input("cannot aggregate zero rows"))?;
        AttributionTable::single(column, self.features.clone(), mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_feature_matrix_rejects_bad_names() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(FeatureMatrix::new(names(&["a"]), values.clone()).is_err());
        assert!(FeatureMatrix::new(names(&["a", "a"]), values.clone()).is_err());
        assert!(FeatureMatrix::new(names(&["a", "b"]), values).is_ok());
    }

    #[test]
    fn test_from_rows_and_columns_agree() {
        let by_rows =
            FeatureMatrix::from_rows(vec!["x", "y"], &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let by_columns =
            FeatureMatrix::from_columns(vec![("x", vec![1.0, 3.0]), ("y", vec![2.0, 4.0])])
                .unwrap();
        assert_eq!(by_rows, by_columns);
        assert_eq!(by_rows.column("y").unwrap().to_vec(), vec![2.0, 4.0]);
        assert!(by_rows.ensure_schema(&by_columns).is_ok());
        let reordered =
            FeatureMatrix::from_columns(vec![("y", vec![2.0, 4.0]), ("x", vec![1.0, 3.0])])
                .unwrap();
        assert!(matches!(
            by_rows.ensure_schema(&reordered),
            Err(XaiError::InvalidInput(_))
        ));
        assert_eq!(by_rows.position("missing"), None);
    }

    #[test]
    fn test_from_rows_ragged() {
        let err = FeatureMatrix::from_rows(vec!["x", "y"], &[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(err, Err(XaiError::InvalidInput(_))));
    }

    #[test]
    fn test_merge_aligns_by_name() {
        let order = names(&["a", "b", "c"]);
        let first =
            AttributionTable::single("v", names(&["a", "b", "c"]), array![1.0, 2.0, 3.0]).unwrap();
        let second =
            AttributionTable::single("v", names(&["c", "a", "b"]), array![30.0, 10.0, 20.0])
                .unwrap();

        let merged = AttributionTable::merge_aligned(
            &order,
            &[("first".to_string(), first), ("second".to_string(), second)],
        );

        assert_eq!(merged.features(), order.as_slice());
        assert_eq!(merged.columns(), names(&["first", "second"]).as_slice());
        assert_eq!(merged.get("a", "second"), Some(10.0));
        assert_eq!(merged.get("c", "second"), Some(30.0));
        assert_eq!(merged.get("b", "first"), Some(2.0));
    }

    #[test]
    fn test_merge_fills_gaps_with_nan() {
        let order = names(&["a", "b"]);
        let partial = AttributionTable::single("v", names(&["b", "z"]), array![2.0, 9.0]).unwrap();
        let merged = AttributionTable::merge_aligned(&order, &[("p".to_string(), partial)]);

        assert_eq!(merged.features(), names(&["a", "b", "z"]).as_slice());
        assert!(merged.get("a", "p").unwrap().is_nan());
        assert_eq!(merged.get("z", "p"), Some(9.0));
    }

    #[test]
    fn test_merge_nothing_is_empty() {
        let merged = AttributionTable::merge_aligned(&names(&["a"]), &[]);
        assert!(merged.is_empty());
        assert!(merged.features().is_empty());
    }

    #[test]
    fn test_local_means() {
        let local =
            LocalAttributions::new(names(&["a", "b"]), array![[1.0, -2.0], [3.0, 4.0]]).unwrap();
        let mean = local.mean_by_feature("m").unwrap();
        assert_eq!(mean.column("m").unwrap().to_vec(), vec![2.0, 1.0]);
        let mean_abs = local.mean_abs_by_feature("m").unwrap();
        assert_eq!(mean_abs.column("m").unwrap().to_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_local_mean_of_no_rows_fails() {
        let local = LocalAttributions::new(names(&["a"]), Array2::zeros((0, 1))).unwrap();
        assert!(local.mean_by_feature("m").is_err());
    }

    #[test]
    fn test_display_lists_every_feature() {
        let table = AttributionTable::single("shap", names(&["age", "income"]), array![0.5, 0.25])
            .unwrap();
        let rendered = table.to_string();
        assert!(rendered.starts_with("feature"));
        assert!(rendered.contains("age"));
        assert!(rendered.contains("0.250000"));
    }
}
