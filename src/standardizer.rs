use crate::error::ForecastError;
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Per-column z-score parameters fitted on one training matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl Standardizer {
    /// Population mean and standard deviation for each column; a zero spread is
    /// floored to 1.
    pub fn fit(matrix: &Array2<f64>) -> Result<Self, ForecastError> {
        let Some(means) = matrix.mean_axis(Axis(0)) else {
            return Err(ForecastError::NumericDegeneracy(
                "cannot fit standardizer on an empty matrix".to_string(),
            ));
        };
        let std_devs = matrix.std_axis(Axis(0), 0.0);
        if let Some(column) = means
            .iter()
            .zip(std_devs.iter())
            .position(|(mean, std_dev)| !mean.is_finite() || !std_dev.is_finite())
        {
            return Err(ForecastError::NumericDegeneracy(format!(
                "column {} has non-finite statistics",
                column
            )));
        }
        let scales = std_devs.mapv(|std_dev| if std_dev == 0.0 { 1.0 } else { std_dev });

        Ok(Self { means, scales })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> ArrayView1<f64> {
        self.means.view()
    }

    pub fn scales(&self) -> ArrayView1<f64> {
        self.scales.view()
    }

    pub fn apply(&self, row: ArrayView1<f64>) -> Result<Array1<f64>, ForecastError> {
        self.check_width(row.len())?;
        Ok((&row - &self.means) / &self.scales)
    }

    pub fn apply_all(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, ForecastError> {
        self.check_width(matrix.ncols())?;
        Ok((matrix - &self.means) / &self.scales)
    }

    fn check_width(&self, width: usize) -> Result<(), ForecastError> {
        if width != self.width() {
            return Err(ForecastError::NumericDegeneracy(format!(
                "feature row has {} values, standardizer was fitted on {}",
                width,
                self.width()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_matrix() -> Array2<f64> {
        array![
            [1.0, 10.0, 5.0],
            [2.0, 30.0, 5.0],
            [3.0, 20.0, 5.0],
            [6.0, 40.0, 5.0],
        ]
    }

    #[test]
    fn transformed_training_matrix_has_zero_mean_unit_scale() {
        let matrix = sample_matrix();
        let standardizer = Standardizer::fit(&matrix).unwrap();
        let transformed = standardizer.apply_all(&matrix).unwrap();

        for column in 0..2 {
            let values = transformed.column(column);
            let mean = values.sum() / values.len() as f64;
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            assert!(mean.abs() < 1e-12, "column {column} mean {mean}");
            assert!((variance.sqrt() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_column_uses_unit_scale() {
        let standardizer = Standardizer::fit(&sample_matrix()).unwrap();
        assert_eq!(standardizer.scales()[2], 1.0);
        let row = standardizer.apply(array![3.0, 25.0, 5.0].view()).unwrap();
        assert_eq!(row[2], 0.0);
    }

    #[test]
    fn single_row_applies_training_parameters() {
        let standardizer = Standardizer::fit(&sample_matrix()).unwrap();
        let row = standardizer.apply(array![6.0, 40.0, 5.0].view()).unwrap();
        // refitting on this one row would have produced all zeros
        assert!(row[0] > 1.0);
        assert!(row[1] > 1.0);
    }

    #[test]
    fn rejects_mismatched_width() {
        let standardizer = Standardizer::fit(&sample_matrix()).unwrap();
        assert!(matches!(
            standardizer.apply(array![1.0, 2.0].view()),
            Err(ForecastError::NumericDegeneracy(_))
        ));
        assert!(Standardizer::fit(&Array2::zeros((0, 3))).is_err());
    }
}
