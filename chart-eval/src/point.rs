use crate::EvalError;
use serde::{Deserialize, Serialize};

/// Smallest time resolution supported by the backing time-series stores,
/// used as the fallback point duration.
pub const MIN_TIME_RESOLUTION: u64 = 5;

/// One timestamped sample of a series. `value == None` means there was no
/// measurement at this timestamp. The boolean flags and the measurement
/// timestamps are provenance metadata only and carry no chart semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Beginning of the point time window, in epoch seconds.
    pub timestamp: i64,
    pub value: Option<f64>,
    /// Time this point occupies on the X axis. Equal for all points of a
    /// chart, independent of how much data was really aggregated.
    #[serde(default = "default_point_duration")]
    pub point_duration: u64,
    /// Timestamp of the first measurement aggregated into this point, when
    /// known. Always >= `timestamp`.
    #[serde(default)]
    pub first_measurement_timestamp: Option<i64>,
    /// Timestamp of the last measurement aggregated into this point, when
    /// known. Always < `timestamp + point_duration`.
    #[serde(default)]
    pub last_measurement_timestamp: Option<i64>,
    /// Generated on the fly to fill a gap the data source did not cover.
    #[serde(default)]
    pub fake: bool,
    /// No meaningful points exist before this one.
    #[serde(default)]
    pub oldest: bool,
    /// No meaningful points exist after this one.
    #[serde(default)]
    pub newest: bool,
}

fn default_point_duration() -> u64 {
    MIN_TIME_RESOLUTION
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PointParams {
    pub point_duration: Option<u64>,
    pub first_measurement_timestamp: Option<i64>,
    pub last_measurement_timestamp: Option<i64>,
    pub fake: bool,
    pub oldest: bool,
    pub newest: bool,
}

impl Point {
    pub fn new(timestamp: i64, value: Option<f64>) -> Self {
        Self::with_params(timestamp, value, PointParams::default())
    }

    pub fn with_params(timestamp: i64, value: Option<f64>, params: PointParams) -> Self {
        Self {
            timestamp,
            value,
            point_duration: params.point_duration.unwrap_or(MIN_TIME_RESOLUTION),
            first_measurement_timestamp: params.first_measurement_timestamp,
            last_measurement_timestamp: params.last_measurement_timestamp,
            fake: params.fake,
            oldest: params.oldest,
            newest: params.newest,
        }
    }

    /// Real time in which data was aggregated in this point. Inner points
    /// span the full `point_duration`; points at the oldest/newest edge are
    /// narrowed down to their first/last measurement timestamps.
    pub fn measurement_duration(&self) -> u64 {
        let first = self.first_measurement_timestamp.unwrap_or(self.timestamp);
        let last = self
            .last_measurement_timestamp
            .unwrap_or(self.timestamp + self.point_duration as i64 - 1);

        let duration: i64 = if !self.oldest && !self.newest {
            self.point_duration as i64
        } else if self.fake {
            1
        } else if self.oldest && !self.newest {
            self.timestamp + self.point_duration as i64 - first
        } else if !self.oldest && self.newest {
            last - self.timestamp + 1
        } else {
            last - first + 1
        };

        duration.max(1) as u64
    }

    /// Same point with a different value; provenance metadata is kept.
    pub fn with_value(&self, value: Option<f64>) -> Point {
        let mut point = self.clone();
        point.value = value;
        point
    }
}

/// Builds a point array out of parallel arrays and freshly computed values.
/// Timestamps and all provenance metadata come from the FIRST array only;
/// the remaining arrays contribute nothing beyond having matching lengths.
/// This asymmetry is intentional: a transform result inherits the identity
/// of its primary operand.
pub fn merge_point_arrays(
    arrays: &[&[Point]],
    new_values: &[Option<f64>],
) -> Result<Vec<Point>, EvalError> {
    let first = arrays
        .first()
        .ok_or(EvalError::LengthMismatch(0, new_values.len()))?;
    for array in arrays {
        if array.len() != first.len() {
            return Err(EvalError::LengthMismatch(first.len(), array.len()));
        }
    }
    if new_values.len() != first.len() {
        return Err(EvalError::LengthMismatch(first.len(), new_values.len()));
    }

    Ok(first
        .iter()
        .zip(new_values.iter())
        .map(|(point, value)| point.with_value(*value))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_duration_of_inner_point_is_point_duration() {
        let point = Point::with_params(
            100,
            Some(1.0),
            PointParams {
                point_duration: Some(10),
                ..Default::default()
            },
        );
        assert_eq!(point.measurement_duration(), 10);
    }

    #[test]
    fn measurement_duration_of_fake_edge_point_is_one() {
        let point = Point::with_params(
            100,
            None,
            PointParams {
                fake: true,
                oldest: true,
                ..Default::default()
            },
        );
        assert_eq!(point.measurement_duration(), 1);
    }

    #[test]
    fn measurement_duration_narrows_at_oldest_edge() {
        let point = Point::with_params(
            100,
            Some(1.0),
            PointParams {
                point_duration: Some(10),
                first_measurement_timestamp: Some(104),
                oldest: true,
                ..Default::default()
            },
        );
        assert_eq!(point.measurement_duration(), 6);
    }

    #[test]
    fn merge_takes_flags_and_timestamps_from_first_array_only() {
        let first = vec![
            Point::with_params(
                10,
                Some(1.0),
                PointParams {
                    oldest: true,
                    ..Default::default()
                },
            ),
            Point::with_params(
                15,
                Some(2.0),
                PointParams {
                    newest: true,
                    ..Default::default()
                },
            ),
        ];
        let second = vec![
            Point::with_params(
                70,
                Some(3.0),
                PointParams {
                    fake: true,
                    newest: true,
                    ..Default::default()
                },
            ),
            Point::with_params(
                75,
                Some(4.0),
                PointParams {
                    oldest: true,
                    ..Default::default()
                },
            ),
        ];

        let merged =
            merge_point_arrays(&[&first, &second], &[Some(3.0), Some(8.0)]).expect("merge");
        assert_eq!(
            merged.iter().map(|p| p.timestamp).collect::<Vec<_>>(),
            vec![10, 15]
        );
        assert_eq!(
            merged.iter().map(|p| p.value).collect::<Vec<_>>(),
            vec![Some(3.0), Some(8.0)]
        );
        assert!(merged[0].oldest && !merged[0].fake && !merged[0].newest);
        assert!(merged[1].newest && !merged[1].fake && !merged[1].oldest);
    }

    #[test]
    fn merge_rejects_mismatched_lengths() {
        let a = vec![Point::new(1, Some(1.0)), Point::new(2, Some(2.0))];
        let b = vec![Point::new(1, Some(3.0))];
        let refs: Vec<&[Point]> = vec![&a, &b];
        let result = merge_point_arrays(&refs, &[Some(1.0), Some(2.0)]);
        assert_eq!(result, Err(EvalError::LengthMismatch(2, 1)));
    }
}
