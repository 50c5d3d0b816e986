//! Short-term forecasting of a value series.
//!
//! Histories that end in a period-2 alternation continue the alternation;
//! anything else is smoothed (pairwise moving average, then centered moving
//! average) and extrapolated along a least-squares line.

use std::fmt;
use tracing::debug;


/// Largest forecast a single call may produce
pub const MAX_STEPS: usize = 10_000;

/// Prediction errors
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionError {
    EmptyHistory,
    /// Too few points to fit a line through the centered series
    Degenerate { points: usize },
    NonFinite,
    TooManySteps { requested: usize },
}

impl fmt::Display for PredictionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionError::EmptyHistory => write!(f, "cannot predict from an empty history"),
            PredictionError::Degenerate { points } => write!(
                f,
                "extrapolation needs at least 2 centered points, got {}",
                points
            ),
            PredictionError::NonFinite => write!(f, "history contains non-finite values"),
            PredictionError::TooManySteps { requested } => write!(
                f,
                "cannot forecast {} steps, at most {} allowed",
                requested, MAX_STEPS
            ),
        }
    }
}

impl std::error::Error for PredictionError {}

/// Forecasts the next `n` values of an entity's history.
pub fn predict(entity_id: u32, n: usize, history: &[f64]) -> Result<Vec<f64>, PredictionError> {
    let predicted = find_pattern(history, n)?;
    debug!(
        entity_id = entity_id,
        history = history.len(),
        n = n,
        "Predicted next values"
    );
    Ok(predicted)
}

/// Picks the forecasting strategy for a history.
///
/// - 1 value: repeat it
/// - 2 values: alternate them, starting from the first
/// - 3 values: extrapolate
/// - more: continue a period-2 alternation found in the final four values,
///   otherwise extrapolate over the whole history
pub fn find_pattern(history: &[f64], n: usize) -> Result<Vec<f64>, PredictionError> {
    if n > MAX_STEPS {
        return Err(PredictionError::TooManySteps { requested: n });
    }
    if history.iter().any(|v| !v.is_finite()) {
        return Err(PredictionError::NonFinite);
    }

    match history {
        [] => Err(PredictionError::EmptyHistory),
        [only] => Ok(vec![*only; n]),
        [a, b] => Ok(alternate(*a, *b, n)),
        [_, _, _] => extrapolate(history, n),
        [.., w0, w1, w2, w3] => {
            if w0 == w2 && w1 == w3 && w0 != w1 {
                // [a, b, a, b] continues with a
                Ok(alternate(*w2, *w3, n))
            } else {
                extrapolate(history, n)
            }
        }
    }
}

/// `first, second, first, second, ...` for `n` steps
fn alternate(first: f64, second: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| if i % 2 == 0 { first } else { second })
        .collect()
}

/// Extrapolates a non-alternating trend.
///
/// The forecast series starts with the first value followed by the average
/// of each consecutive pair; its centered moving average is fitted with a
/// least-squares line over indices `0..k`, and the points at `k+1 ..= k+n`
/// are returned (the point at `k` anchors the projection and is skipped).
pub fn extrapolate(history: &[f64], n: usize) -> Result<Vec<f64>, PredictionError> {
    if n > MAX_STEPS {
        return Err(PredictionError::TooManySteps { requested: n });
    }
    if history.is_empty() {
        return Err(PredictionError::EmptyHistory);
    }

    let mut forecast = Vec::with_capacity(history.len());
    forecast.push(history[0]);
    forecast.extend(history.windows(2).map(|w| (w[0] + w[1]) / 2.0));

    let centered: Vec<f64> = forecast.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    if centered.len() < 2 {
        return Err(PredictionError::Degenerate {
            points: centered.len(),
        });
    }

    let (slope, intercept) = least_squares(&centered);
    let k = centered.len();

    Ok((1..=n)
        .map(|step| slope * (k + step) as f64 + intercept)
        .collect())
}

/// Fits `y = slope * x + intercept` over points `(i, ys[i])`.
fn least_squares(ys: &[f64]) -> (f64, f64) {
    let count = ys.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let x = i as f64;
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }

    let slope = (count * sxy - sx * sy) / (count * sxx - sx * sx);
    let intercept = (sy - slope * sx) / count;
    (slope, intercept)
}
