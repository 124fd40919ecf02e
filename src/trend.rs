use serde::{Deserialize, Serialize};

/// Coarse direction of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Bullish,
    Bearish,
    Unknown,
}

/// Request body for `POST /predict`. Prices are in chronological order.
#[derive(Debug, Clone, Deserialize)]
pub struct MultiTimeframePrices {
    pub prices_1d: Vec<f64>,
    pub prices_7d: Vec<f64>,
    pub prices_30d: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPrediction {
    pub trend_1d: TrendLabel,
    pub trend_7d: TrendLabel,
    pub trend_30d: TrendLabel,
}

/// Compares the last price against the first. Ties count as bearish.
pub fn classify(prices: &[f64]) -> TrendLabel {
    match prices {
        [first, .., last] => {
            if last > first {
                TrendLabel::Bullish
            } else {
                TrendLabel::Bearish
            }
        }
        _ => TrendLabel::Unknown,
    }
}

pub fn predict(prices: &MultiTimeframePrices) -> TrendPrediction {
    let prediction = TrendPrediction {
        trend_1d: classify(&prices.prices_1d),
        trend_7d: classify(&prices.prices_7d),
        trend_30d: classify(&prices.prices_30d),
    };
    tracing::debug!(?prediction, "Classified price series");
    prediction
}
