//! Position and crossover signal series derived from a price series.

use crate::domain::indicator::IndicatorSeries;
use crate::domain::price_series::PriceSeries;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Long,
    Flat,
}

/// Crossover event on the day the position changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
    pub signal: Signal,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSeries {
    points: Vec<SignalPoint>,
}

impl SignalSeries {
    /// Long while the short average is strictly above the long one, flat
    /// otherwise (including while either average is warming up).
    pub fn from_moving_averages(
        series: &PriceSeries,
        short: &IndicatorSeries,
        long: &IndicatorSeries,
    ) -> Self {
        let mut points = Vec::with_capacity(series.len());
        let mut previous = Position::Flat;

        for (i, bar) in series.bars().iter().enumerate() {
            let short_ma = short.value_at(i);
            let long_ma = long.value_at(i);

            let position = match (short_ma, long_ma) {
                (Some(s), Some(l)) if s > l => Position::Long,
                _ => Position::Flat,
            };

            let signal = match (previous, position) {
                (Position::Flat, Position::Long) => Signal::Buy,
                (Position::Long, Position::Flat) => Signal::Sell,
                _ => Signal::Hold,
            };

            points.push(SignalPoint {
                date: bar.date,
                close: bar.close,
                short_ma,
                long_ma,
                signal,
                position,
            });
            previous = position;
        }

        Self { points }
    }

    pub fn points(&self) -> &[SignalPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.points.iter().map(|p| p.position)
    }

    pub fn buy_count(&self) -> usize {
        self.points.iter().filter(|p| p.signal == Signal::Buy).count()
    }

    pub fn sell_count(&self) -> usize {
        self.points.iter().filter(|p| p.signal == Signal::Sell).count()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Long => write!(f, "long"),
            Position::Flat => write!(f, "flat"),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "buy"),
            Signal::Sell => write!(f, "sell"),
            Signal::Hold => write!(f, "hold"),
        }
    }
}
