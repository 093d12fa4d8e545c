use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl GradeError {
    pub fn code(&self) -> &'static str {
        match self {
            GradeError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    /// Thresholds are inclusive lower bounds, checked from the top.
    pub fn from_percentage(percentage: i64) -> Self {
        match percentage {
            p if p >= 90 => LetterGrade::A,
            p if p >= 80 => LetterGrade::B,
            p if p >= 70 => LetterGrade::C,
            p if p >= 60 => LetterGrade::D,
            _ => LetterGrade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(LetterGrade::A),
            "B" => Some(LetterGrade::B),
            "C" => Some(LetterGrade::C),
            "D" => Some(LetterGrade::D),
            "F" => Some(LetterGrade::F),
            _ => None,
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    pub total_points: i64,
    pub percentage: i64,
    pub letter_grade: LetterGrade,
}

/// Half-up integer division for non-negative operands: `round(num / den)`.
fn div_round_half_up(num: i128, den: i128) -> i128 {
    (2 * num + den) / (2 * den)
}

/// Sums the selected level points and scores them against `max_points`.
///
/// Criterion weights are not applied; the stored grade is the raw point sum.
/// Percentages above 100 are kept as-is.
pub fn compute_grade<I>(points: I, max_points: i64) -> Result<GradeResult, GradeError>
where
    I: IntoIterator<Item = i64>,
{
    if max_points <= 0 {
        return Err(GradeError::InvalidArgument(format!(
            "maxPoints must be > 0 (got {max_points})"
        )));
    }

    let mut total_points: i64 = 0;
    for p in points {
        if p < 0 {
            return Err(GradeError::InvalidArgument(format!(
                "points must be >= 0 (got {p})"
            )));
        }
        total_points = total_points.checked_add(p).ok_or_else(|| {
            GradeError::InvalidArgument("points total overflows".to_string())
        })?;
    }

    let scaled = total_points
        .checked_mul(100)
        .ok_or_else(|| GradeError::InvalidArgument("points total overflows".to_string()))?;
    // The quotient is at most `scaled`, so it fits back into i64.
    let percentage = div_round_half_up(scaled as i128, max_points as i128) as i64;

    Ok(GradeResult {
        total_points,
        percentage,
        letter_grade: LetterGrade::from_percentage(percentage),
    })
}

/// The fields of a stored grade that the summary looks at.
pub trait Graded {
    fn percentage(&self) -> i64;
    fn graded_at(&self) -> DateTime<Utc>;
}

impl<G: Graded + ?Sized> Graded for &G {
    fn percentage(&self) -> i64 {
        (**self).percentage()
    }

    fn graded_at(&self) -> DateTime<Utc> {
        (**self).graded_at()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeSummary<'a, G> {
    pub best: Option<&'a G>,
    pub average: i64,
}

/// Best grade (highest percentage, most recent on ties) and the rounded mean
/// percentage. An empty slice averages to 0.
pub fn summarize_grades<G: Graded>(grades: &[G]) -> GradeSummary<'_, G> {
    let mut best: Option<&G> = None;
    // Summed in i128 so many large percentages cannot overflow.
    let mut sum: i128 = 0;

    for g in grades {
        sum += g.percentage() as i128;
        best = match best {
            None => Some(g),
            Some(b) => {
                let key = (g.percentage(), g.graded_at());
                if key >= (b.percentage(), b.graded_at()) {
                    Some(g)
                } else {
                    Some(b)
                }
            }
        };
    }

    let average = if grades.is_empty() {
        0
    } else {
        // A mean of i64 values is itself within i64.
        div_round_half_up(sum, grades.len() as i128) as i64
    };

    GradeSummary { best, average }
}
