use crate::calc::{Graded, LetterGrade};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricLevel {
    pub id: String,
    pub name: String,
    pub points: i64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriteria {
    pub id: String,
    pub rubric_id: String,
    pub name: String,
    /// Percentage of the total as declared by the rubric author (0-100).
    /// Shown to graders; not used when scoring.
    pub weight: f64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rubric {
    pub id: String,
    pub name: String,
    pub criteria: Vec<RubricCriteria>,
    pub levels: Vec<RubricLevel>,
}

impl Rubric {
    pub fn weight_total(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub lesson_id: String,
    pub title: String,
    pub max_points: i64,
    pub rubric_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaGrade {
    pub criteria_id: String,
    pub level_id: String,
    pub points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    pub lesson_id: String,
    pub exercise_id: String,
    pub criteria_grades: Vec<CriteriaGrade>,
    pub total_points: i64,
    pub percentage: i64,
    pub letter_grade: LetterGrade,
    pub feedback: Option<String>,
    pub graded_by: String,
    pub graded_at: DateTime<Utc>,
}

impl Graded for Grade {
    fn percentage(&self) -> i64 {
        self.percentage
    }

    fn graded_at(&self) -> DateTime<Utc> {
        self.graded_at
    }
}

// Request payloads. Unknown fields are ignored.

#[derive(Debug, Clone, Deserialize)]
pub struct PointsEntry {
    pub points: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeGradeParams {
    #[serde(default)]
    pub criteria_grades: Vec<PointsEntry>,
    pub max_points: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaSelection {
    pub criteria_id: String,
    pub level_id: String,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGradeParams {
    pub student_id: String,
    pub exercise_id: String,
    #[serde(default)]
    pub criteria_grades: Vec<CriteriaSelection>,
    #[serde(default)]
    pub feedback: Option<String>,
    pub graded_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCriterion {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRubricParams {
    pub name: String,
    #[serde(default)]
    pub criteria: Vec<NewCriterion>,
    #[serde(default)]
    pub level_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExerciseParams {
    pub lesson_id: String,
    pub title: String,
    pub max_points: i64,
    pub rubric_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLevelParams {
    pub name: String,
    pub points: i64,
}
