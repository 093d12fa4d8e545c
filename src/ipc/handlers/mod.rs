pub mod core;
pub mod exercises;
pub mod grades;
pub mod levels;
pub mod rubrics;
