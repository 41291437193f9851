use serde::{Deserialize, Serialize};

/// One extracted teacher profile.
///
/// Count and rating fields are kept as the page renders them; no numeric
/// parsing happens here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherRecord {
    pub rating: String,
    pub student_count: String,
    pub lesson_count: String,
    /// Attendance percentage with its unit character removed.
    pub attendance: String,
    /// First `\d+\.\d+` token of the price block, if any.
    pub price: Option<String>,
    pub about: String,
    pub as_teacher: String,
    pub teaching_style: String,
    pub languages_taught: Vec<String>,
    pub country: String,
}
