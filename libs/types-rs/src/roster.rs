//! Student roster and examination records.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate student id: {0}")]
    DuplicateStudentId(StudentId),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct StudentId(String);

impl StudentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StudentId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            Err("Student id cannot be empty".to_owned())
        } else {
            Ok(Self(value))
        }
    }
}

impl TryFrom<&str> for StudentId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_owned().try_into()
    }
}

impl From<StudentId> for String {
    fn from(value: StudentId) -> Self {
        value.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CourseCode(String);

impl CourseCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CourseCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            Err("Course code cannot be empty".to_owned())
        } else {
            Ok(Self(value))
        }
    }
}

impl TryFrom<&str> for CourseCode {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_owned().try_into()
    }
}

impl From<CourseCode> for String {
    fn from(value: CourseCode) -> Self {
        value.0
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A student who may present themselves at the terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: StudentId,
    pub name: String,
    pub class: String,
    pub department: String,
    pub faculty: String,
    pub registered_courses: BTreeSet<CourseCode>,
    pub face_id: String,
    pub fingerprint_id: String,
}

impl Identity {
    pub fn is_registered_for(&self, course_code: &CourseCode) -> bool {
        self.registered_courses.contains(course_code)
    }
}

/// The examination this terminal admits students to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExaminationSession {
    pub course_code: CourseCode,
    pub course_name: String,
    pub exam_date: String,
    pub exam_time: String,
    pub duration: String,
    pub venue: String,
}

impl ExaminationSession {
    /// The built-in examination used when no exam file is configured.
    pub fn sample() -> Self {
        Self {
            course_code: code("CSC401"),
            course_name: "Advanced Database Systems".to_owned(),
            exam_date: "2024-07-19".to_owned(),
            exam_time: "09:00 AM".to_owned(),
            duration: "3 hours".to_owned(),
            venue: "Computer Lab A".to_owned(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        Ok(serde_json::from_str(&read(path.as_ref())?)?)
    }
}

/// The set of students the biometric provider can match against. Student ids
/// are unique.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Roster {
    students: Vec<Identity>,
}

#[derive(Deserialize)]
struct RosterFile {
    students: Vec<Identity>,
}

impl Roster {
    pub fn new(students: Vec<Identity>) -> Result<Self, RosterError> {
        let mut seen = HashSet::with_capacity(students.len());
        for student in &students {
            if !seen.insert(&student.id) {
                return Err(RosterError::DuplicateStudentId(student.id.clone()));
            }
        }
        Ok(Self { students })
    }

    pub fn from_json(json: &str) -> Result<Self, RosterError> {
        let file: RosterFile = serde_json::from_str(json)?;
        Self::new(file.students)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        Self::from_json(&read(path.as_ref())?)
    }

    /// The five sample students the terminal ships with.
    pub fn sample() -> Self {
        let student = |id: &str, name: &str, class: &str, department: &str, courses: &[&str]| {
            let n = &id[3..];
            Identity {
                id: StudentId(id.to_owned()),
                name: name.to_owned(),
                class: class.to_owned(),
                department: department.to_owned(),
                faculty: "Faculty of Science".to_owned(),
                registered_courses: courses.iter().copied().map(code).collect(),
                face_id: format!("face_{n}"),
                fingerprint_id: format!("fp_{n}"),
            }
        };

        Self {
            students: vec![
                student(
                    "STU001",
                    "John Doe",
                    "Computer Science 400L",
                    "Computer Science",
                    &["CSC401", "CSC402", "CSC403", "CSC404", "CSC405"],
                ),
                student(
                    "STU002",
                    "Jane Smith",
                    "Computer Science 300L",
                    "Computer Science",
                    &["CSC301", "CSC302", "CSC303", "CSC304"],
                ),
                student(
                    "STU003",
                    "Michael Johnson",
                    "Computer Science 400L",
                    "Computer Science",
                    &["CSC401", "CSC403", "CSC405", "CSC406"],
                ),
                student(
                    "STU004",
                    "Sarah Williams",
                    "Information Technology 300L",
                    "Information Technology",
                    &["IT301", "IT302", "IT303", "CSC401"],
                ),
                student(
                    "STU005",
                    "David Brown",
                    "Computer Science 200L",
                    "Computer Science",
                    &["CSC201", "CSC202", "CSC203", "MTH201"],
                ),
            ],
        }
    }

    pub fn get(&self, id: &StudentId) -> Option<&Identity> {
        self.students.iter().find(|student| student.id == *id)
    }

    pub fn students(&self) -> &[Identity] {
        &self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

fn code(value: &str) -> CourseCode {
    CourseCode(value.to_owned())
}

fn read(path: &Path) -> Result<String, RosterError> {
    std::fs::read_to_string(path).map_err(|source| RosterError::Io {
        path: path.display().to_string(),
        source,
    })
}
