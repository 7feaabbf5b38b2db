//! Deterministic demo database: a small university with departments, people,
//! courses, enrollments and grades.

use duckdb::{params, Connection};
use std::path::Path;
use tracing::info;

const DEPARTMENTS: &[(&str, &str)] = &[
    ("Computer Science", "Building A"),
    ("Software Engineering", "Building B"),
    ("Mathematics", "Building C"),
    ("Physics", "Building D"),
    ("English", "Building E"),
    ("Economics", "Building F"),
    ("Business Administration", "Building G"),
    ("Psychology", "Building H"),
    ("Political Science", "Building I"),
    ("Electrical Engineering", "Building J"),
];

const STUDENTS: &[&str] = &[
    "Amina Yusuf", "Bruno Costa", "Chen Wei", "Dara Okafor", "Elif Demir",
    "Farah Haddad", "Goran Petrov", "Hana Sato", "Ivan Horvat", "Jonas Berg",
    "Kiran Patel", "Lucia Romero", "Mateo Silva", "Nora Lindqvist", "Omar Farouk",
];

const PROFESSORS: &[&str] = &[
    "Dr. Adeyemi", "Dr. Bianchi", "Dr. Castillo", "Dr. Dubois", "Dr. Eriksen",
    "Dr. Fischer", "Dr. Garcia", "Dr. Hoffmann", "Dr. Ibrahim", "Dr. Jensen",
];

const TITLES: &[&str] = &["Professor", "Associate Professor", "Assistant Professor"];

const COURSES: &[&str] = &[
    "Data Structures", "Algorithms", "Operating Systems", "Database Systems",
    "Artificial Intelligence", "Machine Learning", "Calculus I", "Linear Algebra",
    "Quantum Mechanics", "Business Communication", "Macroeconomics", "Microeconomics",
    "Psychology Basics", "Political Theory", "Electrical Circuits",
];

const SEMESTERS: &[&str] = &["Fall 2025", "Spring 2025", "Summer 2025"];
const GRADES: &[&str] = &["A", "B", "C", "D", "F"];

const SCHEMA: &str = r#"
DROP TABLE IF EXISTS grades;
DROP TABLE IF EXISTS enrollments;
DROP TABLE IF EXISTS courses;
DROP TABLE IF EXISTS students;
DROP TABLE IF EXISTS professors;
DROP TABLE IF EXISTS departments;

CREATE TABLE departments (
    department_id INTEGER PRIMARY KEY,
    name VARCHAR NOT NULL,
    building VARCHAR
);
CREATE TABLE students (
    student_id INTEGER PRIMARY KEY,
    name VARCHAR NOT NULL,
    age INTEGER,
    department_id INTEGER REFERENCES departments(department_id)
);
CREATE TABLE professors (
    professor_id INTEGER PRIMARY KEY,
    name VARCHAR NOT NULL,
    title VARCHAR,
    department_id INTEGER REFERENCES departments(department_id)
);
CREATE TABLE courses (
    course_id INTEGER PRIMARY KEY,
    course_name VARCHAR NOT NULL,
    credits INTEGER,
    department_id INTEGER REFERENCES departments(department_id),
    professor_id INTEGER REFERENCES professors(professor_id)
);
CREATE TABLE enrollments (
    enrollment_id INTEGER PRIMARY KEY,
    student_id INTEGER REFERENCES students(student_id),
    course_id INTEGER REFERENCES courses(course_id),
    semester VARCHAR
);
CREATE TABLE grades (
    grade_id INTEGER PRIMARY KEY,
    enrollment_id INTEGER REFERENCES enrollments(enrollment_id),
    grade VARCHAR
);
"#;

/// Creates (or recreates) the sample database at `path`.
pub fn create_sample_database(path: &Path) -> Result<(), duckdb::Error> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare("INSERT INTO departments VALUES (?, ?, ?)")?;
        for (i, (name, building)) in DEPARTMENTS.iter().enumerate() {
            stmt.execute(params![i as i32 + 1, *name, *building])?;
        }

        let department_count = DEPARTMENTS.len();

        let mut stmt = tx.prepare("INSERT INTO professors VALUES (?, ?, ?, ?)")?;
        for (i, name) in PROFESSORS.iter().enumerate() {
            stmt.execute(params![
                i as i32 + 1,
                *name,
                TITLES[i % TITLES.len()],
                ((i * 3) % department_count) as i32 + 1
            ])?;
        }

        let mut stmt = tx.prepare("INSERT INTO students VALUES (?, ?, ?, ?)")?;
        for (i, name) in STUDENTS.iter().enumerate() {
            stmt.execute(params![
                i as i32 + 1,
                *name,
                18 + (i * 5 % 8) as i32,
                ((i * 7) % department_count) as i32 + 1
            ])?;
        }

        let mut stmt = tx.prepare("INSERT INTO courses VALUES (?, ?, ?, ?, ?)")?;
        for (i, name) in COURSES.iter().enumerate() {
            stmt.execute(params![
                i as i32 + 1,
                *name,
                2 + (i % 4) as i32,
                (i % department_count) as i32 + 1,
                ((i * 3 + 1) % PROFESSORS.len()) as i32 + 1
            ])?;
        }

        // every student takes three distinct courses
        let mut enroll = tx.prepare("INSERT INTO enrollments VALUES (?, ?, ?, ?)")?;
        let mut grade = tx.prepare("INSERT INTO grades VALUES (?, ?, ?)")?;
        let mut enrollment_id = 0i32;
        for student in 0..STUDENTS.len() {
            for offset in 0..3 {
                enrollment_id += 1;
                let course = (student * 2 + offset * 5) % COURSES.len();
                enroll.execute(params![
                    enrollment_id,
                    student as i32 + 1,
                    course as i32 + 1,
                    SEMESTERS[(student + offset) % SEMESTERS.len()]
                ])?;
                grade.execute(params![
                    enrollment_id,
                    enrollment_id,
                    GRADES[(student * 3 + offset * 2) % GRADES.len()]
                ])?;
            }
        }
    }
    tx.commit()?;

    info!("Sample database created at {}", path.display());
    Ok(())
}
