/**
 * School Principal Resolvers
 *
 * Relationship lookups that decide who hears about a grade, attendance or
 * assignment change. They read the school schema owned by the CRUD side of
 * the application:
 *
 * ```text
 * classes(id, teacher_id)
 * enrollments(class_id, student_id)
 * grades(id, student_id, class_id)
 * attendance(id, student_id, class_id)
 * assignments(id, class_id)
 * parent_students(parent_id, student_id)   -- optional
 * ```
 *
 * Identifiers are compared as text so integer and UUID keys both work.
 *
 * A deleted row can no longer be joined, so when the row is gone the
 * resolver falls back to `studentId` / `teacherId` hints in the change
 * payload. Guardian lookup is best effort: a missing `parent_students`
 * table or a failing query only drops the guardians.
 */

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::backend::error::SyncError;
use crate::backend::sync::PrincipalResolver;

/// Entity kinds with built-in resolvers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchoolEntity {
    Grade,
    Attendance,
    Assignment,
}

impl SchoolEntity {
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::Grade => "grades",
            Self::Attendance => "attendance",
            Self::Assignment => "assignments",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Grade => "grade",
            Self::Attendance => "attendance",
            Self::Assignment => "assignment",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Grade => "Grade",
            Self::Attendance => "Attendance",
            Self::Assignment => "Assignment",
        }
    }

    pub const ALL: [SchoolEntity; 3] = [Self::Grade, Self::Attendance, Self::Assignment];
}

/// Owner and teacher of a student-scoped record
#[derive(Debug, Default, sqlx::FromRow)]
struct StudentRecordRow {
    student_id: Option<String>,
    teacher_id: Option<String>,
}

/// Resolver for one [`SchoolEntity`] over the school schema
#[derive(Debug, Clone)]
pub struct SchoolResolver {
    pool: PgPool,
    entity: SchoolEntity,
}

impl SchoolResolver {
    pub fn new(pool: PgPool, entity: SchoolEntity) -> Self {
        Self { pool, entity }
    }

    fn query_error(&self, err: sqlx::Error) -> SyncError {
        SyncError::resolution(self.entity.entity_type(), err.to_string())
    }

    /// Student, class teacher and guardians of a grade or attendance row
    async fn student_record(&self, entity_id: &str, payload: &Value) -> Result<Vec<String>, SyncError> {
        let sql = match self.entity {
            SchoolEntity::Grade => {
                r#"
                SELECT r.student_id::text AS student_id, c.teacher_id::text AS teacher_id
                FROM grades r
                LEFT JOIN classes c ON c.id = r.class_id
                WHERE r.id::text = $1
                "#
            }
            _ => {
                r#"
                SELECT r.student_id::text AS student_id, c.teacher_id::text AS teacher_id
                FROM attendance r
                LEFT JOIN classes c ON c.id = r.class_id
                WHERE r.id::text = $1
                "#
            }
        };

        let row = sqlx::query_as::<_, StudentRecordRow>(sql)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.query_error(e))?
            .unwrap_or_else(|| StudentRecordRow {
                student_id: payload_hint(payload, "studentId"),
                teacher_id: payload_hint(payload, "teacherId"),
            });

        let mut principals = Vec::new();
        if let Some(student_id) = row.student_id {
            principals.extend(self.guardians_of(&student_id).await);
            principals.push(student_id);
        }
        principals.extend(row.teacher_id);
        Ok(principals)
    }

    /// Class teacher and enrolled students of an assignment
    async fn assignment(&self, entity_id: &str, payload: &Value) -> Result<Vec<String>, SyncError> {
        let teacher: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT c.teacher_id::text
            FROM assignments a
            JOIN classes c ON c.id = a.class_id
            WHERE a.id::text = $1
            "#,
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| self.query_error(e))?;

        let students: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT e.student_id::text
            FROM enrollments e
            JOIN assignments a ON a.class_id = e.class_id
            WHERE a.id::text = $1
            "#,
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.query_error(e))?;

        let mut principals = students;
        match teacher {
            Some(teacher) => principals.extend(teacher),
            None => principals.extend(payload_hint(payload, "teacherId")),
        }
        Ok(principals)
    }

    async fn guardians_of(&self, student_id: &str) -> Vec<String> {
        let result = sqlx::query_scalar::<_, String>(
            "SELECT parent_id::text FROM parent_students WHERE student_id::text = $1",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await;

        match result {
            Ok(guardians) => guardians,
            Err(e) => {
                tracing::debug!(student_id, "[Router] Guardian lookup skipped: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl PrincipalResolver for SchoolResolver {
    async fn resolve(&self, entity_id: &str, payload: &Value) -> Result<Vec<String>, SyncError> {
        match self.entity {
            SchoolEntity::Grade | SchoolEntity::Attendance => {
                self.student_record(entity_id, payload).await
            }
            SchoolEntity::Assignment => self.assignment(entity_id, payload).await,
        }
    }
}

/// String form of a top-level id field in a change payload
///
/// Accepts both strings and numbers, so `{"studentId": 7}` yields `"7"`.
pub fn payload_hint(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
