//! Annotation store: user-entered workflow fields keyed by project id.
//!
//! Annotations live apart from the spreadsheet rows and are related to them
//! only by matching `project_id` against the values of a sheet's id column.
use crate::database::Store;
use crate::error::TrackerError;
use duckdb::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Tri-state workflow flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Flag {
    Yes,
    #[default]
    No,
    Unknown,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "unknown" => Ok(Self::Unknown),
            _ => Err(TrackerError::InvalidFlag(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Flag {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A project's workflow record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    /// `None` until the record is first written
    pub id: Option<i64>,
    pub project_id: String,
    pub data: Option<String>,
    pub is_complex: Flag,
    pub forested: Flag,
    pub recalculation: Flag,
    pub cfd: Flag,
    pub checker: Option<String>,
}

impl Annotation {
    /// Unsaved record with every flag at its default.
    pub fn new(project_id: &str) -> Self {
        Self {
            id: None,
            project_id: project_id.to_owned(),
            data: None,
            is_complex: Flag::default(),
            forested: Flag::default(),
            recalculation: Flag::default(),
            cfd: Flag::default(),
            checker: None,
        }
    }
}

/// Fields supplied to an upsert. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnotationUpdate {
    pub data: Option<String>,
    #[serde(alias = "complex")]
    pub is_complex: Option<Flag>,
    pub forested: Option<Flag>,
    pub recalculation: Option<Flag>,
    pub cfd: Option<Flag>,
    /// A blank string clears the checker
    pub checker: Option<String>,
}

impl AnnotationUpdate {
    pub fn apply(&self, annotation: &mut Annotation) {
        if let Some(data) = &self.data {
            annotation.data = Some(data.to_owned());
        }
        if let Some(flag) = self.is_complex {
            annotation.is_complex = flag;
        }
        if let Some(flag) = self.forested {
            annotation.forested = flag;
        }
        if let Some(flag) = self.recalculation {
            annotation.recalculation = flag;
        }
        if let Some(flag) = self.cfd {
            annotation.cfd = flag;
        }
        if let Some(checker) = &self.checker {
            let checker = checker.trim();
            annotation.checker = (!checker.is_empty()).then(|| checker.to_owned());
        }
    }
}

impl Store {
    /// Stored annotation of `project_id`, or an unsaved default record.
    pub fn annotation(&self, project_id: &str) -> Result<Annotation, TrackerError> {
        Ok(find_annotation(&self.session()?, project_id)?
            .unwrap_or_else(|| Annotation::new(project_id)))
    }

    /// Read-modify-write of one annotation, creating it on first write.
    pub fn upsert_annotation(
        &self,
        project_id: &str,
        update: &AnnotationUpdate,
    ) -> Result<Annotation, TrackerError> {
        self.write(|connection| {
            let mut annotation = find_annotation(connection, project_id)?
                .unwrap_or_else(|| Annotation::new(project_id));
            update.apply(&mut annotation);

            let id = match annotation.id {
                Some(id) => {
                    connection.execute(
                        "UPDATE project_data
                         SET data = ?, is_complex = ?, forested = ?, recalculation = ?, cfd = ?, checker = ?
                         WHERE id = ?",
                        params![
                            annotation.data,
                            annotation.is_complex.as_str(),
                            annotation.forested.as_str(),
                            annotation.recalculation.as_str(),
                            annotation.cfd.as_str(),
                            annotation.checker,
                            id,
                        ],
                    )?;
                    id
                }
                None => connection.query_row(
                    "INSERT INTO project_data (project_id, data, is_complex, forested, recalculation, cfd, checker)
                     VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
                    params![
                        annotation.project_id,
                        annotation.data,
                        annotation.is_complex.as_str(),
                        annotation.forested.as_str(),
                        annotation.recalculation.as_str(),
                        annotation.cfd.as_str(),
                        annotation.checker,
                    ],
                    |row| row.get(0),
                )?,
            };
            annotation.id = Some(id);
            Ok(annotation)
        })
    }

    /// Distinct assigned checkers, sorted.
    pub fn checkers(&self) -> Result<Vec<String>, TrackerError> {
        let session = self.session()?;
        let mut statement = session.prepare(
            "SELECT DISTINCT checker FROM project_data WHERE checker IS NOT NULL ORDER BY checker",
        )?;
        let checkers = statement
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(checkers)
    }

    /// Soft join of sheet id values against annotations.
    pub fn resolve_checkers(
        &self,
        ids: &[Option<String>],
        unassigned_label: &str,
    ) -> Result<Vec<String>, TrackerError> {
        let assigned = assigned_checkers(&self.session()?)?;
        Ok(assign_checkers(ids, &assigned, unassigned_label))
    }
}

/// Maps every id to its assigned checker, or to `unassigned_label`. Output is aligned with `ids`.
pub fn assign_checkers(
    ids: &[Option<String>],
    assigned: &HashMap<String, String>,
    unassigned_label: &str,
) -> Vec<String> {
    ids.iter()
        .map(|id| {
            id.as_ref()
                .and_then(|id| assigned.get(id))
                .map_or_else(|| unassigned_label.to_owned(), String::to_owned)
        })
        .collect()
}

/// project_id -> checker for every annotation with a checker.
pub(crate) fn assigned_checkers(
    connection: &Connection,
) -> Result<HashMap<String, String>, TrackerError> {
    let mut statement = connection
        .prepare("SELECT project_id, checker FROM project_data WHERE checker IS NOT NULL")?;
    let assigned = statement
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<HashMap<String, String>, _>>()?;
    Ok(assigned)
}

type AnnotationRow = (i64, String, Option<String>, String, String, String, String, Option<String>);

fn find_annotation(
    connection: &Connection,
    project_id: &str,
) -> Result<Option<Annotation>, TrackerError> {
    let result: Result<AnnotationRow, duckdb::Error> = connection.query_row(
        "SELECT id, project_id, data, is_complex, forested, recalculation, cfd, checker
         FROM project_data WHERE project_id = ?",
        params![project_id],
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        },
    );
    let (id, project_id, data, is_complex, forested, recalculation, cfd, checker) = match result {
        Ok(row) => row,
        Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(Annotation {
        id: Some(id),
        project_id,
        data,
        is_complex: is_complex.parse()?,
        forested: forested.parse()?,
        recalculation: recalculation.parse()?,
        cfd: cfd.parse()?,
        checker,
    }))
}
