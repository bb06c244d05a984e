//! Visit database operations.

use chrono::SecondsFormat;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::clock::DateKey;
use crate::models::{Gender, NewVisit, TokenNumber, Visit, VisitStatus, VisitUpdate};

const VISIT_COLUMNS: &str = r#"
    id, token_number, visit_date, name, age, gender, phone, address, status,
    assigned_doctor, symptoms, prescription, bill_amount, created_by, created_at
"#;

/// Row filter for visit queries. Results are always newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitFilter {
    pub visit_date: Option<DateKey>,
    pub status: Option<VisitStatus>,
}

impl VisitFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn on(day: DateKey) -> Self {
        Self {
            visit_date: Some(day),
            status: None,
        }
    }

    pub fn with_status(mut self, status: VisitStatus) -> Self {
        self.status = Some(status);
        self
    }
}

impl Database {
    /// Insert a new visit. The store assigns the id and creation time.
    pub fn insert_visit(&self, new_visit: &NewVisit) -> DbResult<Visit> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let d = &new_visit.demographics;

        self.conn.execute(
            r#"
            INSERT INTO visits (
                id, token_number, visit_date, name, age, gender, phone, address,
                status, assigned_doctor, symptoms, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            "#,
            params![
                id,
                new_visit.token_number.to_string(),
                new_visit.visit_date.to_string(),
                d.name,
                d.age,
                d.gender.as_str(),
                d.phone,
                d.address,
                new_visit.status().as_str(),
                new_visit.assigned_doctor,
                d.symptoms,
                new_visit.created_by,
                now,
            ],
        )
        .map_err(DbError::from_write)?;

        self.get_visit(&id)?
            .ok_or_else(|| DbError::NotFound(format!("visit {} vanished after insert", id)))
    }

    /// Write the fields a transition changed. Returns false if no such visit.
    pub fn update_visit(&self, id: &str, update: &VisitUpdate) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE visits SET
                status = ?2,
                prescription = COALESCE(?3, prescription),
                bill_amount = COALESCE(?4, bill_amount),
                updated_at = ?5
            WHERE id = ?1
            "#,
            params![
                id,
                update.status.as_str(),
                update.prescription,
                update.bill_amount,
                chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(DbError::from_write)?;
        Ok(rows_affected > 0)
    }

    /// Get a visit by ID.
    pub fn get_visit(&self, id: &str) -> DbResult<Option<Visit>> {
        self.conn
            .query_row(
                &format!("SELECT {VISIT_COLUMNS} FROM visits WHERE id = ?"),
                [id],
                VisitRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List visits matching `filter`, newest first.
    pub fn list_visits(&self, filter: &VisitFilter) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {VISIT_COLUMNS}
            FROM visits
            WHERE (?1 IS NULL OR visit_date = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC, rowid DESC
            "#
        ))?;

        let day = filter.visit_date.map(|d| d.to_string());
        let status = filter.status.map(|s| s.as_str());
        let rows = stmt.query_map(params![day, status], VisitRow::from_row)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }
}

/// Intermediate row struct for database mapping.
struct VisitRow {
    id: String,
    token_number: String,
    visit_date: String,
    name: String,
    age: u32,
    gender: String,
    phone: String,
    address: String,
    status: String,
    assigned_doctor: Option<String>,
    symptoms: Option<String>,
    prescription: Option<String>,
    bill_amount: Option<f64>,
    created_by: Option<String>,
    created_at: String,
}

impl VisitRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            token_number: row.get(1)?,
            visit_date: row.get(2)?,
            name: row.get(3)?,
            age: row.get(4)?,
            gender: row.get(5)?,
            phone: row.get(6)?,
            address: row.get(7)?,
            status: row.get(8)?,
            assigned_doctor: row.get(9)?,
            symptoms: row.get(10)?,
            prescription: row.get(11)?,
            bill_amount: row.get(12)?,
            created_by: row.get(13)?,
            created_at: row.get(14)?,
        })
    }
}

impl TryFrom<VisitRow> for Visit {
    type Error = DbError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        let id = row.id.as_str();
        let constraint = |e: &dyn std::fmt::Display| DbError::Constraint(format!("visit {}: {}", id, e));

        let token_number = row
            .token_number
            .parse::<TokenNumber>()
            .map_err(|e| constraint(&e))?;
        let visit_date = row.visit_date.parse::<DateKey>().map_err(|e| constraint(&e))?;
        let gender = row.gender.parse::<Gender>().map_err(|e| constraint(&e))?;
        let status = row.status.parse::<VisitStatus>().map_err(|e| constraint(&e))?;

        Ok(Visit {
            id: row.id,
            token_number,
            visit_date,
            name: row.name,
            age: row.age,
            gender,
            phone: row.phone,
            address: row.address,
            status,
            assigned_doctor: row.assigned_doctor,
            symptoms: row.symptoms,
            prescription: row.prescription,
            bill_amount: row.bill_amount,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Demographics;

    fn day(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    fn new_visit(seq: u32, on: &str, name: &str) -> NewVisit {
        NewVisit::new(
            TokenNumber::from_sequence(seq).unwrap(),
            day(on),
            Demographics::new(name, 40, Gender::Male, "555-0199").with_address("4 Hill St"),
        )
    }

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();

        let mut payload = new_visit(1, "2024-03-07", "Asha");
        payload.demographics.symptoms = Some("Fever".into());
        payload.created_by = Some("recep-1".into());

        let inserted = db.insert_visit(&payload).unwrap();
        assert_eq!(inserted.id.len(), 36);
        assert_eq!(inserted.status, VisitStatus::Waiting);

        let retrieved = db.get_visit(&inserted.id).unwrap().unwrap();
        assert_eq!(retrieved, inserted);
        assert_eq!(retrieved.token_number.to_string(), "T001");
        assert_eq!(retrieved.symptoms.as_deref(), Some("Fever"));
        assert_eq!(retrieved.created_by.as_deref(), Some("recep-1"));
        assert_eq!(retrieved.assigned_doctor.as_deref(), Some("Auto-assigned"));
    }

    #[test]
    fn test_get_missing() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_visit("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let first = db.insert_visit(&new_visit(1, "2024-03-07", "Asha")).unwrap();
        let second = db.insert_visit(&new_visit(2, "2024-03-07", "Ravi")).unwrap();
        let third = db.insert_visit(&new_visit(1, "2024-03-08", "Meera")).unwrap();

        let all = db.list_visits(&VisitFilter::all()).unwrap();
        let ids: Vec<_> = all.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);
    }

    #[test]
    fn test_list_filtered() {
        let db = Database::open_in_memory().unwrap();
        let asha = db.insert_visit(&new_visit(1, "2024-03-07", "Asha")).unwrap();
        db.insert_visit(&new_visit(2, "2024-03-07", "Ravi")).unwrap();
        db.insert_visit(&new_visit(1, "2024-03-08", "Meera")).unwrap();

        db.update_visit(&asha.id, &VisitUpdate::status(VisitStatus::InConsultation))
            .unwrap();

        let on_day = db.list_visits(&VisitFilter::on(day("2024-03-07"))).unwrap();
        assert_eq!(on_day.len(), 2);

        let consulting = db
            .list_visits(&VisitFilter::on(day("2024-03-07")).with_status(VisitStatus::InConsultation))
            .unwrap();
        assert_eq!(consulting.len(), 1);
        assert_eq!(consulting[0].name, "Asha");

        assert_eq!(db.list_visits(&VisitFilter::on(day("2024-03-08"))).unwrap().len(), 1);
    }

    #[test]
    fn test_update_writes_only_changed_fields() {
        let db = Database::open_in_memory().unwrap();
        let visit = db.insert_visit(&new_visit(1, "2024-03-07", "Asha")).unwrap();

        db.update_visit(
            &visit.id,
            &VisitUpdate {
                status: VisitStatus::Completed,
                prescription: Some("Paracetamol 500mg BD".into()),
                bill_amount: None,
            },
        )
        .unwrap();

        db.update_visit(
            &visit.id,
            &VisitUpdate {
                status: VisitStatus::Billed,
                prescription: None,
                bill_amount: Some(750.0),
            },
        )
        .unwrap();

        let retrieved = db.get_visit(&visit.id).unwrap().unwrap();
        assert_eq!(retrieved.status, VisitStatus::Billed);
        assert_eq!(retrieved.prescription.as_deref(), Some("Paracetamol 500mg BD"));
        assert_eq!(retrieved.bill_amount, Some(750.0));
        assert_eq!(retrieved.created_at, visit.created_at);
    }

    #[test]
    fn test_update_missing_returns_false() {
        let db = Database::open_in_memory().unwrap();
        let updated = db
            .update_visit("missing", &VisitUpdate::status(VisitStatus::Billed))
            .unwrap();
        assert!(!updated);
    }

    #[test]
    fn test_update_cannot_regress() {
        let db = Database::open_in_memory().unwrap();
        let visit = db.insert_visit(&new_visit(1, "2024-03-07", "Asha")).unwrap();
        db.update_visit(&visit.id, &VisitUpdate::status(VisitStatus::InConsultation))
            .unwrap();

        let result = db.update_visit(&visit.id, &VisitUpdate::status(VisitStatus::Waiting));
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_rebill_rejected_as_constraint() {
        let db = Database::open_in_memory().unwrap();
        let visit = db.insert_visit(&new_visit(1, "2024-03-07", "Asha")).unwrap();
        let bill = |amount: f64| VisitUpdate {
            status: VisitStatus::Billed,
            prescription: None,
            bill_amount: Some(amount),
        };

        db.update_visit(&visit.id, &bill(750.0)).unwrap();
        let result = db.update_visit(&visit.id, &bill(100.0));

        assert!(matches!(result, Err(DbError::Constraint(_))));
        let stored = db.get_visit(&visit.id).unwrap().unwrap();
        assert_eq!(stored.bill_amount, Some(750.0));
    }
}
