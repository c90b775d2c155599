use std::collections::HashMap;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{HealthEntry, HealthJournal, Symptom};
use crate::repository::InMemoryStore;

pub const SEED_USER_ID: &str = "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_journal(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO health_analytics.journals (id, user_id, name, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, name) DO UPDATE
        SET start_date = COALESCE(EXCLUDED.start_date, health_analytics.journals.start_date),
            end_date = COALESCE(EXCLUDED.end_date, health_analytics.journals.end_date)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_entry(pool: &PgPool, entry: &HealthEntry) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO health_analytics.entries
        (id, journal_id, entry_date, glycemia, tension, sleep_hours, weight)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (journal_id, entry_date) DO UPDATE
        SET glycemia = EXCLUDED.glycemia,
            tension = EXCLUDED.tension,
            sleep_hours = EXCLUDED.sleep_hours,
            weight = EXCLUDED.weight
        RETURNING id
        "#,
    )
    .bind(entry.id)
    .bind(entry.journal_id)
    .bind(entry.date)
    .bind(entry.glycemia)
    .bind(entry.tension.as_deref())
    .bind(entry.sleep)
    .bind(entry.weight)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn insert_symptom(pool: &PgPool, entry_id: Uuid, symptom: &Symptom) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO health_analytics.symptoms (id, entry_id, kind, intensity, zone)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry_id)
    .bind(symptom.kind.as_deref())
    .bind(symptom.intensity)
    .bind(symptom.zone.as_deref())
    .execute(pool)
    .await?;
    Ok(())
}

/// Two monthly journals of realistic readings for one demo user.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let user_id = Uuid::parse_str(SEED_USER_ID)?;
    let march = upsert_journal(pool, user_id, "Suivi mars 2026", None, None).await?;
    let april_start = NaiveDate::from_ymd_opt(2026, 4, 1).context("invalid date")?;
    let april_end = NaiveDate::from_ymd_opt(2026, 4, 30).context("invalid date")?;
    let april = upsert_journal(
        pool,
        user_id,
        "April 2026 follow-up",
        Some(april_start),
        Some(april_end),
    )
    .await?;

    let march_start = NaiveDate::from_ymd_opt(2026, 3, 2).context("invalid date")?;
    let journals = [(march, march_start, 0.0), (april, april_start, 0.12)];

    for (journal_id, first_day, drift) in journals {
        for i in 0..12i64 {
            let mut entry = HealthEntry::new(journal_id, first_day + Duration::days(i * 2));
            let step = i as f64;
            entry.glycemia = Some(0.95 + drift + (i % 4) as f64 * 0.07);
            entry.tension = Some(format!("{}/{}", 112 + (i % 5) * 4, 72 + (i % 3) * 4));
            entry.sleep = Some(6 + (i % 3) as i32);
            entry.weight = Some(71.0 - step * 0.1 + drift * 5.0);

            let entry_id = upsert_entry(pool, &entry).await?;
            sqlx::query("DELETE FROM health_analytics.symptoms WHERE entry_id = $1")
                .bind(entry_id)
                .execute(pool)
                .await?;
            if i % 4 == 3 {
                insert_symptom(pool, entry_id, &Symptom::new("headache", 3 + (i % 3) as i32))
                    .await?;
            }
        }
    }

    info!(user = %user_id, "seeded demo journals");
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    user_id: Uuid,
    journal_name: String,
    journal_start: Option<NaiveDate>,
    journal_end: Option<NaiveDate>,
    date: NaiveDate,
    glycemia: Option<f64>,
    tension: Option<String>,
    sleep: Option<i32>,
    weight: Option<f64>,
    symptom_type: Option<String>,
    symptom_intensity: Option<i32>,
}

/// One journal day as it will be written: readings plus every symptom listed for it.
#[derive(Debug, PartialEq)]
struct ImportedDay {
    user_id: Uuid,
    journal_name: String,
    journal_start: Option<NaiveDate>,
    journal_end: Option<NaiveDate>,
    date: NaiveDate,
    glycemia: Option<f64>,
    tension: Option<String>,
    sleep: Option<i32>,
    weight: Option<f64>,
    symptoms: Vec<Symptom>,
}

/// Groups CSV rows by (user, journal, date). Later rows fill in readings the
/// earlier ones left blank; symptoms accumulate in file order.
fn collect_import_days<R: std::io::Read>(
    mut reader: csv::Reader<R>,
) -> anyhow::Result<Vec<ImportedDay>> {
    let mut days: Vec<ImportedDay> = Vec::new();
    let mut index: HashMap<(Uuid, String, NaiveDate), usize> = HashMap::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let key = (row.user_id, row.journal_name.clone(), row.date);
        let tension = row.tension.filter(|tension| !tension.trim().is_empty());
        let symptom = (row.symptom_type.is_some() || row.symptom_intensity.is_some()).then(|| {
            Symptom {
                kind: row.symptom_type,
                intensity: row.symptom_intensity,
                zone: None,
            }
        });

        let day = match index.get(&key) {
            Some(&position) => {
                let day = &mut days[position];
                day.journal_start = row.journal_start.or(day.journal_start);
                day.journal_end = row.journal_end.or(day.journal_end);
                day.glycemia = row.glycemia.or(day.glycemia);
                day.tension = tension.or(day.tension.take());
                day.sleep = row.sleep.or(day.sleep);
                day.weight = row.weight.or(day.weight);
                day
            }
            None => {
                index.insert(key, days.len());
                days.push(ImportedDay {
                    user_id: row.user_id,
                    journal_name: row.journal_name,
                    journal_start: row.journal_start,
                    journal_end: row.journal_end,
                    date: row.date,
                    glycemia: row.glycemia,
                    tension,
                    sleep: row.sleep,
                    weight: row.weight,
                    symptoms: Vec::new(),
                });
                let last = days.len() - 1;
                &mut days[last]
            }
        };
        day.symptoms.extend(symptom);
    }

    Ok(days)
}

/// Imports a CSV export. Each day's symptoms replace what was stored for it,
/// so importing the same file twice leaves the database unchanged.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let days = collect_import_days(reader)
        .with_context(|| format!("failed to read {}", csv_path.display()))?;

    for day in &days {
        let journal_id = upsert_journal(
            pool,
            day.user_id,
            &day.journal_name,
            day.journal_start,
            day.journal_end,
        )
        .await?;

        let mut entry = HealthEntry::new(journal_id, day.date);
        entry.glycemia = day.glycemia;
        entry.tension = day.tension.clone();
        entry.sleep = day.sleep;
        entry.weight = day.weight;
        let entry_id = upsert_entry(pool, &entry).await?;

        sqlx::query("DELETE FROM health_analytics.symptoms WHERE entry_id = $1")
            .bind(entry_id)
            .execute(pool)
            .await?;
        for symptom in &day.symptoms {
            insert_symptom(pool, entry_id, symptom).await?;
        }
    }

    info!(entries = days.len(), path = %csv_path.display(), "imported journal entries");
    Ok(days.len())
}

fn journal_from_row(row: &PgRow) -> HealthJournal {
    HealthJournal {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
    }
}

pub async fn fetch_journal(pool: &PgPool, journal_id: Uuid) -> anyhow::Result<Option<HealthJournal>> {
    let row = sqlx::query(
        "SELECT id, user_id, name, start_date, end_date \
         FROM health_analytics.journals WHERE id = $1",
    )
    .bind(journal_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(journal_from_row))
}

/// Snapshot of every journal, entry and symptom a user owns.
pub async fn load_user_store(pool: &PgPool, user_id: Uuid) -> anyhow::Result<InMemoryStore> {
    let journals = sqlx::query(
        "SELECT id, user_id, name, start_date, end_date \
         FROM health_analytics.journals WHERE user_id = $1 \
         ORDER BY start_date NULLS FIRST, name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let symptom_rows = sqlx::query(
        "SELECT s.entry_id, s.kind, s.intensity, s.zone \
         FROM health_analytics.symptoms s \
         JOIN health_analytics.entries e ON e.id = s.entry_id \
         JOIN health_analytics.journals j ON j.id = e.journal_id \
         WHERE j.user_id = $1 \
         ORDER BY s.created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut symptoms: HashMap<Uuid, Vec<Symptom>> = HashMap::new();
    for row in symptom_rows {
        symptoms
            .entry(row.get("entry_id"))
            .or_default()
            .push(Symptom {
                kind: row.get("kind"),
                intensity: row.get("intensity"),
                zone: row.get("zone"),
            });
    }

    let entry_rows = sqlx::query(
        "SELECT e.id, e.journal_id, e.entry_date, e.glycemia, e.tension, e.sleep_hours, e.weight \
         FROM health_analytics.entries e \
         JOIN health_analytics.journals j ON j.id = e.journal_id \
         WHERE j.user_id = $1 \
         ORDER BY e.entry_date",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut store = InMemoryStore::new();
    for row in &journals {
        store.add_journal(journal_from_row(row));
    }
    for row in entry_rows {
        let id: Uuid = row.get("id");
        store.add_entry(HealthEntry {
            id,
            journal_id: row.get("journal_id"),
            date: row.get("entry_date"),
            glycemia: row.get("glycemia"),
            tension: row.get("tension"),
            sleep: row.get("sleep_hours"),
            weight: row.get("weight"),
            symptoms: symptoms.remove(&id).unwrap_or_default(),
        });
    }

    debug!(
        user = %user_id,
        journals = store.journals().len(),
        entries = store.entry_count(),
        "loaded user snapshot"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2";
    const HEADER: &str = "user_id,journal_name,journal_start,journal_end,date,glycemia,tension,sleep,weight,symptom_type,symptom_intensity\n";

    fn days(body: &str) -> Vec<ImportedDay> {
        let data = format!("{HEADER}{body}");
        collect_import_days(csv::Reader::from_reader(data.as_bytes())).unwrap()
    }

    #[test]
    fn rows_for_the_same_day_share_one_entry() {
        let body = format!(
            "{USER},Suivi mai 2026,,,2026-05-04,1.1,120/80,7,70.5,headache,3\n\
             {USER},Suivi mai 2026,,,2026-05-04,,,,,fatigue,5\n\
             {USER},Suivi mai 2026,,,2026-05-05,0.98, ,6,,,\n"
        );
        let days = days(&body);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].glycemia, Some(1.1));
        assert_eq!(days[0].tension.as_deref(), Some("120/80"));
        assert_eq!(
            days[0].symptoms,
            vec![Symptom::new("headache", 3), Symptom::new("fatigue", 5)]
        );
        assert_eq!(days[1].tension, None);
        assert!(days[1].symptoms.is_empty());
    }

    #[test]
    fn reading_the_same_file_twice_yields_the_same_days() {
        let body = format!(
            "{USER},April,2026-04-01,2026-04-30,2026-04-02,1.0,118/76,8,69.0,nausea,2\n\
             {USER},April,2026-04-01,2026-04-30,2026-04-02,,,,,nausea,2\n"
        );
        let first = days(&body);
        let second = days(&body);

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].symptoms.len(), 2);
    }

    #[test]
    fn journals_with_the_same_day_stay_apart() {
        let body = format!(
            "{USER},March,,,2026-03-10,1.2,,,,,\n\
             {USER},Mars 2026,,,2026-03-10,1.3,,,,,\n"
        );
        let days = days(&body);
        assert_eq!(days.len(), 2);
        assert_eq!(days[1].glycemia, Some(1.3));
    }
}
