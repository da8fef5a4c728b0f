use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::listings;
use crate::models::{Anomaly, Record};

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub import_id: Uuid,
    pub read: usize,
    pub upserted: usize,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let listings = vec![
        ("seed-101", "Loft na Ribeira", "Ribeira", "Entire home/apt", 120.0, 210, 4.86),
        ("seed-102", "Quarto junto ao rio", "Ribeira", "Private room", 65.0, 250, 4.62),
        ("seed-103", "Duplex com terraço", "Ribeira", "Entire home/apt", 185.0, 140, 4.91),
        ("seed-201", "Casa do Bonfim", "Bonfim", "Entire home/apt", 78.0, 190, 4.74),
        ("seed-202", "Estúdio Campanhã", "Bonfim", "Entire home/apt", 52.0, 95, 3.85),
        ("seed-301", "Apartamento Foz", "Foz do Douro", "Entire home/apt", 140.0, 160, 4.80),
        ("seed-302", "Quarto com vista mar", "Foz do Douro", "Private room", 70.0, 60, 4.10),
    ];

    for (id, name, neighbourhood, room_type, price, occupancy, rating) in listings {
        sqlx::query(
            r#"
            INSERT INTO market_position.listings
            (listing_id, name, room_type, neighbourhood, price, occupancy, rating)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (listing_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(room_type)
        .bind(neighbourhood)
        .bind(price)
        .bind(occupancy)
        .bind(rating)
        .execute(pool)
        .await?;
    }

    Ok(())
}

fn record_from_row(row: &PgRow) -> Record {
    let occupancy: i32 = row.get("occupancy");
    let mut record = Record::new(
        row.get::<String, _>("listing_id"),
        row.get::<String, _>("neighbourhood"),
        row.get("price"),
        occupancy.max(0) as u32,
        row.get("rating"),
    );
    record.name = row.get("name");
    record.host_id = row.get("host_id");
    record.room_type = row.get("room_type");
    record.anomalies = row
        .get::<Vec<String>, _>("anomalies")
        .iter()
        .filter_map(|label| Anomaly::from_label(label))
        .collect();
    record
}

fn anomaly_labels(anomalies: &[Anomaly]) -> Vec<String> {
    anomalies.iter().map(|anomaly| anomaly.as_str().to_string()).collect()
}

/// The whole reference collection, ordered by listing id.
pub async fn fetch_listings(pool: &PgPool) -> anyhow::Result<Vec<Record>> {
    let rows = sqlx::query(
        "SELECT listing_id, name, host_id, room_type, neighbourhood, price, occupancy, rating, anomalies \
         FROM market_position.listings \
         ORDER BY listing_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(record_from_row).collect())
}

pub async fn fetch_listing(pool: &PgPool, listing_id: &str) -> anyhow::Result<Option<Record>> {
    let row = sqlx::query(
        "SELECT listing_id, name, host_id, room_type, neighbourhood, price, occupancy, rating, anomalies \
         FROM market_position.listings \
         WHERE listing_id = $1",
    )
    .bind(listing_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(record_from_row))
}

pub async fn import_file(pool: &PgPool, path: &std::path::Path) -> anyhow::Result<ImportSummary> {
    let records = listings::load_listings_file(path)?;
    let import_id = Uuid::new_v4();
    let imported_at = Utc::now();
    let mut upserted = 0usize;

    for record in records.iter().filter(|record| !record.id.is_empty()) {
        let result = sqlx::query(
            r#"
            INSERT INTO market_position.listings
            (listing_id, name, host_id, room_type, neighbourhood, price, occupancy, rating,
             anomalies, import_id, imported_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (listing_id) DO UPDATE
            SET name = EXCLUDED.name,
                host_id = EXCLUDED.host_id,
                room_type = EXCLUDED.room_type,
                neighbourhood = EXCLUDED.neighbourhood,
                price = EXCLUDED.price,
                occupancy = EXCLUDED.occupancy,
                rating = EXCLUDED.rating,
                anomalies = EXCLUDED.anomalies,
                import_id = EXCLUDED.import_id,
                imported_at = EXCLUDED.imported_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.host_id)
        .bind(&record.room_type)
        .bind(&record.neighbourhood)
        .bind(record.price)
        .bind(i32::try_from(record.occupancy).unwrap_or(i32::MAX))
        .bind(record.rating)
        .bind(anomaly_labels(&record.anomalies))
        .bind(import_id)
        .bind(imported_at)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            upserted += 1;
        }
    }

    Ok(ImportSummary {
        import_id,
        read: records.len(),
        upserted,
    })
}

/// Replaces the stored anomaly flags of one listing.
pub async fn save_anomalies(pool: &PgPool, record: &Record) -> anyhow::Result<()> {
    sqlx::query("UPDATE market_position.listings SET anomalies = $2 WHERE listing_id = $1")
        .bind(&record.id)
        .bind(anomaly_labels(&record.anomalies))
        .execute(pool)
        .await?;
    Ok(())
}
