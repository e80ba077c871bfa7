use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, Transaction};

use crate::{
    db::DbPool,
    error::{AppError, Result},
    models::trip::{HistoryFilter, NewCheckpoint, Trip, TripLog, TripStatus, TripUpdate},
};

/// Trip and trip-log store
///
/// Methods taking `&self` run on the pool. The associated functions taking a
/// `&mut SqliteConnection` are meant to be called inside a transaction
/// obtained from [`TripStore::begin_write`].
#[derive(Clone)]
pub struct TripStore {
    pool: DbPool,
}

impl TripStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open a transaction that holds the write lock from its first statement.
    ///
    /// A deferred transaction that reads before writing fails with
    /// `SQLITE_BUSY_SNAPSHOT` when another writer commits in between, without
    /// waiting on the busy timeout.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(AppError::Database)
    }

    pub async fn get_trip(&self, id: i64) -> Result<Trip> {
        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .ok_or(AppError::NotFound("Trip"))?;

        Ok(trip)
    }

    /// The driver's in-progress trip, if any
    pub async fn find_active(&self, driver_id: i64) -> Result<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(
            "SELECT * FROM trips WHERE driver_id = ? AND status = ? ORDER BY id LIMIT 1",
        )
        .bind(driver_id)
        .bind(TripStatus::InProgress)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(trip)
    }

    /// Insert a new in-progress trip with an empty summary.
    ///
    /// Fails with `Conflict` when the driver already has an in-progress trip.
    pub async fn create_trip(&self, driver_id: i64, start_date: NaiveDateTime) -> Result<Trip> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            INSERT INTO trips (driver_id, start_date, status)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(driver_id)
        .bind(start_date)
        .bind(TripStatus::InProgress)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique(e, "Driver already has an active trip"))?;

        Ok(trip)
    }

    /// All trips, newest first
    pub async fn list_trips(&self) -> Result<Vec<Trip>> {
        let trips = sqlx::query_as::<_, Trip>("SELECT * FROM trips ORDER BY start_date DESC, id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(trips)
    }

    /// Completed trips of a driver, newest first
    pub async fn completed_for_driver(
        &self,
        driver_id: i64,
        filter: HistoryFilter,
    ) -> Result<Vec<Trip>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM trips WHERE driver_id = ");
        query.push_bind(driver_id);
        query.push(" AND status = ");
        query.push_bind(TripStatus::Completed);

        if let Some(year) = filter.year {
            query.push(" AND strftime('%Y', start_date) = ");
            query.push_bind(format!("{year:04}"));
        }
        if let Some(month) = filter.month {
            query.push(" AND strftime('%m', start_date) = ");
            query.push_bind(format!("{month:02}"));
        }
        query.push(" ORDER BY start_date DESC, id DESC");

        let trips = query
            .build_query_as::<Trip>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(trips)
    }

    /// Trips selected for a report, oldest first. Date bounds are inclusive
    /// and compared on the calendar day of `start_date`.
    pub async fn list_for_export(
        &self,
        driver_id: Option<i64>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Trip>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM trips WHERE 1 = 1");

        if let Some(driver_id) = driver_id {
            query.push(" AND driver_id = ");
            query.push_bind(driver_id);
        }
        if let Some(from) = from {
            query.push(" AND date(start_date) >= date(");
            query.push_bind(from);
            query.push(")");
        }
        if let Some(to) = to {
            query.push(" AND date(start_date) <= date(");
            query.push_bind(to);
            query.push(")");
        }
        query.push(" ORDER BY start_date, id");

        let trips = query
            .build_query_as::<Trip>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(trips)
    }

    pub async fn logs_for_trip(&self, trip_id: i64) -> Result<Vec<TripLog>> {
        let logs = sqlx::query_as::<_, TripLog>(
            "SELECT * FROM trip_logs WHERE trip_id = ? ORDER BY timestamp, id",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(logs)
    }

    /// Logs of several trips grouped by trip id, each group timestamp ascending
    pub async fn logs_for_trips(&self, trip_ids: &[i64]) -> Result<HashMap<i64, Vec<TripLog>>> {
        let mut grouped: HashMap<i64, Vec<TripLog>> = HashMap::new();
        if trip_ids.is_empty() {
            return Ok(grouped);
        }

        // Stay well below SQLite's bound-parameter limit.
        for chunk in trip_ids.chunks(500) {
            let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM trip_logs WHERE trip_id IN (");
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY timestamp, id");

            let logs = query
                .build_query_as::<TripLog>()
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::Database)?;

            for log in logs {
                grouped.entry(log.trip_id).or_default().push(log);
            }
        }

        Ok(grouped)
    }

    /// Administrative edit of status and/or start date
    pub async fn update_trip(&self, id: i64, update: &TripUpdate) -> Result<Trip> {
        let mut trip = self.get_trip(id).await?;

        if let Some(status) = update.status {
            trip.status = status;
        }
        if let Some(start_date) = update.start_date {
            trip.start_date = start_date;
        }

        sqlx::query("UPDATE trips SET status = ?, start_date = ? WHERE id = ?")
            .bind(trip.status)
            .bind(trip.start_date)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_unique(e, "Driver already has an active trip"))?;

        Ok(trip)
    }

    /// Delete a trip together with its logs
    pub async fn delete_trip(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM trips WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?
            .rows_affected();

        if deleted == 0 {
            return Err(AppError::NotFound("Trip"));
        }
        Ok(())
    }

    pub async fn fetch_trip(conn: &mut SqliteConnection, id: i64) -> Result<Option<Trip>> {
        sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(AppError::Database)
    }

    pub async fn insert_log(
        conn: &mut SqliteConnection,
        trip_id: i64,
        checkpoint: &NewCheckpoint,
        timestamp: NaiveDateTime,
    ) -> Result<TripLog> {
        sqlx::query_as::<_, TripLog>(
            r#"
            INSERT INTO trip_logs (trip_id, state, timestamp, latitude, longitude, address)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(trip_id)
        .bind(checkpoint.state)
        .bind(timestamp)
        .bind(checkpoint.latitude)
        .bind(checkpoint.longitude)
        .bind(checkpoint.address.as_deref())
        .fetch_one(conn)
        .await
        .map_err(AppError::Database)
    }

    /// Persist status and summary columns of a trip
    pub async fn save_summary(conn: &mut SqliteConnection, trip: &Trip) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trips SET
                status = ?,
                exit_factory_time = ?,
                exit_factory_address = ?,
                arrive_warehouse_time = ?,
                arrive_warehouse_address = ?,
                exit_warehouse_time = ?,
                exit_warehouse_address = ?,
                arrive_factory_time = ?,
                arrive_factory_address = ?
            WHERE id = ?
            "#,
        )
        .bind(trip.status)
        .bind(trip.exit_factory_time)
        .bind(trip.exit_factory_address.as_deref())
        .bind(trip.arrive_warehouse_time)
        .bind(trip.arrive_warehouse_address.as_deref())
        .bind(trip.exit_warehouse_time)
        .bind(trip.exit_warehouse_address.as_deref())
        .bind(trip.arrive_factory_time)
        .bind(trip.arrive_factory_address.as_deref())
        .bind(trip.id)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }
}
