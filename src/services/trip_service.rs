use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::{
    db::TripStore,
    error::{AppError, Result},
    models::trip::{HistoryFilter, NewCheckpoint, Trip, TripDto, TripLog},
};

/// Driver-facing trip lifecycle: start, checkpoint logging, lookups.
#[derive(Clone)]
pub struct TripService {
    trip_store: TripStore,
    timezone: Tz,
}

impl TripService {
    pub fn new(trip_store: TripStore, timezone: Tz) -> Self {
        Self {
            trip_store,
            timezone,
        }
    }

    /// Current civil time in the configured trip zone
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }

    /// Return the driver's in-progress trip, creating one if there is none.
    pub async fn start_trip(&self, driver_id: i64) -> Result<Trip> {
        if let Some(active) = self.trip_store.find_active(driver_id).await? {
            tracing::debug!("Driver {} resumed trip {}", driver_id, active.id);
            return Ok(active);
        }

        match self.trip_store.create_trip(driver_id, self.now()).await {
            Ok(trip) => {
                tracing::info!("Driver {} started trip {}", driver_id, trip.id);
                Ok(trip)
            }
            // Another request created the trip between our read and insert.
            Err(AppError::Conflict(_)) => self
                .trip_store
                .find_active(driver_id)
                .await?
                .ok_or(AppError::NotFound("Active trip")),
            Err(e) => Err(e),
        }
    }

    /// Record a checkpoint against a trip owned by `caller_id`.
    pub async fn log_checkpoint(
        &self,
        trip_id: i64,
        caller_id: i64,
        checkpoint: NewCheckpoint,
    ) -> Result<TripLog> {
        checkpoint.validate()?;

        let mut tx = self.trip_store.begin_write().await?;

        let mut trip = TripStore::fetch_trip(&mut *tx, trip_id)
            .await?
            .ok_or(AppError::NotFound("Trip"))?;
        trip.ensure_owned_by(caller_id)?;

        let now = self.now();
        trip.record_checkpoint(checkpoint.state, now, checkpoint.address.as_deref())?;

        let log = TripStore::insert_log(&mut *tx, trip.id, &checkpoint, now).await?;
        TripStore::save_summary(&mut *tx, &trip).await?;

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            "Trip {}: driver {} logged '{}'{}",
            trip.id,
            caller_id,
            checkpoint.state.label(),
            if trip.is_completed() { ", trip completed" } else { "" }
        );

        Ok(log)
    }

    pub async fn active_trip(&self, driver_id: i64) -> Result<TripDto> {
        let trip = self
            .trip_store
            .find_active(driver_id)
            .await?
            .ok_or(AppError::NotFound("Active trip"))?;

        let logs = self.trip_store.logs_for_trip(trip.id).await?;
        Ok(TripDto {
            trip,
            logs,
            driver: None,
        })
    }

    /// Completed trips of the driver, newest first
    pub async fn history(&self, driver_id: i64, filter: HistoryFilter) -> Result<Vec<TripDto>> {
        let trips = self
            .trip_store
            .completed_for_driver(driver_id, filter)
            .await?;
        self.attach_logs(trips).await
    }

    pub async fn attach_logs(&self, trips: Vec<Trip>) -> Result<Vec<TripDto>> {
        let ids: Vec<i64> = trips.iter().map(|trip| trip.id).collect();
        let mut logs = self.trip_store.logs_for_trips(&ids).await?;

        Ok(trips
            .into_iter()
            .map(|trip| TripDto {
                logs: logs.remove(&trip.id).unwrap_or_default(),
                trip,
                driver: None,
            })
            .collect())
    }
}
