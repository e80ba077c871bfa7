use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    error::{AppError, Result},
    models::user::UserDto,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TripStatus {
    InProgress,
    Completed,
}

impl TripStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
        }
    }
}

/// One of the four stages a driver reports during a trip.
///
/// Persisted with the title-case labels. The older snake_case names are
/// still accepted from clients and rewritten in storage on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Checkpoint {
    #[serde(rename = "Exit Factory", alias = "exit_factory")]
    #[sqlx(rename = "Exit Factory")]
    ExitFactory,
    #[serde(rename = "Arrival at Warehouse", alias = "arrive_warehouse")]
    #[sqlx(rename = "Arrival at Warehouse")]
    ArriveWarehouse,
    #[serde(rename = "Exit Warehouse", alias = "exit_warehouse")]
    #[sqlx(rename = "Exit Warehouse")]
    ExitWarehouse,
    #[serde(rename = "Arrival at Factory", alias = "arrive_factory")]
    #[sqlx(rename = "Arrival at Factory")]
    ArriveFactory,
}

impl Checkpoint {
    /// Nominal trip order. Not enforced when logging.
    pub const ALL: [Checkpoint; 4] = [
        Checkpoint::ExitFactory,
        Checkpoint::ArriveWarehouse,
        Checkpoint::ExitWarehouse,
        Checkpoint::ArriveFactory,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Checkpoint::ExitFactory => "Exit Factory",
            Checkpoint::ArriveWarehouse => "Arrival at Warehouse",
            Checkpoint::ExitWarehouse => "Exit Warehouse",
            Checkpoint::ArriveFactory => "Arrival at Factory",
        }
    }

    pub fn legacy_label(self) -> &'static str {
        match self {
            Checkpoint::ExitFactory => "exit_factory",
            Checkpoint::ArriveWarehouse => "arrive_warehouse",
            Checkpoint::ExitWarehouse => "exit_warehouse",
            Checkpoint::ArriveFactory => "arrive_factory",
        }
    }

    /// Column header used in exports.
    pub fn report_title(self) -> &'static str {
        match self {
            Checkpoint::ExitFactory => "Exit Factory",
            Checkpoint::ArriveWarehouse => "Arrive Warehouse",
            Checkpoint::ExitWarehouse => "Exit Warehouse",
            Checkpoint::ArriveFactory => "Arrive Factory",
        }
    }

    pub fn completes_trip(self) -> bool {
        self == Checkpoint::ArriveFactory
    }
}

/// Database trip model, including the per-checkpoint summary columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: i64,
    pub driver_id: i64,
    pub start_date: NaiveDateTime,
    pub status: TripStatus,
    pub exit_factory_time: Option<NaiveDateTime>,
    pub exit_factory_address: Option<String>,
    pub arrive_warehouse_time: Option<NaiveDateTime>,
    pub arrive_warehouse_address: Option<String>,
    pub exit_warehouse_time: Option<NaiveDateTime>,
    pub exit_warehouse_address: Option<String>,
    pub arrive_factory_time: Option<NaiveDateTime>,
    pub arrive_factory_address: Option<String>,
}

impl Trip {
    pub fn is_completed(&self) -> bool {
        self.status == TripStatus::Completed
    }

    pub fn ensure_owned_by(&self, driver_id: i64) -> Result<()> {
        if self.driver_id != driver_id {
            return Err(AppError::Forbidden(
                "Not authorized to log for this trip".into(),
            ));
        }
        Ok(())
    }

    /// Apply a checkpoint to the trip summary.
    ///
    /// The summary pair for `checkpoint` is overwritten even if it was
    /// already set, and `ArriveFactory` completes the trip. Checkpoints may
    /// arrive in any order while the trip is in progress.
    pub fn record_checkpoint(
        &mut self,
        checkpoint: Checkpoint,
        at: NaiveDateTime,
        address: Option<&str>,
    ) -> Result<()> {
        if self.is_completed() {
            return Err(AppError::InvalidState("Trip is already completed".into()));
        }

        let (time, addr) = self.summary_slot(checkpoint);
        *time = Some(at);
        *addr = address.map(str::to_string);

        if checkpoint.completes_trip() {
            self.status = TripStatus::Completed;
        }
        Ok(())
    }

    pub fn summary(&self, checkpoint: Checkpoint) -> (Option<NaiveDateTime>, Option<&str>) {
        let (time, addr) = match checkpoint {
            Checkpoint::ExitFactory => (self.exit_factory_time, &self.exit_factory_address),
            Checkpoint::ArriveWarehouse => {
                (self.arrive_warehouse_time, &self.arrive_warehouse_address)
            }
            Checkpoint::ExitWarehouse => (self.exit_warehouse_time, &self.exit_warehouse_address),
            Checkpoint::ArriveFactory => (self.arrive_factory_time, &self.arrive_factory_address),
        };
        (time, addr.as_deref())
    }

    fn summary_slot(
        &mut self,
        checkpoint: Checkpoint,
    ) -> (&mut Option<NaiveDateTime>, &mut Option<String>) {
        match checkpoint {
            Checkpoint::ExitFactory => (&mut self.exit_factory_time, &mut self.exit_factory_address),
            Checkpoint::ArriveWarehouse => (
                &mut self.arrive_warehouse_time,
                &mut self.arrive_warehouse_address,
            ),
            Checkpoint::ExitWarehouse => (
                &mut self.exit_warehouse_time,
                &mut self.exit_warehouse_address,
            ),
            Checkpoint::ArriveFactory => (
                &mut self.arrive_factory_time,
                &mut self.arrive_factory_address,
            ),
        }
    }
}

/// Append-only checkpoint log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TripLog {
    pub id: i64,
    pub trip_id: i64,
    pub state: Checkpoint,
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

/// Checkpoint submitted by a driver
#[derive(Debug, Clone, Deserialize)]
pub struct NewCheckpoint {
    pub state: Checkpoint,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

impl NewCheckpoint {
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(AppError::BadRequest("Coordinates out of range".into()));
        }
        Ok(())
    }
}

/// Trip with its logs (timestamp ascending) and, for admin views, its driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripDto {
    #[serde(flatten)]
    pub trip: Trip,
    pub logs: Vec<TripLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<UserDto>,
}

/// Administrative trip edit
#[derive(Debug, Default, Deserialize)]
pub struct TripUpdate {
    pub status: Option<TripStatus>,
    pub start_date: Option<NaiveDateTime>,
}

/// Optional calendar filter for a driver's history. Values that do not
/// parse or fall outside a calendar range are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl HistoryFilter {
    pub fn from_raw(month: Option<&str>, year: Option<&str>) -> Self {
        let month = month
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|month| (1..=12).contains(month));
        let year = year
            .and_then(|raw| raw.trim().parse::<i32>().ok())
            .filter(|year| (1..=9999).contains(year));
        Self { month, year }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn open_trip() -> Trip {
        Trip {
            id: 7,
            driver_id: 1,
            start_date: at(7, 0),
            status: TripStatus::InProgress,
            exit_factory_time: None,
            exit_factory_address: None,
            arrive_warehouse_time: None,
            arrive_warehouse_address: None,
            exit_warehouse_time: None,
            exit_warehouse_address: None,
            arrive_factory_time: None,
            arrive_factory_address: None,
        }
    }

    #[test]
    fn arrive_factory_completes_even_without_prior_checkpoints() {
        let mut trip = open_trip();
        trip.record_checkpoint(Checkpoint::ArriveFactory, at(9, 0), Some("Factory Gate"))
            .unwrap();

        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(trip.summary(Checkpoint::ExitFactory), (None, None));
        assert_eq!(
            trip.summary(Checkpoint::ArriveFactory),
            (Some(at(9, 0)), Some("Factory Gate"))
        );
    }

    #[test]
    fn intermediate_checkpoints_keep_trip_open() {
        let mut trip = open_trip();
        for checkpoint in [
            Checkpoint::ExitWarehouse,
            Checkpoint::ExitFactory,
            Checkpoint::ArriveWarehouse,
        ] {
            trip.record_checkpoint(checkpoint, at(8, 0), None).unwrap();
        }
        assert_eq!(trip.status, TripStatus::InProgress);
    }

    #[test]
    fn repeated_checkpoint_overwrites_summary() {
        let mut trip = open_trip();
        trip.record_checkpoint(Checkpoint::ArriveWarehouse, at(8, 0), Some("WH1"))
            .unwrap();
        trip.record_checkpoint(Checkpoint::ArriveWarehouse, at(8, 30), Some("WH2"))
            .unwrap();

        assert_eq!(
            trip.summary(Checkpoint::ArriveWarehouse),
            (Some(at(8, 30)), Some("WH2"))
        );
    }

    #[test]
    fn completed_trip_rejects_checkpoints() {
        let mut trip = open_trip();
        trip.record_checkpoint(Checkpoint::ArriveFactory, at(9, 0), None)
            .unwrap();

        let err = trip
            .record_checkpoint(Checkpoint::ExitFactory, at(9, 5), None)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(trip.exit_factory_time, None);
    }

    #[test]
    fn foreign_driver_is_forbidden() {
        let trip = open_trip();
        assert!(trip.ensure_owned_by(1).is_ok());
        assert!(matches!(trip.ensure_owned_by(2), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn checkpoint_accepts_both_vocabularies() {
        let canonical: Checkpoint = serde_json::from_str(r#""Arrival at Warehouse""#).unwrap();
        let legacy: Checkpoint = serde_json::from_str(r#""arrive_warehouse""#).unwrap();
        assert_eq!(canonical, legacy);
        assert_eq!(
            serde_json::to_string(&legacy).unwrap(),
            r#""Arrival at Warehouse""#
        );
    }

    #[test]
    fn history_filter_drops_malformed_values() {
        assert_eq!(
            HistoryFilter::from_raw(Some("3"), Some("2024")),
            HistoryFilter {
                month: Some(3),
                year: Some(2024)
            }
        );
        assert_eq!(
            HistoryFilter::from_raw(Some("13"), Some("twenty")),
            HistoryFilter::default()
        );
        assert_eq!(HistoryFilter::from_raw(None, Some(" 2023 ")).year, Some(2023));
    }

    #[test]
    fn coordinates_must_be_on_the_globe() {
        let point = |latitude, longitude| NewCheckpoint {
            state: Checkpoint::ExitFactory,
            latitude,
            longitude,
            address: None,
        };

        assert!(point(24.7, 46.6).validate().is_ok());
        assert!(point(-90.0, 180.0).validate().is_ok());
        assert!(matches!(point(91.0, 0.0).validate(), Err(AppError::BadRequest(_))));
        assert!(matches!(point(0.0, -180.5).validate(), Err(AppError::BadRequest(_))));
    }
}
