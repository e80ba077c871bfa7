//! Trip export: filters, row projection, workbook rendering.
//!
//! Each checkpoint kind becomes two columns, one with the `" | "`-joined
//! timestamps and one with the matching `" | "`-joined addresses, both in
//! timestamp order so that the n-th entries belong to the same log.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook};

use crate::{
    db::{CarStore, TripStore, UserStore},
    error::{AppError, Result},
    models::{
        car::Car,
        trip::{Checkpoint, Trip, TripLog},
        user::User,
    },
};

pub const DEFAULT_EXPORT_FILENAME: &str = "trips_export.xlsx";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NAME: &str = "Trips";
const JOIN_SEPARATOR: &str = " | ";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
/// Excel's per-cell text limit, in characters
const MAX_CELL_CHARS: usize = 32_767;

/// Export selection. Inputs that fail to parse are dropped, never rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportFilter {
    pub driver_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ExportFilter {
    pub fn from_raw(driver_id: Option<&str>, from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            driver_id: driver_id.and_then(|raw| raw.trim().parse().ok()),
            from: from.and_then(parse_day),
            to: to.and_then(parse_day),
        }
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let parsed = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok();
    if parsed.is_none() && !raw.trim().is_empty() {
        tracing::debug!("Ignoring malformed export date filter '{}'", raw);
    }
    parsed
}

/// A trip with everything the projection needs resolved
#[derive(Debug, Clone)]
pub struct ExportTrip {
    pub trip: Trip,
    pub logs: Vec<TripLog>,
    pub driver: Option<User>,
    pub car: Option<Car>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointCells {
    pub times: String,
    pub addresses: String,
}

/// One spreadsheet row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub trip_id: i64,
    pub driver: String,
    pub car_plate: String,
    pub start_date: String,
    pub status: String,
    /// In `Checkpoint::ALL` order
    pub checkpoints: Vec<CheckpointCells>,
}

impl ReportRow {
    pub fn headers() -> Vec<String> {
        let mut headers: Vec<String> = ["Trip ID", "Driver", "Car Plate", "Start Date", "Status"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        for checkpoint in Checkpoint::ALL {
            headers.push(format!("{} Time", checkpoint.report_title()));
            headers.push(format!("{} Address", checkpoint.report_title()));
        }
        headers
    }

    /// Text cells after the numeric trip id, in header order
    pub fn text_cells(&self) -> Vec<&str> {
        let mut cells = vec![
            self.driver.as_str(),
            self.car_plate.as_str(),
            self.start_date.as_str(),
            self.status.as_str(),
        ];
        for cell in &self.checkpoints {
            cells.push(&cell.times);
            cells.push(&cell.addresses);
        }
        cells
    }

    pub fn cells(&self, checkpoint: Checkpoint) -> Option<&CheckpointCells> {
        let index = Checkpoint::ALL.iter().position(|c| *c == checkpoint)?;
        self.checkpoints.get(index)
    }
}

fn format_time(time: NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Flatten a trip and its logs into a report row
pub fn project(export: &ExportTrip) -> ReportRow {
    let mut logs: Vec<&TripLog> = export.logs.iter().collect();
    logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

    let checkpoints = Checkpoint::ALL
        .iter()
        .map(|checkpoint| {
            let matching: Vec<&&TripLog> =
                logs.iter().filter(|log| log.state == *checkpoint).collect();
            CheckpointCells {
                times: matching
                    .iter()
                    .map(|log| format_time(log.timestamp))
                    .collect::<Vec<_>>()
                    .join(JOIN_SEPARATOR),
                addresses: matching
                    .iter()
                    .map(|log| log.address.as_deref().unwrap_or("N/A"))
                    .collect::<Vec<_>>()
                    .join(JOIN_SEPARATOR),
            }
        })
        .collect();

    ReportRow {
        trip_id: export.trip.id,
        driver: export
            .driver
            .as_ref()
            .map(|driver| driver.username.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        car_plate: export
            .car
            .as_ref()
            .map(|car| car.plate.clone())
            .unwrap_or_else(|| "N/A".to_string()),
        start_date: format_time(export.trip.start_date),
        status: export.trip.status.as_str().to_string(),
        checkpoints,
    }
}

/// Download name: generic for multi-driver exports, otherwise built from
/// the driver's username and plate.
pub fn export_filename(driver: Option<&User>, car: Option<&Car>) -> String {
    match driver {
        Some(driver) => {
            let user = driver.username.trim().replace(' ', "_");
            let plate = car
                .map(|car| car.plate.replace(' ', ""))
                .filter(|plate| !plate.is_empty())
                .unwrap_or_else(|| "NoPlate".to_string());
            format!("{}_{}.xlsx", user, plate)
        }
        None => DEFAULT_EXPORT_FILENAME.to_string(),
    }
}

/// Render rows into an xlsx workbook
pub fn render_workbook(rows: &[ReportRow]) -> Result<Vec<u8>> {
    let headers = ReportRow::headers();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        worksheet.write_number(line, 0, row.trip_id as f64)?;
        widths[0] = widths[0].max(row.trip_id.to_string().len());

        for (offset, cell) in row.text_cells().into_iter().enumerate() {
            let col = offset + 1;
            let cell = fit_cell(cell);
            worksheet.write_string(line, col as u16, cell)?;
            if let Some(width) = widths.get_mut(col) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, (*width + 2) as f64)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Cut a cell down to what a worksheet cell can hold.
fn fit_cell(cell: &str) -> &str {
    match cell.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => {
            tracing::warn!("Truncated export cell of {} characters", cell.chars().count());
            &cell[..end]
        }
        None => cell,
    }
}

/// A rendered export ready to be sent as a download
#[derive(Debug)]
pub struct Export {
    pub filename: String,
    pub rows: usize,
    pub content: Vec<u8>,
}

/// Gathers trips, logs, drivers and cars for an export
#[derive(Clone)]
pub struct ReportService {
    user_store: UserStore,
    car_store: CarStore,
    trip_store: TripStore,
}

impl ReportService {
    pub fn new(user_store: UserStore, car_store: CarStore, trip_store: TripStore) -> Self {
        Self {
            user_store,
            car_store,
            trip_store,
        }
    }

    pub async fn collect(&self, filter: ExportFilter) -> Result<Vec<ExportTrip>> {
        let trips = self
            .trip_store
            .list_for_export(filter.driver_id, filter.from, filter.to)
            .await?;

        let trip_ids: Vec<i64> = trips.iter().map(|trip| trip.id).collect();
        let mut logs = self.trip_store.logs_for_trips(&trip_ids).await?;

        let mut driver_ids: Vec<i64> = trips.iter().map(|trip| trip.driver_id).collect();
        driver_ids.sort_unstable();
        driver_ids.dedup();
        let drivers: HashMap<i64, User> = self
            .user_store
            .get_users_by_ids(&driver_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();
        let cars = self.car_store.cars_by_id().await?;

        Ok(trips
            .into_iter()
            .map(|trip| {
                let driver = drivers.get(&trip.driver_id).cloned();
                let car = driver
                    .as_ref()
                    .and_then(|driver| driver.car_id)
                    .and_then(|car_id| cars.get(&car_id).cloned());
                ExportTrip {
                    logs: logs.remove(&trip.id).unwrap_or_default(),
                    trip,
                    driver,
                    car,
                }
            })
            .collect())
    }

    pub async fn export(&self, filter: ExportFilter) -> Result<Export> {
        let trips = self.collect(filter).await?;
        let rows: Vec<ReportRow> = trips.iter().map(project).collect();

        let filename = match filter.driver_id {
            // Only a driver names the file; unknown ids and admins get the generic name.
            Some(driver_id) => match self.user_store.get_driver(driver_id).await {
                Ok(driver) => {
                    let car = match driver.car_id {
                        Some(car_id) => self.car_store.get_car(car_id).await.ok(),
                        None => None,
                    };
                    export_filename(Some(&driver), car.as_ref())
                }
                Err(AppError::NotFound(_)) => export_filename(None, None),
                Err(e) => return Err(e),
            },
            None => export_filename(None, None),
        };

        let content = render_workbook(&rows)?;
        tracing::info!("Exported {} trips as {}", rows.len(), filename);

        Ok(Export {
            filename,
            rows: rows.len(),
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{car::CarStatus, trip::TripStatus, user::Role};

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn trip(id: i64) -> Trip {
        Trip {
            id,
            driver_id: 3,
            start_date: at(4, 6, 30),
            status: TripStatus::Completed,
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

    fn log(id: i64, state: Checkpoint, timestamp: NaiveDateTime, address: Option<&str>) -> TripLog {
        TripLog {
            id,
            trip_id: 1,
            state,
            timestamp,
            latitude: 24.7,
            longitude: 46.6,
            address: address.map(str::to_string),
        }
    }

    fn driver(username: &str) -> User {
        User {
            id: 3,
            username: username.into(),
            password_hash: String::new(),
            role: Role::Driver,
            car_id: Some(9),
        }
    }

    fn car(plate: &str) -> Car {
        Car {
            id: 9,
            plate: plate.into(),
            model: "Hilux".into(),
            status: CarStatus::Active,
        }
    }

    #[test]
    fn repeated_checkpoint_joins_in_timestamp_order() {
        let export = ExportTrip {
            trip: trip(1),
            // Deliberately out of order
            logs: vec![
                log(3, Checkpoint::ArriveWarehouse, at(4, 9, 15), Some("B")),
                log(1, Checkpoint::ExitFactory, at(4, 7, 0), Some("Factory Gate")),
                log(2, Checkpoint::ArriveWarehouse, at(4, 8, 0), Some("A")),
            ],
            driver: Some(driver("Omar")),
            car: Some(car("ABC 123")),
        };

        let row = project(&export);
        let warehouse = row.cells(Checkpoint::ArriveWarehouse).unwrap();
        assert_eq!(warehouse.addresses, "A | B");
        assert_eq!(warehouse.times, "2024-03-04 08:00 | 2024-03-04 09:15");

        let factory = row.cells(Checkpoint::ExitFactory).unwrap();
        assert_eq!(factory.addresses, "Factory Gate");
        assert_eq!(row.cells(Checkpoint::ExitWarehouse).unwrap(), &CheckpointCells::default());

        assert_eq!(row.driver, "Omar");
        assert_eq!(row.car_plate, "ABC 123");
        assert_eq!(row.start_date, "2024-03-04 06:30");
        assert_eq!(row.status, "completed");
    }

    #[test]
    fn missing_address_keeps_columns_aligned() {
        let export = ExportTrip {
            trip: trip(1),
            logs: vec![
                log(1, Checkpoint::ExitWarehouse, at(4, 8, 0), None),
                log(2, Checkpoint::ExitWarehouse, at(4, 10, 0), Some("WH2")),
            ],
            driver: None,
            car: None,
        };

        let row = project(&export);
        let cells = row.cells(Checkpoint::ExitWarehouse).unwrap();
        assert_eq!(cells.addresses, "N/A | WH2");
        assert_eq!(cells.times.split(JOIN_SEPARATOR).count(), 2);
        assert_eq!(row.driver, "Unknown");
        assert_eq!(row.car_plate, "N/A");
    }

    #[test]
    fn headers_match_cell_count() {
        let row = project(&ExportTrip {
            trip: trip(1),
            logs: Vec::new(),
            driver: None,
            car: None,
        });
        assert_eq!(ReportRow::headers().len(), row.text_cells().len() + 1);
        assert_eq!(ReportRow::headers()[5], "Exit Factory Time");
        assert_eq!(ReportRow::headers()[12], "Arrive Factory Time");
    }

    #[test]
    fn filename_uses_sanitized_username_and_plate() {
        assert_eq!(
            export_filename(Some(&driver("Omar Al Harbi")), Some(&car("ABC 123"))),
            "Omar_Al_Harbi_ABC123.xlsx"
        );
        assert_eq!(export_filename(Some(&driver("Omar")), None), "Omar_NoPlate.xlsx");
        assert_eq!(export_filename(None, None), DEFAULT_EXPORT_FILENAME);
    }

    #[test]
    fn malformed_filters_are_ignored() {
        let filter = ExportFilter::from_raw(Some("abc"), Some("2024-02-30"), Some("2024-03-31"));
        assert_eq!(
            filter,
            ExportFilter {
                driver_id: None,
                from: None,
                to: NaiveDate::from_ymd_opt(2024, 3, 31),
            }
        );
        assert_eq!(ExportFilter::from_raw(Some("5"), None, None).driver_id, Some(5));
    }

    #[test]
    fn workbook_renders_as_zip_container() {
        let row = project(&ExportTrip {
            trip: trip(1),
            logs: vec![log(1, Checkpoint::ArriveFactory, at(4, 12, 0), Some("Factory Gate"))],
            driver: Some(driver("Omar")),
            car: None,
        });
        let bytes = render_workbook(&[row]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn oversized_cells_are_truncated() {
        assert_eq!(fit_cell("WH1 | WH2"), "WH1 | WH2");

        let long = "ä".repeat(MAX_CELL_CHARS + 10);
        assert_eq!(fit_cell(&long).chars().count(), MAX_CELL_CHARS);

        // Two thousand visits to the same warehouse overflow a single cell
        let logs = (0..2_000)
            .map(|i| {
                log(
                    i,
                    Checkpoint::ArriveWarehouse,
                    at(4, 8, 0) + chrono::Duration::minutes(i),
                    Some("Warehouse District 7"),
                )
            })
            .collect();
        let row = project(&ExportTrip {
            trip: trip(1),
            logs,
            driver: None,
            car: None,
        });
        assert!(row.cells(Checkpoint::ArriveWarehouse).unwrap().addresses.chars().count() > MAX_CELL_CHARS);

        let content = render_workbook(&[row]).unwrap();
        assert!(content.starts_with(b"PK"));
    }
}
