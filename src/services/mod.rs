pub mod auth_service;
pub mod logo_store;
pub mod report_service;
pub mod trip_service;

pub use auth_service::{AuthService, JwtKeys};
pub use logo_store::{FsLogoStore, LogoStore};
pub use report_service::ReportService;
pub use trip_service::TripService;
