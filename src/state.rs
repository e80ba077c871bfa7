use std::sync::Arc;

use crate::{
    config::Config,
    db::{CarStore, DbPool, SettingsStore, TripStore, UserStore},
    services::{AuthService, FsLogoStore, JwtKeys, LogoStore, ReportService, TripService},
};

/// Stores and services handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub user_store: UserStore,
    pub car_store: CarStore,
    pub trip_store: TripStore,
    pub settings_store: SettingsStore,
    pub auth_service: AuthService,
    pub trip_service: TripService,
    pub report_service: ReportService,
    pub logo_store: Arc<dyn LogoStore>,
}

impl AppState {
    pub fn new(pool: DbPool, config: &Config) -> Self {
        let logo_store = Arc::new(FsLogoStore::new(config.logo_path.clone()));
        Self::with_logo_store(pool, config, logo_store)
    }

    pub fn with_logo_store(pool: DbPool, config: &Config, logo_store: Arc<dyn LogoStore>) -> Self {
        let user_store = UserStore::new(pool.clone());
        let car_store = CarStore::new(pool.clone());
        let trip_store = TripStore::new(pool.clone());
        let settings_store = SettingsStore::new(pool);

        let keys = JwtKeys::new(&config.jwt_secret, config.jwt_expiration_hours);
        let auth_service = AuthService::new(user_store.clone(), keys);
        let trip_service = TripService::new(trip_store.clone(), config.trip_timezone);
        let report_service =
            ReportService::new(user_store.clone(), car_store.clone(), trip_store.clone());

        Self {
            user_store,
            car_store,
            trip_store,
            settings_store,
            auth_service,
            trip_service,
            report_service,
            logo_store,
        }
    }
}
