pub mod car;
pub mod trip;
pub mod user;
