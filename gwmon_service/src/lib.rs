pub mod alert;
pub mod analysis;
pub mod config;
pub mod db;
pub mod districts;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod refresh;
pub mod verify;
