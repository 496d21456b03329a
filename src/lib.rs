// Library for tests to access modules

pub mod aggregate;
pub mod cache;
pub mod codec;
pub mod config;
pub mod dashboard;
pub mod marker;
pub mod models;
pub mod partition;
pub mod read_path;
pub mod store;
