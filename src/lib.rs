pub mod config;
pub mod db;
pub mod entities;
pub mod import;
pub mod ipc;
pub mod store;
pub mod xlsx;
