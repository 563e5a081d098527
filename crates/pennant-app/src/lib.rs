// Library root: exposes the application modules so integration tests can
// drive the same loading, persistence and rendering paths as the binary.

pub mod config;
pub mod db;
pub mod input;
pub mod pipeline;
pub mod report;
