pub mod driver;
pub mod questions;
pub mod record;
pub mod report;
