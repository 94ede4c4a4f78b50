pub mod resolve;
pub mod setup;
pub mod spot;
pub mod ui;
