pub mod datasheet_service;

pub use datasheet_service::DatasheetService;
