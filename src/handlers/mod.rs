// handlers/mod.rs - HTTP handlers
//
// Handlers stay thin: extract, call DatasheetService, wrap the result in the
// response envelope. Errors convert into ApiError through `?`.
pub mod datasheet;
pub mod health;
