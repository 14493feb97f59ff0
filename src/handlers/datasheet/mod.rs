pub mod column;
pub mod data;
pub mod experiment;
pub mod utils;

// Re-export handler functions for use in routing
pub use experiment::create as experiment_create;
pub use experiment::delete as experiment_delete;
pub use experiment::get as experiment_get;
pub use experiment::list as experiment_list;

pub use column::add as columns_add;
pub use column::delete as column_delete;
pub use column::update as column_update;

pub use data::add as data_add;
pub use data::batch_delete as data_batch_delete;
pub use data::batch_import as data_batch_import;
pub use data::delete as data_delete;
pub use data::export as data_export;
pub use data::import_csv as data_import_csv;
pub use data::query as data_query;
pub use data::update as data_update;
