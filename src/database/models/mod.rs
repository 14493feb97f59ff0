pub mod column;
pub mod experiment;
pub mod experiment_data;

pub use column::*;
pub use experiment::*;
pub use experiment_data::*;
