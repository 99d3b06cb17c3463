pub mod audit;
pub mod cleaning;
pub mod error;
pub mod fetch;
pub mod model;
pub mod output;
pub mod ranking;
pub mod source;
pub mod stats;
