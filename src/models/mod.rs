pub mod chart;
pub mod schema;
