pub mod aggregate;
pub mod alias_index;
pub mod analytics;
pub mod join_chain;
pub mod raw_query;
pub mod schema_graph;
