pub mod audit;
pub mod batch;
pub mod migrate;
pub mod predict;
