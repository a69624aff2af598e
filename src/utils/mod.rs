pub mod cfg;
pub mod dominance;
