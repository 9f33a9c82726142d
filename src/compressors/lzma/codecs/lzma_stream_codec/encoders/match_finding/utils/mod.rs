pub mod hash234;
pub mod match_positions;
