pub mod cli;
pub mod plan;
pub mod replay;
pub mod restore;
