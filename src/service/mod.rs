pub mod retry;
pub mod startup;
