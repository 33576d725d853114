pub mod runner;
mod scan;
