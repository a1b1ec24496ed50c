// Aggregates per-module test suites, mirroring src/
mod cli;
mod parse;
mod store;
mod utils;
