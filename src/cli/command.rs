/// A programmatic shell command, independent of how it was spelled on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Parse only and print the descriptor.
    Parse { query: String },
    /// Parse and execute one page.
    Run { query: String, page: u64 },
    /// Print the process-wide counters.
    Metrics,
}
