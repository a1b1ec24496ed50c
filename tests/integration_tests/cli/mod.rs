#[path = "mod_cli.rs"]
mod cli_tests;
#[path = "mod_shell.rs"]
mod shell_tests;
