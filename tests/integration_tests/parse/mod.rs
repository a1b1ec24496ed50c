#[path = "mod_collection.rs"]
mod collection_tests;
#[path = "mod_command.rs"]
mod command_tests;
#[path = "mod_notation.rs"]
mod notation_tests;
