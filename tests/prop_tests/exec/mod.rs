#[path = "prop_paging.rs"]
mod paging_props;
