#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    let Ok(s) = std::str::from_utf8(data) else { return };
    let Ok(value) = docshell::parse::normalize(s) else { return };
    let Ok(filter) = docshell::utils::json::to_document(&value, "filter") else { return };
    let docs = [
        bson::doc! {"a": 1, "b": 2, "name": "x"},
        bson::doc! {"a": 10, "b": -5, "name": "y", "nested": {"z": 3}, "tags": ["p", "q"]},
        bson::doc! {"active": true},
    ];
    for d in &docs {
        let _ = docshell::store::eval::matches(d, &filter);
    }
});
