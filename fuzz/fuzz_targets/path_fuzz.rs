#![no_main]
use fusecomm::modules::path::{absolutize_in, clean};
use libfuzzer_sys::fuzz_target;
use std::path::{Component, Path};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let input = input.replace('\0', "");

    let cleaned = clean(Path::new(&input));
    assert_eq!(clean(&cleaned), cleaned);

    let absolute = absolutize_in(Path::new("/base"), Path::new(&input));
    assert!(absolute.is_absolute());
    assert_eq!(absolutize_in(Path::new("/base"), &absolute), absolute);
    assert!(!absolute
        .components()
        .any(|c| matches!(c, Component::CurDir | Component::ParentDir)));
});
