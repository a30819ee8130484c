#![no_main]
use fusecomm::modules::cmsg::{min_rights_len, ControlMessageReader};
use fusecomm::Error;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the length the kernel claims to have written
    let Some((&claimed, buf)) = data.split_first() else {
        return;
    };
    let reader = ControlMessageReader::new(buf, claimed as usize);

    let passed = reader.passed_descriptors();
    assert!(passed.iter().all(|fd| *fd >= 0));

    match reader.try_read_descriptor() {
        Ok(msg) => {
            assert_eq!(passed.first(), Some(&msg.fd));
            assert!(msg.header.is_rights());
            assert!(msg.fd >= 0);
            assert!(msg.header.len >= min_rights_len());
            assert!(msg.header.len <= claimed as usize);
        }
        Err(Error::UnexpectedMessageType { .. })
        | Err(Error::TruncatedMessage { .. })
        | Err(Error::InvalidDescriptor(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
});
