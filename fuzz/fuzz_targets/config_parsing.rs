#![no_main]

use libfuzzer_sys::fuzz_target;
use resolvit::{ContainerBuilder, ContainerConfig, DiError};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    match ContainerConfig::from_json_str(text) {
        Ok(config) => {
            // Anything that parses must validate and build.
            assert!(config.max_depth >= 1);
            assert!(config.validate().is_ok());
            let container = ContainerBuilder::new().with_config(config.clone()).build();
            assert_eq!(container.config(), &config);
        }
        Err(DiError::Config(_)) => {}
        Err(other) => panic!("unexpected error kind: {other}"),
    }
});
