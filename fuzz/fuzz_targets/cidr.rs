#![no_main]

use libfuzzer_sys::fuzz_target;
use surveyor_core::net::Cidr;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(cidr) = text.parse::<Cidr>() {
            // 정규화된 표기는 다시 같은 값으로 파싱됨
            let again: Cidr = cidr.to_string().parse().expect("canonical form must parse");
            assert_eq!(cidr, again);
            assert!(cidr.contains(&cidr.network()));
        }
    }
});
