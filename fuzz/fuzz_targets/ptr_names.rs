#![no_main]

use libfuzzer_sys::fuzz_target;
use surveyor_dns::SubdomainExtractor;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(extractor) = SubdomainExtractor::new() else {
        return;
    };
    if let Some(name) = extractor.single_name(raw) {
        // 받아들인 값은 그 자체로 정확히 하나의 토큰이어야 함
        assert_eq!(extractor.tokens(&name), vec![name.clone()]);
        assert!(!name.contains(char::is_whitespace));
    }
});
