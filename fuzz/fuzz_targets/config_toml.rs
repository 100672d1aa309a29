#![no_main]

use libfuzzer_sys::fuzz_target;
use surveyor_core::config::SurveyorConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(config) = SurveyorConfig::parse(content) {
            // 파싱에 성공한 설정은 검증 단계에서도 패닉 없이 결과를 내야 함
            let _ = config.validate();
        }
    }
});
