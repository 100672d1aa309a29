#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use surveyor_core::transform::{Transformation, TransformationSet};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 목록 (최대 16개로 제한)
    rules: Vec<FuzzRule>,
    from: FuzzType,
    tos: Vec<FuzzType>,
}

#[derive(Arbitrary, Debug)]
struct FuzzRule {
    from: FuzzType,
    to: FuzzType,
    priority: i8,
    confidence: u8,
    ttl: u16,
    exclude: Vec<FuzzType>,
}

#[derive(Arbitrary, Debug, Clone, Copy)]
enum FuzzType {
    Fqdn,
    IpAddress,
    Netblock,
    Organization,
    TlsCertificate,
    All,
    None,
    Source,
    Garbage,
}

impl FuzzType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Fqdn => "FQDN",
            Self::IpAddress => "IPAddress",
            Self::Netblock => "Netblock",
            Self::Organization => "Organization",
            Self::TlsCertificate => "TLSCertificate",
            Self::All => "all",
            Self::None => "none",
            Self::Source => "DNS",
            Self::Garbage => "NotAType",
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let mut set = TransformationSet::new(1440, 50);
    set.register_source("DNS", 60);

    for rule in input.rules.iter().take(16) {
        let t = Transformation::new(rule.from.as_str(), rule.to.as_str())
            .with_priority(i32::from(rule.priority))
            .with_confidence(rule.confidence)
            .with_ttl(u32::from(rule.ttl))
            .with_exclude(rule.exclude.iter().take(8).map(|e| e.as_str()));
        let _ = set.add(t);
    }

    let tos: Vec<&str> = input.tos.iter().take(8).map(|t| t.as_str()).collect();
    if let Ok(matches) = set.check(input.from.as_str(), &tos) {
        // 결과에는 요청한 대상만 들어 있음
        for to in &tos {
            if matches.is_match(to) {
                assert!(matches.ttl(to).is_some());
            }
        }
    }
});
