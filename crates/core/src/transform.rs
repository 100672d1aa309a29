//! 변환 매처 -- 발견된 에셋 타입에서 탐색 가능한 하위 타입 결정
//!
//! [`Transformation`]은 `From -> To` 규칙이며 `To`는 에셋 카탈로그 타입,
//! 설정된 데이터 소스 이름, 또는 특수 값 `none`/`all` 중 하나입니다.
//!
//! # 규칙
//! - `none` 규칙은 같은 From 타입의 유일한 규칙이어야 합니다 (선언 순서 무관).
//! - `all` 규칙의 `exclude` 목록에 있는 타입은 결과에 절대 포함되지 않습니다.
//! - 유효 TTL/신뢰도 우선순위: 데이터 소스 TTL > 특정 규칙의 0이 아닌 값
//!   > `all` 규칙에서 상속된 값 > 전역 기본값.
//! - 규칙은 `priority` 내림차순으로 평가되며, 같은 우선순위는 선언 순서를 따릅니다.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MatchError};
use crate::types::AssetType;

/// 탐색 금지 대상
pub const TO_NONE: &str = "none";
/// 모든 후보 대상
pub const TO_ALL: &str = "all";
/// 전역 기본 TTL (분)
pub const DEFAULT_TTL_MINUTES: u32 = 1440;
/// 전역 기본 신뢰도
pub const DEFAULT_CONFIDENCE: u8 = 50;

/// 변환 규칙
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub priority: i32,
    /// 0이면 상속 또는 기본값 사용
    #[serde(default)]
    pub confidence: u8,
    /// 분 단위, 0이면 상속 또는 기본값 사용
    #[serde(default)]
    pub ttl: u32,
    /// `all` 규칙에서만 허용
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl Transformation {
    /// 값이 비어 있는 규칙을 생성합니다.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            priority: 0,
            confidence: 0,
            ttl: 0,
            exclude: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_none(&self) -> bool {
        self.to.eq_ignore_ascii_case(TO_NONE)
    }

    pub fn is_all(&self) -> bool {
        self.to.eq_ignore_ascii_case(TO_ALL)
    }

    fn excludes(&self, to: &str) -> bool {
        self.exclude.iter().any(|e| e.eq_ignore_ascii_case(to))
    }

    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidTransformation {
            from: self.from.clone(),
            to: self.to.clone(),
            reason: reason.into(),
        }
    }
}

/// 매칭된 대상 하나의 유효 값
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchValue {
    pub ttl: u32,
    pub confidence: u8,
}

/// `check` 결과 -- 대상 이름(대소문자 무시)에서 유효 TTL/신뢰도로의 매핑
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matches {
    to: HashMap<String, (String, MatchValue)>,
}

impl Matches {
    pub fn is_match(&self, to: &str) -> bool {
        self.to.contains_key(&to.to_ascii_lowercase())
    }

    /// 매칭된 대상의 유효 TTL (분)
    pub fn ttl(&self, to: &str) -> Option<u32> {
        self.get(to).map(|v| v.ttl)
    }

    /// 매칭된 대상의 유효 신뢰도
    pub fn confidence(&self, to: &str) -> Option<u8> {
        self.get(to).map(|v| v.confidence)
    }

    pub fn get(&self, to: &str) -> Option<MatchValue> {
        self.to.get(&to.to_ascii_lowercase()).map(|(_, v)| *v)
    }

    /// 매칭된 대상 이름 (후보로 전달된 표기 그대로)
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.to.values().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to.is_empty()
    }
}

#[derive(Default)]
struct Pending {
    name: String,
    ttl: u32,
    confidence: u8,
    explicit_ttl: bool,
    explicit_confidence: bool,
}

impl Pending {
    fn merge(&mut self, rule: &Transformation, explicit: bool) {
        if rule.ttl != 0 && !self.explicit_ttl && (explicit || self.ttl == 0) {
            self.ttl = rule.ttl;
            self.explicit_ttl = explicit;
        }
        if rule.confidence != 0
            && !self.explicit_confidence
            && (explicit || self.confidence == 0)
        {
            self.confidence = rule.confidence;
            self.explicit_confidence = explicit;
        }
    }
}

/// 검증된 변환 규칙 집합
#[derive(Debug, Clone)]
pub struct TransformationSet {
    rules: Vec<Transformation>,
    /// 소문자 데이터 소스 이름 -> TTL (분, 0이면 미설정)
    sources: HashMap<String, u32>,
    default_ttl: u32,
    default_confidence: u8,
}

impl Default for TransformationSet {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MINUTES, DEFAULT_CONFIDENCE)
    }
}

impl TransformationSet {
    pub fn new(default_ttl: u32, default_confidence: u8) -> Self {
        Self {
            rules: Vec::new(),
            sources: HashMap::new(),
            default_ttl,
            default_confidence,
        }
    }

    /// 데이터 소스 이름을 등록합니다. 규칙의 `To`로 쓰일 수 있고, TTL이 0이 아니면
    /// 해당 대상의 유효 TTL을 덮어씁니다.
    pub fn register_source(&mut self, name: &str, ttl: u32) {
        self.sources.insert(name.to_ascii_lowercase(), ttl);
    }

    pub fn is_source(&self, name: &str) -> bool {
        self.sources.contains_key(&name.to_ascii_lowercase())
    }

    /// 데이터 소스에 설정된 0이 아닌 TTL
    pub fn source_ttl(&self, name: &str) -> Option<u32> {
        self.sources
            .get(&name.to_ascii_lowercase())
            .copied()
            .filter(|ttl| *ttl > 0)
    }

    pub fn rules(&self) -> &[Transformation] {
        &self.rules
    }

    pub fn default_ttl(&self) -> u32 {
        self.default_ttl
    }

    pub fn default_confidence(&self) -> u8 {
        self.default_confidence
    }

    /// 규칙을 검증한 뒤 추가합니다.
    pub fn add(&mut self, rule: Transformation) -> Result<(), ConfigError> {
        self.validate(&rule)?;
        self.rules.push(rule);
        Ok(())
    }

    /// 이미 추가된 규칙들을 기준으로 새 규칙을 검증합니다.
    pub fn validate(&self, rule: &Transformation) -> Result<(), ConfigError> {
        if AssetType::lookup(&rule.from).is_none() {
            return Err(rule.invalid("from type is not in the asset catalog"));
        }
        if !rule.is_none() && !rule.is_all() && !self.is_target(&rule.to) {
            return Err(rule.invalid(
                "to must be an asset type, a configured data source, 'none' or 'all'",
            ));
        }
        if !rule.exclude.is_empty() {
            if !rule.is_all() {
                return Err(rule.invalid("exclude is only valid on an 'all' rule"));
            }
            if let Some(bad) = rule.exclude.iter().find(|e| !self.is_target(e)) {
                return Err(rule.invalid(format!("excluded type '{bad}' is unknown")));
            }
        }
        if rule.confidence > 100 {
            return Err(rule.invalid("confidence must be within 0-100"));
        }

        let mut same_from = self
            .rules
            .iter()
            .filter(|r| r.from.eq_ignore_ascii_case(&rule.from))
            .peekable();
        if rule.is_none() {
            if let Some(existing) = same_from.peek() {
                return Err(rule.invalid(format!(
                    "'none' must be the only transformation for {}, found {}->{}",
                    rule.from, existing.from, existing.to
                )));
            }
        } else if same_from.any(Transformation::is_none) {
            return Err(rule.invalid(format!(
                "{}->none is already declared and must be the only transformation",
                rule.from
            )));
        }
        Ok(())
    }

    fn is_target(&self, name: &str) -> bool {
        AssetType::lookup(name).is_some() || self.is_source(name)
    }

    /// `from` 타입에서 후보 대상들로의 허용된 전이를 계산합니다.
    pub fn check(&self, from: &str, tos: &[&str]) -> Result<Matches, MatchError> {
        let mut ordered: Vec<&Transformation> = self
            .rules
            .iter()
            .filter(|r| r.from.eq_ignore_ascii_case(from))
            .collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut pending: HashMap<String, Pending> = HashMap::new();
        let mut excluded: HashSet<String> = HashSet::new();

        for rule in ordered {
            if rule.is_none() {
                continue;
            }
            if rule.is_all() {
                excluded.extend(rule.exclude.iter().map(|e| e.to_ascii_lowercase()));
                for to in tos.iter().filter(|to| !rule.excludes(to)) {
                    entry(&mut pending, to).merge(rule, false);
                }
            } else {
                for to in tos.iter().filter(|to| rule.to.eq_ignore_ascii_case(to)) {
                    entry(&mut pending, to).merge(rule, true);
                }
            }
        }
        pending.retain(|key, _| !excluded.contains(key));

        if pending.is_empty() {
            return Err(MatchError::NoMatches {
                from: from.to_owned(),
            });
        }

        let to = pending
            .into_iter()
            .map(|(key, p)| {
                let mut ttl = if p.ttl == 0 { self.default_ttl } else { p.ttl };
                if let Some(&source_ttl) = self.sources.get(&key) {
                    if source_ttl > 0 {
                        ttl = source_ttl;
                    }
                }
                let confidence = if p.confidence == 0 {
                    self.default_confidence
                } else {
                    p.confidence
                };
                (key, (p.name, MatchValue { ttl, confidence }))
            })
            .collect();
        Ok(Matches { to })
    }
}

fn entry<'a>(pending: &'a mut HashMap<String, Pending>, to: &str) -> &'a mut Pending {
    pending
        .entry(to.to_ascii_lowercase())
        .or_insert_with(|| Pending {
            name: to.to_owned(),
            ..Pending::default()
        })
}
