//! 저장소에서 읽은 행을 엄격한 `TradeRecord` 로 바꾸는 유일한 진입점.
//! 누락 필드/예전 포맷은 여기서만 기본값으로 채운다.

use chrono::{DateTime, NaiveDateTime, Utc};
use interface::{
    compute_profit, compute_roi, duration_minutes, Memo, Mood, ResultStatus, TradeRecord,
    DEFAULT_STRATEGY, DEFAULT_TICKER,
};
use serde_json::Value;
use std::convert::TryFrom;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use super::entities::trade;
use super::RecordError;

const DEFAULT_SATISFACTION: u8 = 5;

/// SeaORM trade::Model 을 TradeRecord 로 변환
impl TryFrom<trade::Model> for TradeRecord {
    type Error = RecordError;

    fn try_from(model: trade::Model) -> Result<Self, Self::Error> {
        let entry_time = parse_timestamp(&model.entry_time).ok_or_else(|| {
            RecordError::InvalidRecord(format!(
                "Failed to parse entry_time of trade {}: {}",
                model.id, model.entry_time
            ))
        })?;

        let mut exit_time = model
            .exit_time
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(entry_time);
        if exit_time < entry_time {
            warn!(
                "trade {}: exit_time before entry_time, clamping to entry_time",
                model.id
            );
            exit_time = entry_time;
        }

        let profit = model
            .profit
            .unwrap_or_else(|| compute_profit(model.start_balance, model.final_balance));
        let roi = model
            .roi
            .unwrap_or_else(|| compute_roi(model.start_balance, profit));

        let result_status = model
            .result_status
            .as_deref()
            .and_then(|s| ResultStatus::from_str(s).ok())
            .unwrap_or_else(|| ResultStatus::from_profit(profit));

        let satisfaction = model
            .satisfaction
            .map(|s| s.clamp(1, 10) as u8)
            .unwrap_or(DEFAULT_SATISFACTION);

        Ok(TradeRecord {
            trade_key: Uuid::parse_str(&model.trade_key).unwrap_or_default(),
            user_id: model.user_id,
            entry_time,
            exit_time,
            ticker: non_empty_or(model.ticker, DEFAULT_TICKER),
            strategy_name: non_empty_or(model.strategy_name, DEFAULT_STRATEGY),
            strategy_detail: model.strategy_detail.unwrap_or_default(),
            mood: model.mood.map(Mood::from).unwrap_or_default(),
            start_balance: model.start_balance,
            final_balance: model.final_balance,
            profit,
            roi,
            result_status,
            review: model.review.unwrap_or_default(),
            satisfaction,
            chart_url: model.chart_url.unwrap_or_default(),
            duration_minutes: model
                .duration_minutes
                .unwrap_or_else(|| duration_minutes(entry_time, exit_time)),
            memos: parse_memos(model.memos.as_deref()),
        })
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

/// RFC3339 또는 타임존 없는 ISO 8601 (UTC 로 간주)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// 메모 컬럼 파싱. JSON 배열이 정상이지만 예전 데이터는
/// 파이썬 리터럴 문자열(`[{'time': .., 'text': "don't"}]`)로 들어있을 수 있다.
/// 해석할 수 없으면 빈 목록.
pub fn parse_memos(raw: Option<&str>) -> Vec<Memo> {
    let raw = match raw.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return Vec::new(),
    };

    let value = serde_json::from_str::<Value>(raw)
        .ok()
        .or_else(|| parse_py_literal(raw));

    match value {
        Some(Value::Array(items)) => items.into_iter().map(memo_from_value).collect(),
        Some(_) | None => {
            warn!("Unreadable memos column, defaulting to empty list");
            Vec::new()
        }
    }
}

fn memo_from_value(item: Value) -> Memo {
    match item {
        Value::Object(map) => Memo {
            time: map
                .get("time")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            text: match map.get("text") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            },
        },
        Value::String(text) => Memo {
            time: String::new(),
            text,
        },
        other => Memo {
            time: String::new(),
            text: other.to_string(),
        },
    }
}

/// 파이썬 `repr` 리터럴을 JSON 값으로 변환.
/// list/tuple/dict, 작은/큰따옴표 문자열(백슬래시 이스케이프), 숫자, None/True/False 만 지원.
pub(crate) fn parse_py_literal(raw: &str) -> Option<Value> {
    let mut parser = LiteralParser {
        chars: raw.chars().collect(),
        pos: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    (parser.pos == parser.chars.len()).then_some(value)
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '[' => self.sequence(']'),
            '(' => self.sequence(')'),
            '{' => self.dict(),
            '\'' | '"' => self.string().map(Value::String),
            _ => self.atom(),
        }
    }

    fn sequence(&mut self, close: char) -> Option<Value> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek()? == close {
                self.bump();
                return Some(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump()? {
                ',' => continue,
                c if c == close => return Some(Value::Array(items)),
                _ => return None,
            }
        }
    }

    fn dict(&mut self) -> Option<Value> {
        self.bump();
        let mut map = serde_json::Map::new();
        loop {
            self.skip_ws();
            if self.peek()? == '}' {
                self.bump();
                return Some(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.skip_ws();
            if self.bump()? != ':' {
                return None;
            }
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump()? {
                ',' => continue,
                '}' => return Some(Value::Object(map)),
                _ => return None,
            }
        }
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            match self.bump()? {
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'x' => out.push(self.hex_escape(2)?),
                    'u' => out.push(self.hex_escape(4)?),
                    'U' => out.push(self.hex_escape(8)?),
                    c @ ('\\' | '\'' | '"') => out.push(c),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                c if c == quote => return Some(out),
                c => out.push(c),
            }
        }
    }

    fn hex_escape(&mut self, digits: usize) -> Option<char> {
        let hex = (0..digits)
            .map(|_| self.bump())
            .collect::<Option<String>>()?;
        char::from_u32(u32::from_str_radix(&hex, 16).ok()?)
    }

    fn atom(&mut self) -> Option<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || matches!(c, '.' | '-' | '+' | '_')) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "None" => Some(Value::Null),
            "True" => Some(Value::Bool(true)),
            "False" => Some(Value::Bool(false)),
            _ => match word.parse::<i64>() {
                Ok(i) => Some(Value::from(i)),
                Err(_) => word
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number),
            },
        }
    }
}
