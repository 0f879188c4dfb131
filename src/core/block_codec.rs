//! 整合區塊的編碼與解析。
//!
//! 區塊以成對的標記包住，標記內容只取決於平台名稱：
//! `{{!-- begin SCW integration block --}}` ... `{{!-- end SCW integration block --}}`
//! 這是已儲存資料的格式，必須逐位元組保持一致。

use crate::core::template::Template;
use crate::domain::model::{IntegrationRecord, PolicyContext, Provider};
use crate::utils::error::Result;
use std::collections::BTreeMap;
use std::ops::Range;

pub fn begin_marker(name: &str) -> String {
    format!("{{{{!-- begin {} integration block --}}}}", name)
}

pub fn end_marker(name: &str) -> String {
    format!("{{{{!-- end {} integration block --}}}}", name)
}

/// TeamServer 儲存時會改動換行，所以區塊內容不依賴換行
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace('\n', " ").trim().to_string()
}

pub fn render_block(
    provider: Provider,
    template: &Template,
    record: &IntegrationRecord,
    policy: &PolicyContext,
) -> Result<String> {
    let context = serde_json::json!({
        "integration": serde_json::to_value(record)?,
        "policy": serde_json::to_value(policy)?,
    });
    let body = template.render(&context);
    let name = provider.block_name();
    let block = format!("{}{}{}", begin_marker(name), body, end_marker(name));

    tracing::debug!("Rendered {} block for rule '{}'", name, policy.name);
    Ok(normalize_newlines(&block))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWarning {
    UnmatchedBegin { provider: Provider },
    UnmatchedEnd { provider: Provider },
    OverlappingBlocks { first: Provider, second: Provider },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedField {
    /// 每個平台找到的區塊，依出現順序排列
    pub blocks: BTreeMap<Provider, Vec<String>>,
    pub unrelated: String,
    pub warnings: Vec<FieldWarning>,
}

impl ParsedField {
    /// 同一平台有多個區塊時，以最後一個為準
    pub fn block_for(&self, provider: Provider) -> Option<&str> {
        self.blocks
            .get(&provider)
            .and_then(|blocks| blocks.last())
            .map(String::as_str)
    }

    pub fn has_block(&self, provider: Provider) -> bool {
        self.blocks.contains_key(&provider)
    }
}

pub fn extract_blocks(text: &str) -> ParsedField {
    let normalized = normalize_newlines(text);
    let mut warnings = Vec::new();
    let mut spans: Vec<(Provider, Range<usize>)> = Vec::new();

    for provider in Provider::ALL {
        let (found, provider_warnings) = scan_provider(&normalized, provider);
        spans.extend(found.into_iter().map(|span| (provider, span)));
        warnings.extend(provider_warnings);
    }

    spans.sort_by_key(|(_, span)| span.start);

    let mut blocks: BTreeMap<Provider, Vec<String>> = BTreeMap::new();
    let mut unrelated = String::new();
    let mut cursor = 0;
    for group in group_overlapping(spans) {
        let start = group[0].1.start;
        let end = group.iter().map(|(_, span)| span.end).max().unwrap_or(start);
        unrelated.push_str(&normalized[cursor..start]);

        match group.as_slice() {
            [(provider, span)] => blocks
                .entry(*provider)
                .or_default()
                .push(normalized[span.clone()].to_string()),
            [(first, _), (second, _), ..] => {
                tracing::warn!(
                    "⚠️ {} and {} integration blocks overlap; keeping that part as plain text",
                    first,
                    second
                );
                warnings.push(FieldWarning::OverlappingBlocks {
                    first: *first,
                    second: *second,
                });
                unrelated.push_str(&normalized[start..end]);
            }
            [] => {}
        }
        cursor = end;
    }
    unrelated.push_str(&normalized[cursor..]);

    ParsedField {
        blocks,
        unrelated: unrelated.trim().to_string(),
        warnings,
    }
}

/// 依起點排序的區塊中，彼此重疊（含巢狀）的放在同一組；
/// 只有單一成員的組才算是完整區塊。
fn group_overlapping(spans: Vec<(Provider, Range<usize>)>) -> Vec<Vec<(Provider, Range<usize>)>> {
    let mut groups: Vec<Vec<(Provider, Range<usize>)>> = Vec::new();
    let mut group_end = 0;

    for (provider, span) in spans {
        match groups.last_mut() {
            Some(group) if span.start < group_end => {
                group_end = group_end.max(span.end);
                group.push((provider, span));
            }
            _ => {
                group_end = span.end;
                groups.push(vec![(provider, span)]);
            }
        }
    }

    groups
}

/// 逐一尋找結束標記，再往回找最近的開始標記，取最小的完整區塊。
/// 找不到配對的標記保留在原文中。
fn scan_provider(text: &str, provider: Provider) -> (Vec<Range<usize>>, Vec<FieldWarning>) {
    let begin = begin_marker(provider.block_name());
    let end = end_marker(provider.block_name());
    let mut spans = Vec::new();
    let mut warnings = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(&end) {
        let end_at = cursor + offset;
        match text[cursor..end_at].rfind(&begin) {
            Some(begin_offset) => {
                let start = cursor + begin_offset;
                if text[cursor..start].contains(&begin) {
                    warnings.push(FieldWarning::UnmatchedBegin { provider });
                }
                spans.push(start..end_at + end.len());
            }
            None => warnings.push(FieldWarning::UnmatchedEnd { provider }),
        }
        cursor = end_at + end.len();
    }

    if text[cursor..].contains(&begin) {
        warnings.push(FieldWarning::UnmatchedBegin { provider });
    }

    for warning in &warnings {
        tracing::warn!("⚠️ Ignoring malformed {} marker: {:?}", provider, warning);
    }

    (spans, warnings)
}
