use crate::core::block_codec::extract_blocks;
use crate::domain::model::Provider;

pub const PARAGRAPH_OPEN: &str = "{{#paragraph}}";
pub const PARAGRAPH_CLOSE: &str = "{{/paragraph}}";

/// 手寫文字若還沒有段落標記，包成一個段落
pub fn wrap_paragraph(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    if !text.starts_with(PARAGRAPH_OPEN)
        && !text.ends_with(PARAGRAPH_CLOSE)
        && !text.contains(PARAGRAPH_OPEN)
    {
        return format!("{}{}{}", PARAGRAPH_OPEN, text, PARAGRAPH_CLOSE);
    }
    text.to_string()
}

/// 加入或取代某平台的區塊。新區塊一律放在最後。
pub fn add_block(field: &str, provider: Provider, rendered: &str) -> String {
    compose(field, provider, Some(rendered))
}

/// 移除某平台的區塊，其餘內容不變
pub fn remove_block(field: &str, provider: Provider) -> String {
    compose(field, provider, None)
}

fn compose(field: &str, provider: Provider, rendered: Option<&str>) -> String {
    let mut composed = String::new();

    if !field.is_empty() {
        let parsed = extract_blocks(field);
        composed.push_str(&wrap_paragraph(&parsed.unrelated));

        for other in Provider::ALL.into_iter().filter(|p| *p != provider) {
            if let Some(block) = parsed.block_for(other) {
                tracing::debug!("Keeping existing {} block", other);
                composed.push_str(block);
            }
        }

        if parsed.has_block(provider) {
            tracing::debug!("Dropping existing {} block", provider);
        }
    }

    if let Some(block) = rendered {
        composed.push_str(block);
    }

    composed
}

/// risk 欄位只做較弱的合併：既有內容包段落，新內容包段落後
/// 只在尚未出現時附加。重複啟用時不保證像 recommendation 一樣冪等。
pub fn merge_risk(existing: &str, new_risk: Option<&str>) -> String {
    let mut risk = wrap_paragraph(existing);

    if let Some(new_risk) = new_risk.filter(|r| !r.is_empty()) {
        let wrapped = format!("{}{}{}", PARAGRAPH_OPEN, new_risk, PARAGRAPH_CLOSE);
        if !risk.contains(&wrapped) {
            risk.push_str(&wrapped);
        }
    }

    risk
}
