use crate::core::engine::{BatchReport, RuleOutcome};
use crate::domain::model::{Rule, RuleSummary};
use crate::utils::error::Result;
use serde::Serialize;
use std::io::Write;

/// `list-org-policy` 的一列；加上 `--details` 才會填入客製化欄位
#[derive(Debug, Clone, Serialize)]
pub struct PolicyRow {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_levels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_guidance: Option<bool>,
}

impl PolicyRow {
    pub fn summary(rule: &RuleSummary) -> Self {
        Self {
            name: rule.name.clone(),
            title: rule.title.clone(),
            enabled: None,
            severity: None,
            custom_levels: None,
            custom_guidance: None,
        }
    }

    pub fn detailed(rule: &Rule) -> Self {
        Self {
            name: rule.name.clone(),
            title: rule.title.clone(),
            enabled: Some(rule.enabled),
            severity: Some(rule.severity.clone()),
            custom_levels: Some(rule.has_custom_levels()),
            custom_guidance: Some(rule.has_custom_guidance()),
        }
    }
}

pub fn write_policy_csv<W: Write>(rows: &[PolicyRow], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn format_policy_table(rows: &[PolicyRow]) -> String {
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!("{:<width$}  {}", row.name, row.title, width = width));
        if let (Some(levels), Some(guidance)) = (row.custom_levels, row.custom_guidance) {
            let mut flags = Vec::new();
            if levels {
                flags.push("custom levels");
            }
            if guidance {
                flags.push("custom guidance");
            }
            if !flags.is_empty() {
                out.push_str(&format!("  [{}]", flags.join(", ")));
            }
        }
        out.push('\n');
    }
    out.push_str(&format!("{} rules\n", rows.len()));
    out
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

pub fn describe_rule(rule: &Rule) -> String {
    let mut lines = vec![
        format!("{} ({})", rule.title, rule.name),
        format!("  enabled:        {}", rule.enabled),
        format!("  severity:       {}", or_dash(&rule.severity)),
        format!("  CWE:            {}", or_dash(&rule.classifier())),
        format!(
            "  likelihood:     {}",
            rule.likelihood_custom.as_deref().unwrap_or(or_dash(&rule.likelihood))
        ),
        format!(
            "  impact:         {}",
            rule.impact_custom.as_deref().unwrap_or(or_dash(&rule.impact))
        ),
        format!(
            "  confidence:     {}",
            rule.confidence_level_custom
                .as_deref()
                .unwrap_or(or_dash(&rule.confidence_level))
        ),
        format!("  recommendation: {}", or_dash(&rule.recommendation)),
        format!("  risk:           {}", or_dash(&rule.risk)),
    ];
    if rule.references.is_empty() {
        lines.push("  references:     -".to_string());
    } else {
        lines.push("  references:".to_string());
        lines.extend(rule.references.iter().map(|r| format!("    - {}", r)));
    }
    lines.join("\n")
}

pub fn describe_outcome(rule_name: &str, outcome: &RuleOutcome) -> String {
    match outcome {
        RuleOutcome::Updated => format!("✅ Updated '{}'", rule_name),
        RuleOutcome::Unchanged => format!("➖ '{}' was already up to date", rule_name),
        RuleOutcome::Reset => format!("♻️ Reset '{}' to its defaults", rule_name),
        RuleOutcome::NoData(message) => format!("⏭️ {}", message),
        RuleOutcome::Failed(message) => format!("❌ '{}' failed: {}", rule_name, message),
    }
}

pub fn describe_report(report: &BatchReport) -> String {
    let mut lines = vec![report.summary()];
    lines.extend(
        report
            .failures()
            .map(|r| format!("  {}", describe_outcome(&r.rule_name, &r.outcome))),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> Rule {
        serde_json::from_value(serde_json::json!({
            "name": "sql-injection",
            "title": "SQL Injection",
            "enabled": true,
            "severity": "CRITICAL",
            "impact": "HIGH",
            "impact_custom": "LOW",
            "recommendation": "Use binds",
            "cwe": "https://cwe.mitre.org/data/definitions/89.html",
        }))
        .unwrap()
    }

    #[test]
    fn test_csv_has_header_and_detail_columns() {
        let mut buffer = Vec::new();
        write_policy_csv(&[PolicyRow::detailed(&rule())], &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("name,title,enabled,severity,custom_levels,custom_guidance")
        );
        assert_eq!(lines.next(), Some("sql-injection,SQL Injection,true,CRITICAL,true,true"));
    }

    #[test]
    fn test_table_marks_customized_rules() {
        let table = format_policy_table(&[PolicyRow::detailed(&rule())]);
        assert!(table.contains("[custom levels, custom guidance]"));
        assert!(table.ends_with("1 rules\n"));
    }

    #[test]
    fn test_describe_rule_prefers_custom_levels() {
        let text = describe_rule(&rule());
        assert!(text.contains("impact:         LOW"));
        assert!(text.contains("CWE:            89"));
        assert!(text.contains("references:     -"));
    }
}
