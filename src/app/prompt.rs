use crate::utils::error::Result;
use std::io::{BufRead, Write};

/// 要求使用者輸入 y/yes 確認；`skip` 為真時直接通過
pub fn confirm<R: BufRead, W: Write>(question: &str, skip: bool, mut input: R, mut output: W) -> Result<bool> {
    if skip {
        return Ok(true);
    }

    write!(output, "{} [y/N] ", question)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn confirm_stdin(question: &str, skip: bool) -> Result<bool> {
    let stdin = std::io::stdin();
    confirm(question, skip, stdin.lock(), std::io::stderr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_answers() {
        for answer in ["y\n", "YES\n", "  yes  \n"] {
            assert!(confirm("Continue?", false, answer.as_bytes(), Vec::new()).unwrap());
        }
    }

    #[test]
    fn test_anything_else_declines() {
        for answer in ["\n", "n\n", "sure\n", ""] {
            assert!(!confirm("Continue?", false, answer.as_bytes(), Vec::new()).unwrap());
        }
    }

    #[test]
    fn test_skip_does_not_read_input() {
        let mut output = Vec::new();
        assert!(confirm("Continue?", true, "n\n".as_bytes(), &mut output).unwrap());
        assert!(output.is_empty());
    }
}
