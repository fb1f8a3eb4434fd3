//! Check-run output assembly
//!
//! Builds the `{title, summary, text}` block attached to the merge
//! gate's check run. The text body is fenced, capped to the remote
//! store's size limit, and has configured secrets masked before
//! transmission.

use gh_client::CheckRunOutput;

/// Maximum length GitHub accepts for check-run output text
pub const MAX_OUTPUT_LEN: usize = 65534;

/// Fixed replacement for configured secret strings
pub const SECRET_MASK: &str = "*****";

/// Replace every occurrence of each configured secret with the mask
pub fn redact(text: &str, secrets: &[String]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if secret.is_empty() {
            continue;
        }
        out = out.replace(secret.as_str(), SECRET_MASK);
    }
    out
}

/// Build a check-run output block
///
/// The body is redacted first, then wrapped in a code fence, then
/// truncated so the fenced result never exceeds [`MAX_OUTPUT_LEN`].
pub fn render_output(title: &str, summary: &str, body: &str, secrets: &[String]) -> CheckRunOutput {
    const FENCE: &str = "```";
    // Room for the opening fence + newline and the newline + closing fence
    let budget = MAX_OUTPUT_LEN - (FENCE.len() * 2 + 2);

    let mut body = redact(body, secrets);
    if body.len() > budget {
        // Truncate on a char boundary
        let mut cut = budget;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    CheckRunOutput {
        title: title.to_string(),
        summary: redact(summary, secrets),
        text: format!("{}\n{}\n{}", FENCE, body, FENCE),
    }
}
