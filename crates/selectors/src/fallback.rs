use once_cell::sync::Lazy;
use promptdock_core::SelectorConfig;

fn config(name: &str, input: &str, insert: &str, send: &str) -> SelectorConfig {
    SelectorConfig {
        name: name.to_string(),
        input_selector: input.to_string(),
        button_insert_selector: insert.to_string(),
        send_button_selector: send.to_string(),
    }
}

/// Built-in selector table served under the lenient policy when neither the
/// network nor the persisted cache can provide one. Shipped with the
/// extension, so it ages with the release rather than with the cache TTL.
static BUILTIN_SELECTORS: Lazy<Vec<SelectorConfig>> = Lazy::new(|| {
    vec![
        config(
            "chatgpt",
            "#prompt-textarea",
            "form [data-testid=\"composer-trailing-actions\"]",
            "[data-testid=\"send-button\"]",
        ),
        config(
            "claude",
            "div[contenteditable=\"true\"].ProseMirror",
            "fieldset .flex.gap-2\\.5",
            "button[aria-label=\"Send message\"]",
        ),
        config(
            "gemini",
            ".ql-editor[contenteditable=\"true\"]",
            ".input-buttons-wrapper-bottom",
            "button.send-button",
        ),
        config(
            "deepseek",
            "textarea#chat-input",
            ".ec4f5d61",
            "div[role=\"button\"].f6d670",
        ),
    ]
});

pub fn builtin_selectors() -> &'static [SelectorConfig] {
    &BUILTIN_SELECTORS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_non_empty_with_unique_names() {
        let configs = builtin_selectors();
        assert!(!configs.is_empty());

        let mut names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), configs.len());
    }
}
