use promptdock_core::SelectorConfig;

/// The slice of the host page the agent needs. Implemented by the page
/// binding in production and by an in-memory fake in tests.
pub trait PageDom: Send {
    /// Whether any element on the page matches `selector`.
    fn matches(&self, selector: &str) -> bool;

    /// Write `text` into the element matched by `selector`. Returns false
    /// when the element is missing or rejects input.
    fn set_input(&mut self, selector: &str, text: &str) -> bool;
}

/// Match the page against the known configs: the first whose input control
/// is present wins. `None` means no supported LLM page was detected.
pub fn detect_site<'a>(
    page: &dyn PageDom,
    configs: &'a [SelectorConfig],
) -> Option<&'a SelectorConfig> {
    configs.iter().find(|c| page.matches(&c.input_selector))
}
