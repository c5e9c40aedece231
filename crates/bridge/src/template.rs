use std::collections::HashMap;

/// Visible separator between prepended custom instructions and the prompt
/// body.
pub const INSTRUCTION_DELIMITER: &str = "\n\n---\n\n";

/// Replace every `{{name}}` placeholder with its value. Placeholders with
/// no value are left in place so the gap stays visible to the user.
pub fn substitute(template: &str, values: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{{{}}}}}", name), value);
    }
    out
}

pub fn with_custom_instructions(instructions: &str, content: &str) -> String {
    format!(
        "{}{}{}",
        instructions.trim_end(),
        INSTRUCTION_DELIMITER,
        content
    )
}
