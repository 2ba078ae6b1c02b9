use crate::StepState;

/// Renders `(speaker, text)` pairs one per line.
pub fn chat_history_to_str(chat_history: &[(String, String)]) -> String {
    chat_history
        .iter()
        .map(|(speaker, text)| format!("{}: {}", speaker.trim(), text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn steps_to_str(steps: &[StepState]) -> String {
    steps
        .iter()
        .map(|step| {
            format!(
                "Tool: {}\nTool Input: {}\nTool Output: {}",
                step.invocation.tool_name, step.invocation.tool_input, step.output
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
