/// Extract the target color from a "pick up the <color> ..." instruction.
///
/// Matching is case-insensitive and token based: the color is the token right
/// after the `pick up the` phrase, with surrounding punctuation stripped.
/// Anything else yields `None`.
pub fn parse_target(instruction: &str) -> Option<String> {
    let lower = instruction.to_lowercase();
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    let start = tokens
        .windows(3)
        .position(|w| w == ["pick", "up", "the"])?;
    let color = tokens
        .get(start + 3)?
        .trim_matches(|c: char| !c.is_alphanumeric());
    if color.is_empty() {
        return None;
    }
    Some(color.to_string())
}

pub fn synthesize_instruction(color: &str) -> String {
    format!("pick up the {color} block")
}
