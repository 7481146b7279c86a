use crate::types::Observation;

/// Render an observation as fixed-format text: a two-line header followed by
/// one line per grid row.
///
/// Cells: `.` empty, `A` agent, `@` agent carrying, otherwise the upper-cased
/// first letter of the object color.
pub fn render_text(obs: &Observation) -> String {
    let size = obs.size;
    let mut cells = vec![vec!['.'; size]; size];
    for o in &obs.objects {
        let (r, c) = o.pos;
        if r < size && c < size {
            cells[r][c] = o.color.chars().next().map(|ch| ch.to_ascii_uppercase()).unwrap_or('?');
        }
    }
    let (ar, ac) = obs.agent_pos;
    if ar < size && ac < size {
        cells[ar][ac] = if obs.holding.is_some() { '@' } else { 'A' };
    }

    let mut s = format!("instruction: {}\n", obs.instruction);
    s.push_str(&format!("holding: {}\n", obs.holding.as_deref().unwrap_or("nothing")));
    for (i, row) in cells.iter().enumerate() {
        let line: Vec<String> = row.iter().map(|ch| ch.to_string()).collect();
        s.push_str(&line.join(" "));
        if i + 1 < size {
            s.push('\n');
        }
    }
    s
}
