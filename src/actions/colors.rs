use std::collections::{BTreeSet, HashMap, HashSet};

pub const STREAM_ASSIGNMENT_COLORS: [&str; 24] = [
    "#76ce90", "#fae589", "#a6c7e5", "#e79ab5", "#bfd56f", "#f4ae55", "#b0a5fd", "#addfe5",
    "#f5ce6e", "#c2726a", "#94c849", "#bd86e5", "#ee7e4a", "#a6dcbf", "#95a5fd", "#53a063",
    "#9987e1", "#e4523d", "#c2c2c2", "#4f8de4", "#c6a8ad", "#e7cc4d", "#c8bebf", "#a47462",
];

/// Assigns a color to each of `recipient_ids` for one user.
///
/// Recipients the user already has a row for keep that row's color. The rest,
/// in ascending id order, take the palette colors not in `used_colors`; when
/// those run out the color falls back to `palette[recipient_id % 24]`.
pub fn pick_colors(
    used_colors: &HashSet<String>,
    color_map: &HashMap<i64, String>,
    recipient_ids: &[i64],
) -> HashMap<i64, String> {
    let mut available = STREAM_ASSIGNMENT_COLORS
        .iter()
        .filter(|color| !used_colors.contains(**color));

    let ordered: BTreeSet<i64> = recipient_ids.iter().copied().collect();
    let mut picked = HashMap::with_capacity(ordered.len());
    for recipient_id in ordered {
        let color = match color_map.get(&recipient_id) {
            Some(existing) => existing.clone(),
            None => match available.next() {
                Some(color) => (*color).to_string(),
                None => fallback_color(recipient_id).to_string(),
            },
        };
        picked.insert(recipient_id, color);
    }
    picked
}

fn fallback_color(recipient_id: i64) -> &'static str {
    let len = STREAM_ASSIGNMENT_COLORS.len() as i64;
    STREAM_ASSIGNMENT_COLORS[recipient_id.rem_euclid(len) as usize]
}

/// Whether `value` looks like `#rrggbb`.
pub fn is_valid_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_user_gets_palette_in_recipient_order() {
        let picked = pick_colors(&HashSet::new(), &HashMap::new(), &[9, 3, 5]);
        assert_eq!(picked[&3], "#76ce90");
        assert_eq!(picked[&5], "#fae589");
        assert_eq!(picked[&9], "#a6c7e5");
    }

    #[test]
    fn used_colors_are_skipped_and_existing_rows_keep_theirs() {
        let used: HashSet<String> = ["#76ce90".to_string(), "#c2726a".to_string()].into();
        let existing: HashMap<i64, String> = [(4, "#c2726a".to_string())].into();

        let picked = pick_colors(&used, &existing, &[4, 10]);
        assert_eq!(picked[&4], "#c2726a");
        assert_eq!(picked[&10], "#fae589");
    }

    #[test]
    fn exhausted_palette_falls_back_to_modulo() {
        let used: HashSet<String> = STREAM_ASSIGNMENT_COLORS
            .iter()
            .map(|c| c.to_string())
            .collect();
        let picked = pick_colors(&used, &HashMap::new(), &[25, 48]);
        assert_eq!(picked[&25], STREAM_ASSIGNMENT_COLORS[1]);
        assert_eq!(picked[&48], STREAM_ASSIGNMENT_COLORS[0]);
    }

    #[test]
    fn equal_inputs_pick_equal_colors() {
        let used: HashSet<String> = ["#a6c7e5".to_string()].into();
        let a = pick_colors(&used, &HashMap::new(), &[7, 2, 11]);
        let b = pick_colors(&used, &HashMap::new(), &[11, 7, 2]);
        assert_eq!(a, b);
    }

    #[test]
    fn color_validation() {
        assert!(is_valid_color("#a47462"));
        assert!(is_valid_color("#ABCDEF"));
        assert!(!is_valid_color("a47462"));
        assert!(!is_valid_color("#a4746"));
        assert!(!is_valid_color("#zzzzzz"));
    }
}
