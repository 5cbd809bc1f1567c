/// Room value that gets a hand-written description instead of the template.
pub const GAMING_ROOM: &str = "Gaming Room";

/// Prompt used for [`GAMING_ROOM`], whatever the theme.
pub const GAMING_ROOM_PROMPT: &str =
    "a room for gaming with gaming computers, gaming consoles, and gaming chairs";

/// Builds the generation prompt from a theme and a room type.
pub struct PromptBuilder;

impl PromptBuilder {
    /// `"a {theme} {room}"`, both lowercased.
    ///
    /// The gaming-room check is an exact, case-sensitive match on the raw
    /// input. Callers validate that neither value is empty.
    pub fn build(theme: &str, room: &str) -> String {
        if room == GAMING_ROOM {
            return GAMING_ROOM_PROMPT.to_string();
        }
        format!("a {} {}", theme.to_lowercase(), room.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_lowercases_both_inputs() {
        assert_eq!(PromptBuilder::build("Modern", "Living Room"), "a modern living room");
        assert_eq!(PromptBuilder::build("TROPICAL", "Bathroom"), "a tropical bathroom");
        assert_eq!(PromptBuilder::build("Vintage", "Kitchen"), "a vintage kitchen");
    }

    #[test]
    fn gaming_room_ignores_theme() {
        for theme in ["Modern", "Minimalist", "Professional", ""] {
            assert_eq!(PromptBuilder::build(theme, "Gaming Room"), GAMING_ROOM_PROMPT);
        }
    }

    #[test]
    fn gaming_room_match_is_exact() {
        assert_eq!(PromptBuilder::build("Modern", "gaming room"), "a modern gaming room");
        assert_eq!(PromptBuilder::build("Modern", "GAMING ROOM"), "a modern gaming room");
    }

    #[test]
    fn empty_inputs_still_produce_a_string() {
        assert_eq!(PromptBuilder::build("", ""), "a  ");
    }
}
