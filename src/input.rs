/// A single keypad event, decoded outside the core. Digit, operator and
/// grouping actions carry the literal character they stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Digit(char),
    Operator(char),
    Decimal,
    Grouping(char),
    Clear,
    Backspace,
    Submit,
    Negate,
    Percent,
    Square,
    Sqrt,
}

impl Action {
    /// Maps a typed key to its action. Unbound keys map to nothing.
    pub fn from_key(key: char) -> Option<Self> {
        let action = match key {
            '0'..='9' => Action::Digit(key),
            '+' | '-' | '*' | '/' => Action::Operator(key),
            '.' => Action::Decimal,
            '(' | ')' => Action::Grouping(key),
            '=' => Action::Submit,
            'c' | 'C' => Action::Clear,
            // ^H and DEL
            '\u{8}' | '\u{7f}' => Action::Backspace,
            'n' | 'N' => Action::Negate,
            '%' => Action::Percent,
            's' | 'S' => Action::Square,
            'r' | 'R' => Action::Sqrt,
            _ => return None,
        };
        Some(action)
    }
}
