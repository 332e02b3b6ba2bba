use std::fmt;

pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

#[macro_export]
macro_rules! possibly_parenthesized {
    ($buff:ident, $cond:expr, $v:expr) => {
        if $cond {
            $buff.push('(');
            $v;
            $buff.push(')');
        } else {
            $v;
        }
    };
}

/// Display adapter cutting text longer than 500 bytes down to its first 497 bytes,
/// followed by `...`. The cut never splits a character.
pub struct TruncateLong<'a>(pub &'a str);

impl<'a> TruncateLong<'a> {
    pub const LIMIT: usize = 497;

    pub fn new(value: &'a str) -> Self {
        Self(value)
    }
}

impl fmt::Display for TruncateLong<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() <= Self::LIMIT {
            return f.write_str(self.0.trim_end());
        }
        let mut end = Self::LIMIT;
        while !self.0.is_char_boundary(end) {
            end -= 1;
        }
        write!(f, "{}...", self.0[..end].trim_end())
    }
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        $crate::TruncateLong::new(::std::convert::AsRef::<str>::as_ref(&$query))
    };
}

#[cfg(test)]
mod tests {
    use super::separated_by;

    #[test]
    fn separator_only_between_written_items() {
        let mut out = String::from("SELECT ");
        separated_by(
            &mut out,
            ["a", "", "b"],
            |out, v| out.push_str(v),
            ", ",
        );
        assert_eq!(out, "SELECT a, b");
    }

    #[test]
    fn truncates_long_text() {
        let long = "x".repeat(600);
        let formatted = format!("{}", truncate_long!(long));
        assert_eq!(formatted.len(), 500);
        assert!(formatted.ends_with("..."));
        let short = "SELECT 1";
        assert_eq!(format!("{}", truncate_long!(short)), "SELECT 1");
    }

    #[test]
    fn truncates_on_character_boundaries() {
        let long = format!("{}é{}", "a".repeat(496), "b".repeat(100));
        let formatted = format!("{}", truncate_long!(long));
        assert_eq!(formatted, format!("{}...", "a".repeat(496)));
        let wide = "€".repeat(300);
        let formatted = format!("{}", truncate_long!(wide.as_str()));
        assert!(formatted.ends_with("€..."));
        assert!(formatted.len() <= 500);
    }
}
