//! Fill-empty merge rules.
//!
//! Enrichment never overwrites data the user (or an earlier provider)
//! already put in a record; it only fills fields that are still empty.

/// A field that can be filled from provider data.
pub trait FillEmpty {
    /// Replace `self` with `value` if `self` is empty and `value` is not.
    /// Returns whether the field changed.
    fn fill_empty(&mut self, value: Self) -> bool;
}

impl FillEmpty for String {
    fn fill_empty(&mut self, value: Self) -> bool {
        if self.trim().is_empty() && !value.trim().is_empty() {
            *self = value;
            true
        } else {
            false
        }
    }
}

impl<T> FillEmpty for Option<T> {
    fn fill_empty(&mut self, value: Self) -> bool {
        if self.is_none() && value.is_some() {
            *self = value;
            true
        } else {
            false
        }
    }
}

impl<T> FillEmpty for Vec<T> {
    fn fill_empty(&mut self, value: Self) -> bool {
        if self.is_empty() && !value.is_empty() {
            *self = value;
            true
        } else {
            false
        }
    }
}

/// Like [`FillEmpty`] for optional text, also treating blank strings as empty.
pub fn fill_text(field: &mut Option<String>, value: Option<&str>) -> bool {
    let value = match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value,
        None => return false,
    };

    if field.as_deref().map(str::trim).is_some_and(|f| !f.is_empty()) {
        return false;
    }
    *field = Some(value.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_fill() {
        let mut title = String::new();
        assert!(title.fill_empty("Heat".to_string()));
        assert!(!title.fill_empty("Other".to_string()));
        assert_eq!(title, "Heat");

        let mut blank = "  ".to_string();
        assert!(!blank.fill_empty(" ".to_string()));
    }

    #[test]
    fn test_option_and_vec_fill() {
        let mut runtime: Option<u32> = Some(90);
        assert!(!runtime.fill_empty(Some(120)));
        assert_eq!(runtime, Some(90));

        let mut missing: Option<u32> = None;
        assert!(!missing.fill_empty(None));
        assert!(missing.fill_empty(Some(120)));

        let mut genres: Vec<String> = Vec::new();
        assert!(genres.fill_empty(vec!["Drama".to_string()]));
        assert!(!genres.fill_empty(vec!["Comedy".to_string()]));
        assert_eq!(genres, vec!["Drama".to_string()]);
    }

    #[test]
    fn test_fill_text_treats_blank_as_empty() {
        let mut plot = Some("   ".to_string());
        assert!(fill_text(&mut plot, Some("A heist.")));
        assert_eq!(plot.as_deref(), Some("A heist."));

        assert!(!fill_text(&mut plot, Some("Something else")));
        assert!(!fill_text(&mut None, Some("  ")));
    }
}
