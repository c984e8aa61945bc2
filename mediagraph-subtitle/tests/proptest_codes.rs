//! Property-based tests for override-code parsing.

use mediagraph_subtitle::*;
use proptest::prelude::*;

const TAGS: &[&str] = &[
    "b1", "i0", "u", "s1", "fs20", "fnArial", "c&H0000FF&", "3a&H80&", "alpha&HFF&",
    "pos(10,20)", "move(0,0,10,10)", "an5", "a6", "k10", "blur2", "frz30", "t(0,100,\\fs30)",
    "fad(100,200)", "clip(0,0,5,5)", "p1", "rDefault",
];

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ,.!?]{1,12}",
        Just("\\N".to_string()),
        Just("\\n".to_string()),
        prop::collection::vec(prop::sample::select(TAGS), 1..4)
            .prop_map(|tags| format!("{{\\{}}}", tags.join("\\"))),
    ]
}

// =============================================================================
// Filter Tests
// =============================================================================

proptest! {
    /// Keeping every component reproduces a well-formed line exactly.
    #[test]
    fn keep_all_is_identity(parts in prop::collection::vec(segment(), 0..8)) {
        let line = parts.concat();
        prop_assert_eq!(filter_override_codes(&mut (), &line, Components::all()), line);
    }

    /// Plain text never contains an override block.
    #[test]
    fn plain_text_has_no_blocks(parts in prop::collection::vec(segment(), 0..8)) {
        let plain = plain_text(&parts.concat());
        prop_assert!(!plain.contains("{\\"), "override block left in plain text");
    }

    /// Text without braces or backslashes passes through untouched.
    #[test]
    fn plain_text_identity(text in "[a-zA-Z0-9 ,.!?]{0,40}") {
        prop_assert_eq!(plain_text(&text), text);
    }

    /// Arbitrary input never panics and always reaches the end callback.
    #[test]
    fn arbitrary_input_is_safe(text in any::<String>()) {
        struct Ended(bool);
        impl OverrideHandler for Ended {
            fn end(&mut self) {
                self.0 = true;
            }
        }
        let mut handler = Ended(false);
        split_override_codes(&mut handler, &text);
        prop_assert!(handler.0);
    }
}
