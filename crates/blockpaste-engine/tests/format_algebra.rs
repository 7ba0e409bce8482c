use blockpaste_engine::rich_text::{
    Format, FormatTypeRegistry, Record, apply_format, create_from_html, create_from_text,
    remove_format,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn strong() -> Format {
    Format::new("strong")
}

fn link(url: &str) -> Format {
    Format::new("core/link").with_attribute("url", url)
}

/// Records with a mix of absent, single and multi-format slots.
fn sample(name: &str) -> Record {
    let registry = FormatTypeRegistry::with_core_formats();
    match name {
        "plain" => create_from_text("one two three"),
        "italic" => create_from_html("<em>one</em> two <em>three</em>", &registry),
        "nested" => create_from_html("<a href=\"x\">one <code>two</code></a> three", &registry),
        _ => unreachable!("unknown sample {name}"),
    }
}

#[test]
fn scenario_apply_strong_to_a_word() {
    let record = create_from_text("one two three");
    let formatted = apply_format(&record, strong(), Some(4..7));

    for i in 0..formatted.len() {
        let expected = if (4..7).contains(&i) { vec![strong()] } else { vec![] };
        assert_eq!(formatted.formats_at(i), expected.as_slice(), "index {i}");
        assert_eq!(formatted.formats()[i].is_none(), !(4..7).contains(&i));
    }
}

#[rstest]
fn reapplying_is_idempotent(
    #[values("plain", "italic", "nested")] name: &str,
    #[values(0..0, 0..3, 2..9, 4..7, 0..13)] range: std::ops::Range<usize>,
) {
    let record = sample(name);
    let once = apply_format(&record, strong(), Some(range.clone()));
    let twice = apply_format(&once, strong(), Some(range));
    assert_eq!(twice, once);
}

#[rstest]
fn remove_undoes_apply(
    #[values("plain", "italic", "nested")] name: &str,
    #[values(0..0, 0..3, 2..9, 4..7, 0..13)] range: std::ops::Range<usize>,
) {
    let record = sample(name);
    let applied = apply_format(&record, strong(), Some(range.clone()));
    let removed = remove_format(&applied, "strong", Some(range.clone()));
    assert_eq!(&removed.formats()[range.clone()], &record.formats()[range]);
}

#[rstest]
fn apply_leaves_other_characters_alone(
    #[values("plain", "italic", "nested")] name: &str,
    #[values(0..3, 2..9, 4..7, 12..13)] range: std::ops::Range<usize>,
) {
    let record = sample(name);
    let applied = apply_format(&record, link("y"), Some(range.clone()));
    for i in (0..record.len()).filter(|i| !range.contains(i)) {
        assert_eq!(applied.formats()[i], record.formats()[i], "index {i}");
    }
}

#[test]
fn no_slot_ever_holds_a_type_twice() {
    let mut record = sample("nested");
    let steps = [
        (link("a"), 0..5),
        (strong(), 2..8),
        (link("b"), 3..13),
        (strong(), 0..13),
        (Format::new("core/code"), 4..7),
        (link("c"), 6..7),
    ];
    for (format, range) in steps {
        record = apply_format(&record, format, Some(range));
        for i in 0..record.len() {
            let slot = record.formats_at(i);
            for (n, format) in slot.iter().enumerate() {
                assert!(
                    slot[n + 1..].iter().all(|other| !other.is_same_type(format)),
                    "duplicate {} at {i}",
                    format.format_type
                );
            }
        }
    }
    assert_eq!(record.formats_at(6).iter().filter(|f| f.format_type == "core/link").count(), 1);
    assert_eq!(
        record.formats_at(6).iter().find(|f| f.format_type == "core/link").unwrap().attribute("url"),
        Some("c")
    );
}

#[test]
fn selection_is_the_default_range() {
    let record = create_from_text("one two three").with_selection(8, 13);
    let formatted = apply_format(&record, strong(), None);
    assert!(formatted.formats_at(7).is_empty());
    assert_eq!(formatted.formats_at(8), &[strong()]);
    assert_eq!(formatted.selection(), Some(8..13));
}
