#![cfg(test)]

use core::error::Error;
use css_orchestrator::{ComputedValues, Origin, PropertyValue, StyleDatabase};
use css_variables::{ExpansionLimits, StyleSet, VarError};

const DOCUMENT: &str = "https://example.com/site/index.html";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scope<'db>(
    db: &'db StyleDatabase,
    key: &str,
) -> Result<&'db ComputedValues, Box<dyn Error>> {
    db.computed(key)
        .ok_or_else(|| format!("scope {key} was not computed").into())
}

fn css_of<'db>(
    values: &'db ComputedValues,
    name: &str,
    style_set: StyleSet,
) -> Option<&'db str> {
    values.get(name, style_set).and_then(PropertyValue::css)
}

fn error_of(values: &ComputedValues, name: &str) -> Option<VarError> {
    values
        .get(name, StyleSet::NonVisited)
        .and_then(PropertyValue::error)
        .cloned()
}

#[test]
fn urls_resolve_against_the_declaring_stylesheet() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    db.add_stylesheet(
        "styles/a.css",
        ":root { --bg: url(../assets/x.png); } p { background: var(--bg) no-repeat; }",
        Origin::Author,
    )?;
    db.add_document_style("div { --icon: url(icons/i.svg); border-image: var(--icon); }");
    assert!(db.recompute());

    let paragraph = scope(&db, "p")?;
    assert_eq!(
        css_of(paragraph, "background", StyleSet::NonVisited),
        Some(r#"url("https://example.com/site/assets/x.png") no-repeat"#)
    );
    let div = scope(&db, "div")?;
    assert_eq!(
        css_of(div, "border-image", StyleSet::NonVisited),
        Some(r#"url("https://example.com/site/icons/i.svg")"#)
    );
    Ok(())
}

#[test]
fn visited_rules_only_reach_the_visited_style_set() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    db.add_document_style(
        "a { --c: blue; color: var(--c); } a:visited { --c: purple; } a:link { outline-color: var(--c); }",
    );
    db.recompute();

    let link = scope(&db, "a")?;
    assert_eq!(css_of(link, "color", StyleSet::NonVisited), Some("blue"));
    assert_eq!(css_of(link, "color", StyleSet::Visited), Some("purple"));
    assert_eq!(css_of(link, "outline-color", StyleSet::NonVisited), Some("blue"));
    assert_eq!(link.visited.get("outline-color"), None);
    Ok(())
}

#[test]
fn cascade_order_picks_the_winner() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    db.add_stylesheet("ua.css", "p { --x: agent; --y: agent !important; }", Origin::UserAgent)?;
    db.add_stylesheet("user.css", "p { --y: user !important; }", Origin::User)?;
    db.add_stylesheet("a.css", "p { --x: author; --y: author; --z: one; }", Origin::Author)?;
    db.add_stylesheet("b.css", "p { --z: two; }", Origin::Author)?;
    db.add_inline_style("p", "--z: inline");
    db.add_stylesheet("c.css", "p { --z: three; }", Origin::Author)?;
    db.recompute();

    let paragraph = scope(&db, "p")?;
    assert_eq!(css_of(paragraph, "--x", StyleSet::NonVisited), Some("author"));
    assert_eq!(css_of(paragraph, "--y", StyleSet::NonVisited), Some("agent"));
    assert_eq!(css_of(paragraph, "--z", StyleSet::NonVisited), Some("inline"));
    Ok(())
}

#[test]
fn invalid_values_are_reported_per_property() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    db.add_document_style(
        "p { --a: var(--b); --b: var(--a); width: var(--a, 5px); height: var(--missing); --broken: a ) b; }",
    );
    db.recompute();

    let paragraph = scope(&db, "p")?;
    assert_eq!(
        error_of(paragraph, "--a"),
        Some(VarError::CycleDetected {
            name: "--a".to_owned()
        })
    );
    assert_eq!(css_of(paragraph, "width", StyleSet::NonVisited), Some("5px"));
    assert_eq!(
        error_of(paragraph, "height"),
        Some(VarError::UnresolvedReference {
            name: "--missing".to_owned()
        })
    );
    assert_eq!(paragraph.non_visited.get("--broken"), None);
    Ok(())
}

#[test]
fn nested_scopes_inherit_from_their_parent() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    db.nest_scope("li", "ul");
    db.add_document_style(
        ":root { --unit: 1px; } ul { --gap: 2px; } li { margin: var(--gap) var(--unit); } p { margin: var(--gap, 0); }",
    );
    db.recompute();

    let item = scope(&db, "li")?;
    assert_eq!(css_of(item, "margin", StyleSet::NonVisited), Some("2px 1px"));
    assert_eq!(css_of(item, "--gap", StyleSet::Visited), Some("2px"));
    let paragraph = scope(&db, "p")?;
    assert_eq!(css_of(paragraph, "margin", StyleSet::NonVisited), Some("0"));
    Ok(())
}

#[test]
fn only_custom_properties_inherit() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    db.add_document_style(":root { --x: 1; width: var(--x); } p { --y: 2; }");
    db.recompute();

    let paragraph = scope(&db, "p")?;
    assert_eq!(css_of(paragraph, "--x", StyleSet::NonVisited), Some("1"));
    assert_eq!(paragraph.non_visited.get("width"), None);
    assert_eq!(css_of(scope(&db, ":root")?, "width", StyleSet::NonVisited), Some("1"));
    Ok(())
}

#[test]
fn negated_link_pseudos_apply_to_both_style_sets() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    db.add_document_style("a:not(:visited) { --c: red; }");
    db.recompute();

    let negated = scope(&db, "a:not(:visited)")?;
    assert_eq!(css_of(negated, "--c", StyleSet::NonVisited), Some("red"));
    assert_eq!(css_of(negated, "--c", StyleSet::Visited), Some("red"));
    assert!(db.computed("a").is_none());
    Ok(())
}

#[test]
fn nesting_cycles_fall_back_to_root() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    db.nest_scope("a", "b");
    db.nest_scope("b", "a");
    db.add_document_style(":root { --x: 1; } a { width: var(--x); }");
    db.recompute();

    assert_eq!(css_of(scope(&db, "a")?, "width", StyleSet::NonVisited), Some("1"));
    assert!(db.computed("b").is_some());
    Ok(())
}

#[test]
fn limits_apply_to_every_property() -> Result<(), Box<dyn Error>> {
    init_logging();
    let limits = ExpansionLimits {
        max_substitutions: 2,
        ..ExpansionLimits::default()
    };
    let mut db = StyleDatabase::with_limits(DOCUMENT, limits)?;
    db.add_document_style(":root { --a: 1; --b: var(--a) var(--a); --c: var(--b, 0); }");
    db.recompute();

    let root = scope(&db, ":root")?;
    assert_eq!(css_of(root, "--b", StyleSet::NonVisited), Some("1 1"));
    assert_eq!(
        error_of(root, "--c"),
        Some(VarError::BudgetExceeded { limit: 2 })
    );
    Ok(())
}

#[test]
fn recompute_reports_changes() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    db.add_document_style(":root { --x: 1; }");
    assert!(db.recompute());
    assert!(!db.recompute());

    db.add_document_style("p { --y: var(--x); }");
    assert!(db.recompute());
    assert_eq!(db.computed_snapshot().len(), 2);

    db.nest_scope("p", ":root");
    assert!(!db.recompute());
    Ok(())
}

#[test]
fn bad_urls_are_rejected() {
    assert_eq!(
        StyleDatabase::new("not a url")
            .err()
            .map(|err| err.to_string()),
        Some(r#"Invalid document URL "not a url""#.to_owned())
    );
}

#[test]
fn scopes_resolve_independently() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut db = StyleDatabase::new(DOCUMENT)?;
    let css: String = (0..64)
        .map(|index| {
            format!(".s{index} {{ --v: {index}; --w: var(--v) var(--v); width: var(--w); }} ")
        })
        .collect();
    db.add_document_style(&css);
    db.recompute();

    for index in 0..64 {
        let values = scope(&db, &format!(".s{index}"))?;
        let expected = format!("{index} {index}");
        assert_eq!(css_of(values, "width", StyleSet::NonVisited), Some(expected.as_str()));
        assert_eq!(css_of(values, "width", StyleSet::Visited), Some(expected.as_str()));
    }
    Ok(())
}
