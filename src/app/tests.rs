use super::{find_title, truncate, visible_titles};
use crate::provider::{Role, SkipWindows, Title, Viewer};

fn title(id: &str, name: &str, published: bool) -> Title {
    Title {
        id: id.to_string(),
        title: name.to_string(),
        description: String::new(),
        premium: false,
        published,
        source_url: None,
        download_url: None,
        episodes: Vec::new(),
        skip: SkipWindows::default(),
        tags: Vec::new(),
    }
}

fn viewer(role: Role) -> Viewer {
    Viewer {
        email: "viewer@example.test".to_string(),
        role,
        paid: false,
    }
}

#[test]
fn unpublished_titles_hidden_from_regular_viewers() {
    let catalog = vec![
        title("a", "Published Show", true),
        title("b", "Draft Show", false),
    ];

    let visible = visible_titles(catalog.clone(), None);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "a");

    let visible = visible_titles(catalog.clone(), Some(&viewer(Role::User)));
    assert_eq!(visible.len(), 1);

    let visible = visible_titles(catalog.clone(), Some(&viewer(Role::Manager)));
    assert_eq!(visible.len(), 2);

    let visible = visible_titles(catalog, Some(&viewer(Role::Admin)));
    assert_eq!(visible.len(), 2);
}

#[test]
fn find_title_prefers_exact_match_over_substring() {
    let titles = vec![
        title("a", "Living With Dying: Origins", true),
        title("b", "Living With Dying", true),
    ];

    let found = find_title(&titles, "living with dying").expect("match");
    assert_eq!(found.id, "b");

    let found = find_title(&titles, "origins").expect("substring match");
    assert_eq!(found.id, "a");

    assert!(find_title(&titles, "unrelated").is_none());
}

#[test]
fn truncate_keeps_short_text_and_marks_long_text() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly-10", 10), "exactly-10");
    let long = truncate("a much longer title than fits", 10);
    assert_eq!(long.chars().count(), 10);
    assert!(long.ends_with('…'));
}
