use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use composer::lookup::rank_candidates;
use composer::{
    BlockType, Composer, EditError, Entity, EntityLookup, LookupError, MatchMode, Position, ResolverState, Selection,
    StaticLookup, parse_keys,
};
use richdoc::{Block, Inline, Mark, Marks, RenderOptions, Renderer};

fn clubs() -> StaticLookup {
    StaticLookup::new(vec![
        Entity::new(9, "Chemistry Club"),
        Entity::new(7, "Chess Club"),
        Entity::new(3, "Archery"),
    ])
}

/// Feed a key script, running the suggestion lookup after every key the
/// way an interactive host would.
async fn type_keys(composer: &mut Composer, lookup: &dyn EntityLookup, script: &str) {
    for key in parse_keys(script).expect("bad key script") {
        composer.handle_key(key).expect("key rejected");
        composer.refresh_suggestions(lookup).await;
    }
}

#[tokio::test]
async fn mention_end_to_end() {
    let mut composer = Composer::default();
    type_keys(&mut composer, &clubs(), "Hello @Che").await;
    assert!(matches!(
        composer.mentions().state(),
        ResolverState::Open(s) if s.query == "Che" && s.candidates[0].id == 9
    ));

    type_keys(&mut composer, &clubs(), "{Enter}").await;
    let expected = vec![Block::paragraph(vec![
        Inline::text("Hello "),
        Inline::mention(9, "Chemistry Club"),
        Inline::text(" "),
    ])];
    assert_eq!(composer.document().nodes, expected);
    assert_eq!(composer.mentions().state(), &ResolverState::Idle);

    let transport = composer.serialized();
    assert_eq!(richdoc::deserialize(&transport).nodes, expected);

    let html = Renderer::new(RenderOptions::default()).render(&transport);
    assert!(html.starts_with("<p>Hello <a class=\"mention\""));
    assert!(html.contains(">@Chemistry Club</a>"));
}

#[tokio::test]
async fn typing_after_a_mention_continues_the_paragraph() {
    let mut composer = Composer::default();
    type_keys(&mut composer, &clubs(), "@Arc{Enter}rocks").await;
    assert_eq!(composer.document().to_string(), "@Archery rocks\n");
}

#[tokio::test]
async fn backspace_removes_a_mention_whole() {
    let mut composer = Composer::default();
    type_keys(&mut composer, &clubs(), "@Chess{Tab}").await;
    assert_eq!(composer.document().mentions(), vec![(7, "Chess Club")]);
    assert_eq!(composer.selection().head, Position::new(vec![0], 2));

    type_keys(&mut composer, &clubs(), "{Left}{Backspace}").await;
    assert!(composer.document().mentions().is_empty());
    assert_eq!(composer.document().nodes, vec![Block::paragraph(vec![Inline::text(" ")])]);
}

#[test]
fn backspace_into_a_code_block_keeps_the_mention() {
    let mut composer = Composer::default();
    composer.load(
        r#"{"type":"doc","content":[
            {"type":"codeBlock","content":[{"type":"text","text":"x"}]},
            {"type":"paragraph","content":[{"type":"mention","attrs":{"id":7,"label":"Chess Club"}},
                {"type":"text","text":" hi"}]}]}"#,
    );
    let before = composer.document().clone();
    composer
        .set_selection(Selection::collapsed(Position::new(vec![1], 0)))
        .unwrap();

    composer.delete_backward();
    assert_eq!(composer.document(), &before);
    assert_eq!(composer.document().mentions(), vec![(7, "Chess Club")]);
    assert_eq!(composer.selection().head, Position::new(vec![0], 1));

    // Typing lands in the code block; the mention paragraph is untouched.
    composer.insert_text("y");
    assert_eq!(composer.document().to_string(), "```\nxy\n```\n@Chess Club hi\n");
}

#[tokio::test]
async fn arrows_pick_another_candidate() {
    let mut composer = Composer::default();
    type_keys(&mut composer, &clubs(), "@ch{Down}{Tab}").await;
    assert_eq!(composer.document().mentions(), vec![(7, "Chess Club")]);
    assert_eq!(composer.mentions().state(), &ResolverState::Idle);
}

#[tokio::test]
async fn escape_leaves_the_text_alone() {
    let mut composer = Composer::default();
    type_keys(&mut composer, &clubs(), "@Che{Escape}{Enter}x").await;
    assert!(composer.document().mentions().is_empty());
    assert_eq!(composer.document().to_string(), "@Che\nx\n");
}

#[tokio::test]
async fn no_trigger_inside_a_word() {
    let mut composer = Composer::default();
    type_keys(&mut composer, &clubs(), "chess@Che{Enter}").await;
    assert!(composer.document().mentions().is_empty());
    assert_eq!(composer.document().to_string(), "chess@Che\n\n");
}

#[tokio::test]
async fn failed_lookups_do_not_reach_the_editor() {
    struct Offline;

    #[async_trait]
    impl EntityLookup for Offline {
        async fn lookup(&self, _query: &str) -> Result<Vec<Entity>, LookupError> {
            Err(LookupError::Unavailable("offline".into()))
        }
    }

    let mut composer = Composer::default();
    type_keys(&mut composer, &Offline, "@Che").await;
    assert!(matches!(
        composer.mentions().state(),
        ResolverState::Composing(s) if s.candidates.is_empty()
    ));
    // Enter is not swallowed while nothing is offered.
    type_keys(&mut composer, &Offline, "{Enter}").await;
    assert_eq!(composer.document().nodes.len(), 2);
}

struct SlowLookup(StaticLookup);

#[async_trait]
impl EntityLookup for SlowLookup {
    async fn lookup(&self, query: &str) -> Result<Vec<Entity>, LookupError> {
        // Shorter queries answer later.
        let delay = if query.chars().count() < 2 { 40 } else { 5 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.0.lookup(query).await
    }
}

#[tokio::test]
async fn late_results_for_an_old_query_are_dropped() {
    let lookup = SlowLookup(StaticLookup::new(vec![
        Entity::new(1, "Abacus Society"),
        Entity::new(2, "Archery"),
    ]));
    let mut composer = Composer::default();
    composer.insert_text("@");
    composer.begin_lookup();
    composer.insert_text("a");
    let first = composer.begin_lookup().unwrap();
    composer.insert_text("b");
    let second = composer.begin_lookup().unwrap();

    let arrivals = Mutex::new(Vec::new());
    let run = |query: String| {
        let lookup = &lookup;
        let arrivals = &arrivals;
        async move {
            let result = lookup.lookup(&query).await;
            arrivals.lock().unwrap().push((query, result));
        }
    };
    tokio::join!(run(first.query.clone()), run(second.query.clone()));

    let arrivals = arrivals.into_inner().unwrap();
    assert_eq!(arrivals[0].0, "ab");
    let applied: Vec<bool> = arrivals
        .into_iter()
        .map(|(query, result)| composer.apply_lookup(&query, result))
        .collect();
    assert_eq!(applied, vec![true, false]);

    let suggestion = composer.suggestion().unwrap();
    assert_eq!(suggestion.query, "ab");
    assert_eq!(
        suggestion.candidates,
        rank_candidates(vec![Entity::new(1, "Abacus Society")], "ab", MatchMode::Prefix, 5)
    );
}

#[test]
fn link_urls_are_checked_before_anything_changes() {
    let mut composer = Composer::default();
    composer.insert_text("hello world");
    composer
        .set_selection(Selection::new(Position::new(vec![0], 0), Position::new(vec![0], 5)))
        .unwrap();
    let before = composer.document().clone();

    assert_eq!(
        composer.set_link("not a url"),
        Err(EditError::InvalidUrl("not a url".into()))
    );
    assert_eq!(composer.document(), &before);

    composer.set_link("https://example.com").unwrap();
    let linked = Marks::default().with(Mark::link("https://example.com"));
    assert_eq!(
        composer.document().nodes,
        vec![Block::paragraph(vec![
            Inline::marked("hello", linked),
            Inline::text(" world"),
        ])]
    );
}

#[test]
fn undo_redo_is_linear() {
    let mut composer = Composer::default();
    for text in ["a", "b", "c"] {
        composer.insert_text(text);
    }
    assert!(composer.undo());
    assert!(composer.undo());
    assert_eq!(composer.document().to_string(), "a\n");
    assert!(composer.redo());
    assert_eq!(composer.document().to_string(), "ab\n");
    assert!(composer.can_redo());

    composer.insert_text("x");
    assert!(!composer.can_redo());
    assert!(!composer.redo());
    assert_eq!(composer.document().to_string(), "abx\n");
}

#[test]
fn content_changes_are_reported() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut composer = Composer::default();
    let sink = Arc::clone(&seen);
    composer.on_content_change(move |value| sink.lock().unwrap().push(value.to_string()));

    composer.insert_text("hi");
    composer.select_all();
    composer.toggle_mark(Mark::Bold);
    composer.move_to_block_end();
    composer.insert_youtube("https://youtu.be/dQw4w9WgXcQ").unwrap();
    composer.insert_mention(&Entity::new(7, "Chess Club")).unwrap();
    assert!(composer.insert_image("nope", None).is_err());
    composer.undo();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 5);
    assert_eq!(seen.last(), Some(&composer.serialized()));
}

#[test]
fn stored_posts_load_for_editing() {
    let mut composer = Composer::default();
    composer.load("Welcome to the club fair!");
    assert_eq!(
        composer.document().nodes,
        vec![Block::paragraph(vec![Inline::text("Welcome to the club fair!")])]
    );
    assert!(!composer.can_undo());

    composer.handle_key(composer::Key::End).unwrap();
    composer.insert_text(" See you there.");
    let transport = composer.serialized();

    composer.load(&transport);
    assert_eq!(composer.document().to_string(), "Welcome to the club fair! See you there.\n");

    composer.load("");
    assert_eq!(composer.document().nodes, vec![Block::paragraph(vec![])]);
}

#[test]
fn mentions_round_trip_from_every_block_kind() {
    let chess = Entity::new(7, "Chess Club");
    let mention_after = |composer: &mut Composer, text: &str| {
        composer.insert_text(text);
        composer.insert_mention(&chess).unwrap();
    };

    let mut composer = Composer::default();
    mention_after(&mut composer, "para ");
    composer.split_block();

    mention_after(&mut composer, "head ");
    composer.set_block_type(BlockType::Heading(2));
    composer.split_block();

    mention_after(&mut composer, "bullet ");
    composer.toggle_bullet_list();
    composer.split_block();
    composer.split_block();

    mention_after(&mut composer, "ordered ");
    composer.toggle_ordered_list();
    composer.split_block();
    composer.split_block();

    mention_after(&mut composer, "quote ");
    composer.toggle_blockquote();

    let doc = composer.document().clone();
    assert!(
        matches!(
            doc.nodes.as_slice(),
            [
                Block::Paragraph { .. },
                Block::Heading { level: 2, .. },
                Block::BulletList { .. },
                Block::OrderedList { .. },
                Block::Blockquote { .. },
            ]
        ),
        "{:?}",
        doc.nodes
    );
    assert_eq!(doc.mentions(), vec![(7, "Chess Club"); 5]);

    let transport = composer.serialized();
    assert_eq!(richdoc::try_deserialize(&transport).unwrap(), doc);
    let html = Renderer::new(RenderOptions::default()).render(&transport);
    assert_eq!(html.matches(r#"href="/entities/7">@Chess Club</a>"#).count(), 5);
}
