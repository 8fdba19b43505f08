//! End-to-end behavior against an on-disk database

use postrefs::render::{ListRenderer, NoHooks, Permalinks};
use postrefs::{
    AttachmentStore, ConfigStore, ContentType, DefinitionFilter, PublishStatus, Record, RecordId,
    RelationRegistry, ReverseIndex, SetOutcome, SqliteStore, UpsertOutcome,
};
use tempfile::TempDir;

fn open_site() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("site.db")).unwrap();
    for name in ["article", "news", "events", "page"] {
        store.register_type(&ContentType::new(name, name)).unwrap();
    }
    ConfigStore::new(&store).install().unwrap();
    (dir, store)
}

fn publish(store: &SqliteStore, record_type: &str, title: &str) -> RecordId {
    store.insert_record(&Record::published(record_type, title)).unwrap()
}

#[test]
fn upsert_then_list_returns_the_definition() {
    let (_dir, store) = open_site();
    let registry = RelationRegistry::open(&store);

    let outcome = registry
        .upsert("article", "related", vec!["news", "events"], "Related")
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Created(1));

    let defs = registry.for_type("article").unwrap();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].internal_id, 1);
    assert_eq!(defs[0].key.as_str(), "related");
    assert_eq!(defs[0].source_type, "article");
    assert_eq!(&*defs[0].target_types, &["news".to_string(), "events".to_string()]);
    assert_eq!(defs[0].title, "Related");
}

#[test]
fn repeated_upsert_updates_in_place() {
    let (_dir, store) = open_site();
    let registry = RelationRegistry::open(&store);

    registry.upsert("article", "related", "news", "Related").unwrap();
    let again = registry.upsert("article", "related", "news", "Related").unwrap();
    assert_eq!(again, UpsertOutcome::Updated(1));
    assert_eq!(registry.list(DefinitionFilter::all()).unwrap().len(), 1);
}

#[test]
fn list_filters_combine() {
    let (_dir, store) = open_site();
    let registry = RelationRegistry::open(&store);
    registry.upsert("article", "related", "news", "A").unwrap();
    registry.upsert("article", "sources", "news", "B").unwrap();
    registry.upsert("page", "related", "article", "C").unwrap();

    let by_type = registry.list(DefinitionFilter::all().source_type("article")).unwrap();
    assert!(by_type.iter().all(|d| d.source_type == "article"));
    assert_eq!(by_type.len(), 2);

    let by_key = registry.list(DefinitionFilter::all().key("related")).unwrap();
    assert_eq!(by_key.len(), 2);

    let both = registry
        .list(DefinitionFilter::all().source_type("page").key("related"))
        .unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].title, "C");

    assert!(registry.list(DefinitionFilter::all().key("missing")).unwrap().is_empty());
}

#[test]
fn attachments_overwrite_and_stay_isolated() {
    let (_dir, store) = open_site();
    let registry = RelationRegistry::open(&store);
    registry.upsert("article", "related", vec!["news", "events"], "Related").unwrap();
    registry.upsert("article", "sources", "news", "Sources").unwrap();

    let article = publish(&store, "article", "Host");
    let attachments = AttachmentStore::open(&store);

    assert_eq!(attachments.set(article, "sources", vec![9]).unwrap(), SetOutcome::Stored { count: 1 });
    attachments.set(article, "related", vec![1, 2, 3]).unwrap();
    attachments.set(article, "related", vec![4]).unwrap();

    let all = attachments.get_all(article).unwrap().unwrap();
    assert_eq!(&**all.get("related").unwrap(), &[4]);
    assert_eq!(&**all.get("sources").unwrap(), &[9]);

    let json = serde_json::to_value(&all).unwrap();
    assert_eq!(json, serde_json::json!({ "related": [4], "sources": [9] }));
}

#[test]
fn set_then_get_all_for_an_article() {
    let (_dir, store) = open_site();
    RelationRegistry::open(&store)
        .upsert("article", "related", "news", "Related")
        .unwrap();
    let article = publish(&store, "article", "Host");

    let attachments = AttachmentStore::open(&store);
    attachments.set(article, "related", vec![7, 8]).unwrap();
    let all = attachments.get_all(article).unwrap().unwrap();
    assert_eq!(serde_json::to_value(&all).unwrap(), serde_json::json!({ "related": [7, 8] }));

    assert_eq!(attachments.set(article, "unknown", vec![1]).unwrap(), SetOutcome::NoSuchRelation);
    assert_eq!(attachments.set(99_999, "related", vec![1]).unwrap(), SetOutcome::RecordMissing);
    assert!(attachments.get_all(99_999).unwrap().is_none());
}

#[test]
fn reverse_lookup_finds_referrers() {
    let (_dir, store) = open_site();
    RelationRegistry::open(&store)
        .upsert("article", "related", "news", "Related")
        .unwrap();
    let target = publish(&store, "news", "Target");
    let r1 = publish(&store, "article", "Refers");
    let r2 = publish(&store, "article", "Does not");

    let attachments = AttachmentStore::open(&store);
    attachments.set(r1, "related", vec![target]).unwrap();
    attachments.set(r2, "related", vec![target + 100]).unwrap();

    let index = ReverseIndex::new(&store);
    let found = index.find(target, &[], true).unwrap();
    assert!(found.contains(r1));
    assert!(!found.contains(r2));

    store.set_status(r1, PublishStatus::Draft).unwrap();
    assert!(!index.find(target, &[], true).unwrap().contains(r1));
    assert!(index.find(target, &[], false).unwrap().contains(r1));
    assert!(index.find(target, &["page".to_string()], false).unwrap().is_empty());
}

#[test]
fn malformed_rows_are_counted_not_fatal() {
    let (_dir, store) = open_site();
    let target = publish(&store, "news", "Target");
    let broken = publish(&store, "article", "Broken");
    store.set_meta(broken, "_ref_related", "{not json").unwrap();

    let found = ReverseIndex::new(&store).find(target, &[], true).unwrap();
    assert!(found.is_empty());
    assert_eq!(found.skipped_malformed, 1);
}

#[test]
fn empty_state_renders_no_blocks() {
    let (_dir, store) = open_site();
    RelationRegistry::open(&store)
        .upsert("article", "related", "news", "Related")
        .unwrap();
    let article = publish(&store, "article", "Lonely");

    let renderer = ListRenderer::new(&store, Permalinks::new("http://localhost"), &NoHooks);
    assert!(renderer.blocks(article, None).unwrap().is_empty());
    assert_eq!(renderer.render(article, None).unwrap(), "");
}

#[test]
fn removing_a_definition_orphans_its_data() {
    let (_dir, store) = open_site();
    let registry = RelationRegistry::open(&store);
    registry.upsert("article", "related", "news", "Related").unwrap();
    let article = publish(&store, "article", "Host");
    let news = publish(&store, "news", "Story");

    let attachments = AttachmentStore::open(&store);
    attachments.set(article, "related", vec![news]).unwrap();

    assert_eq!(registry.remove("article", "related").unwrap(), 1);
    assert_eq!(
        store.get_meta(article, "_ref_related").unwrap().as_deref(),
        Some(format!("[{}]", news).as_str())
    );
    assert!(attachments.get_all(article).unwrap().unwrap().is_empty());
    assert_eq!(registry.remove("article", "related").unwrap(), 0);
}

#[test]
fn settings_survive_reopen_and_uninstall() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("site.db");
    {
        let store = SqliteStore::open(&path).unwrap();
        store.register_type(&ContentType::new("article", "Articles")).unwrap();
        ConfigStore::new(&store).install().unwrap();
        RelationRegistry::open(&store)
            .upsert("article", "related", "article", "Related")
            .unwrap();
        ConfigStore::new(&store).uninstall().unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert!(!ConfigStore::new(&store).install().unwrap());
    let settings = ConfigStore::new(&store).load().unwrap();
    assert_eq!(settings.refs.len(), 1);
    assert_eq!(settings.next_id, 2);
}
