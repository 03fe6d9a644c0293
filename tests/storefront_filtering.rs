//! End-to-end filtering against a mock storefront with SQLite-backed state.
//!
//! These tests wire the real `HttpTransport` and `Database` into a
//! `FilterController` and drive it the way the event loop does: user actions
//! go in, `FilterEvent`s come back over the channel and are handed to
//! `handle_event`.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use shopfilter::filter::{
    selection_key, Collaborators, CategoryId, ControllerOptions, FilterController, FilterEvent,
    ItemType, Phase, SELECTION_KEY_PREFIX,
};
use shopfilter::page::{CategoryOption, MemoryPage, Page, Target};
use shopfilter::storage::{Database, KeyValueStore};
use shopfilter::transport::{CountSource, HttpTransport, ItemSource, TransportConfig};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cards(n: usize) -> String {
    "<div class=\"product-card\"><h3>Item</h3></div>".repeat(n)
}

fn options(ids: &[&str]) -> Vec<CategoryOption> {
    ids.iter()
        .map(|id| CategoryOption {
            id: CategoryId::from(*id),
            name: format!("Category {}", id),
        })
        .collect()
}

async fn mount_storefront(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/products/"))
        .and(query_param_is_missing("category"))
        .respond_with(ResponseTemplate::new(200).set_body_string(cards(2)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/"))
        .and(query_param("category", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "html": cards(3),
            "total_count": 3,
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/"))
        .and(query_param("category", "5,7"))
        .respond_with(ResponseTemplate::new(200).set_body_string(cards(4)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/api/products/count/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "product_count": 9 })),
        )
        .mount(server)
        .await;
}

struct Session {
    controller: FilterController<MemoryPage>,
    rx: mpsc::Receiver<FilterEvent>,
}

impl Session {
    async fn start(server: &MockServer, db: Arc<Database>, available: &[&str]) -> Self {
        let transport = Arc::new(
            HttpTransport::new(&TransportConfig {
                base_url: server.uri(),
                ..TransportConfig::default()
            })
            .unwrap(),
        );
        let items: Arc<dyn ItemSource> = transport.clone();
        let counts: Arc<dyn CountSource> = transport;
        let (tx, rx) = mpsc::channel(32);
        let controller = FilterController::new(
            MemoryPage::new(options(available)),
            ControllerOptions::default(),
            Collaborators {
                items,
                counts: Some(counts),
                storage: db,
            },
            tx,
        )
        .await
        .unwrap();
        Self { controller, rx }
    }

    /// Hand events to the controller until a listing resolves.
    async fn settle_listing(&mut self) {
        loop {
            let event = self.rx.recv().await.unwrap();
            let is_listing = matches!(event, FilterEvent::ListingResolved { .. });
            self.controller.handle_event(event);
            if is_listing {
                return;
            }
        }
    }

    fn item_count_text(&self) -> Option<&str> {
        self.controller.page().text(&Target::ItemCount)
    }
}

async fn stored_selection(db: &Database) -> Option<String> {
    db.get(&selection_key(ItemType::Products)).await.unwrap()
}

#[tokio::test]
async fn test_orphaned_ids_dropped_on_restore() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    db.set(&selection_key(ItemType::Products), r#"["5","9"]"#)
        .await
        .unwrap();

    let mut session = Session::start(&server, db.clone(), &["5", "7"]).await;

    assert_eq!(session.controller.selected(), &[CategoryId::from("5")]);
    assert_eq!(stored_selection(&db).await.as_deref(), Some(r#"["5"]"#));
    assert!(session
        .controller
        .page()
        .is_checked(&Target::CategoryOption(CategoryId::from("5"))));

    session.controller.initialize();
    session.settle_listing().await;

    // Server-reported total wins over the three rendered cards
    assert_eq!(session.controller.item_count(), Some(3));
    assert_eq!(session.item_count_text(), Some("3 products"));
    assert_eq!(session.controller.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_selection_survives_reload() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;
    let db = Arc::new(Database::open(":memory:").await.unwrap());

    let mut first = Session::start(&server, db.clone(), &["5", "7"]).await;
    first.controller.initialize();
    first.settle_listing().await;
    assert_eq!(first.item_count_text(), Some("2 products"));

    first.controller.select_category(CategoryId::from("5")).await;
    first.settle_listing().await;
    first.controller.select_category(CategoryId::from("7")).await;
    first.settle_listing().await;

    // No explicit count in the bare fragment, so the cards are counted
    assert_eq!(first.item_count_text(), Some("4 products"));
    assert_eq!(stored_selection(&db).await.as_deref(), Some(r#"["5","7"]"#));
    first.controller.destroy();
    drop(first);

    let second = Session::start(&server, db.clone(), &["5", "7"]).await;
    assert_eq!(
        second.controller.selected(),
        &[CategoryId::from("5"), CategoryId::from("7")]
    );
}

#[tokio::test]
async fn test_clear_persists_empty_selection() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    db.set(&selection_key(ItemType::Products), r#"["5"]"#)
        .await
        .unwrap();

    let mut session = Session::start(&server, db.clone(), &["5", "7"]).await;
    session.controller.initialize();
    session.settle_listing().await;

    session.controller.clear_categories().await;
    session.settle_listing().await;

    assert!(session.controller.selected().is_empty());
    assert_eq!(stored_selection(&db).await.as_deref(), Some("[]"));
    assert_eq!(session.item_count_text(), Some("2 products"));
}

#[tokio::test]
async fn test_reset_forgets_every_item_type() {
    let db = Database::open(":memory:").await.unwrap();
    db.set(&selection_key(ItemType::Products), r#"["5"]"#)
        .await
        .unwrap();
    db.set(&selection_key(ItemType::Categories), r#"["2"]"#)
        .await
        .unwrap();
    db.set("theme", "dark").await.unwrap();

    let removed = db
        .delete_preferences_by_prefix(SELECTION_KEY_PREFIX)
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(stored_selection(&db).await, None);
    assert_eq!(db.get("theme").await.unwrap().as_deref(), Some("dark"));
}
