//! End-to-end scenarios: registration, mutation mirroring, search, and
//! drift repair against the in-memory backend.

use semsearch_core::SemanticSearchConfig;
use semsearch_documents::{
    DocumentSpec, Entity, EntitySchema, EntitySignals, FieldDef, InMemoryEntityStore,
    IndexDeclaration, Registration, Registry, SearchQuery,
};
use semsearch_vector::{
    BackendFactory, Distance, DocumentId, FieldValue, InMemoryStore, MockEmbeddingProvider,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
struct Product {
    id: i64,
    name: String,
    price: f64,
}

impl Entity for Product {
    fn schema() -> EntitySchema {
        EntitySchema::new("Product")
            .with_field(FieldDef::integer("id"))
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::float("price"))
    }

    fn id(&self) -> Option<DocumentId> {
        Some(DocumentId::Int(self.id))
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.clone().into()),
            "price" => Some(self.price.into()),
            _ => None,
        }
    }
}

fn product(id: i64, name: &str) -> Product {
    Product {
        id,
        name: name.to_string(),
        price: 9.5,
    }
}

struct Fixture {
    registry: Registry,
    signals: EntitySignals<Product>,
    store: InMemoryEntityStore<Product>,
}

impl Fixture {
    fn new(config: SemanticSearchConfig) -> Self {
        Self {
            registry: Registry::new(
                config,
                BackendFactory::with_defaults(),
                Arc::new(MockEmbeddingProvider::new(16)),
            ),
            signals: EntitySignals::new(),
            store: InMemoryEntityStore::new(),
        }
    }

    async fn register(&self, spec: DocumentSpec) -> Arc<Registration<Product>> {
        self.registry.register(spec, &self.signals).await.unwrap()
    }

    fn vectors(&self) -> &InMemoryStore {
        self.registry.factory().memory_store()
    }

    async fn save(&self, product: Product) {
        self.store.insert(product.clone());
        self.signals.notify_saved(&product).await.unwrap();
    }

    async fn delete(&self, product: &Product) {
        self.store.remove(&DocumentId::Int(product.id));
        self.signals.notify_deleted(product).await.unwrap();
    }
}

fn name_index() -> DocumentSpec {
    DocumentSpec::new().index(IndexDeclaration::new("name"))
}

fn ids(products: &[Product]) -> Vec<i64> {
    products.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn test_save_find_delete_roundtrip() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    let products = fx.register(name_index()).await;

    let shoes = product(1, "red running shoes");
    fx.save(shoes.clone()).await;
    fx.save(product(2, "blue winter coat")).await;
    assert_eq!(fx.vectors().count("Product"), 2);

    let query = SearchQuery::field("name", "red running shoes").top_k(1);
    let found = products.find(&fx.store, &query).await.unwrap();
    assert_eq!(found, vec![shoes.clone()]);

    fx.delete(&shoes).await;
    assert_eq!(fx.vectors().count("Product"), 1);
    assert!(!fx.vectors().contains("Product", &DocumentId::Int(1)));

    let found = products.find(&fx.store, &query).await.unwrap();
    assert_eq!(ids(&found), vec![2]);
}

#[tokio::test]
async fn test_top_k_bounds_results() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    let products = fx.register(name_index()).await;

    for id in 1..=5 {
        fx.save(product(id, &format!("item number {id}"))).await;
    }

    let found = products
        .find(&fx.store, &SearchQuery::field("name", "item").top_k(2))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    let found = products
        .find(&fx.store, &SearchQuery::field("name", "item"))
        .await
        .unwrap();
    assert_eq!(found.len(), 5);
}

#[tokio::test]
async fn test_exact_text_ranks_first() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    let products = fx.register(name_index()).await;

    for (id, name) in [(1, "lamp"), (2, "desk"), (3, "chair")] {
        fx.save(product(id, name)).await;
    }

    let found = products
        .find(&fx.store, &SearchQuery::field("name", "desk"))
        .await
        .unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(found[0].id, 2);
}

#[tokio::test]
async fn test_multi_field_query_rejected() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    let products = fx.register(name_index()).await;
    fx.save(product(1, "kettle")).await;

    let query = SearchQuery::field("name", "kettle").and_field("price", "9.5");
    let err = products.find(&fx.store, &query).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(fx.store.fetch_count(), 0);
}

#[tokio::test]
async fn test_stale_vector_is_skipped() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    let products = fx.register(name_index()).await;
    fx.save(product(1, "one")).await;
    fx.save(product(2, "two")).await;
    fx.save(product(3, "three")).await;

    // Deleted relationally without a notification
    fx.store.remove(&DocumentId::Int(2));

    let query = SearchQuery::field("name", "two");
    let vector = products.descriptors()[0]
        .embed_for_query("two")
        .await
        .unwrap();
    let ranked = products.backend().search("name", &vector, 10).await.unwrap();
    assert_eq!(ranked[0], DocumentId::Int(2));
    let expected: Vec<i64> = ranked
        .iter()
        .filter_map(|id| match id {
            DocumentId::Int(id) if *id != 2 => Some(*id),
            _ => None,
        })
        .collect();

    let found = products.find(&fx.store, &query).await.unwrap();
    assert_eq!(ids(&found), expected);
    assert_eq!(expected.len(), 2);
}

#[tokio::test]
async fn test_delete_only_product_then_find_is_empty() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    let products = fx.register(name_index()).await;

    let shoes = product(1, "red shoes");
    fx.save(shoes.clone()).await;

    let query = SearchQuery::field("name", "red shoes");
    assert_eq!(products.find(&fx.store, &query).await.unwrap(), vec![shoes.clone()]);

    fx.delete(&shoes).await;
    assert_eq!(fx.vectors().count("Product"), 0);

    let fetches = fx.store.fetch_count();
    let found = products.find(&fx.store, &query).await.unwrap();
    assert!(found.is_empty());
    assert_eq!(fx.store.fetch_count(), fetches);
}

#[tokio::test]
async fn test_dropped_collection_is_error_not_empty() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    let products = fx.register(name_index()).await;
    fx.save(product(1, "lamp")).await;

    assert!(fx.vectors().drop_collection("Product"));

    let err = products
        .find(&fx.store, &SearchQuery::field("name", "lamp"))
        .await
        .unwrap_err();
    assert!(err.is_backend());
}

#[tokio::test]
async fn test_repeated_saves_keep_one_record() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    fx.register(name_index()).await;

    fx.save(product(7, "draft title")).await;
    fx.save(product(7, "final title")).await;

    assert_eq!(fx.vectors().count("Product"), 1);
    let payload = fx.vectors().payload("Product", &DocumentId::Int(7)).unwrap();
    assert_eq!(payload.get("name"), Some(&FieldValue::from("final title")));
}

#[tokio::test]
async fn test_concurrent_saves_same_id() {
    let fx = Arc::new(Fixture::new(SemanticSearchConfig::default()));
    fx.register(name_index()).await;

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let fx = fx.clone();
            tokio::spawn(async move { fx.save(product(1, &format!("revision {i}"))).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(fx.vectors().count("Product"), 1);
}

#[tokio::test]
async fn test_duplicate_registration_keeps_single_subscription() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    fx.register(name_index()).await;

    let err = fx
        .registry
        .register(name_index(), &fx.signals)
        .await
        .unwrap_err();
    assert!(err.is_config());

    fx.save(product(1, "lamp")).await;
    assert_eq!(fx.vectors().count("Product"), 1);
}

#[tokio::test]
async fn test_reindex_repairs_drift() {
    let fx = Fixture::new(SemanticSearchConfig::default());

    // Entities that predate the registration
    let existing: Vec<Product> = (1..=3).map(|id| product(id, &format!("old {id}"))).collect();
    for p in &existing {
        fx.store.insert(p.clone());
    }

    let products = fx.register(name_index()).await;
    assert_eq!(fx.vectors().count("Product"), 0);

    let stats = products.reindex(existing.clone()).await.unwrap();
    assert_eq!(stats.indexed, 3);
    assert_eq!(fx.vectors().count("Product"), 3);

    // Vector deleted out of band
    fx.vectors().remove("Product", &DocumentId::Int(2));
    assert_eq!(fx.vectors().count("Product"), 2);

    products.reindex(existing).await.unwrap();
    assert_eq!(fx.vectors().count("Product"), 3);
}

#[tokio::test]
async fn test_disabled_signals_only_change_via_reindex() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    let products = fx.register(name_index().disable_signals(true)).await;
    assert!(!products.signals_connected());

    let lamp = product(1, "lamp");
    fx.save(lamp.clone()).await;
    assert_eq!(fx.vectors().count("Product"), 0);

    products.reindex([lamp]).await.unwrap();
    assert_eq!(fx.vectors().count("Product"), 1);
}

#[tokio::test]
async fn test_payload_honours_include_fields() {
    let fx = Fixture::new(SemanticSearchConfig::default());
    fx.register(name_index().include_fields(["price"])).await;

    fx.save(product(1, "lamp")).await;
    let payload = fx.vectors().payload("Product", &DocumentId::Int(1)).unwrap();
    assert_eq!(payload.get("price"), Some(&FieldValue::Float(9.5)));
    assert!(!payload.contains_key("name"));
}

#[tokio::test]
async fn test_two_indexes_search_independently() {
    #[derive(Debug, Clone)]
    struct Listing {
        id: i64,
        title: String,
        body: String,
    }

    impl Entity for Listing {
        fn schema() -> EntitySchema {
            EntitySchema::new("Listing")
                .with_field(FieldDef::integer("id"))
                .with_field(FieldDef::text("title"))
                .with_field(FieldDef::text("body"))
        }

        fn id(&self) -> Option<DocumentId> {
            Some(DocumentId::Int(self.id))
        }

        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "id" => Some(self.id.into()),
                "title" => Some(self.title.clone().into()),
                "body" => Some(self.body.clone().into()),
                _ => None,
            }
        }
    }

    let registry = Registry::new(
        SemanticSearchConfig::default(),
        BackendFactory::with_defaults(),
        Arc::new(MockEmbeddingProvider::new(16)),
    );
    let signals = EntitySignals::<Listing>::new();
    let store = InMemoryEntityStore::new();
    let listings = registry
        .register(
            DocumentSpec::new()
                .index(IndexDeclaration::new("title"))
                .index(
                    IndexDeclaration::new("body")
                        .with_index_name("body_vec")
                        .with_distance(Distance::DotProduct),
                ),
            &signals,
        )
        .await
        .unwrap();
    assert_eq!(listings.index_configuration().vector_slots.len(), 2);

    for (id, title, body) in [(1, "alpha", "zulu"), (2, "zulu", "alpha")] {
        let listing = Listing {
            id,
            title: title.to_string(),
            body: body.to_string(),
        };
        store.insert(listing.clone());
        signals.notify_saved(&listing).await.unwrap();
    }

    let by_title = listings
        .find(&store, &SearchQuery::field("title", "alpha").top_k(1))
        .await
        .unwrap();
    let by_body = listings
        .find(&store, &SearchQuery::field("body", "alpha").top_k(1))
        .await
        .unwrap();
    assert_eq!(by_title[0].id, 1);
    assert_eq!(by_body[0].id, 2);
}

#[tokio::test]
async fn test_toml_configuration_drives_registration() {
    let config = SemanticSearchConfig::from_toml_str(
        r#"
        [vector_store]
        backend = "memory"
        timeout_ms = 1000

        [vector_store.retry]
        max_attempts = 3
        initial_delay_ms = 1

        [embeddings]
        provider = "mock"
        dimension = 16

        [documents.Product]
        namespace = "catalog"
        include_fields = ["name"]
        "#,
    )
    .unwrap();

    let registry = Registry::from_config(config).unwrap();
    let signals = EntitySignals::<Product>::new();
    let store = InMemoryEntityStore::new();
    let products = registry.register(name_index(), &signals).await.unwrap();
    assert_eq!(products.namespace(), "catalog");
    assert_eq!(products.backend().name(), "memory");

    let lamp = product(1, "lamp");
    store.insert(lamp.clone());
    signals.notify_saved(&lamp).await.unwrap();

    let vectors = registry.factory().memory_store();
    assert_eq!(vectors.count("catalog"), 1);
    let payload = vectors.payload("catalog", &DocumentId::Int(1)).unwrap();
    assert_eq!(payload.keys().collect::<Vec<_>>(), vec!["id", "name"]);

    let found = products
        .find(&store, &SearchQuery::field("name", "lamp"))
        .await
        .unwrap();
    assert_eq!(found, vec![lamp]);
}
