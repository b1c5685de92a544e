use super::*;
use crate::alt::{self, AltFeature, PROPERTY_ALT_LABEL};
use crate::fixtures::{self, CountingStore, MemoryWriterFactory};
use crate::geometry;
use crate::store::MemoryStore;
use crate::uri;
use geo_types::{Geometry, Point};
use serde_json::{Map, Value, json};
use std::sync::Arc;

const DEPICTION_ID: i64 = 1511949289;
const SUBJECT_ID: i64 = 1511943105;

fn options(store: &Arc<MemoryStore>) -> AssignReferencesOptions {
    AssignReferencesOptions {
        depiction_reader: store.clone(),
        subject_reader: store.clone(),
        whosonfirst_reader: store.clone(),
        depiction_writer_uri: String::from("mem://depictions"),
        subject_writer_uri: String::from("mem://subjects"),
        writer_factory: Arc::new(MemoryWriterFactory::shared(store.clone())),
        author: String::from("tester"),
        source_geom_suffix: None,
        default_geometry_id: Some(fixtures::DEFAULT_GEOMETRY_ID),
    }
}

fn setup(alt_labels: &[&str]) -> Arc<MemoryStore> {
    let store = fixtures::seeded_store();
    fixtures::put(&store, &fixtures::depiction(DEPICTION_ID, SUBJECT_ID, alt_labels));
    fixtures::put(&store, &fixtures::subject(SUBJECT_ID, &[DEPICTION_ID]));
    store
}

async fn load(store: &MemoryStore, id: i64) -> Value {
    crate::store::load_feature(store, id).await.unwrap()
}

async fn load_alt(store: &MemoryStore, alt_label: &str) -> AltFeature {
    let body = crate::store::load_alt_bytes(store, DEPICTION_ID, alt_label)
        .await
        .unwrap();
    alt::parse(&body).unwrap()
}

fn snapshot(store: &MemoryStore) -> Vec<(String, Vec<u8>)> {
    store
        .paths()
        .into_iter()
        .map(|p| {
            let body = store.get(&p).unwrap().to_vec();
            (p, body)
        })
        .collect()
}

fn default_point() -> Value {
    let (x, y) = fixtures::DEFAULT_GEOMETRY_POINT;
    geometry::point_to_json(Point::new(x, y)).unwrap()
}

#[tokio::test]
async fn test_assign_single_reference() {
    let store = setup(&[]);

    let bundle = assign_references(
        &options(&store),
        DEPICTION_ID,
        &[Reference::new("arrival", vec![1001])],
    )
    .await
    .unwrap();

    let alt_feature = load_alt(&store, "georef_arrival").await;
    assert_eq!(alt_feature.id, DEPICTION_ID);
    assert_eq!(alt_feature.alt_label(), Some("georef_arrival"));
    assert_eq!(alt_feature.properties["arrival"], json!([1001]));
    assert_eq!(alt_feature.properties["src:geom"], json!("sfomuseum#georeference"));
    assert_eq!(
        alt_feature.properties["wof:repo"],
        json!("sfomuseum-data-media-collection")
    );
    assert!(!alt_feature.is_deprecated());
    assert_eq!(
        alt_feature.geo_geometry().unwrap(),
        Geometry::MultiPoint(vec![(10.0, 20.0)].into())
    );

    let depiction = load(&store, DEPICTION_ID).await;
    let props = &depiction["properties"];
    assert_eq!(props["src:geom"], json!("sfomuseum#georeference"));
    assert_eq!(props["src:geom_alt"], json!(["georef_arrival"]));
    assert_eq!(
        props["georef:depicted"],
        json!([{"georef:label": "arrival", "wof:depicts": [1001]}])
    );
    assert_eq!(props["georef:whosonfirst_belongsto"], json!([1001]));
    assert_eq!(
        props["wof:hierarchy"],
        json!([{"country_id": 85633793, "locality_id": 1001}])
    );
    assert!(props["georef:lastmodified"].is_i64());
    assert_eq!(
        depiction["geometry"],
        json!({"type": "MultiPoint", "coordinates": [[10.0, 20.0]]})
    );

    let subject = load(&store, SUBJECT_ID).await;
    let props = &subject["properties"];
    assert_eq!(props["georef:depicted"], json!({"arrival": [1001]}));
    assert_eq!(props["georef:depictions"], json!([DEPICTION_ID]));
    assert_eq!(props["georef:whosonfirst_belongsto"], json!([1001]));
    assert_eq!(
        subject["geometry"],
        json!({"type": "MultiPoint", "coordinates": [[10.0, 20.0]]})
    );

    assert_eq!(bundle["type"], json!("FeatureCollection"));
    let features = bundle["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0], subject);
    assert_eq!(features[1], depiction);
}

#[tokio::test]
async fn test_assign_is_idempotent() {
    let store = setup(&[]);
    let opts = options(&store);
    let refs = vec![
        Reference::new("arrival", vec![1001]),
        Reference::new("departure", vec![1002, 1001]),
    ];

    let first = assign_references(&opts, DEPICTION_ID, &refs).await.unwrap();
    let before = snapshot(&store);

    let second = assign_references(&opts, DEPICTION_ID, &refs).await.unwrap();

    assert_eq!(snapshot(&store), before);
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_multiple_references() {
    let store = setup(&[]);

    assign_references(
        &options(&store),
        DEPICTION_ID,
        &[
            Reference::new("arrival", vec![1001]),
            Reference::new("departure", vec![1002, 1001]),
        ],
    )
    .await
    .unwrap();

    let departure = load_alt(&store, "georef_departure").await;
    assert_eq!(
        departure.geo_geometry().unwrap(),
        Geometry::MultiPoint(vec![(30.0, 40.0), (10.0, 20.0)].into())
    );

    let depiction = load(&store, DEPICTION_ID).await;
    let props = &depiction["properties"];
    assert_eq!(
        props["src:geom_alt"],
        json!(["georef_arrival", "georef_departure"])
    );
    assert_eq!(props["georef:whosonfirst_belongsto"], json!([1001, 1002]));
    assert_eq!(
        props["wof:hierarchy"],
        json!([
            {"country_id": 85633793, "locality_id": 1001},
            {"country_id": 85633793, "locality_id": 1002}
        ])
    );
    assert_eq!(
        depiction["geometry"],
        json!({"type": "MultiPoint", "coordinates": [[10.0, 20.0], [30.0, 40.0]]})
    );

    let subject = load(&store, SUBJECT_ID).await;
    assert_eq!(
        subject["properties"]["georef:depicted"],
        json!({"arrival": [1001], "departure": [1002, 1001]})
    );
}

#[tokio::test]
async fn test_duplicate_labels_fail_before_io() {
    let counting = Arc::new(CountingStore::default());
    let factory = Arc::new(MemoryWriterFactory::default());

    let opts = AssignReferencesOptions {
        depiction_reader: counting.clone(),
        subject_reader: counting.clone(),
        whosonfirst_reader: counting.clone(),
        depiction_writer_uri: String::from("mem://depictions"),
        subject_writer_uri: String::from("mem://subjects"),
        writer_factory: factory.clone(),
        author: String::from("tester"),
        source_geom_suffix: None,
        default_geometry_id: None,
    };

    let result = assign_references(
        &opts,
        DEPICTION_ID,
        &[
            Reference::new("arrival", vec![1001]),
            Reference::new("arrival", vec![1002]),
        ],
    )
    .await;

    assert!(matches!(result, Err(GeoError::DuplicateLabel(l)) if l == "arrival"));
    assert_eq!(counting.reads(), 0);
    assert_eq!(counting.writes(), 0);
    assert!(factory.requested().is_empty());
}

#[tokio::test]
async fn test_remove_reference_deprecates_alt() {
    let store = setup(&[]);
    let opts = options(&store);

    assign_references(&opts, DEPICTION_ID, &[Reference::new("arrival", vec![1001])])
        .await
        .unwrap();

    assign_references(&opts, DEPICTION_ID, &[Reference::new("arrival", vec![])])
        .await
        .unwrap();

    let arrival = load_alt(&store, "georef_arrival").await;
    assert!(arrival.is_deprecated());
    assert_eq!(arrival.alt_label(), Some("georef_arrival"));
    assert_eq!(
        arrival.geo_geometry().unwrap(),
        Geometry::Point(Point::new(0.0, 0.0))
    );

    let depiction = load(&store, DEPICTION_ID).await;
    let props = &depiction["properties"];
    assert_eq!(props["src:geom_alt"], json!([]));
    assert_eq!(props["georef:depicted"], json!([]));
    assert_eq!(props["georef:whosonfirst_belongsto"], json!([]));
    assert_eq!(depiction["geometry"], default_point());

    let subject = load(&store, SUBJECT_ID).await;
    let props = &subject["properties"];
    assert_eq!(props["georef:depicted"], json!({}));
    assert_eq!(props["georef:whosonfirst_belongsto"], json!([]));
    assert_eq!(props["georef:depictions"], json!([DEPICTION_ID]));
    assert_eq!(subject["geometry"], default_point());

    // A second removal leaves the deprecated file alone.
    let before = snapshot(&store);
    assign_references(&opts, DEPICTION_ID, &[Reference::new("arrival", vec![])])
        .await
        .unwrap();
    assert_eq!(snapshot(&store), before);
}

#[tokio::test]
async fn test_omitted_labels_are_kept() {
    let store = setup(&[]);
    let opts = options(&store);

    assign_references(
        &opts,
        DEPICTION_ID,
        &[
            Reference::new("arrival", vec![1001]),
            Reference::new("departure", vec![1002]),
        ],
    )
    .await
    .unwrap();

    assign_references(&opts, DEPICTION_ID, &[Reference::new("arrival", vec![])])
        .await
        .unwrap();

    assert!(load_alt(&store, "georef_arrival").await.is_deprecated());
    assert!(!load_alt(&store, "georef_departure").await.is_deprecated());

    let depiction = load(&store, DEPICTION_ID).await;
    assert_eq!(
        depiction["properties"]["src:geom_alt"],
        json!(["georef_departure"])
    );
    assert_eq!(
        depiction["geometry"],
        json!({"type": "MultiPoint", "coordinates": [[30.0, 40.0]]})
    );

    let props = &depiction["properties"];
    assert_eq!(
        props["georef:depicted"],
        json!([{"georef:label": "departure", "wof:depicts": [1002]}])
    );
    assert_eq!(props["georef:whosonfirst_belongsto"], json!([1002]));
    assert_eq!(
        props["wof:hierarchy"],
        json!([{"country_id": 85633793, "locality_id": 1002}])
    );

    let subject = load(&store, SUBJECT_ID).await;
    let props = &subject["properties"];
    assert_eq!(props["georef:depicted"], json!({"departure": [1002]}));
    assert_eq!(props["georef:whosonfirst_belongsto"], json!([1002]));
    assert_eq!(props["georef:depictions"], json!([DEPICTION_ID]));
    assert_eq!(
        subject["geometry"],
        json!({"type": "MultiPoint", "coordinates": [[30.0, 40.0]]})
    );
}

#[tokio::test]
async fn test_updating_one_label_keeps_the_others() {
    let store = setup(&[]);
    let opts = options(&store);

    assign_references(
        &opts,
        DEPICTION_ID,
        &[
            Reference::new("arrival", vec![1001]),
            Reference::new("departure", vec![1002]),
        ],
    )
    .await
    .unwrap();

    assign_references(&opts, DEPICTION_ID, &[Reference::new("arrival", vec![1002])])
        .await
        .unwrap();

    let depiction = load(&store, DEPICTION_ID).await;
    let props = &depiction["properties"];
    assert_eq!(
        props["src:geom_alt"],
        json!(["georef_arrival", "georef_departure"])
    );
    assert_eq!(
        props["georef:depicted"],
        json!([
            {"georef:label": "arrival", "wof:depicts": [1002]},
            {"georef:label": "departure", "wof:depicts": [1002]}
        ])
    );
    assert_eq!(props["georef:whosonfirst_belongsto"], json!([1002]));

    let subject = load(&store, SUBJECT_ID).await;
    assert_eq!(
        subject["properties"]["georef:depicted"],
        json!({"arrival": [1002], "departure": [1002]})
    );

    // Nothing changes when the same update is repeated.
    let before = snapshot(&store);
    assign_references(&opts, DEPICTION_ID, &[Reference::new("arrival", vec![1002])])
        .await
        .unwrap();
    assert_eq!(snapshot(&store), before);
}

#[tokio::test]
async fn test_empty_references_use_default_geometry() {
    let store = setup(&[]);

    assign_references(&options(&store), DEPICTION_ID, &[])
        .await
        .unwrap();

    let depiction = load(&store, DEPICTION_ID).await;
    assert_eq!(depiction["geometry"], default_point());
    assert_eq!(
        depiction["properties"]["wof:hierarchy"],
        json!([{"campus_id": fixtures::DEFAULT_GEOMETRY_ID}])
    );

    let subject = load(&store, SUBJECT_ID).await;
    assert_eq!(subject["geometry"], default_point());
}

#[tokio::test]
async fn test_empty_references_keep_other_alt_geometries() {
    let store = setup(&[]);
    let opts = options(&store);

    assign_references(&opts, DEPICTION_ID, &[Reference::new("arrival", vec![1001])])
        .await
        .unwrap();

    let mut props = Map::new();
    props.insert(String::from(PROPERTY_ALT_LABEL), json!("geotag-fov"));
    let fov = AltFeature::new(DEPICTION_ID, props, &Geometry::Point(Point::new(5.0, 5.0)));
    store.insert(
        uri::alt_id_to_rel_path(DEPICTION_ID, "geotag-fov").unwrap(),
        alt::format(&fov).unwrap(),
    );

    let mut depiction = load(&store, DEPICTION_ID).await;
    depiction["properties"]["src:geom_alt"] = json!(["georef_arrival", "geotag-fov"]);
    fixtures::put(&store, &depiction);

    assign_references(&opts, DEPICTION_ID, &[]).await.unwrap();

    assert!(load_alt(&store, "georef_arrival").await.is_deprecated());
    assert!(!load_alt(&store, "geotag-fov").await.is_deprecated());

    let depiction = load(&store, DEPICTION_ID).await;
    assert_eq!(depiction["properties"]["src:geom_alt"], json!(["geotag-fov"]));
    assert_eq!(
        depiction["geometry"],
        json!({"type": "MultiPoint", "coordinates": [[5.0, 5.0]]})
    );
}

#[tokio::test]
async fn test_stale_alt_listing_is_skipped() {
    let store = setup(&["georef_ghost"]);

    assign_references(
        &options(&store),
        DEPICTION_ID,
        &[Reference::new("arrival", vec![1001])],
    )
    .await
    .unwrap();

    let depiction = load(&store, DEPICTION_ID).await;
    assert_eq!(depiction["properties"]["src:geom_alt"], json!(["georef_arrival"]));
}

#[tokio::test]
async fn test_missing_place_writes_nothing() {
    let store = setup(&[]);
    let before = snapshot(&store);

    let result = assign_references(
        &options(&store),
        DEPICTION_ID,
        &[Reference::new("arrival", vec![4040])],
    )
    .await;

    assert!(matches!(result, Err(GeoError::NotFound(_))));
    assert_eq!(snapshot(&store), before);
}

#[tokio::test]
async fn test_source_geom_suffix() {
    let store = setup(&[]);
    let mut opts = options(&store);
    opts.source_geom_suffix = Some(String::from("sfo"));

    assign_references(&opts, DEPICTION_ID, &[Reference::new("arrival", vec![1001])])
        .await
        .unwrap();

    let depiction = load(&store, DEPICTION_ID).await;
    assert_eq!(
        depiction["properties"]["src:geom"],
        json!("sfomuseum#georeference-sfo")
    );
    assert_eq!(
        load_alt(&store, "georef_arrival").await.properties["src:geom"],
        json!("sfomuseum#georeference-sfo")
    );
}
