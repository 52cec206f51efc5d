#![cfg(feature = "memory")]

use strata_store::{
    Cid, Datastore, MemoryStore, Multistore, PrefixQuery, Region, Store, StoreError,
    create_regions,
};

fn store() -> MemoryStore {
    let store = MemoryStore::new();
    create_regions(&store).unwrap();
    store
}

fn keys(ds: &dyn Datastore, query: &PrefixQuery) -> Vec<String> {
    ds.query(Region::Heads, query)
        .unwrap()
        .map(|r| String::from_utf8(r.unwrap().0).unwrap())
        .collect()
}

#[test]
fn regions_are_isolated() {
    let store = store();
    let ds = Multistore::new(store.begin(false).unwrap()).unwrap();
    ds.put(Region::Data, b"/k", b"data").unwrap();
    ds.put(Region::System, b"/k", b"system").unwrap();

    assert_eq!(ds.get(Region::Data, b"/k").unwrap().unwrap(), b"data");
    assert_eq!(ds.get(Region::System, b"/k").unwrap().unwrap(), b"system");
    assert!(!ds.has(Region::Heads, b"/k").unwrap());
}

#[test]
fn commit_publishes_all_regions() {
    let store = store();
    let ds = Multistore::new(store.begin(false).unwrap()).unwrap();
    ds.put(Region::Data, b"/k", b"v").unwrap();
    let cid = ds.put_block(b"block").unwrap();
    ds.commit().unwrap();

    let ds = Multistore::new(store.begin(true).unwrap()).unwrap();
    assert!(ds.has(Region::Data, b"/k").unwrap());
    assert_eq!(ds.get_block(&cid).unwrap(), b"block");
}

#[test]
fn blocks_are_content_addressed() {
    let store = store();
    let ds = Multistore::new(store.begin(false).unwrap()).unwrap();
    let a = ds.put_block(b"same").unwrap();
    let b = ds.put_block(b"same").unwrap();
    assert_eq!(a, b);
    assert_eq!(a, Cid::of(b"same"));
    assert_eq!(Cid::parse(a.as_str()).unwrap(), a);
}

#[test]
fn missing_block_is_not_found() {
    let store = store();
    let ds = Multistore::new(store.begin(true).unwrap()).unwrap();
    let err = ds.get_block(&Cid::of(b"nothing")).unwrap_err();
    assert!(matches!(err, StoreError::BlockNotFound(_)));
}

#[test]
fn invalid_cid_is_rejected() {
    assert!(Cid::parse("not-a-cid").is_err());
}

#[test]
fn prefix_query_supports_filters_order_offset_and_limit() {
    let store = store();
    let ds = Multistore::new(store.begin(false).unwrap()).unwrap();
    for i in 0u8..6 {
        ds.put(Region::Heads, format!("/doc/1/{i}").as_bytes(), &[i]).unwrap();
    }
    ds.put(Region::Heads, b"/other/1/0", &[0]).unwrap();

    assert_eq!(keys(&ds, &PrefixQuery::new("/doc/")).len(), 6);
    assert_eq!(
        keys(&ds, &PrefixQuery::new("/doc/").reverse().limit(2)),
        vec!["/doc/1/5", "/doc/1/4"]
    );
    assert_eq!(
        keys(&ds, &PrefixQuery::new("/doc/").offset(4)),
        vec!["/doc/1/4", "/doc/1/5"]
    );
    let even = PrefixQuery::new("/doc/").filter(|_, v| v[0] % 2 == 0);
    assert_eq!(keys(&ds, &even), vec!["/doc/1/0", "/doc/1/2", "/doc/1/4"]);
}
