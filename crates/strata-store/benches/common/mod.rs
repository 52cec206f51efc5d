#![allow(dead_code)]

use strata_store::{Datastore, MemoryStore, Multistore, Region, Store, create_regions};

const FIELDS: [&str; 4] = ["1", "2", "3", "4"];

/// Data keys for `docs` documents of collection 1, four fields each.
pub fn data_keys(docs: usize) -> Vec<Vec<u8>> {
    (0..docs)
        .flat_map(|d| FIELDS.iter().map(move |f| format!("/1/bae-{d:06}/{f}:v").into_bytes()))
        .collect()
}

/// A store with `docs` documents in the data region and one head per
/// document in the heads region.
pub fn seeded_store(docs: usize) -> MemoryStore {
    let store = MemoryStore::new();
    create_regions(&store).unwrap();
    let ds = Multistore::new(store.begin(false).unwrap()).unwrap();
    for key in data_keys(docs) {
        ds.put(Region::Data, &key, &[0x10, 0x2a, 0, 0, 0]).unwrap();
    }
    for d in 0..docs {
        let cid = ds.put_block(format!("block-{d}").as_bytes()).unwrap();
        let head = format!("/bae-{d:06}/C/{cid}");
        ds.put(Region::Heads, head.as_bytes(), &(d as u64).to_be_bytes()).unwrap();
    }
    ds.commit().unwrap();
    store
}
