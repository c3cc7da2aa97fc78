use std::collections::{HashMap, HashSet};

use idcompact::{IdType, ParallelCompactTable, ParallelConfig, ParallelContext};
use proptest::prelude::*;

const CAPACITY: usize = 256;

fn table(threads: usize) -> ParallelCompactTable {
    let config = ParallelConfig {
        threads,
        min_chunk_len: 1,
        ..ParallelConfig::default()
    };
    ParallelCompactTable::new(CAPACITY, &ParallelContext::new(&config).unwrap()).unwrap()
}

fn batches() -> impl Strategy<Value = Vec<Vec<IdType>>> {
    proptest::collection::vec(proptest::collection::vec(0..CAPACITY as IdType, 0..64), 1..8)
}

proptest! {
    #[test]
    fn test_populate_is_bijection(batches in batches(), threads in 1usize..6) {
        let table = table(threads);
        let mut seen = HashSet::new();
        for batch in &batches {
            let fresh: HashSet<_> = batch.iter().filter(|id| !seen.contains(*id)).collect();
            let inserted = table.populate(batch);
            prop_assert_eq!(inserted, fresh.len());
            seen.extend(batch.iter().copied());
        }

        prop_assert_eq!(table.num_items(), seen.len());
        let nodes = table.mapped_nodes();
        prop_assert_eq!(nodes.iter().copied().collect::<HashSet<_>>(), seen);
        for (local, &global) in nodes.iter().enumerate() {
            prop_assert_eq!(table.local_of(global), Some(local as IdType));
            prop_assert_eq!(table.global_of(local as IdType), Some(global));
        }
    }

    #[test]
    fn test_repeated_ids_keep_first_assignment(batches in batches()) {
        let table = table(4);
        let mut first: HashMap<IdType, IdType> = HashMap::new();
        for batch in &batches {
            table.populate(batch);
            for &id in batch {
                let local = table.local_of(id).unwrap();
                prop_assert_eq!(*first.entry(id).or_insert(local), local);
            }
        }
        // Re-offering everything changes nothing.
        let all: Vec<IdType> = first.keys().copied().collect();
        prop_assert_eq!(table.populate(&all), 0);
        for (id, local) in first {
            prop_assert_eq!(table.local_of(id), Some(local));
        }
    }

    #[test]
    fn test_map_edges_agrees_with_origin(
        edges in proptest::collection::vec((0..CAPACITY as IdType, 0..CAPACITY as IdType), 0..200),
        threads in 1usize..6,
    ) {
        let table = table(threads);
        let (src, dst): (Vec<IdType>, Vec<IdType>) = edges.into_iter().unzip();
        table.populate(&src);
        table.populate(&dst);

        let mut new_src = vec![0; src.len()];
        let mut new_dst = vec![0; dst.len()];
        table.map_edges(&src, &dst, &mut new_src, &mut new_dst);
        for i in 0..src.len() {
            prop_assert_eq!(Some(new_src[i]), table.local_of(src[i]));
            prop_assert_eq!(Some(new_dst[i]), table.local_of(dst[i]));
        }
    }

    #[test]
    fn test_reset_then_repopulate(before in batches(), after in batches()) {
        let mut table = table(3);
        for batch in &before {
            table.populate(batch);
        }
        table.reset();
        prop_assert_eq!(table.num_items(), 0);

        let mut seen = HashSet::new();
        for batch in &after {
            table.populate(batch);
            seen.extend(batch.iter().copied());
        }
        prop_assert_eq!(table.num_items(), seen.len());
        for id in 0..CAPACITY as IdType {
            prop_assert_eq!(table.local_of(id).is_some(), seen.contains(&id));
        }
        let nodes = table.mapped_nodes();
        for (local, &global) in nodes.iter().enumerate() {
            prop_assert_eq!(table.local_of(global), Some(local as IdType));
        }
    }
}
