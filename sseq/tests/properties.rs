use proptest::prelude::*;
use sseq::{ClassId, PageEntry, PageList, Sseq, INFINITY};
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum Op {
    AddClass { x: i8, y: i8 },
    SwapUp { idx: u16 },
    SwapDown { idx: u16 },
    AddStructline { a: u16, b: u16 },
    AddDifferential { a: u16, b: u16, page: i8 },
    DeleteEdge { idx: u16 },
    DedupEdges,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-3i8..3, -3i8..3).prop_map(|(x, y)| Op::AddClass { x, y }),
        any::<u16>().prop_map(|idx| Op::SwapUp { idx }),
        any::<u16>().prop_map(|idx| Op::SwapDown { idx }),
        (any::<u16>(), any::<u16>()).prop_map(|(a, b)| Op::AddStructline { a, b }),
        (any::<u16>(), any::<u16>(), any::<i8>()).prop_map(|(a, b, page)| Op::AddDifferential { a, b, page }),
        any::<u16>().prop_map(|idx| Op::DeleteEdge { idx }),
        Just(Op::DedupEdges),
    ]
}

fn pick(g: &Sseq, i: u16) -> Option<ClassId> {
    let n = g.class_count();
    (n > 0).then(|| ClassId::new((i as usize % n) as u32))
}

fn check_invariants(g: &Sseq) {
    let mut by_degree: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
    for (i, c) in g.classes().iter().enumerate() {
        assert_eq!(c.class_list_index(), i);
        by_degree.entry(c.degree()).or_default().push(c.idx());
        let d = g.display().class(i).expect("display slot");
        assert_eq!((d.x, d.y, d.idx), (c.x(), c.y(), c.idx()));
    }
    for ((x, y), mut idx) in by_degree {
        idx.sort_unstable();
        assert_eq!(idx, (0..idx.len()).collect::<Vec<_>>(), "idx gap at ({x}, {y})");
        assert_eq!(g.num_classes_in_degree(x, y), idx.len());
    }
    assert_eq!(g.display().edges.len(), g.edge_count());
    for (i, e) in g.edges().iter().enumerate() {
        assert_eq!(e.edge_list_index(), i);
        let d = g.display().edge(i).expect("display edge slot");
        assert_eq!((d.source, d.target), (e.source().index(), e.target().index()));
        assert!(g.real_edge_of(d).is_some());
    }
    let starts: Vec<_> = g.page_list().iter().map(PageEntry::start).collect();
    assert!(starts.windows(2).all(|w| w[0] <= w[1]));
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn graph_invariants_hold(ops in proptest::collection::vec(op_strategy(), 1..80)) {
        let mut g = Sseq::new();
        for op in ops {
            match op {
                Op::AddClass { x, y } => {
                    g.add_class(x as i32, y as i32);
                }
                Op::SwapUp { idx } => {
                    if let Some(c) = pick(&g, idx) {
                        g.swap_index_up(c);
                    }
                }
                Op::SwapDown { idx } => {
                    if let Some(c) = pick(&g, idx) {
                        g.swap_index_down(c);
                    }
                }
                Op::AddStructline { a, b } => {
                    let r = g.add_structline(pick(&g, a), pick(&g, b));
                    prop_assert_eq!(r.is_dummy(), g.class_count() == 0);
                }
                Op::AddDifferential { a, b, page } => {
                    let before = g.edge_count();
                    let r = g.add_differential(pick(&g, a), pick(&g, b), page as i32);
                    if page <= 0 {
                        prop_assert!(r.is_dummy());
                        prop_assert_eq!(g.edge_count(), before);
                    }
                }
                Op::DeleteEdge { idx } => {
                    let n = g.edge_count();
                    if n > 0 {
                        let id = g.edges()[idx as usize % n].id();
                        prop_assert!(g.delete_edge(id));
                        prop_assert_eq!(g.edge_count(), n - 1);
                    }
                }
                Op::DedupEdges => {
                    g.delete_duplicate_edges();
                }
            }
            check_invariants(&g);
        }
    }

    #[test]
    fn swap_up_then_down_restores(n in 2usize..8, k in 0usize..8) {
        let mut g = Sseq::new();
        let ids: Vec<_> = (0..n).map(|_| g.add_class(0, 0)).collect();
        let c = ids[k % n];
        let before: Vec<_> = g.classes().iter().map(|c| c.idx()).collect();
        if g.swap_index_up(c) {
            prop_assert!(g.swap_index_down(c));
        }
        let after: Vec<_> = g.classes().iter().map(|c| c.idx()).collect();
        prop_assert_eq!(before, after);
        for c in g.classes() {
            prop_assert_eq!(g.display().class(c.class_list_index()).map(|d| d.idx), Some(c.idx()));
        }
    }

    #[test]
    fn page_list_stays_sorted(ops in proptest::collection::vec((1i32..50, proptest::option::of(0i32..20)), 0..40)) {
        let mut list = PageList::new();
        for (start, len) in ops {
            match len {
                None => { list.add_page(start); }
                Some(l) => { list.add_page_range(start, start + l); }
            }
            let snapshot = list.clone();
            if len.is_none() {
                list.add_page(start);
                prop_assert_eq!(&list, &snapshot);
            }
        }
        let starts: Vec<_> = list.iter().map(PageEntry::start).collect();
        prop_assert!(starts.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(list.get(0), Some(PageEntry::Page(0)));
        prop_assert!(list.iter().any(|p| *p == PageEntry::Page(INFINITY)));
        for w in list.entries().windows(2) {
            if w[0].is_range() && w[1].is_range() {
                prop_assert!(w[0].start() != w[1].start());
            }
        }
    }
}
