use sseq::{ClassId, ClassRef, EdgeType, PageEntry, Sseq, INFINITY};

fn neighbours(g: &Sseq, c: ClassId) -> Vec<(i32, i32)> {
    g.incident_edges(c)
        .map(|e| g.class(e.other_class(c)).unwrap().degree())
        .collect()
}

#[test]
fn duplicate_edges_keep_the_first_occurrence() {
    let mut g = Sseq::new();
    let hub = g.add_class(0, 0);
    let a = g.add_class(1, 1);
    let b = g.add_class(2, 1);
    let c = g.add_class(3, 1);
    let created: Vec<_> = [a, b, a, c, a]
        .into_iter()
        .map(|t| g.add_structline(hub, t).id().unwrap())
        .collect();

    assert_eq!(g.delete_duplicate_edges(), 2);
    assert_eq!(neighbours(&g, hub), vec![(1, 1), (2, 1), (3, 1)]);
    let kept: Vec<_> = g.edges().iter().map(|e| e.id()).collect();
    assert_eq!(kept, vec![created[0], created[1], created[3]]);
    assert_eq!(g.class(a).unwrap().incident_edges(), &[created[0]]);
    assert_eq!(g.display().edges.len(), 3);
    assert_eq!(g.delete_duplicate_edges(), 0);
}

#[test]
fn mixed_kinds_to_one_neighbour_count_as_duplicates() {
    let mut g = Sseq::new();
    let s = g.add_class(1, 0);
    let t = g.add_class(0, 2);
    let first = g.add_differential(s, t, 2).id().unwrap();
    g.add_structline(s, t);
    g.add_extension(s, t);
    assert_eq!(g.delete_duplicate_edges(), 1);
    // extensions are not incident, so they are never deduplicated
    assert_eq!(g.edge_count(), 2);
    assert_eq!(g.class(s).unwrap().incident_edges(), &[first]);
}

#[test]
fn dummy_endpoints_give_dummy_edges() {
    let mut g = Sseq::new();
    let a = g.add_class(0, 0);
    for kind in [EdgeType::Structline, EdgeType::Differential, EdgeType::Extension] {
        let r = match kind {
            EdgeType::Structline => g.add_structline(a, ClassRef::Dummy),
            EdgeType::Differential => g.add_differential(ClassRef::Dummy, a, 3),
            EdgeType::Extension => g.add_extension(None::<ClassId>, a),
        };
        assert!(r.is_dummy());
        assert_eq!(r.edge_type(), kind);
    }
    assert_eq!(g.edge_count(), 0);
    assert_eq!(g.display().edges.len(), 0);
    // a rejected differential does not grow the page list
    assert_eq!(g.page_list().len(), 2);
}

#[test]
fn differentials_grow_the_page_list() {
    let mut g = Sseq::new();
    let s = g.add_class(1, 0);
    let t = g.add_class(0, 3);
    g.add_differential(s, t, 3);
    g.add_differential(s, t, 2);
    g.add_differential(s, t, 3);
    assert_eq!(
        g.page_list().entries(),
        &[PageEntry::Page(0), PageEntry::Page(2), PageEntry::Page(3), PageEntry::Page(INFINITY)]
    );
    assert_eq!(g.display().page_list, *g.page_list());
}

#[test]
fn swaps_are_adjacent_transpositions() {
    let mut g = Sseq::new();
    let ids: Vec<_> = (0..3).map(|_| g.add_class(2, 2)).collect();
    assert!(!g.swap_index_up(ids[0]));
    assert!(!g.swap_index_down(ids[2]));

    assert!(g.swap_index_up(ids[2]));
    assert_eq!(g.class(ids[2]).unwrap().idx(), 1);
    assert_eq!(g.class(ids[1]).unwrap().idx(), 2);
    assert_eq!(g.classes_in_degree(2, 2), vec![ids[0], ids[2], ids[1]]);

    assert!(g.swap_index_down(ids[2]));
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(g.class(*id).unwrap().idx(), i);
        assert_eq!(g.display().class(id.index()).unwrap().idx, i);
    }
}

#[test]
fn stem_and_degree_queries() {
    let mut g = Sseq::new();
    let a = g.add_class(1, 0);
    let b = g.add_class(1, 4);
    let c = g.add_class(2, 0);
    g.add_class(1, 0);
    assert_eq!(g.stem(1).len(), 3);
    assert_eq!(g.stem(2), &[c]);
    assert!(g.stem(7).is_empty());
    assert_eq!(g.occupied_degrees(), vec![(1, 0), (1, 4), (2, 0)]);
    assert_eq!(g.num_classes_in_degree(1, 0), 2);
    assert_eq!(g.display().num_classes_in_degree(1, 0), 2);
    assert_eq!(g.classes_in_degree(1, 4), vec![b]);
    assert_eq!(g.class(a).unwrap().idx(), 0);
}

#[test]
fn page_list_operations_through_the_graph() {
    let mut g = Sseq::new();
    g.add_page_to_page_list(5).add_page_to_page_list(5);
    g.add_page_range_to_page_list(5, 9);
    g.add_page_range_to_page_list(5, 7);
    assert_eq!(
        g.page_list().entries(),
        &[
            PageEntry::Page(0),
            PageEntry::Range([5, 9]),
            PageEntry::Page(5),
            PageEntry::Page(INFINITY)
        ]
    );
    g.add_page_range_to_page_list(5, 12);
    assert_eq!(g.page_list().get(1), Some(PageEntry::Range([5, 12])));
    assert_eq!(g.page_list().len(), 4);
}

#[test]
fn visibility_follows_the_selected_page() {
    let mut g = Sseq::new();
    let s = g.add_class(1, 0);
    let t = g.add_class(0, 2);
    let u = g.add_class(0, 0);
    let d = g.add_differential(s, t, 2).id().unwrap();
    let line = g.add_structline(u, s).id().unwrap();
    g.set_page(s, 2);
    g.set_page(t, 2);
    g.update();

    assert_eq!(g.select_page_idx(1), Some(PageEntry::Page(2)));
    assert_eq!(g.visible_classes(), vec![s, t, u]);
    assert_eq!(g.visible_edges(), vec![d, line]);

    g.next_page();
    assert_eq!(g.visible_classes(), vec![u]);
    assert!(g.visible_edges().is_empty());
}
