use chrono::{Duration, Utc};
use jsonpersist::{ConnectionConfig, Object, OrQuery, Query, Store, timestamp_value};
use serde_json::{Value, json};

jsonpersist::persistent_type! {
    struct A = "tests.A";
    struct B = "tests.B", references = ["ref0"];
}

fn store() -> Store {
    Store::connect(&ConnectionConfig::in_memory().debug(true)).unwrap()
}

fn save_a(store: &Store, attributes: Value) -> Object {
    let a = Object::of::<A>();
    if let Value::Object(map) = attributes {
        for (key, value) in map {
            a.set_value(&key, value).unwrap();
        }
    }
    a.save(store).unwrap();
    a
}

fn ids(objects: &[Object]) -> Vec<String> {
    objects.iter().map(Object::id).collect()
}

fn found(query: &Query, store: &Store) -> Vec<String> {
    ids(&query.find(store).unwrap().unwrap())
}

#[test]
fn test_query_all_objects() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"foo": 2}));

    assert_eq!(found(&Query::new(), &store), vec![a0.id(), a1.id()]);
}

#[test]
fn test_query_scoped_to_type() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    let b = Object::of::<B>();
    b.set("foo", 1).unwrap();
    b.save(&store).unwrap();
    let a1 = save_a(&store, json!({"foo": 2}));

    assert_eq!(found(&Query::of::<A>(), &store), vec![a0.id(), a1.id()]);
    assert_eq!(found(&Query::for_type("tests.B"), &store), vec![b.id()]);
}

#[test]
fn test_first() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": 2}));

    let first = Query::of::<A>().first(&store).unwrap().unwrap();
    assert_eq!(first.id(), a0.id());
    assert!(Query::of::<B>().first(&store).unwrap().is_none());
}

#[test]
fn test_exists_and_does_not_exist() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"bar": 1}));

    assert_eq!(found(&Query::of::<A>().exists("foo"), &store), vec![a0.id()]);
    assert_eq!(found(&Query::of::<A>().does_not_exist("foo"), &store), vec![a1.id()]);
}

#[test]
fn test_equal_to() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": 2}));

    assert_eq!(found(&Query::of::<A>().equal_to("foo", 1), &store), vec![a0.id(), a1.id()]);
}

#[test]
fn test_equal_to_text_and_bool() {
    let store = store();
    let a0 = save_a(&store, json!({"name": "ann", "active": true}));
    save_a(&store, json!({"name": "bob", "active": false}));

    assert_eq!(found(&Query::of::<A>().equal_to("name", "ann"), &store), vec![a0.id()]);
    assert_eq!(found(&Query::of::<A>().equal_to("active", true), &store), vec![a0.id()]);
}

#[test]
fn test_equal_to_list() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": [1, 2, 3]}));
    save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": "[1,2,3]"}));

    assert_eq!(
        found(&Query::of::<A>().equal_to("foo", json!([1, 2, 3])), &store),
        vec![a0.id()]
    );
}

#[test]
fn test_equal_to_map() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": {"b": 2, "a": 1}}));
    save_a(&store, json!({"foo": {"a": 1}}));

    assert_eq!(
        found(&Query::of::<A>().equal_to("foo", json!({"a": 1, "b": 2})), &store),
        vec![a0.id()]
    );
}

#[test]
fn test_not_equal_to() {
    let store = store();
    save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"foo": 2}));

    assert_eq!(found(&Query::of::<A>().not_equal_to("foo", 1), &store), vec![a1.id()]);
}

#[test]
fn test_not_equal_to_list() {
    let store = store();
    save_a(&store, json!({"foo": [1, 2, 3]}));
    let a1 = save_a(&store, json!({"foo": 2}));

    assert_eq!(
        found(&Query::of::<A>().not_equal_to("foo", json!([1, 2, 3])), &store),
        vec![a1.id()]
    );
}

#[test]
fn test_greater_than() {
    let store = store();
    save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"foo": 2}));

    assert_eq!(found(&Query::of::<A>().greater_than("foo", 1, false), &store), vec![a1.id()]);
}

#[test]
fn test_greater_than_with_list() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": [1, 2, 3]}));
    save_a(&store, json!({"foo": 2}));

    assert_eq!(found(&Query::of::<A>().greater_than("foo", 2, true), &store), vec![a0.id()]);
    assert!(
        Query::of::<A>()
            .greater_than("foo", 3, true)
            .find(&store)
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_greater_than_or_equal_to() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"foo": 2}));
    save_a(&store, json!({"foo": 0}));

    assert_eq!(
        found(&Query::of::<A>().greater_than_or_equal_to("foo", 1, false), &store),
        vec![a0.id(), a1.id()]
    );
}

#[test]
fn test_greater_than_or_equal_to_with_list() {
    let store = store();
    save_a(&store, json!({"foo": [1]}));
    let a1 = save_a(&store, json!({"foo": [1, 2, 3]}));
    let a2 = save_a(&store, json!({"foo": [1, 2]}));

    assert_eq!(
        found(&Query::of::<A>().greater_than_or_equal_to("foo", 2, true), &store),
        vec![a1.id(), a2.id()]
    );
}

#[test]
fn test_less_than() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": 2}));

    assert_eq!(found(&Query::of::<A>().less_than("foo", 2, false), &store), vec![a0.id()]);
}

#[test]
fn test_less_than_with_list() {
    let store = store();
    save_a(&store, json!({"foo": [1, 2, 3]}));
    let a1 = save_a(&store, json!({"foo": [1, 2]}));

    assert_eq!(found(&Query::of::<A>().less_than("foo", 3, true), &store), vec![a1.id()]);
}

#[test]
fn test_less_than_or_equal_to() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"foo": 2}));

    assert_eq!(
        found(&Query::of::<A>().less_than_or_equal_to("foo", 2, false), &store),
        vec![a0.id(), a1.id()]
    );
}

#[test]
fn test_less_than_or_equal_to_with_list() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": [1, 2, 3]}));
    let a1 = save_a(&store, json!({"foo": [1, 2]}));
    save_a(&store, json!({"foo": [1, 2, 3, 4]}));

    assert_eq!(
        found(&Query::of::<A>().less_than_or_equal_to("foo", 3, true), &store),
        vec![a0.id(), a1.id()]
    );
}

#[test]
fn test_contained_in() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"foo": 2}));

    assert_eq!(
        found(&Query::of::<A>().contained_in("foo", [1, 3, 5]), &store),
        vec![a0.id()]
    );
    assert_eq!(
        found(&Query::of::<A>().not_contained_in("foo", [1, 3, 5]), &store),
        vec![a1.id()]
    );
}

#[test]
fn test_substring_predicates() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": "abc"}));
    let a1 = save_a(&store, json!({"foo": "cde"}));

    assert_eq!(
        found(&Query::of::<A>().contains("foo", "c", false), &store),
        vec![a0.id(), a1.id()]
    );
    assert_eq!(found(&Query::of::<A>().starts_with("foo", "ab", false), &store), vec![a0.id()]);
    assert_eq!(found(&Query::of::<A>().ends_with("foo", "de", false), &store), vec![a1.id()]);
    assert!(
        Query::of::<A>()
            .contains("foo", "C", false)
            .find(&store)
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_substring_predicates_case_insensitive() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": "abc"}));
    let a1 = save_a(&store, json!({"foo": "cde"}));

    assert_eq!(
        found(&Query::of::<A>().contains("foo", "C", true), &store),
        vec![a0.id(), a1.id()]
    );
    assert_eq!(found(&Query::of::<A>().starts_with("foo", "aB", true), &store), vec![a0.id()]);
    assert_eq!(found(&Query::of::<A>().ends_with("foo", "DE", true), &store), vec![a1.id()]);
}

#[test]
fn test_case_insensitive_substring_with_non_ascii_text() {
    let store = store();
    let a0 = save_a(&store, json!({"name": "École"}));
    save_a(&store, json!({"name": "ecole"}));

    assert_eq!(found(&Query::of::<A>().contains("name", "École", true), &store), vec![a0.id()]);
    assert_eq!(found(&Query::of::<A>().starts_with("name", "ÉCO", true), &store), vec![a0.id()]);
    assert_eq!(found(&Query::of::<A>().ends_with("name", "COLE", true), &store).len(), 2);
    assert_eq!(found(&Query::of::<A>().contains("name", "École", false), &store), vec![a0.id()]);
}

#[test]
fn test_substring_wildcards_match_literally() {
    let store = store();
    let a0 = save_a(&store, json!({"label": "50% off"}));
    save_a(&store, json!({"label": "500 off"}));
    let a2 = save_a(&store, json!({"label": "snake_case"}));
    save_a(&store, json!({"label": "snakeXcase"}));

    assert_eq!(found(&Query::of::<A>().contains("label", "0%", false), &store), vec![a0.id()]);
    assert_eq!(found(&Query::of::<A>().contains("label", "e_c", false), &store), vec![a2.id()]);
}

#[test]
fn test_matches_regex() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": "abc"}));
    let a1 = save_a(&store, json!({"foo": "cde"}));

    let query = Query::of::<A>().matches("foo", "^a", false).unwrap();
    assert_eq!(found(&query, &store), vec![a0.id()]);

    let query = Query::of::<A>().matches("foo", "^CDE$", true).unwrap();
    assert_eq!(found(&query, &store), vec![a1.id()]);

    let query = Query::of::<A>().matches("foo", "b", false).unwrap();
    assert!(found(&query, &store).is_empty());
}

#[test]
fn test_regex_requires_text_value() {
    let store = store();
    save_a(&store, json!({"foo": 123}));
    let query = Query::of::<A>().matches("foo", "1", false).unwrap();
    assert_eq!(query.find(&store).unwrap(), Some(Vec::new()));
}

#[test]
fn test_regex_on_nested_and_referenced_paths() {
    let store = store();
    let target = save_a(&store, json!({"name": "target"}));
    let b = Object::of::<B>();
    b.set("meta", json!({"tags": ["red", "blue"]})).unwrap();
    b.set_ref("ref0", &target).unwrap();
    b.save(&store).unwrap();

    let query = Query::of::<B>().matches("meta.tags.1", "bl", false).unwrap();
    assert_eq!(found(&query, &store), vec![b.id()]);

    let query = Query::of::<B>().matches("ref0.name", "tar", false).unwrap();
    assert_eq!(found(&query, &store), vec![b.id()]);
}

#[test]
fn test_no_results_sentinel_differs_from_filtered_out() {
    let store = store();
    save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": 2}));

    assert!(Query::of::<A>().exists("bar").find(&store).unwrap().is_none());

    let filtered = Query::of::<A>().exists("foo").matches("foo", "x", false).unwrap();
    assert_eq!(filtered.find(&store).unwrap().map(|objects| objects.len()), Some(0));
    assert!(filtered.first(&store).unwrap().is_none());
}

#[test]
fn test_count_ignores_regex_filters() {
    let store = store();
    save_a(&store, json!({"foo": "abc"}));
    save_a(&store, json!({"foo": "cde"}));

    let query = Query::of::<A>().exists("foo").matches("foo", "^a", false).unwrap();
    let found = query.find(&store).unwrap().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(query.count(&store).unwrap(), 2);
}

#[test]
fn test_sort_single_key() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"foo": 2}));

    assert_eq!(
        found(&Query::of::<A>().exists("foo").ascending("foo"), &store),
        vec![a0.id(), a1.id()]
    );
    assert_eq!(
        found(&Query::of::<A>().exists("foo").descending("foo"), &store),
        vec![a1.id(), a0.id()]
    );
}

#[test]
fn test_sort_multiple_keys() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1, "bar": 0}));
    let a1 = save_a(&store, json!({"foo": 1, "bar": 2}));

    assert_eq!(
        found(&Query::of::<A>().exists("foo").ascending("foo").ascending("bar"), &store),
        vec![a0.id(), a1.id()]
    );
    assert_eq!(
        found(&Query::of::<A>().exists("foo").descending("foo").descending("bar"), &store),
        vec![a1.id(), a0.id()]
    );
}

#[test]
fn test_skip_without_limit() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": 2}));

    let query = Query::of::<A>().exists("foo").descending("foo").skip(1).unwrap();
    assert_eq!(found(&query, &store), vec![a0.id()]);
}

#[test]
fn test_limit_and_skip() {
    let store = store();
    let objects: Vec<Object> = (0..5).map(|n| save_a(&store, json!({"n": n}))).collect();

    let query = Query::of::<A>().ascending("n").skip(1).unwrap().limit(2).unwrap();
    assert_eq!(found(&query, &store), vec![objects[1].id(), objects[2].id()]);
    assert_eq!(query.count(&store).unwrap(), 5);
}

#[test]
fn test_count() {
    let store = store();
    save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": 2}));

    assert_eq!(Query::of::<A>().exists("foo").count(&store).unwrap(), 2);
    assert_eq!(Query::of::<A>().exists("bar").count(&store).unwrap(), 0);
}

#[test]
fn test_invalid_limit_and_skip() {
    assert!(Query::of::<A>().limit(-1).is_err());
    assert!(Query::of::<A>().limit(0).is_err());
    assert!(Query::of::<A>().skip(-1).is_err());
    assert!(OrQuery::default().skip(0).is_err());
}

#[test]
fn test_multiple_and_conditions() {
    let store = store();
    save_a(&store, json!({"foo": 1, "bar": 2}));
    let a1 = save_a(&store, json!({"foo": 1, "bar": 3}));

    let query = Query::of::<A>().equal_to("foo", 1).greater_than("bar", 2, false);
    assert_eq!(found(&query, &store), vec![a1.id()]);
}

#[test]
fn test_or_query() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": 2}));
    let a2 = save_a(&store, json!({"bar": 2}));

    let query = OrQuery::new([
        Query::of::<A>().exists("bar"),
        Query::of::<A>().equal_to("foo", 1),
    ]);
    let objects = query.find(&store).unwrap().unwrap();
    assert_eq!(ids(&objects), vec![a0.id(), a2.id()]);
    assert_eq!(query.count(&store).unwrap(), 2);
}

#[test]
fn test_or_query_returns_each_object_once() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1, "bar": 1}));

    let query = OrQuery::new([
        Query::of::<A>().equal_to("foo", 1),
        Query::of::<A>().equal_to("bar", 1),
    ]);
    assert_eq!(ids(&query.find(&store).unwrap().unwrap()), vec![a0.id()]);
}

#[test]
fn test_or_query_shaping() {
    let store = store();
    let a0 = save_a(&store, json!({"foo": 1}));
    let a1 = save_a(&store, json!({"foo": 2}));
    save_a(&store, json!({"foo": 3}));

    let query = OrQuery::new([Query::of::<A>().equal_to("foo", 1)])
        .or(Query::of::<A>().equal_to("foo", 2))
        .descending("foo");
    assert_eq!(ids(&query.find(&store).unwrap().unwrap()), vec![a1.id(), a0.id()]);

    let first = query.first(&store).unwrap().unwrap();
    assert_eq!(first.id(), a1.id());
}

#[test]
fn test_or_query_skips_children_without_predicates() {
    let store = store();
    save_a(&store, json!({"foo": 0}));
    let a1 = save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": 2}));

    let query = OrQuery::new([Query::new(), Query::of::<A>().equal_to("foo", 1)]);
    assert_eq!(query.count(&store).unwrap(), 1);
    assert_eq!(ids(&query.find(&store).unwrap().unwrap()), vec![a1.id()]);

    let unconstrained = OrQuery::new([Query::new(), Query::new()]);
    assert_eq!(unconstrained.count(&store).unwrap(), 3);
}

#[test]
fn test_query_by_reference() {
    let store = store();
    let a = save_a(&store, json!({"foo": 1}));
    let b = Object::of::<B>();
    b.set_ref("ref0", &a).unwrap();
    b.save(&store).unwrap();

    assert_eq!(Query::of::<B>().equal_to("ref0", &a).count(&store).unwrap(), 1);
}

#[test]
fn test_matches_query() {
    let store = store();
    let a = save_a(&store, json!({"foo": 1}));
    let b0 = Object::of::<B>();
    b0.set("foo", 2).unwrap();
    b0.set_ref("ref0", &a).unwrap();
    b0.save(&store).unwrap();
    let b1 = Object::of::<B>();
    b1.set("foo", 2).unwrap();
    b1.save(&store).unwrap();

    let qa = Query::of::<A>().equal_to("foo", 1);
    let qb = Query::of::<B>().matches_query("ref0", &qa, &store).unwrap();
    assert_eq!(found(&qb, &store), vec![b0.id()]);
}

#[test]
fn test_does_not_match_query() {
    let store = store();
    let a = save_a(&store, json!({"foo": 1}));
    save_a(&store, json!({"foo": 2}));
    let b0 = Object::of::<B>();
    b0.set("foo", 2).unwrap();
    b0.set_ref("ref0", &a).unwrap();
    b0.save(&store).unwrap();
    let b1 = Object::of::<B>();
    b1.set("foo", 2).unwrap();
    b1.save(&store).unwrap();

    let qa = Query::of::<A>().equal_to("foo", 1);
    let no_ref = Query::of::<B>().does_not_exist("ref0");
    let not_in_qa = Query::of::<B>().does_not_match_query("ref0", &qa, &store).unwrap();
    let query = OrQuery::new([no_ref, not_in_qa]);
    assert_eq!(ids(&query.find(&store).unwrap().unwrap()), vec![b1.id()]);
}

#[test]
fn test_empty_nested_query() {
    let store = store();
    let a = save_a(&store, json!({"foo": 1}));
    let b = Object::of::<B>();
    b.set_ref("ref0", &a).unwrap();
    b.save(&store).unwrap();

    let nothing = Query::of::<A>().equal_to("foo", 99);
    let matching = Query::of::<B>().matches_query("ref0", &nothing, &store).unwrap();
    assert!(matching.find(&store).unwrap().is_none());

    let excluding = Query::of::<B>().does_not_match_query("ref0", &nothing, &store).unwrap();
    assert_eq!(found(&excluding, &store), vec![b.id()]);
}

#[test]
fn test_query_dates() {
    let store = store();
    let a0 = Object::of::<A>();
    a0.set_timestamp("a_date", Utc::now() - Duration::hours(1)).unwrap();
    a0.save(&store).unwrap();
    let a1 = Object::of::<A>();
    a1.set_timestamp("a_date", Utc::now() - Duration::minutes(61)).unwrap();
    a1.save(&store).unwrap();

    let now = timestamp_value(Utc::now());
    assert_eq!(Query::of::<A>().less_than("a_date", now, false).count(&store).unwrap(), 2);

    let cutoff = timestamp_value(Utc::now() - Duration::seconds(3630));
    let query = Query::of::<A>().greater_than("a_date", cutoff, false);
    assert_eq!(found(&query, &store), vec![a0.id()]);
}

#[test]
fn test_query_envelope_timestamps() {
    let store = store();
    let before = timestamp_value(Utc::now() - Duration::seconds(1));
    let a = save_a(&store, json!({"foo": 1}));

    let query = Query::of::<A>().greater_than("created_at", before, false).does_not_exist("updated_at");
    assert_eq!(found(&query, &store), vec![a.id()]);
}
