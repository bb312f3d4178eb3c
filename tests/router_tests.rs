use brrtnav::definition::{load_route_config, LoaderRegistry, RouteDefinition};
use brrtnav::router::{
    create_branches, match_pattern, resolve_path, MatchFilter, MatchFilters, RouteMatch, Router,
};
use brrtnav::NavigationError;
use std::sync::Arc;

mod common;
use common::temp_files::create_temp_yaml;

fn zoo_routes() -> Vec<RouteDefinition> {
    vec![
        RouteDefinition::new("/").handler("root_handler"),
        RouteDefinition::new("/zoo")
            .handler("zoo_layout")
            .children(vec![
                RouteDefinition::new("/animals").handler("get_animals"),
                RouteDefinition::new("/animals/:id").handler("get_animal"),
                RouteDefinition::new("/animals/new").handler("new_animal"),
                RouteDefinition::new("/animals/:id/toys/:toy_id").handler("animal_toy"),
                RouteDefinition::new("/health").handler("health_check"),
            ]),
        RouteDefinition::new("/:lang?/docs/*page").handler("docs"),
        RouteDefinition::new("*404").handler("not_found"),
    ]
}

fn leaf_handler(matches: &[RouteMatch]) -> Option<String> {
    matches
        .last()
        .and_then(|m| m.route.handler_name.as_deref())
        .map(str::to_string)
}

fn assert_route_match(router: &Router, path: &str, expected_handler: &str) -> Vec<RouteMatch> {
    let matches = router.match_path(path);
    assert_eq!(
        leaf_handler(&matches).as_deref(),
        Some(expected_handler),
        "Handler mismatch for {path}"
    );
    matches
}

#[test]
fn test_zoo_routes() {
    let router = Router::new(&zoo_routes(), "");
    assert_route_match(&router, "/", "root_handler");
    assert_route_match(&router, "/zoo/animals", "get_animals");
    assert_route_match(&router, "/zoo/health", "health_check");

    let matches = assert_route_match(&router, "/zoo/animals/123", "get_animal");
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].route.handler_name.as_deref(), Some("zoo_layout"));
    assert_eq!(matches[0].path, "/zoo");
    assert_eq!(matches[1].get_param("id"), Some("123"));

    let matches = assert_route_match(&router, "/zoo/animals/7/toys/ball", "animal_toy");
    assert_eq!(matches[1].get_param("id"), Some("7"));
    assert_eq!(matches[1].get_param("toy_id"), Some("ball"));
}

#[test]
fn test_static_segment_beats_dynamic() {
    let routes = vec![
        RouteDefinition::new("/users/:id").handler("user"),
        RouteDefinition::new("/users/new").handler("new_user"),
    ];
    let router = Router::new(&routes, "");
    let matches = assert_route_match(&router, "/users/new", "new_user");
    assert!(matches[0].params.is_empty());
    assert_route_match(&router, "/users/42", "user");

    let nested = Router::new(&zoo_routes(), "");
    assert_route_match(&nested, "/zoo/animals/new", "new_animal");
}

#[test]
fn test_branch_order_is_stable() {
    let routes = zoo_routes();
    let first: Vec<(i64, String)> = create_branches(&routes, "")
        .iter()
        .map(|b| (b.score(), b.leaf().map(|r| r.pattern.clone()).unwrap_or_default()))
        .collect();
    for _ in 0..5 {
        let again: Vec<(i64, String)> = create_branches(&routes, "")
            .iter()
            .map(|b| (b.score(), b.leaf().map(|r| r.pattern.clone()).unwrap_or_default()))
            .collect();
        assert_eq!(first, again);
    }
    let scores: Vec<i64> = first.iter().map(|(s, _)| *s).collect();
    let mut sorted = scores.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(scores, sorted);
    let mut unique = scores.clone();
    unique.dedup();
    assert_eq!(unique.len(), scores.len(), "scores must be a total order");
}

#[test]
fn test_resolve_then_match_round_trip() {
    let routes = vec![RouteDefinition::new("/orgs/:org/repos/:repo").handler("repo")];
    for base in ["", "/app", "/nested/base"] {
        let router = Router::new(&routes, base);
        let resolved = resolve_path(base, "/orgs/acme/repos/engine", None).unwrap();
        let matches = router.match_path(&resolved);
        assert_eq!(matches.len(), 1, "no match for {resolved} under {base:?}");
        assert_eq!(matches[0].get_param("org"), Some("acme"));
        assert_eq!(matches[0].get_param("repo"), Some("engine"));
    }
}

#[test]
fn test_base_path_mounts_tree() {
    let router = Router::new(&zoo_routes(), "/app");
    assert_eq!(router.base_path(), "/app");
    assert_route_match(&router, "/app/zoo/animals", "get_animals");
    assert_route_match(&router, "/app/missing", "not_found");
    assert!(router.match_path("/zoo/animals").is_empty());
}

#[test]
fn test_unroutable_base() {
    let err = Router::try_new(&zoo_routes(), "https://example.com").err();
    assert_eq!(
        err,
        Some(NavigationError::InvalidBasePath {
            base: "https://example.com".to_string()
        })
    );

    // the infallible constructor mounts at the root instead
    let router = Router::new(&zoo_routes(), "https://example.com");
    assert_eq!(router.base_path(), "");
    assert_route_match(&router, "/zoo/animals", "get_animals");

    let router = Router::try_new(&zoo_routes(), "/app/").unwrap();
    assert_eq!(router.base_path(), "/app");
}

#[test]
fn test_optional_and_splat_params() {
    let router = Router::new(&zoo_routes(), "");
    let matches = assert_route_match(&router, "/en/docs/guide/intro", "docs");
    assert_eq!(matches[0].get_param("lang"), Some("en"));
    assert_eq!(matches[0].get_param("page"), Some("guide/intro"));

    let matches = assert_route_match(&router, "/docs/faq", "docs");
    assert_eq!(matches[0].get_param("lang"), None);
    assert_eq!(matches[0].get_param("page"), Some("faq"));

    let matches = assert_route_match(&router, "/nowhere/at/all", "not_found");
    assert_eq!(matches[0].get_param("404"), Some("nowhere/at/all"));
}

#[test]
fn test_match_filters_constrain_params() {
    let routes = vec![
        RouteDefinition::new("/items/:id")
            .handler("item")
            .filter("id", MatchFilter::predicate(|v| v.parse::<u32>().is_ok())),
        RouteDefinition::new("/items/:slug").handler("item_by_slug"),
    ];
    let router = Router::new(&routes, "");
    assert_route_match(&router, "/items/42", "item");
    assert_route_match(&router, "/items/blue-chair", "item_by_slug");
}

#[test]
fn test_unmatched_is_empty() {
    let routes = vec![RouteDefinition::new("/only").handler("only")];
    let router = Router::new(&routes, "");
    assert!(router.match_path("/other").is_empty());
}

#[test]
fn test_replace_routes_swaps_table() {
    let router = Router::new(&[RouteDefinition::new("/a").handler("a")], "/base");
    let before = router.table();
    assert_eq!(before.generation(), 1);

    router.replace_routes(&[RouteDefinition::new("/b").handler("b")]);
    assert_eq!(router.table().generation(), 2);
    assert_eq!(router.base_path(), "/base");
    assert!(router.match_path("/base/a").is_empty());
    assert_route_match(&router, "/base/b", "b");

    // readers holding the old snapshot keep a consistent table
    assert_eq!(before.branches().len(), 1);
    assert_eq!(before.generation(), 1);
}

#[test]
fn test_match_pattern_with_filters() {
    let mut filters = MatchFilters::new();
    filters.insert(
        "tab".to_string(),
        MatchFilter::OneOf(vec!["profile".into(), "settings".into()]),
    );
    let filters = Arc::new(filters);

    let hit = match_pattern("/users/:id/:tab?", Arc::clone(&filters), "/users/1/settings").unwrap();
    assert_eq!(hit.params.len(), 2);
    assert!(match_pattern("/users/:id/:tab?", Arc::clone(&filters), "/users/1/billing").is_none());
    let bare = match_pattern("/users/:id/:tab?", filters, "/users/1").unwrap();
    assert_eq!(bare.path, "/users/1");
}

#[test]
fn test_yaml_tree_matches_like_code_tree() {
    let file = create_temp_yaml(
        r#"
base: /shop
routes:
  - path: [/products, /catalog]
    handler: products
    children:
      - path: /:sku
        handler: product
        match_filters:
          sku: { regex: "^[A-Z]{3}-\\d+$" }
      - path: /
        handler: product_list
"#,
    );
    let (defs, base) = load_route_config(file.path(), &LoaderRegistry::new()).unwrap();
    assert_eq!(base, "/shop");
    let router = Router::new(&defs, &base);

    let matches = assert_route_match(&router, "/shop/catalog/ABC-12", "product");
    assert_eq!(matches[1].get_param("sku"), Some("ABC-12"));
    assert_route_match(&router, "/shop/products", "product_list");
    assert!(router.match_path("/shop/products/abc").is_empty());

    let lines = router.dump_routes();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("/shop/products > /shop/products/:sku"), "{lines:?}");
}
