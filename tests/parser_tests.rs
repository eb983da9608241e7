//! Property tests for type expression parsing and import resolution

use docsig::resolve::{resolve, FileScope, ImportPlan, ImportedName};
use docsig::types::{parse, ParseErrorKind, TypeExpr, TypeRegistry};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("int".to_string()),
        Just("str".to_string()),
        Just("None".to_string()),
        Just("engine.models.Product".to_string()),
        "[A-Z][a-z]{1,6}",
        ("[a-z]{1,5}", "[A-Z][a-z]{1,5}").prop_map(|(m, n)| format!("{}.{}", m, n)),
    ]
}

fn type_text() -> impl Strategy<Value = String> {
    leaf().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| format!("List[{}]", t)),
            (inner.clone(), inner.clone()).prop_map(|(k, v)| format!("Dict[{}, {}]", k, v)),
            prop::collection::vec(inner.clone(), 1..4).prop_map(|m| format!("Union[{}]", m.join(", "))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} | {}", a, b)),
            inner.clone().prop_map(|t| format!("Optional[{}]", t)),
            inner.clone().prop_map(|t| format!("Tuple[{}, ...]", t)),
            (prop::collection::vec(inner.clone(), 1..3), inner.clone())
                .prop_map(|(p, r)| format!("Callable[[{}], {}]", p.join(", "), r)),
            inner.prop_map(|r| format!("Callable[..., {}]", r)),
        ]
    })
}

fn scope() -> FileScope {
    FileScope {
        imported_names: vec![
            ImportedName {
                module: "typing".to_string(),
                name: "List".to_string(),
                alias: None,
            },
            ImportedName {
                module: "shop".to_string(),
                name: "Product".to_string(),
                alias: None,
            },
        ],
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn rendering_then_reparsing_is_stable(text in type_text()) {
        let first = parse(&text).unwrap();
        let rendered = first.to_string();
        let second = parse(&rendered).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(rendered, second.to_string());
    }

    #[test]
    fn resolution_is_deterministic(text in type_text()) {
        let expr = parse(&text).unwrap();
        let leaves = expr.leaf_names();
        let scope = scope();
        let first = resolve(&leaves, &scope, TypeRegistry::global());
        let second = resolve(&leaves, &scope, TypeRegistry::global());
        prop_assert_eq!(&first, &second);
    }

    #[test]
    fn import_order_does_not_depend_on_insertion_order(
        texts in prop::collection::vec(type_text(), 1..5).prop_shuffle()
    ) {
        let scope = scope();
        let statements: Vec<_> = texts
            .iter()
            .flat_map(|t| {
                let leaves = parse(t).unwrap().leaf_names();
                resolve(&leaves, &scope, TypeRegistry::global())
                    .into_values()
                    .filter_map(|r| r.import)
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut forward = ImportPlan::new();
        forward.extend(&statements);
        let mut backward = ImportPlan::new();
        backward.extend(statements.iter().rev());
        prop_assert_eq!(
            forward.render(&scope, TypeRegistry::global()),
            backward.render(&scope, TypeRegistry::global())
        );
    }
}

#[test]
fn test_documented_examples() {
    let expr = parse("Union[Iterable[Dict], Iterable[engine.models.Product]]").unwrap();
    let TypeExpr::Union { members } = &expr else {
        panic!("expected a union, got {:?}", expr);
    };
    assert_eq!(members.len(), 2);
    assert_eq!(members[1], parse("Iterable[engine.models.Product]").unwrap());
    assert!(expr
        .leaf_names()
        .contains(&vec!["engine".to_string(), "models".to_string(), "Product".to_string()]));

    assert_eq!(parse("Optional[int]").unwrap(), parse("Union[int, None]").unwrap());
    assert_eq!(parse("Dict[str").unwrap_err().kind, ParseErrorKind::UnbalancedBrackets);
}
