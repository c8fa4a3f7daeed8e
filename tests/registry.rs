use assemblage::{create_container, BuildErrorKind, CompileErrorKind, Definition, FeatureDefinition, RegistryList};
use tracing_test::traced_test;

fn items(list: &RegistryList<&'static str>) -> Vec<&'static str> {
    list.iter().map(|item| **item).collect()
}

#[tokio::test]
#[traced_test]
async fn test_list_order() {
    let container = create_container()
        .add(|context| {
            context.register_list::<&'static str>("plugins")?;
            context.register_value("plugins", "a");
            Ok(FeatureDefinition::new())
        })
        .add(|context| {
            context.register_value("plugins", "b");
            Ok(FeatureDefinition::new())
        })
        .build()
        .await
        .unwrap();

    assert_eq!(items(&container.registry::<&'static str>("plugins").unwrap()), ["a", "b"]);
}

#[tokio::test]
#[traced_test]
async fn test_list_contributed_before_declared() {
    let container = create_container()
        .add(|context| {
            context.register_service("plugins", || Ok("a"));
            Ok(FeatureDefinition::new())
        })
        .add(|context| {
            context.register_list::<&'static str>("plugins")?;
            context.register_value("plugins", "b");
            Ok(FeatureDefinition::new())
        })
        .build()
        .await
        .unwrap();

    assert_eq!(items(&container.registry::<&'static str>("plugins").unwrap()), ["a", "b"]);
}

#[tokio::test]
#[traced_test]
async fn test_list_declared_twice() {
    let container = create_container()
        .add(|context| {
            context.register_list::<&'static str>("plugins")?;
            Ok(FeatureDefinition::new())
        })
        .add(|context| {
            context.register_list::<&'static str>("plugins")?;
            context.register("plugins", Definition::value("a"));
            Ok(FeatureDefinition::new())
        })
        .build()
        .await
        .unwrap();

    assert_eq!(items(&container.registry::<&'static str>("plugins").unwrap()), ["a"]);
}

#[tokio::test]
#[traced_test]
async fn test_list_declared_with_another_type() {
    let result = create_container()
        .add(|context| {
            context.register_list::<&'static str>("plugins")?;
            Ok(FeatureDefinition::new())
        })
        .add(|context| {
            context.register_list::<u8>("plugins")?;
            Ok(FeatureDefinition::new())
        })
        .build()
        .await;

    assert!(matches!(
        result,
        Err(BuildErrorKind::Compile(CompileErrorKind::RegistryTypeMismatch { name, .. })) if name == "plugins"
    ));
}

#[tokio::test]
#[traced_test]
async fn test_contribution_of_another_type() {
    let result = create_container()
        .add(|context| {
            context.register_list::<&'static str>("plugins")?;
            context.register_value("plugins", 1u8);
            Ok(FeatureDefinition::new())
        })
        .build()
        .await;

    assert!(matches!(
        result,
        Err(BuildErrorKind::Compile(CompileErrorKind::RegistryTypeMismatch { .. }))
    ));
}

#[tokio::test]
#[traced_test]
async fn test_registry_and_service_names_conflict() {
    let result = create_container()
        .add(|context| {
            context.register_list::<&'static str>("plugins")?;
            Ok(FeatureDefinition::new())
        })
        .add(|_| Ok(FeatureDefinition::new().value("plugins", "a")))
        .build()
        .await;

    assert!(matches!(
        result,
        Err(BuildErrorKind::Compile(CompileErrorKind::DuplicateService { name, .. })) if name == "plugins"
    ));
}

#[tokio::test]
#[traced_test]
async fn test_registry_not_overridable() {
    let result = create_container()
        .add(|context| {
            context.register_list::<&'static str>("plugins")?;
            Ok(FeatureDefinition::new())
        })
        .add(|context| {
            context.override_service("plugins", Definition::value("a"));
            Ok(FeatureDefinition::new())
        })
        .build()
        .await;

    assert!(matches!(
        result,
        Err(BuildErrorKind::Compile(CompileErrorKind::OverrideRegistry { name, .. })) if name == "plugins"
    ));
}

#[tokio::test]
#[traced_test]
async fn test_registry_as_dependency() {
    let container = create_container()
        .add(|context| {
            let plugins = context.register_list::<&'static str>("plugins")?;
            Ok(FeatureDefinition::new().service("plugin_count", move || Ok(plugins.get()?.len())))
        })
        .add(|context| {
            context.register_value("plugins", "a");
            context.register_value("plugins", "b");
            Ok(FeatureDefinition::new())
        })
        .build()
        .await
        .unwrap();

    assert_eq!(*container.get::<usize>("plugin_count").unwrap(), 2);
}

#[tokio::test]
#[traced_test]
async fn test_map() {
    let container = create_container()
        .add(|context| {
            context.register_map::<u16>("codes")?;
            context.register_entry("codes", "ok", Definition::value(200u16));
            Ok(FeatureDefinition::new())
        })
        .add(|context| {
            context.register_entry("codes", "not_found", Definition::service(|| Ok(404u16)));
            Ok(FeatureDefinition::new())
        })
        .build()
        .await
        .unwrap();

    let codes = container.registry_map::<u16>("codes").unwrap();

    assert_eq!(codes.keys().collect::<Vec<_>>(), ["ok", "not_found"]);
    assert_eq!(codes.get("not_found").map(|code| **code), Some(404));
    assert!(codes.get("teapot").is_none());
}

#[tokio::test]
#[traced_test]
async fn test_map_duplicate_key() {
    let result = create_container()
        .add(|context| {
            context.register_map::<u16>("codes")?;
            context.register_entry("codes", "ok", Definition::value(200u16));
            Ok(FeatureDefinition::new())
        })
        .add(|context| {
            context.register_entry("codes", "ok", Definition::value(204u16));
            Ok(FeatureDefinition::new())
        })
        .build()
        .await;

    assert!(matches!(
        result,
        Err(BuildErrorKind::Compile(CompileErrorKind::DuplicateKey { name, key })) if name == "codes" && key == "ok"
    ));
}

#[tokio::test]
#[traced_test]
async fn test_undeclared_registry() {
    let result = create_container()
        .add(|context| {
            context.register_value("plugins", "a");
            Ok(FeatureDefinition::new())
        })
        .build()
        .await;

    assert!(matches!(
        result,
        Err(BuildErrorKind::Compile(CompileErrorKind::MissingService { name, .. })) if name == "plugins"
    ));
}
