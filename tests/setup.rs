use assemblage::{create_container, BuildErrorKind, FeatureDefinition, SetupCallback, SetupErrorKind, SETUP_CALLBACKS};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tracing_test::traced_test;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn push(log: &Log, entry: &'static str) -> SetupCallback {
    let log = log.clone();
    SetupCallback::new(move || {
        let log = log.clone();
        async move {
            log.lock().push(entry);
            anyhow::Ok(())
        }
    })
}

#[tokio::test]
#[traced_test]
async fn test_setups_fail_fast() {
    let log = Log::default();
    let result = create_container()
        .add({
            let log = log.clone();
            move |context| {
                context.register_value(SETUP_CALLBACKS, push(&log, "s1"));
                context.setup({
                    let log = log.clone();
                    move || {
                        let log = log.clone();
                        async move {
                            log.lock().push("s2");
                            Err::<(), _>(anyhow::anyhow!("s2 failed"))
                        }
                    }
                });
                context.register_value(SETUP_CALLBACKS, push(&log, "s3"));
                Ok(FeatureDefinition::new())
            }
        })
        .build()
        .await;

    let Err(BuildErrorKind::Setup(SetupErrorKind::Failed { index, source })) = result else {
        panic!("setup failure expected");
    };
    assert_eq!(index, 1);
    assert_eq!(source.to_string(), "s2 failed");
    assert_eq!(*log.lock(), ["s1", "s2"]);
}

#[tokio::test]
#[traced_test]
async fn test_setups_sequential() {
    let log = Log::default();
    let container = create_container()
        .add({
            let log = log.clone();
            move |context| {
                context.setup({
                    let log = log.clone();
                    move || {
                        let log = log.clone();
                        async move {
                            // The next callback doesn't start until this one finishes
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            log.lock().push("slow");
                            anyhow::Ok(())
                        }
                    }
                });
                Ok(FeatureDefinition::new())
            }
        })
        .add({
            let log = log.clone();
            move |context| {
                context.register_value(SETUP_CALLBACKS, push(&log, "fast"));
                Ok(FeatureDefinition::new())
            }
        })
        .build()
        .await
        .unwrap();

    assert_eq!(*log.lock(), ["slow", "fast"]);
    assert_eq!(container.registry::<SetupCallback>(SETUP_CALLBACKS).unwrap().len(), 2);
}

#[tokio::test]
#[traced_test]
async fn test_setup_uses_services() {
    let log = Log::default();
    create_container()
        .add({
            let log = log.clone();
            move |context| {
                let greeting = context.reference::<&'static str>("greeting");
                let log = log.clone();
                context.setup(move || {
                    let greeting = greeting.clone();
                    let log = log.clone();
                    async move {
                        log.lock().push(*greeting.get()?);
                        anyhow::Ok(())
                    }
                });
                Ok(FeatureDefinition::new())
            }
        })
        .add(|_| Ok(FeatureDefinition::new().value("greeting", "hi")))
        .build()
        .await
        .unwrap();

    assert_eq!(*log.lock(), ["hi"]);
}

#[tokio::test]
#[traced_test]
async fn test_setup_in_merged_group() {
    let log = Log::default();
    create_container()
        .add({
            let log = log.clone();
            move |context| {
                context.register_value(SETUP_CALLBACKS, push(&log, "before"));
                let log = log.clone();
                context
                    .merge(move |context| {
                        context.register_value(SETUP_CALLBACKS, push(&log, "merged"));
                        Ok(FeatureDefinition::new())
                    })
                    .create()?;
                Ok(FeatureDefinition::new())
            }
        })
        .build()
        .await
        .unwrap();

    assert_eq!(*log.lock(), ["before", "merged"]);
}

#[tokio::test]
#[traced_test]
async fn test_setup_runs_once_per_build() {
    let log = Log::default();
    let builder = create_container().add({
        let log = log.clone();
        move |context| {
            context.register_value(SETUP_CALLBACKS, push(&log, "setup"));
            Ok(FeatureDefinition::new())
        }
    });

    let container = builder.build().await.unwrap();
    let _ = container.registry::<SetupCallback>(SETUP_CALLBACKS).unwrap();
    assert_eq!(*log.lock(), ["setup"]);

    builder.build().await.unwrap();
    assert_eq!(*log.lock(), ["setup", "setup"]);
}
