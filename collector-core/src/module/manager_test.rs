#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    use crate::errors::{CollectorError, Result};
    use crate::module::{
        bootstrap, ModuleManager, ModuleProvider, ModuleState, ServiceRegistry,
    };

    trait Marker: Send + Sync {
        fn owner(&self) -> &'static str;
    }

    struct Owned(&'static str);
    impl Marker for Owned {
        fn owner(&self) -> &'static str {
            self.0
        }
    }

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        module: &'static str,
        requires: &'static [&'static str],
        log: Log,
        fail_start: bool,
    }

    impl Recording {
        fn boxed(
            module: &'static str,
            requires: &'static [&'static str],
            log: &Log,
        ) -> Box<dyn ModuleProvider> {
            Box::new(Self {
                module,
                requires,
                log: log.clone(),
                fail_start: false,
            })
        }

        fn record(&self, phase: &str) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", phase, self.module));
        }
    }

    #[async_trait]
    impl ModuleProvider for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn module(&self) -> &str {
            self.module
        }

        fn required_modules(&self) -> &[&'static str] {
            self.requires
        }

        async fn prepare(
            &mut self,
            manager: &ModuleManager,
            services: &mut ServiceRegistry,
        ) -> Result<()> {
            for required in self.requires {
                let marker = manager.service::<dyn Marker>(required)?;
                assert_eq!(marker.owner(), *required);
            }
            services.register::<dyn Marker>(Arc::new(Owned(self.module)))?;
            self.record("prepare");
            Ok(())
        }

        async fn start(&mut self, manager: &ModuleManager) -> Result<()> {
            for required in self.requires {
                assert_eq!(manager.state(required), ModuleState::Started);
            }
            if self.fail_start {
                return Err(CollectorError::BackendUnavailable("refused".into()));
            }
            self.record("start");
            Ok(())
        }

        async fn notify_after_completed(&mut self, _: &ModuleManager) -> Result<()> {
            self.record("notify");
            Ok(())
        }
    }

    fn phases(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn required_module_runs_first_for_any_input_order() {
        for reversed in [false, true] {
            let log: Log = Arc::default();
            let mut providers = vec![
                Recording::boxed("a", &["b"], &log),
                Recording::boxed("b", &[], &log),
            ];
            if reversed {
                providers.reverse();
            }

            let running = bootstrap(providers).await.unwrap();

            let phases = phases(&log);
            assert_eq!(
                &phases[..4],
                &["prepare:b", "prepare:a", "start:b", "start:a"]
            );
            let mut notified = phases[4..].to_vec();
            notified.sort();
            assert_eq!(notified, vec!["notify:a", "notify:b"]);

            assert_eq!(running.manager.state("a"), ModuleState::Ready);
            assert_eq!(running.manager.state("b"), ModuleState::Ready);
            assert_eq!(running.manager.modules().collect::<Vec<_>>(), vec!["b", "a"]);
        }
    }

    #[tokio::test]
    async fn unrelated_modules_keep_input_order() {
        let log: Log = Arc::default();
        let providers = vec![
            Recording::boxed("x", &[], &log),
            Recording::boxed("c", &["y"], &log),
            Recording::boxed("y", &[], &log),
        ];

        let running = bootstrap(providers).await.unwrap();
        assert_eq!(
            running.manager.modules().collect::<Vec<_>>(),
            vec!["x", "y", "c"]
        );
    }

    #[tokio::test]
    async fn two_providers_for_one_module_conflict() {
        let log: Log = Arc::default();
        let providers = vec![
            Recording::boxed("storage", &[], &log),
            Recording::boxed("storage", &[], &log),
        ];

        let err = bootstrap(providers).await.unwrap_err();
        assert!(matches!(err, CollectorError::ConfigurationConflict(_)));
        assert!(phases(&log).is_empty());
    }

    #[tokio::test]
    async fn missing_required_module_fails_fast() {
        let log: Log = Arc::default();
        let providers = vec![Recording::boxed("storage", &["cluster"], &log)];

        let err = bootstrap(providers).await.unwrap_err();
        match err {
            CollectorError::MissingDependency { module, required } => {
                assert_eq!(module, "storage");
                assert_eq!(required, "cluster");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn dependency_cycle_is_reported() {
        let log: Log = Arc::default();
        let providers = vec![
            Recording::boxed("root", &[], &log),
            Recording::boxed("a", &["b"], &log),
            Recording::boxed("b", &["a"], &log),
        ];

        match bootstrap(providers).await.unwrap_err() {
            CollectorError::DependencyCycle(path) => {
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(phases(&log).is_empty());
    }

    #[tokio::test]
    async fn failing_start_aborts_bootstrap() {
        let log: Log = Arc::default();
        let providers: Vec<Box<dyn ModuleProvider>> = vec![
            Recording::boxed("b", &[], &log),
            Box::new(Recording {
                module: "a",
                requires: &["b"],
                log: log.clone(),
                fail_start: true,
            }),
        ];

        let err = bootstrap(providers).await.unwrap_err();
        assert!(matches!(err, CollectorError::BackendUnavailable(_)));
        assert!(!phases(&log).iter().any(|p| p.starts_with("notify")));
    }

    #[test]
    fn lookups_on_unknown_modules() {
        let manager = ModuleManager::default();
        assert!(matches!(
            manager.service::<dyn Marker>("storage"),
            Err(CollectorError::ServiceNotProvided { .. })
        ));
        assert!(matches!(
            manager.find("storage"),
            Err(CollectorError::ServiceNotProvided { ref module, .. }) if module == "storage"
        ));
        assert_eq!(manager.state("storage"), ModuleState::Unregistered);
    }
}
