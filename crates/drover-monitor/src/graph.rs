//! Step-graph construction.

use std::collections::HashSet;
use std::sync::Arc;

use drover_core::{Build, Step, StepInit, StorePath};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::error::Result;
use crate::state::State;

impl State {
    /// Materialise the step for `drv_path` and, recursively, its
    /// dependencies, linking everything into the interner.
    ///
    /// Returns `None` when the derivation's outputs are all valid already
    /// (nothing needs to run) or when `drv_path` was proven valid earlier in
    /// this ingestion. Newly created steps are collected in `new_steps`;
    /// steps that finished initialisation with no dependencies land in
    /// `new_runnable`. The recursion terminates because derivation input
    /// graphs are acyclic and the interner never initialises a step twice.
    pub(crate) fn create_step<'a>(
        &'a self,
        drv_path: &'a StorePath,
        referring_build: Option<&'a Arc<Build>>,
        referring_step: Option<&'a Arc<Step>>,
        finished_drvs: &'a mut HashSet<StorePath>,
        new_steps: &'a mut HashSet<Arc<Step>>,
        new_runnable: &'a mut HashSet<Arc<Step>>,
    ) -> BoxFuture<'a, Result<Option<Arc<Step>>>> {
        async move {
            if finished_drvs.contains(drv_path) {
                return Ok(None);
            }

            let (step, is_new) =
                self.steps
                    .lookup_or_install(drv_path, referring_build, referring_step);

            // A pre-existing step already has its subgraph built.
            if !is_new {
                return Ok(Some(step));
            }

            debug!(drv_path = %drv_path, "considering derivation");

            // The step is visible in the interner from here on. That is
            // harmless: nobody treats it as runnable while `created` is
            // false.
            let drv = self.store.read_derivation(drv_path).await?;

            let required_system_features = drv
                .env
                .get("requiredSystemFeatures")
                .map(|features| {
                    features
                        .split_whitespace()
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();
            let prefer_local_build = drv
                .env
                .get("preferLocalBuild")
                .is_some_and(|v| v == "1")
                && self.config.local_platforms.contains(&drv.platform);

            let mut valid = true;
            for output in drv.output_paths() {
                if !self.store.is_valid_path(output).await? {
                    valid = false;
                    break;
                }
            }

            let input_drvs: Vec<StorePath> = drv.input_drvs.keys().cloned().collect();
            step.set_init(StepInit {
                drv,
                required_system_features,
                prefer_local_build,
            });

            // All outputs valid: the step is unnecessary.
            if valid {
                finished_drvs.insert(drv_path.clone());
                return Ok(None);
            }

            debug!(drv_path = %drv_path, "creating build step");
            new_steps.insert(step.clone());

            for input in &input_drvs {
                let dep = self
                    .create_step(input, None, Some(&step), finished_drvs, new_steps, new_runnable)
                    .await?;
                if let Some(dep) = dep {
                    step.lock_state().deps.insert(dep);
                }
            }

            {
                let mut state = step.lock_state();
                debug_assert!(!state.created);
                state.created = true;
                if state.deps.is_empty() {
                    new_runnable.insert(step.clone());
                }
            }

            Ok(Some(step))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::testutil::{drv, harness};

    async fn build_graph(
        h: &crate::testutil::Harness,
        root: &str,
    ) -> (Option<Arc<Step>>, HashSet<Arc<Step>>, HashSet<Arc<Step>>) {
        let mut finished_drvs = HashSet::new();
        let mut new_steps = HashSet::new();
        let mut new_runnable = HashSet::new();
        let root = h
            .state
            .create_step(
                &StorePath::from(root),
                None,
                None,
                &mut finished_drvs,
                &mut new_steps,
                &mut new_runnable,
            )
            .await
            .unwrap();
        (root, new_steps, new_runnable)
    }

    #[tokio::test]
    async fn diamond_dependencies_share_one_step() {
        let h = harness(MonitorConfig::default());
        h.store.add_derivation("/d/d", drv("/o/d", &[]));
        h.store.add_derivation("/d/b", drv("/o/b", &["/d/d"]));
        h.store.add_derivation("/d/c", drv("/o/c", &["/d/d"]));
        h.store.add_derivation("/d/a", drv("/o/a", &["/d/b", "/d/c"]));

        let (root, new_steps, new_runnable) = build_graph(&h, "/d/a").await;
        let root = root.expect("root must need building");

        assert_eq!(new_steps.len(), 4);
        assert_eq!(h.state.steps.live_count(), 4);

        // Exactly one step for the shared dependency, runnable, with both
        // parents as rdeps.
        let shared = new_steps
            .iter()
            .find(|s| s.drv_path().as_str() == "/d/d")
            .expect("shared step exists");
        assert!(new_runnable.iter().any(|s| Arc::ptr_eq(s, shared)));
        let mut rdeps: Vec<String> = shared
            .lock_state()
            .rdeps
            .iter()
            .filter_map(|w| w.upgrade())
            .map(|s| s.drv_path().as_str().to_owned())
            .collect();
        rdeps.sort();
        assert_eq!(rdeps, vec!["/d/b".to_owned(), "/d/c".to_owned()]);

        // The root depends on both intermediates and is not runnable.
        assert_eq!(root.lock_state().deps.len(), 2);
        assert!(!root.runnable());
    }

    #[tokio::test]
    async fn valid_input_subgraph_yields_one_runnable_step() {
        let h = harness(MonitorConfig::default());
        h.store.add_derivation("/d/leaf", drv("/o/leaf", &[]));
        h.store.mark_valid("/o/leaf");
        h.store.add_derivation("/d/root", drv("/o/root", &["/d/leaf"]));

        let (root, new_steps, new_runnable) = build_graph(&h, "/d/root").await;
        let root = root.expect("root must need building");

        assert_eq!(new_steps.len(), 1);
        assert_eq!(new_runnable.len(), 1);
        assert!(root.runnable());
        assert!(root.lock_state().deps.is_empty());
    }

    #[tokio::test]
    async fn fully_valid_derivation_is_skipped() {
        let h = harness(MonitorConfig::default());
        h.store.add_derivation("/d/cached", drv("/o/cached", &[]));
        h.store.mark_valid("/o/cached");

        let (root, new_steps, new_runnable) = build_graph(&h, "/d/cached").await;
        assert!(root.is_none());
        assert!(new_steps.is_empty());
        assert!(new_runnable.is_empty());
    }

    #[tokio::test]
    async fn derivation_environment_drives_step_init() {
        let mut config = MonitorConfig::default();
        config.local_platforms.insert("riscv64-linux".to_owned());
        let h = harness(config);

        let mut recipe = drv("/o/a", &[]);
        recipe.platform = "riscv64-linux".to_owned();
        recipe.env.insert(
            "requiredSystemFeatures".to_owned(),
            "kvm big-parallel".to_owned(),
        );
        recipe.env.insert("preferLocalBuild".to_owned(), "1".to_owned());
        h.store.add_derivation("/d/a", recipe);

        let (root, _, _) = build_graph(&h, "/d/a").await;
        let root = root.expect("root must need building");
        let init = root.init().expect("initialised");
        assert!(init.prefer_local_build);
        assert_eq!(init.required_system_features.len(), 2);
        assert!(init.required_system_features.contains("kvm"));
        assert!(init.required_system_features.contains("big-parallel"));
    }

    #[tokio::test]
    async fn prefer_local_build_requires_a_local_platform() {
        let h = harness(MonitorConfig::default());
        let mut recipe = drv("/o/a", &[]);
        recipe.platform = "armv7l-linux".to_owned();
        recipe.env.insert("preferLocalBuild".to_owned(), "1".to_owned());
        h.store.add_derivation("/d/a", recipe);

        let (root, _, _) = build_graph(&h, "/d/a").await;
        let root = root.expect("root must need building");
        let init = root.init().expect("initialised");
        assert!(!init.prefer_local_build);
    }
}
