use std::collections::HashSet;

use proptest::prelude::*;

use planloop::config::PlanFile;
use planloop::plan::ExecutionPlan;
use planloop::remote::StepEvent;
use planloop::sched::{priority_key, DispatchKey};
use planloop_test_utils::builders::{PlanFileBuilder, StepConfigBuilder};

// Strategy to generate a valid plan configuration.
// We ensure acyclicity by only allowing step N to depend on steps 0..N-1.
fn plan_strategy(max_steps: usize) -> impl Strategy<Value = PlanFile> {
    (1..=max_steps).prop_flat_map(|num_steps| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_steps),
            num_steps,
        );

        deps_strat.prop_map(move |raw_deps| {
            let mut builder = PlanFileBuilder::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let name = format!("step_{i:02}");
                let mut step = StepConfigBuilder::new(&format!("echo {name}"));

                // Sanitize dependencies: only allow deps < i.
                let mut valid_deps = HashSet::new();
                for dep_idx in potential_deps {
                    if i > 0 {
                        valid_deps.insert(dep_idx % i);
                    }
                }
                for dep_idx in valid_deps {
                    step = step.after(&format!("step_{dep_idx:02}"));
                }

                builder = builder.with_step(&name, step.build());
            }
            builder.build()
        })
    })
}

proptest! {
    /// Whatever the DAG shape and whichever steps fail, repeatedly draining
    /// ready steps and marking unreachable ones always terminates with every
    /// step in a terminal state.
    #[test]
    fn test_plan_always_drains_to_all_terminal(
        plan_file in plan_strategy(10),
        failing_indices in proptest::collection::vec(0..10usize, 0..5),
    ) {
        let step_names: Vec<String> = plan_file.step.keys().cloned().collect();
        let failing: HashSet<String> = failing_indices
            .iter()
            .filter(|&&i| i < step_names.len())
            .map(|&i| step_names[i].clone())
            .collect();

        let mut plan = ExecutionPlan::from_plan_file(&plan_file);

        // Queue of steps currently "executing".
        let mut executing: Vec<String> = Vec::new();
        let mut completions = 0usize;
        let max_completions = step_names.len() + 1;

        loop {
            executing.extend(plan.ready_steps().into_iter().map(|s| s.id));

            // Propagate unreachability to a fixpoint, like the loop does.
            loop {
                let blocked = plan.unreachable_candidates();
                if blocked.is_empty() {
                    break;
                }
                for step in blocked {
                    plan.mark_unreachable(&step);
                }
            }

            if executing.is_empty() {
                break;
            }

            let step = executing.remove(0);
            let event = if failing.contains(&step) {
                StepEvent::Failed {
                    step,
                    message: "scripted failure".to_string(),
                    trace: None,
                }
            } else {
                StepEvent::Succeeded { step }
            };
            plan.apply_event(&event);

            completions += 1;
            prop_assert!(
                completions <= max_completions,
                "more completions than steps - double dispatch?"
            );
        }

        prop_assert!(plan.is_complete(), "plan stalled with non-terminal steps");
    }

    /// The dispatch ordering is a total order: sorting any permutation of
    /// keys yields the same sequence, priority keys descend from declared
    /// priority, and ties break on step id.
    #[test]
    fn test_dispatch_key_order_is_deterministic(
        entries in proptest::collection::vec((0..5i64, "[a-z]{1,6}"), 1..20),
        run_priority in -10..10i64,
    ) {
        let mut keys: Vec<DispatchKey> = entries
            .iter()
            .map(|(tag, id)| DispatchKey::new(priority_key(Some(*tag), run_priority), id.clone()))
            .collect();

        let mut reversed = keys.clone();
        reversed.reverse();

        keys.sort();
        reversed.sort();
        prop_assert_eq!(&keys, &reversed);

        for pair in keys.windows(2) {
            prop_assert!(pair[0].priority <= pair[1].priority);
            if pair[0].priority == pair[1].priority {
                prop_assert!(pair[0].step <= pair[1].step);
            }
        }
    }
}

#[test]
fn test_priority_key_formula() {
    // Higher declared priority -> smaller (more urgent) key.
    assert_eq!(priority_key(Some(10), 0), -10);
    assert_eq!(priority_key(Some(1), 2), -3);
    assert_eq!(priority_key(None, 0), 0);
    assert_eq!(priority_key(None, 5), -5);
    assert_eq!(priority_key(Some(-4), 0), 4);
    assert!(priority_key(Some(10), 0) < priority_key(Some(5), 0));
}
