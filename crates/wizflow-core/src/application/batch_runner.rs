use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::info;

use crate::application::flow_executor::FlowExecutor;
use crate::domain::flow_result::FlowResult;
use crate::domain::flow_step::Flow;
use crate::domain::randomizer::Randomizer;
use crate::error::CoreResult;

/// Seed of the `iteration`-th flow (1-based) of a batch
pub fn iteration_seed(base_seed: u64, iteration: u32) -> u64 {
    base_seed.wrapping_add(u64::from(iteration.saturating_sub(1)))
}

/// Runs many flows against one subject; results come back in iteration order.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    executor: Arc<FlowExecutor>,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(executor: Arc<FlowExecutor>) -> Self {
        Self {
            executor,
            concurrency: 1,
        }
    }

    /// Flows in flight at once; 1 runs strictly sequentially.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn executor(&self) -> &FlowExecutor {
        &self.executor
    }

    /// Build and execute `count` flows.
    ///
    /// Each iteration gets its own randomizer seeded from `base_seed`; `build` draws
    /// from it first and execution continues on the same sequence.
    pub async fn run<F>(&self, base_seed: u64, count: u32, mut build: F) -> CoreResult<Vec<FlowResult>>
    where
        F: FnMut(&mut Randomizer, u32) -> CoreResult<Flow>,
    {
        let mut prepared = Vec::with_capacity(count as usize);
        for iteration in 1..=count {
            let mut randomizer = Randomizer::new(iteration_seed(base_seed, iteration));
            let flow = build(&mut randomizer, iteration)?;
            prepared.push((iteration, randomizer, flow));
        }
        Ok(self.execute_all(prepared).await)
    }

    async fn execute_all(&self, prepared: Vec<(u32, Randomizer, Flow)>) -> Vec<FlowResult> {
        let total = prepared.len();
        let results: Vec<FlowResult> = stream::iter(prepared)
            .map(|(iteration, mut randomizer, flow)| {
                let executor = self.executor.clone();
                async move { executor.execute(&flow, &mut randomizer, iteration).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let passed = results.iter().filter(|r| r.passed()).count();
        info!(total, passed, concurrency = self.concurrency, "Batch finished");
        results
    }
}
