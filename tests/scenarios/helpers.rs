//! Test utility functions for contextchain scenarios

#![allow(dead_code)]

use async_trait::async_trait;
use contextchain::core::{
    OutputCollection, PipelineSchema, RunReport, Task, TaskContext, TaskStatus,
};
use contextchain::execution::ExecutionEngine;
use contextchain::persistence::{InMemoryStore, RecordFilter, ResultRecord, Store};
use contextchain::runners::{TaskError, TaskRunner};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A scripted reply for one attempt
#[derive(Debug, Clone)]
pub enum Reply {
    Output(String),
    Fail(String),
    /// Never returns within any sane timeout
    Hang,
}

/// One call seen by the mock runner
#[derive(Debug, Clone)]
pub struct Call {
    pub task_id: u32,
    pub context: TaskContext,
}

#[derive(Default)]
struct Script {
    replies: HashMap<u32, VecDeque<Reply>>,
    sources: HashMap<String, Result<String, String>>,
    fetched: Vec<String>,
    calls: Vec<Call>,
}

/// Mock runner that returns predefined replies per task.
///
/// Once a task's script runs out it echoes `"<task_id>:<joined inputs>"`.
#[derive(Clone, Default)]
pub struct MockRunner {
    script: Arc<Mutex<Script>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies for a task's next attempts
    pub fn reply(self, task_id: u32, replies: Vec<Reply>) -> Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .entry(task_id)
            .or_default()
            .extend(replies);
        self
    }

    /// Serve a body for an input source URL
    pub fn source(self, url: &str, body: Result<&str, &str>) -> Self {
        self.script.lock().unwrap().sources.insert(
            url.to_string(),
            body.map(String::from).map_err(String::from),
        );
        self
    }

    /// Input source URLs requested, in order
    pub fn fetched(&self) -> Vec<String> {
        self.script.lock().unwrap().fetched.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Task IDs in the order they were run, one entry per attempt
    pub fn call_order(&self) -> Vec<u32> {
        self.calls().iter().map(|c| c.task_id).collect()
    }

    pub fn attempts(&self, task_id: u32) -> usize {
        self.calls().iter().filter(|c| c.task_id == task_id).count()
    }
}

#[async_trait]
impl TaskRunner for MockRunner {
    async fn run(&self, task: &Task, context: &TaskContext) -> Result<String, TaskError> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Call {
                task_id: task.task_id,
                context: context.clone(),
            });
            script
                .replies
                .get_mut(&task.task_id)
                .and_then(VecDeque::pop_front)
        };

        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Fail(error)) => Err(TaskError::Process(error)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
            None => Ok(format!("{}:{}", task.task_id, context.joined_inputs())),
        }
    }

    async fn fetch_input_source(
        &self,
        url: &str,
        _context: &TaskContext,
    ) -> Result<String, TaskError> {
        let mut script = self.script.lock().unwrap();
        script.fetched.push(url.to_string());
        match script.sources.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(e)) => Err(TaskError::Http(e.clone())),
            None => Err(TaskError::Http(format!("no route to {}", url))),
        }
    }
}

/// Parse an inline JSON schema fixture
pub fn schema(json: &str) -> PipelineSchema {
    PipelineSchema::from_json_str(json).unwrap()
}

/// Engine over a fresh in-memory store
pub fn engine_with(runner: MockRunner) -> (ExecutionEngine<MockRunner>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (ExecutionEngine::new(runner, store.clone()), store)
}

/// Run a pipeline with a mock runner
pub async fn run_pipeline_with_mock(
    schema: &PipelineSchema,
    runner: MockRunner,
) -> (RunReport, Arc<InMemoryStore>) {
    let (engine, store) = engine_with(runner);
    let report = engine.execute_pipeline(schema).await.unwrap();
    (report, store)
}

pub async fn records(
    store: &InMemoryStore,
    collection: OutputCollection,
    filter: RecordFilter,
) -> Vec<ResultRecord> {
    store.find_records(collection, &filter).await.unwrap()
}

pub fn assert_task_status(report: &RunReport, task_id: u32, status: TaskStatus) {
    let outcome = report
        .outcome(task_id)
        .unwrap_or_else(|| panic!("task {} missing from report", task_id));
    assert_eq!(
        outcome.status, status,
        "task {} ended as {:?}: {:?}",
        task_id, outcome.status, outcome.error
    );
}

pub fn assert_task_output(report: &RunReport, task_id: u32, expected: &str) {
    let output = report
        .outcome(task_id)
        .and_then(|o| o.output.as_deref())
        .unwrap_or_else(|| panic!("task {} has no output", task_id));
    assert_eq!(output, expected);
}
