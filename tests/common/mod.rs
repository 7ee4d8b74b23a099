//! 集成测试共用的假模型与装配工具

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use genforge::application::{
    GenerationRequest, ModelError, ModelHandle, ModelHandleFactory, ProgressReporter,
    TaskRegistryPort,
};
use genforge::domain::{Artifact, ModelRole, TaskRecord};
use genforge::{AppConfig, Application, WorkerHandles};

/// 假模型上的一次调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Load,
    Run,
    Unload,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub role: ModelRole,
    pub task_id: Option<String>,
    pub call: Call,
    pub at: Instant,
}

#[derive(Default)]
struct JournalInner {
    entries: Vec<Entry>,
    active: HashMap<ModelRole, usize>,
    peak: HashMap<ModelRole, usize>,
}

/// 记录所有假模型调用，以及每个角色同时运行的峰值
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<JournalInner>>);

impl Journal {
    fn record(&self, role: ModelRole, task_id: Option<&str>, call: Call) {
        let mut inner = self.0.lock().unwrap();
        inner.entries.push(Entry {
            role,
            task_id: task_id.map(str::to_string),
            call,
            at: Instant::now(),
        });
    }

    fn enter(&self, role: ModelRole) {
        let mut inner = self.0.lock().unwrap();
        let active = inner.active.entry(role).or_default();
        *active += 1;
        let current = *active;
        let peak = inner.peak.entry(role).or_default();
        *peak = (*peak).max(current);
    }

    fn leave(&self, role: ModelRole) {
        let mut inner = self.0.lock().unwrap();
        if let Some(active) = inner.active.get_mut(&role) {
            *active -= 1;
        }
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().entries.clone()
    }

    pub fn count(&self, role: ModelRole, call: Call) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.role == role && e.call == call)
            .count()
    }

    pub fn peak(&self, role: ModelRole) -> usize {
        self.0.lock().unwrap().peak.get(&role).copied().unwrap_or(0)
    }

    /// 某个任务运行之后的第一次卸载
    pub fn unload_after_run(&self, task_id: &str) -> Option<Instant> {
        let entries = self.entries();
        let run_index = entries
            .iter()
            .position(|e| e.call == Call::Run && e.task_id.as_deref() == Some(task_id))?;
        let role = entries[run_index].role;
        entries[run_index..]
            .iter()
            .find(|e| e.call == Call::Unload && e.role == role)
            .map(|e| e.at)
    }
}

/// 假模型行为
#[derive(Debug, Clone)]
pub struct Behavior {
    pub steps: u8,
    pub step_delay: Duration,
    pub fail_load: bool,
    pub fail_run: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            steps: 5,
            step_delay: Duration::from_millis(20),
            fail_load: false,
            fail_run: false,
        }
    }
}

pub struct FakeHandle {
    role: ModelRole,
    loaded: bool,
    behavior: Behavior,
    journal: Journal,
}

impl ModelHandle for FakeHandle {
    fn role(&self) -> ModelRole {
        self.role
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn ensure_loaded(&mut self) -> Result<(), ModelError> {
        self.journal.record(self.role, None, Call::Load);
        if self.behavior.fail_load {
            return Err(ModelError::unavailable(self.role, "weights missing"));
        }
        self.loaded = true;
        Ok(())
    }

    fn run(
        &mut self,
        request: &GenerationRequest,
        progress: &ProgressReporter,
    ) -> Result<Artifact, ModelError> {
        self.journal
            .record(self.role, Some(&request.task_id), Call::Run);
        self.journal.enter(self.role);

        let steps = self.behavior.steps.max(1);
        let mut outcome = Ok(());
        for step in 1..=steps {
            if progress.is_cancelled() {
                outcome = Err(ModelError::Cancelled);
                break;
            }
            std::thread::sleep(self.behavior.step_delay);
            let percent = (u32::from(step) * 100 / u32::from(steps)) as u8;
            progress.report(percent, Some(format!("step {}/{}", step, steps)));
        }
        self.journal.leave(self.role);
        outcome?;

        if self.behavior.fail_run {
            return Err(ModelError::execution("CUDA out of memory"));
        }
        Ok(Artifact::from_files(vec![PathBuf::from(format!(
            "/outputs/{}.png",
            request.task_id
        ))]))
    }

    fn unload(&mut self) {
        self.journal.record(self.role, None, Call::Unload);
        self.loaded = false;
    }
}

pub struct FakeFactory {
    behavior: Behavior,
    journal: Journal,
}

impl ModelHandleFactory for FakeFactory {
    fn create(&self, role: ModelRole) -> Box<dyn ModelHandle> {
        Box::new(FakeHandle {
            role,
            loaded: false,
            behavior: self.behavior.clone(),
            journal: self.journal.clone(),
        })
    }
}

/// 全部角色启用、短间隔的测试配置
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    for role in ModelRole::ALL {
        let model = config.models.get_mut(role);
        model.enabled = true;
        model.path = Some(PathBuf::from(format!("/models/{}", role.config_key())));
    }
    config.lease.acquire_timeout_secs = 10;
    config.progress.stream_interval_ms = 20;
    config
}

pub struct Harness {
    pub app: Application,
    pub workers: WorkerHandles,
    pub journal: Journal,
}

/// 用假模型装配并启动应用（需要在 tokio 运行时中调用）
pub fn start(config: &AppConfig, behavior: Behavior) -> Harness {
    let journal = Journal::default();
    let factory = Arc::new(FakeFactory {
        behavior,
        journal: journal.clone(),
    });
    let (app, workers) = Application::build(config, factory);
    Harness {
        app,
        workers: workers.spawn(),
        journal,
    }
}

pub fn image_params() -> serde_json::Value {
    serde_json::json!({ "prompt": "a lighthouse at dusk", "width": 512, "height": 512 })
}

/// 轮询直到任务进入终态
pub async fn wait_terminal(
    registry: &dyn TaskRegistryPort,
    task_id: &str,
    limit: Duration,
) -> TaskRecord {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(record) = registry.get(task_id) {
            if record.is_terminal() {
                return record;
            }
        }
        assert!(
            Instant::now() < deadline,
            "task {} did not finish within {:?}",
            task_id,
            limit
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
