//! Progress Queries - 任务进度查询

/// 查询任务当前进度
#[derive(Debug, Clone)]
pub struct GetTaskProgress {
    pub task_id: String,
}

/// 订阅任务进度流
#[derive(Debug, Clone)]
pub struct StreamTaskProgress {
    pub task_id: String,
}
