// 后台任务池
//
// 每个任务是一个完整的逻辑操作（一次检查、一次安装、一次扫描），
// 并发数由信号量限制，结果通过 oneshot 返回，提交方从不阻塞。

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};

/// 默认并发数
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl TaskPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 当前空闲的并发槽位
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// 提交一个任务，返回结果接收端
    ///
    /// 接收端被丢弃不影响任务本身执行完毕。
    pub fn submit<F, T>(&self, name: &'static str, task: F) -> oneshot::Receiver<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::warn!(task = name, "任务池已关闭，任务未执行");
                return;
            };
            tracing::debug!(task = name, "后台任务开始");
            let output = task.await;
            if tx.send(output).is_err() {
                tracing::debug!(task = name, "任务结果无人接收");
            }
            tracing::debug!(task = name, "后台任务结束");
        });

        rx
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_returns_result() {
        let pool = TaskPool::new(2);
        let rx = pool.submit("add", async { 40 + 2 });
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = TaskPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let receivers: Vec<_> = (0..8)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                pool.submit("sleep", async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for rx in receivers {
            rx.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_cancel_task() {
        let pool = TaskPool::new(1);
        let done = Arc::new(AtomicUsize::new(0));
        let flag = done.clone();
        drop(pool.submit("fire-and-forget", async move {
            flag.store(1, Ordering::SeqCst);
        }));
        pool.submit("barrier", async {}).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(TaskPool::new(0).size(), 1);
    }
}
