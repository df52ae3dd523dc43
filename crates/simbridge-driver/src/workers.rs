//! 后台线程生命周期
//!
//! 线程按启动顺序登记，关闭时先发取消信号，再按启动的逆序逐个 join。

use crate::cancel::CancellationToken;
use crate::error::DriverError;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

type WorkerResult = Result<(), DriverError>;

/// 带超时的 join
trait JoinTimeout<T> {
    fn join_timeout(self, timeout: Duration) -> Option<thread::Result<T>>;
}

impl<T: Send + 'static> JoinTimeout<T> for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Option<thread::Result<T>> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // 看门狗线程代为 join；超时后它继续阻塞，进程退出时回收
        thread::spawn(move || {
            let _ = tx.send(self.join());
        });

        rx.recv_timeout(timeout).ok()
    }
}

struct Worker {
    name: String,
    handle: JoinHandle<WorkerResult>,
}

/// 关闭结果
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// 按 join 顺序排列的线程名
    pub joined: Vec<String>,
    /// 返回错误、panic 或超时的线程
    pub failures: Vec<(String, DriverError)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// 取出第一个失败（按 join 顺序）
    pub fn into_result(self) -> Result<Vec<String>, DriverError> {
        match self.failures.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(self.joined),
        }
    }
}

/// 会话后台线程集合
pub struct WorkerSet {
    cancel: CancellationToken,
    workers: Vec<Worker>,
    join_timeout: Duration,
}

impl WorkerSet {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            workers: Vec::new(),
            join_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 启动命名线程
    pub fn spawn<F>(&mut self, name: &str, f: F) -> Result<(), DriverError>
    where
        F: FnOnce() -> WorkerResult + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .map_err(|source| DriverError::ThreadSpawn {
                name: name.to_string(),
                source,
            })?;

        debug!("worker {} started", name);
        self.workers.push(Worker {
            name: name.to_string(),
            handle,
        });
        Ok(())
    }

    /// 按启动顺序的线程名
    pub fn names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// 是否有线程已自行退出（致命错误或 panic）
    pub fn any_finished(&self) -> bool {
        self.workers.iter().any(|w| w.handle.is_finished())
    }

    /// 取消并逆序 join 全部线程
    pub fn shutdown(&mut self) -> ShutdownReport {
        self.cancel.cancel();

        let mut report = ShutdownReport::default();
        while let Some(worker) = self.workers.pop() {
            let outcome = match worker.handle.join_timeout(self.join_timeout) {
                Some(Ok(result)) => result,
                Some(Err(_)) => Err(DriverError::ThreadJoin(worker.name.clone())),
                None => {
                    error!(
                        "{} thread failed to shut down within {:?}",
                        worker.name, self.join_timeout
                    );
                    Err(DriverError::ThreadJoin(worker.name.clone()))
                },
            };

            match outcome {
                Ok(()) => debug!("worker {} joined", worker.name),
                Err(e) => {
                    error!("worker {} exited with error: {}", worker.name, e);
                    report.failures.push((worker.name.clone(), e));
                },
            }
            report.joined.push(worker.name);
        }
        report
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.shutdown();
        }
    }
}
